//! A source adapter applying field transfer policies.

use tracing::debug;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::schema::Schema;
use crate::source::{Bindings, RecordSource};
use crate::types::InputType;
use crate::value::SharedValue;

/// Reads rows from an inner source into its own input schema, then moves
/// each value into the target schema through a [`Field`].
pub struct MappedSource<S> {
    inner: S,
    input: Schema,
    fields: Vec<Field>,
    links: Vec<(usize, SharedValue)>,
    bindings: Bindings,
}

impl<S: RecordSource> MappedSource<S> {
    pub fn new(inner: S, input: Schema, fields: Vec<Field>) -> Self {
        Self {
            inner,
            input,
            fields,
            links: Vec::new(),
            bindings: Bindings::default(),
        }
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordSource> RecordSource for MappedSource<S> {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        let bindings = Bindings::resolve(schema, field_names)?;
        let mut links = Vec::with_capacity(field_names.len());
        let mut input_names: Vec<String> = Vec::new();

        for name in field_names {
            let index = self
                .fields
                .iter()
                .position(|field| field.name() == name)
                .ok_or_else(|| Error::configuration(format!("No mapping for field '{}'", name)))?;
            let field = &mut self.fields[index];
            field.bind(schema.value(name)?.clone());
            if field.input_type() == InputType::Manual {
                continue;
            }

            let input_name = field.input_name();
            let input = self.input.value(input_name).map_err(|_| {
                Error::configuration(format!(
                    "Field '{}' reads '{}', which is not in the input schema",
                    name, input_name
                ))
            })?;
            if !input_names.iter().any(|known| known == input_name) {
                input_names.push(input_name.to_string());
            }
            links.push((index, input.clone()));
        }

        debug!(
            fields = field_names.len(),
            inputs = input_names.len(),
            "configuring mapped source"
        );
        self.inner.configure(&self.input, &input_names)?;
        self.links = links;
        self.bindings = bindings;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn read(&mut self) -> Result<bool> {
        if !self.inner.read()? {
            return Ok(false);
        }
        for (index, input) in &self.links {
            self.fields[*index].set_value(input)?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}
