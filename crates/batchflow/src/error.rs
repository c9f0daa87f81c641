//! Errors with context and suggestions for job-file problems.

use std::fmt;
use std::path::Path;

/// An error carrying what happened, where, and what to try next.
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn job_not_found(path: &Path) -> Self {
        Self::new(format!("Job file not found: {}", path.display()))
            .with_context("The job file does not exist or cannot be read")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    pub fn invalid_job(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid job file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: [source] needs `kind` (csv, fixed, directory or sql)".to_string(),
                "TRY: [sink] needs `kind` (csv or fixed), `path` and [[sink.fields]]".to_string(),
                "TRY: Each field needs `name` and `type` (integer, decimal, boolean, string, datetime)"
                    .to_string(),
            ])
    }

    pub fn missing_option(section: &str, kind: &str, option: &str) -> Self {
        Self::new(format!("[{}] of kind '{}' requires `{}`", section, kind, option))
            .with_suggestion(format!("TRY: Add `{} = ...` to [{}]", option, section))
    }

    pub fn sql_unavailable() -> Self {
        Self::new("SQL sources are not available in this build")
            .with_context("batchflow was built without a SQL backend")
            .with_suggestion("TRY: Rebuild with `--features duckdb` (or `duckdb-bundled`)")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
