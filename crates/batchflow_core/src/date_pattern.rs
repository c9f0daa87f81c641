//! Date patterns in the `Y-m-d H:i:s` token language, compiled to chrono
//! formatting items.
//!
//! | token | meaning | chrono |
//! |-------|---------|--------|
//! | `Y` / `y` | 4-digit / 2-digit year | `%Y` / `%y` |
//! | `m` / `n` | month, zero-padded / bare | `%m` / `%-m` |
//! | `d` / `j` | day of month, zero-padded / bare | `%d` / `%-d` |
//! | `H` / `G` | 24-hour, zero-padded / bare | `%H` / `%-H` |
//! | `h` / `g` | 12-hour, zero-padded / bare | `%I` / `%-I` |
//! | `i` / `s` | minutes / seconds | `%M` / `%S` |
//! | `A` / `a` | `AM`/`PM`, `am`/`pm` | `%p` / `%P` |
//! | `u` / `v` | microseconds / milliseconds | `%6f` / `%3f` |
//! | `M` / `F` | month name, short / full | `%b` / `%B` |
//! | `D` / `l` | weekday name, short / full | `%a` / `%A` |
//! | `U` | seconds since the Unix epoch | `%s` |
//!
//! Any other character is literal; `\` makes the next character literal.
//! When parsing, absent date parts default to 1970-01-01 and absent time
//! parts to midnight. Dates that do not exist (February 30th) are rejected.

use chrono::format::{self, Item, Parsed, StrftimeItems};
use chrono::{NaiveDateTime, Timelike};
use std::fmt;

pub const DEFAULT_DATE_PATTERN: &str = "Y-m-d H:i:s";

fn strftime(token: char) -> Option<&'static str> {
    Some(match token {
        'Y' => "%Y",
        'y' => "%y",
        'm' => "%m",
        'n' => "%-m",
        'd' => "%d",
        'j' => "%-d",
        'H' => "%H",
        'G' => "%-H",
        'h' => "%I",
        'g' => "%-I",
        'i' => "%M",
        's' => "%S",
        'A' => "%p",
        'a' => "%P",
        'u' => "%6f",
        'v' => "%3f",
        'M' => "%b",
        'F' => "%B",
        'D' => "%a",
        'l' => "%A",
        'U' => "%s",
        _ => return None,
    })
}

/// A compiled date pattern, usable for both parsing and rendering.
#[derive(Debug, Clone)]
pub struct DatePattern {
    source: String,
    render: Vec<Item<'static>>,
    parse: Vec<Item<'static>>,
    /// `h`/`g` without `A`/`a`: the hour is read as written and must be 1..=12.
    bare_twelve_hour: bool,
}

impl PartialEq for DatePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for DatePattern {}

impl Default for DatePattern {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_PATTERN)
    }
}

impl fmt::Display for DatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl DatePattern {
    pub fn new(pattern: &str) -> Self {
        // Ok(strftime spec, token) or Err(literal)
        let mut tokens: Vec<Result<(&'static str, char), char>> = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    tokens.push(Err(escaped));
                }
                continue;
            }
            tokens.push(strftime(c).map(|spec| (spec, c)).ok_or(c));
        }

        let has_meridiem = tokens
            .iter()
            .any(|token| matches!(token, Ok((_, 'A' | 'a'))));
        let mut bare_twelve_hour = false;
        let mut render = Vec::with_capacity(tokens.len());
        let mut parse = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Ok((spec, c)) => {
                    render.extend(StrftimeItems::new(spec));
                    let parse_spec = match c {
                        'h' | 'g' if !has_meridiem => {
                            bare_twelve_hour = true;
                            "%H"
                        }
                        _ => spec,
                    };
                    parse.extend(StrftimeItems::new(parse_spec));
                }
                Err(literal) => {
                    let item = Item::OwnedLiteral(literal.to_string().into_boxed_str());
                    render.push(item.clone());
                    parse.push(item);
                }
            }
        }

        Self {
            source: pattern.to_string(),
            render,
            parse,
            bare_twelve_hour,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render `value` with this pattern.
    pub fn render(&self, value: &NaiveDateTime) -> String {
        value.format_with_items(self.render.iter()).to_string()
    }

    /// Parse `input`, which must match the whole pattern.
    pub fn parse(&self, input: &str) -> Result<NaiveDateTime, String> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, input, self.parse.iter()).map_err(|e| e.to_string())?;
        fill_defaults(&mut parsed).map_err(|e| e.to_string())?;

        let value = parsed
            .to_naive_datetime_with_offset(0)
            .map_err(|e| e.to_string())?;
        if self.bare_twelve_hour && !(1..=12).contains(&value.hour()) {
            return Err(format!("12-hour value {} out of range", value.hour()));
        }
        Ok(value)
    }
}

/// Complete a partial parse with 1970-01-01 00:00:00.
fn fill_defaults(parsed: &mut Parsed) -> format::ParseResult<()> {
    if parsed.timestamp().is_some() {
        return Ok(());
    }

    if parsed.year().is_none() && parsed.year_div_100().is_none() {
        match parsed.year_mod_100() {
            Some(short) => parsed.set_year_div_100(if short < 70 { 20 } else { 19 })?,
            None => parsed.set_year(1970)?,
        }
    }
    if parsed.month().is_none() {
        parsed.set_month(1)?;
    }
    if parsed.day().is_none() {
        parsed.set_day(1)?;
    }

    if parsed.hour_div_12().is_none() && parsed.hour_mod_12().is_none() {
        parsed.set_hour(0)?;
    }
    if parsed.minute().is_none() {
        parsed.set_minute(0)?;
    }
    if parsed.second().is_none() {
        parsed.set_second(0)?;
    }
    Ok(())
}
