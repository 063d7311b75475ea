//! Locale-aware display of numbers and dates.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};

use crate::error::{Result, TesseraError};
use crate::value::{Value, DATE_FORMAT};

/// Largest precision or width accepted by numeric patterns.
const MAX_PRECISION: usize = 99;

/// Number formatting conventions for a language tag such as `en-US` or `es-ES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    tag: String,
    decimal_separator: char,
    group_separator: char,
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

impl Locale {
    /// Culture-neutral conventions: `.` for decimals, `,` for groups.
    pub fn invariant() -> Self {
        Self::with_separators("", '.', ',')
    }

    pub fn with_separators(tag: impl Into<String>, decimal: char, group: char) -> Self {
        Self {
            tag: tag.into(),
            decimal_separator: decimal,
            group_separator: group,
        }
    }

    /// Look up separators by the primary language subtag. Unknown languages
    /// keep the tag but use invariant separators.
    pub fn new(tag: &str) -> Self {
        let language = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let (decimal, group) = match language.as_str() {
            "es" | "de" | "it" | "pt" | "nl" | "da" | "el" | "id" | "tr" | "ro" | "hr" | "sl" => {
                (',', '.')
            }
            "fr" | "ru" | "pl" | "cs" | "sk" | "sv" | "fi" | "nb" | "no" | "uk" | "hu" | "bg" => {
                (',', '\u{a0}')
            }
            _ => ('.', ','),
        };
        Self::with_separators(tag, decimal, group)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    pub fn group_separator(&self) -> char {
        self.group_separator
    }

    /// Default display of a value under this locale.
    pub fn display(&self, value: &Value) -> String {
        match value {
            Value::Float(n) => self.localize_number(&n.to_string(), false),
            other => other.to_string(),
        }
    }

    /// Format `value` with `pattern`. Returns `None` for values that have no
    /// formatting contract (strings, collections, null).
    pub fn format(&self, value: &Value, pattern: &str) -> Result<Option<String>> {
        match value {
            Value::Integer(n) => self.format_number(Number::Integer(*n), pattern).map(Some),
            Value::Float(n) => self.format_number(Number::Float(*n), pattern).map(Some),
            Value::Date(date) => {
                let pattern = if pattern.is_empty() { DATE_FORMAT } else { pattern };
                let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    return Err(format_error(pattern, "invalid date pattern"));
                }
                let mut out = String::new();
                write!(out, "{}", date.format_with_items(items.into_iter()))
                    .map_err(|_| format_error(pattern, "invalid date pattern"))?;
                Ok(Some(out))
            }
            _ => Ok(None),
        }
    }

    fn format_number(&self, number: Number, pattern: &str) -> Result<String> {
        let mut chars = pattern.chars();
        let specifier = chars.next().map(|c| c.to_ascii_uppercase());
        let precision = chars.as_str();
        let precision = if precision.is_empty() {
            None
        } else {
            let precision = precision
                .parse::<usize>()
                .map_err(|_| format_error(pattern, "invalid precision"))?;
            if precision > MAX_PRECISION {
                return Err(format_error(pattern, "precision out of range"));
            }
            Some(precision)
        };

        match specifier {
            None | Some('G') => Ok(self.localize_number(&number.general(), false)),
            Some('F') => {
                let text = format!("{:.*}", precision.unwrap_or(2), number.as_f64());
                Ok(self.localize_number(&text, false))
            }
            Some('N') => {
                let text = format!("{:.*}", precision.unwrap_or(2), number.as_f64());
                Ok(self.localize_number(&text, true))
            }
            Some('D') => match number {
                Number::Integer(n) => {
                    let width = precision.unwrap_or(0);
                    let digits = format!("{:0width$}", n.unsigned_abs());
                    Ok(if n < 0 { format!("-{digits}") } else { digits })
                }
                Number::Float(_) => Err(format_error(pattern, "'D' requires an integer")),
            },
            Some(_) => Err(format_error(pattern, "unsupported numeric format")),
        }
    }

    /// Swap in this locale's separators. `text` uses `.` for decimals and no grouping.
    fn localize_number(&self, text: &str, grouped: bool) -> String {
        let (sign, unsigned) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text),
        };
        let (integer, fraction) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };

        let mut out = String::from(sign);
        if grouped {
            let len = integer.len();
            for (i, digit) in integer.chars().enumerate() {
                if i > 0 && (len - i) % 3 == 0 {
                    out.push(self.group_separator);
                }
                out.push(digit);
            }
        } else {
            out.push_str(integer);
        }
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(tag: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Locale::new(tag))
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn general(self) -> String {
        match self {
            Number::Integer(n) => n.to_string(),
            Number::Float(n) => n.to_string(),
        }
    }
}

fn format_error(pattern: &str, message: &str) -> TesseraError {
    TesseraError::Format {
        message: format!("{message}: '{pattern}'"),
    }
}
