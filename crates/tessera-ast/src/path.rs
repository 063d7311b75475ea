//! Dotted, optionally indexed model paths (`.customer.orders[0].total`).

use std::fmt;

/// One `name[index]...` step of a [`ModelPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    /// Raw index expressions between the brackets, applied in order.
    pub indexes: Vec<String>,
}

/// A parsed model path. `.` (or an empty path) refers to the model root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl ModelPath {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let segments = split_segments(raw)
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(parse_segment)
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `.` outside brackets and quotes.
fn split_segments(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') if depth > 0 => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '.') if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// `name[a][b]`: the name, then every top-level bracket group in order.
/// An unterminated group runs to the end of the segment.
fn parse_segment(segment: &str) -> PathSegment {
    let Some(open) = segment.find('[') else {
        return PathSegment {
            name: segment.to_string(),
            indexes: Vec::new(),
        };
    };

    let mut indexes = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = open + 1;

    for (i, c) in segment.char_indices().skip_while(|&(i, _)| i < open) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if depth > 0 => quote = Some(c),
            (None, '[') => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            (None, ']') if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    indexes.push(segment[start..i].to_string());
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        indexes.push(segment[start..].to_string());
    }

    PathSegment {
        name: segment[..open].to_string(),
        indexes,
    }
}
