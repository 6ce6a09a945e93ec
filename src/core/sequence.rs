//! Sequence sets and chunk address templates
//!
//! A sequence set is one pre-baked animation split into `total_chunks` chunks
//! of (nominally) `frames_per_chunk` frames. Each chunk lives under its own
//! address, produced by formatting the set's template with the logical chunk
//! number.
//!
//! # Template syntax
//!
//! - `{0}`, `{0:00}`, `{0:D3}` - composite format, zero padded to the width given
//! - `####` - hash run, padded to the number of hashes
//! - `%04d`, `%d` - printf style
//! - `{{` / `}}` - literal braces
//!
//! Example: `"fish/chunk{0:00}_2048x1024"` with chunk 3 -> `"fish/chunk03_2048x1024"`.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Stable index of a registered set (insertion order)
pub type SetId = usize;

/// Static configuration of one chunked animation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceSet {
    pub name: String,
    pub address_template: String,
    pub total_chunks: usize,
    pub fps: u32,
    pub frames_per_chunk: usize,
    /// Whether chunk numbers in the template start at 0 (otherwise 1)
    pub start_at_zero: bool,
}

impl Default for SequenceSet {
    fn default() -> Self {
        Self {
            name: "Fish".to_string(),
            address_template: "chunk{0:00}".to_string(),
            total_chunks: 1,
            fps: 30,
            frames_per_chunk: 120,
            start_at_zero: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Number { width: usize },
}

/// Parsed address template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl AddressTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let fail = |reason: &str| ConfigError::Template {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(fail("unmatched '}'")),
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(fail("unclosed '{'"));
                    }
                    let width = Self::parse_composite(&body).ok_or_else(|| {
                        fail(&format!("unsupported placeholder '{{{}}}'", body))
                    })?;
                    Self::flush(&mut segments, &mut literal);
                    segments.push(Segment::Number { width });
                }
                '#' => {
                    let mut width = 1;
                    while chars.peek() == Some(&'#') {
                        chars.next();
                        width += 1;
                    }
                    Self::flush(&mut segments, &mut literal);
                    segments.push(Segment::Number { width });
                }
                '%' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(|d| d.is_ascii_digit()) {
                        digits.push(d);
                        chars.next();
                    }
                    if chars.next() != Some('d') {
                        return Err(fail("expected '%d' or '%0Nd'"));
                    }
                    let width = if digits.is_empty() {
                        0
                    } else {
                        digits.parse().map_err(|_| fail("bad printf width"))?
                    };
                    Self::flush(&mut segments, &mut literal);
                    segments.push(Segment::Number { width });
                }
                _ => literal.push(c),
            }
        }
        Self::flush(&mut segments, &mut literal);

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// `0`, `0:000`, `0:D4` -> zero-pad width
    fn parse_composite(body: &str) -> Option<usize> {
        let (index, format) = match body.split_once(':') {
            Some((i, f)) => (i.trim(), Some(f)),
            None => (body.trim(), None),
        };
        if index != "0" {
            return None;
        }
        match format {
            None => Some(0),
            Some(f) if !f.is_empty() && f.chars().all(|c| c == '0') => Some(f.len()),
            Some(f) if f.starts_with(['D', 'd']) => {
                let digits = &f[1..];
                if digits.is_empty() {
                    Some(0)
                } else {
                    digits.parse().ok()
                }
            }
            Some(_) => None,
        }
    }

    fn flush(segments: &mut Vec<Segment>, literal: &mut String) {
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(literal)));
        }
    }

    /// True if the template produces a different address per chunk
    pub fn has_placeholder(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Number { .. }))
    }

    pub fn format(&self, number: usize) -> String {
        let mut out = String::with_capacity(self.source.len() + 4);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Number { width } => {
                    out.push_str(&format!("{:0width$}", number, width = *width))
                }
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// A validated set together with its parsed template
#[derive(Debug, Clone)]
pub struct RegisteredSet {
    pub set: SequenceSet,
    template: AddressTemplate,
}

impl RegisteredSet {
    /// Address for a zero-based chunk index
    pub fn address(&self, chunk_index: usize) -> String {
        let logical = if self.set.start_at_zero {
            chunk_index
        } else {
            chunk_index + 1
        };
        self.template.format(logical)
    }
}

/// Ordered registry of sequence sets; the position is the `SetId`
#[derive(Debug, Default, Clone)]
pub struct SetRegistry {
    sets: Vec<RegisteredSet>,
}

impl SetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, set: SequenceSet) -> Result<SetId, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSet {
            name: set.name.clone(),
            reason: reason.to_string(),
        };
        if set.total_chunks == 0 {
            return Err(invalid("total_chunks must be at least 1"));
        }
        if set.frames_per_chunk == 0 {
            return Err(invalid("frames_per_chunk must be at least 1"));
        }

        let template = AddressTemplate::parse(&set.address_template)?;
        if !template.has_placeholder() && set.total_chunks > 1 {
            return Err(invalid("template has no chunk placeholder but the set has several chunks"));
        }

        self.sets.push(RegisteredSet { set, template });
        Ok(self.sets.len() - 1)
    }

    pub fn get(&self, set_id: SetId) -> Option<&RegisteredSet> {
        self.sets.get(set_id)
    }

    pub fn address(&self, set_id: SetId, chunk_index: usize) -> Option<String> {
        self.get(set_id).map(|s| s.address(chunk_index))
    }

    pub fn total_chunks(&self, set_id: SetId) -> usize {
        self.get(set_id).map(|s| s.set.total_chunks).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
