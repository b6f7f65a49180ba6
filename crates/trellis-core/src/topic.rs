//! Topic pattern parsing and matching.
//!
//! Broker topics are `/`-separated strings like
//! `devices/water_pump/duty_cycle/value`. Route patterns may contain
//! `<name>` placeholder segments, each binding exactly one topic segment.
//!
//! Patterns are compiled into a segment list once at registration time;
//! matching a message is then a linear segment comparison with no string
//! parsing per message. Matching is purely structural: equal segment count,
//! static segments compared for equality, placeholders bound to whatever
//! sits in the corresponding position.

/// A segment in a topic pattern.
#[derive(Debug, Clone, PartialEq)]
enum PatternSegment {
    /// Exact literal match for this segment
    Literal(String),
    /// Named placeholder binding exactly one topic segment
    Placeholder(String),
}

/// A compiled topic pattern.
///
/// Supported forms:
/// - Exact: `devices/water_pump/duty_cycle/value`
/// - Placeholders: `devices/<device>/<setting>/value`
#[derive(Debug, Clone)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl TopicPattern {
    /// Compile a pattern string.
    ///
    /// A segment of the form `<name>` is a placeholder; a segment that only
    /// partially looks like one (`<name`, `name>`, `<>`) is rejected rather
    /// than silently treated as a literal.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let segments = pattern
            .split('/')
            .map(|part| {
                if part.starts_with('<') && part.ends_with('>') && part.len() > 2 {
                    Ok(PatternSegment::Placeholder(
                        part[1..part.len() - 1].to_string(),
                    ))
                } else if part.contains('<') || part.contains('>') {
                    Err(PatternError::InvalidPlaceholder(part.to_string()))
                } else {
                    Ok(PatternSegment::Literal(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Get the raw pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PatternSegment::Placeholder(name) => Some(name.as_str()),
            PatternSegment::Literal(_) => None,
        })
    }

    /// Match a topic against this pattern, extracting placeholder bindings
    /// in declaration order. Returns `None` when the topic does not match.
    pub fn captures(&self, topic: &str) -> Option<Vec<String>> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                PatternSegment::Literal(lit) => {
                    if part != lit {
                        return None;
                    }
                }
                PatternSegment::Placeholder(_) => {
                    bindings.push((*part).to_string());
                }
            }
        }

        Some(bindings)
    }

    /// Check if a topic matches this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        self.captures(topic).is_some()
    }
}

/// Errors that can occur when compiling a topic pattern.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Empty pattern")]
    EmptyPattern,

    #[error("Invalid placeholder segment '{0}'")]
    InvalidPlaceholder(String),
}
