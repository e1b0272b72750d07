//! Path matching.
//!
//! # Responsibilities
//! - Compile route patterns once at registration
//! - Match a request path (query already stripped) segment by segment
//! - Capture `:name` segments and a trailing `*` splat
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - Empty segments are ignored, so `/a//b/` matches `/a/b`
//! - No regex, matching is a single pass over the segments

/// Values captured while matching a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    captures: Vec<(String, String)>,
    splat: Option<String>,
}

impl Params {
    /// Value captured by `:name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remainder matched by a trailing `*`, without its leading slash.
    pub fn splat(&self) -> Option<&str> {
        self.splat.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.captures.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty() && self.splat.is_none()
    }
}

/// Trait for matching request paths.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns the captured parameters if `path` matches.
    fn matches(&self, path: &str) -> Option<Params>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A compiled route pattern such as `/users/:id/files/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    splat: bool,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let mut parts: Vec<&str> = segments(pattern).collect();
        let splat = parts.last() == Some(&"*");
        if splat {
            parts.pop();
        }

        let segments = parts
            .into_iter()
            .map(|part| match part.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Capture(name.to_string()),
                _ => Segment::Literal(part.to_string()),
            })
            .collect();

        Self {
            source: pattern.to_string(),
            segments,
            splat,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl Matcher for PathPattern {
    fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = segments(path).collect();
        if parts.len() < self.segments.len() || (!self.splat && parts.len() != self.segments.len()) {
            return None;
        }

        let mut params = Params::default();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(expected) if expected == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => params.captures.push((name.clone(), (*part).to_string())),
            }
        }

        if self.splat {
            params.splat = Some(parts[self.segments.len()..].join("/"));
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
