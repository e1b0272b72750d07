//! Ordered, case-insensitive header storage.
//!
//! Entries are keyed by the lowercased name and keep the spelling and
//! position of their first insertion. Each entry holds a list of values:
//! one in the common case, several for repeated request headers or for
//! `set-cookie` on a response.

use crate::http::error::MissingHeader;

const SET_COOKIE: &str = "set-cookie";

/// Which side of the exchange a store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Request,
    Response,
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    key: String,
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HeaderStore {
    kind: HeaderKind,
    entries: Vec<HeaderEntry>,
}

impl HeaderStore {
    pub fn new(kind: HeaderKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.key.eq_ignore_ascii_case(name))
    }

    /// Append a value, keeping any values already stored under `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].values.push(value),
            None => self.entries.push(HeaderEntry {
                key: name.to_ascii_lowercase(),
                name,
                values: vec![value],
            }),
        }
    }

    /// Replace the value stored under `name` in place.
    ///
    /// `set-cookie` on a response never replaces: each call adds a
    /// separate header line.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.kind == HeaderKind::Response && name.eq_ignore_ascii_case(SET_COOKIE) {
            self.add(name.to_ascii_lowercase(), value);
            return;
        }

        match self.position(&name) {
            Some(i) => self.entries[i].values = vec![value.into()],
            None => self.add(name, value),
        }
    }

    /// Most recent value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.entries[i].values.last())
            .map(String::as_str)
    }

    /// Like [`get`](Self::get), but absence is an error. A present header
    /// with an empty value is returned as `Ok("")`.
    pub fn get_required(&self, name: &str) -> Result<&str, MissingHeader> {
        self.get(name).ok_or_else(|| MissingHeader(name.to_string()))
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].values,
            None => &[],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Vec<String> {
        match self.position(name) {
            Some(i) => self.entries.remove(i).values,
            None => Vec::new(),
        }
    }

    /// Header lines in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
