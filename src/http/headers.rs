//! Header table and header-block parsing.
//!
//! Names are stored lower-cased and compared case-insensitively. A name that
//! shows up more than once keeps a single entry whose value is every value in
//! arrival order joined by `", "`.

use thiserror::Error;

use crate::http::wire::{self, CRLF, HEADERS_END, VALUE_SEPARATOR};

/// Reasons a header line is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("whitespace before colon in header line: {0:?}")]
    SpaceBeforeColon(String),

    #[error("header line has no colon: {0:?}")]
    MissingColon(String),

    #[error("empty header name")]
    EmptyName,

    #[error("invalid character in header name: {0:?}")]
    InvalidName(String),
}

/// Case-insensitive header table with merge-on-duplicate insertion.
///
/// Entries keep the order in which each name was first inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a header block from the front of `buf`.
    ///
    /// Returns `(consumed, complete)`. `(0, false)` means the terminating
    /// blank line has not arrived yet and the caller should retry with more
    /// bytes. On error nothing from the block is kept.
    pub fn parse(&mut self, buf: &[u8]) -> Result<(usize, bool), HeaderError> {
        if buf.starts_with(HEADERS_END) {
            return Ok((HEADERS_END.len(), true));
        }

        // Blank line right after the request line: no fields at all.
        if buf.starts_with(CRLF) {
            return Ok((CRLF.len(), true));
        }

        let Some(end) = wire::find(buf, HEADERS_END) else {
            return Ok((0, false));
        };

        let mut staged = Vec::new();
        for line in wire::split_crlf(&buf[..end]) {
            if line.is_empty() {
                continue;
            }
            staged.push(parse_line(line)?);
        }

        for (name, value) in staged {
            self.insert(name, value);
        }

        Ok((end + HEADERS_END.len(), true))
    }

    /// Looks up a header by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Adds a value, appending to an existing entry with `", "` if the name is
    /// already present. An existing empty value is replaced, not joined.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) if !existing.is_empty() => {
                existing.push_str(VALUE_SEPARATOR);
                existing.push_str(&value);
            }
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Replaces any existing value for `name`.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates over `(name, value)` pairs; names are lower-case.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

fn parse_line(line: &[u8]) -> Result<(String, String), HeaderError> {
    let lossy = || String::from_utf8_lossy(line).into_owned();

    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| HeaderError::MissingColon(lossy()))?;

    if colon > 0 && line[colon - 1].is_ascii_whitespace() {
        return Err(HeaderError::SpaceBeforeColon(lossy()));
    }

    let name = line[..colon].trim_ascii();
    if name.is_empty() {
        return Err(HeaderError::EmptyName);
    }
    if !name.iter().all(|&b| wire::is_token_byte(b)) {
        return Err(HeaderError::InvalidName(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }

    // Names are pure ASCII at this point.
    let name = String::from_utf8_lossy(name).to_ascii_lowercase();
    let value = String::from_utf8_lossy(line[colon + 1..].trim_ascii()).into_owned();

    Ok((name, value))
}
