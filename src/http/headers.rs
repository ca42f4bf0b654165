//! Order-preserving header list with case-insensitive lookup.

use std::fmt;

/// Header fields in arrival order. Names compare case-insensitively.
///
/// ```
/// use rtrie::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/plain");
/// assert_eq!(headers.get("content-type"), Some("text/plain"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Appends a field. Repeated names are kept as separate entries.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("X-Request-Id", "7");
        assert_eq!(h.get("x-request-id"), Some("7"));
        assert!(h.contains("X-REQUEST-ID"));
        assert!(!h.contains("x-trace-id"));
    }

    #[test]
    fn first_value_wins_on_repeat() {
        let mut h = Headers::new();
        h.insert("Accept", "text/plain");
        h.insert("accept", "application/json");
        assert_eq!(h.get("ACCEPT"), Some("text/plain"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn display_uses_wire_format() {
        let mut h = Headers::new();
        h.insert("Host", "localhost");
        assert_eq!(h.to_string(), "Host: localhost\r\n");
    }
}
