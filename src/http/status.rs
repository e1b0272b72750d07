//! Status codes and their reason sentences.

use std::fmt;
use std::str::FromStr;

/// Fixed code → reason table.
const REASONS: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Payload Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "I'm a teapot"),
    (422, "Unprocessable Entity"),
    (426, "Upgrade Required"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
];

/// Numeric HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const SWITCHING_PROTOCOLS: StatusCode = StatusCode(101);
    pub const OK: StatusCode = StatusCode(200);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Reason sentence from the fixed table, if the code is listed.
    pub fn reason(&self) -> Option<&'static str> {
        REASONS
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, reason)| *reason)
    }

    /// Resolve a symbolic name such as `not_found` or `im_a_teapot`.
    ///
    /// Names are the reason sentences lowercased, with spaces turned into
    /// underscores and apostrophes dropped.
    pub fn from_name(name: &str) -> Option<Self> {
        REASONS
            .iter()
            .find(|(_, reason)| symbol_of(reason) == name)
            .map(|(code, _)| StatusCode(*code))
    }
}

fn symbol_of(reason: &str) -> String {
    reason
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned when a symbolic status name is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status name: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StatusCode {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_for_known_codes() {
        assert_eq!(StatusCode::OK.reason(), Some("OK"));
        assert_eq!(StatusCode::new(101).reason(), Some("Switching Protocols"));
        assert_eq!(StatusCode::new(299).reason(), None);
    }

    #[test]
    fn symbolic_names() {
        assert_eq!("not_found".parse::<StatusCode>(), Ok(StatusCode::NOT_FOUND));
        assert_eq!("im_a_teapot".parse::<StatusCode>().map(|s| s.as_u16()), Ok(418));
        assert_eq!(
            StatusCode::from_name("non-authoritative_information").map(|s| s.as_u16()),
            Some(203)
        );
        assert_eq!(
            StatusCode::from_name("internal_server_error"),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!("teapot".parse::<StatusCode>().is_err());
    }
}
