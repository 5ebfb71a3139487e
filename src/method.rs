//! HTTP method as a typed enum.
//!
//! Covers the RFC 9110 standard methods. Dispatch keys are the upper-cased
//! method name, so parsing is case-insensitive: `get`, `Get` and `GET` all
//! select [`Method::Get`]. Anything else is an unknown verb and is answered
//! with `405 Method Not Allowed` before it reaches a handler.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Every known method, in alphabetical order.
    pub const ALL: [Method; 9] = [
        Self::Connect,
        Self::Delete,
        Self::Get,
        Self::Head,
        Self::Options,
        Self::Patch,
        Self::Post,
        Self::Put,
        Self::Trace,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }

    /// Parses a method token after upper-casing it.
    pub fn parse(token: &str) -> Option<Self> {
        token.to_ascii_uppercase().parse().ok()
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Use [`Method::parse`]
/// for the case-insensitive form.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_upper_cases_the_token() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("Post"), Some(Method::Post));
        assert_eq!(Method::parse("OPTIONS"), Some(Method::Options));
    }

    #[test]
    fn from_str_is_case_sensitive() {
        assert_eq!("put".parse::<Method>(), Err(()));
        assert_eq!("PUT".parse::<Method>(), Ok(Method::Put));
    }

    #[test]
    fn unknown_verbs_do_not_parse() {
        assert_eq!(Method::parse("BREW"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn wire_form_round_trips() {
        for method in Method::ALL {
            assert_eq!(Method::parse(method.as_str()), Some(method));
        }
    }
}
