//! Errors for xoimport
//!
//! error_chain and failure are certainly nice, but completely overengineered
//! for this use-case. Matching on `*e.kind()` or wiring up `From` conversions
//! through a macro-generated tree makes debugging harder, not easier. So the
//! error type here is the plain Rust-native shape: an enum, `From` impls, and
//! pattern matching. Each variant carries a message chain so the caller can
//! see which stage of the pipeline failed and why.

use std::fmt;
use std::io;

/// Every fallible operation in this crate returns this on failure.
#[derive(Debug)]
pub enum Error {
    /// Source file or stream could not be opened or seeked.
    InputOpen(String),
    /// Malformed PDF syntax: unexpected token, unbalanced delimiters, a
    /// non-matching object declaration, a missing required dictionary key.
    Parse(String),
    /// A well-formed but unsupported PDF feature: a filter other than
    /// `/FlateDecode`, a predictor/columns combination we don't decode,
    /// an encrypted document, a cross-reference stream missing required
    /// fields.
    UnsupportedFeature(String),
    /// A dangling indirect reference: the id is not present in either
    /// xref map.
    Reference(String),
    /// Page number out of range, a box missing with no fallback, or the
    /// `/Parent` chain was exhausted while resolving an inherited
    /// attribute.
    Page(String),
    /// Internal invariant violation in the serializer (e.g. attempting to
    /// emit when no current object is open).
    Serialization(String),
    /// Wraps the underlying I/O error from the source reader.
    Io(io::Error),
}

impl Error {
    /// Prefixes an existing error with context describing the enclosing
    /// action, building the "failed to X -> failed to Y -> ..." chains
    /// spec'd for this crate's error propagation.
    pub fn context(self, action: &str) -> Error {
        use Error::*;
        let msg = |m: &str| format!("{action} -> {m}");
        match self {
            InputOpen(m) => InputOpen(msg(&m)),
            Parse(m) => Parse(msg(&m)),
            UnsupportedFeature(m) => UnsupportedFeature(msg(&m)),
            Reference(m) => Reference(msg(&m)),
            Page(m) => Page(msg(&m)),
            Serialization(m) => Serialization(msg(&m)),
            Io(e) => Parse(format!("{action} -> io error: {e}")),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            InputOpen(m) => write!(f, "could not open input: {m}"),
            Parse(m) => write!(f, "parse error: {m}"),
            UnsupportedFeature(m) => write!(f, "unsupported feature: {m}"),
            Reference(m) => write!(f, "dangling reference: {m}"),
            Page(m) => write!(f, "page error: {m}"),
            Serialization(m) => write!(f, "serialization error: {m}"),
            Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
