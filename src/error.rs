//! Parser error type.

/// Protocol violation detected by the parser.
///
/// Surfacing one of these means the connection is beyond saving; the
/// caller must close it. Incomplete heads and partial bodies are not
/// errors, they are carried in parser state until more bytes arrive.
#[derive(Debug)]
pub struct ParseError {
    kind: ParseErrorKind,
}

/// The class of protocol violation behind a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// No `Host` header field in the head.
    MissingHost,
    /// Both `Transfer-Encoding` and `Content-Length` present.
    AmbiguousFraming,
    /// Non-digit or oversized `Content-Length` value.
    InvalidContentLength,
    /// Malformed chunked transfer coding.
    InvalidChunkedEncoding,
}

use ParseErrorKind as Kind;

impl ParseError {
    pub fn kind(&self) -> Kind {
        self.kind
    }
}

impl From<Kind> for ParseError {
    #[inline]
    fn from(kind: Kind) -> Self {
        Self { kind }
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Kind::MissingHost => f.write_str("missing host header"),
            Kind::AmbiguousFraming => {
                f.write_str("both content-length and transfer-encoding present")
            }
            Kind::InvalidContentLength => f.write_str("invalid content-length"),
            Kind::InvalidChunkedEncoding => f.write_str("invalid chunked encoding"),
        }
    }
}
