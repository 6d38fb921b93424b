use std::fmt;
use std::str::FromStr;

/// How [`decode`](crate::decode) reacts to a malformed escape sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorMode {
    /// Reject the packet with a [`ProtocolError`](crate::ProtocolError).
    #[default]
    Strict,
    /// Copy the offending bytes through verbatim.
    ///
    /// `ESC` followed by `END` ends the message right after the lone `ESC`.
    Relaxed,
}

impl ErrorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorMode::Strict => "strict",
            ErrorMode::Relaxed => "relaxed",
        }
    }

    pub fn is_strict(self) -> bool {
        self == ErrorMode::Strict
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown error-mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error mode {0:?} (expected \"strict\" or \"relaxed\")")]
pub struct ParseErrorModeError(pub String);

impl FromStr for ErrorMode {
    type Err = ParseErrorModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ErrorMode::Strict),
            "relaxed" => Ok(ErrorMode::Relaxed),
            _ => Err(ParseErrorModeError(s.to_string())),
        }
    }
}
