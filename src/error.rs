// ==============================================================================
// error.rs — LOAD-TIME ERRORS (CONFIG + LEVEL GEOMETRY)
// ------------------------------------------------------------------------------
// Two kinds only:
// - ConfigError: a record breaks an invariant, an asset is missing, a registry
//   name is unknown, or a level source holds no geometry at all.
// - ParseError: level geometry or a registry document is malformed.
//
// Both are fatal for the load that raised them. Nothing in the per-tick path
// returns an error; numeric edge cases there are clamped instead.
// ==============================================================================

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub source_name: String,
    pub offset: Option<usize>, // byte offset into the source, when known
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Config(ConfigError),
    Parse(ParseError),
}

impl Error {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn parse(source_name: impl Into<String>, offset: Option<usize>, reason: impl Into<String>) -> Self {
        Error::Parse(ParseError {
            source_name: source_name.into(),
            offset,
            reason: reason.into(),
        })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config `{}`: {}", self.field, self.reason)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(at) => write!(f, "{}: parse error at byte {}: {}", self.source_name, at, self.reason),
            None => write!(f, "{}: parse error: {}", self.source_name, self.reason),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => e.fmt(f),
            Error::Parse(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for ParseError {}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Parse(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}
