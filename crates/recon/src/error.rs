use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty synonym list, bad threshold, etc.).
    ConfigValidation(String),
    /// A source table could not be read at all. Fatal for the run.
    SourceUnavailable { source: String, message: String },
    /// Strict mode: a code occurs more than once within one source.
    DuplicateKey { source: String, code: String, count: usize },
    /// Export collaborator failed to write its artifact.
    Export(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SourceUnavailable { source, message } => {
                write!(f, "source '{source}' unavailable: {message}")
            }
            Self::DuplicateKey { source, code, count } => {
                write!(f, "source '{source}': code '{code}' occurs {count} times (strict keys)")
            }
            Self::Export(msg) => write!(f, "export error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl ReconError {
    pub fn source_unavailable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source: source.into(),
            message: message.into(),
        }
    }
}
