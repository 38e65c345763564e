//! Broad error classification.

/// Broad error category for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Configuration,
    NotFound,
    Conflict,
    MalformedData,
    Api,
    Io,
    Unknown,
}

impl ErrorCategory {
    /// Short hint printed after a failed command.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Authentication => Some("check the tenant, client id and client secret"),
            Self::Configuration => Some("check the config file and command-line flags"),
            Self::NotFound => Some("the user or extension does not exist"),
            Self::MalformedData => Some("the extension exists but holds no string value"),
            _ => None,
        }
    }
}
