#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Got an invalid parameter value in a function
    InvalidParameter(String),
    /// All candidate configurations were filtered out of the search space
    EmptySearchSpace(String),
    /// The requested algorithm is not supported by this build or this
    /// hardware
    Unsupported(String),
    /// A timer was used out of order
    Timer(String),
    /// Error while serializing/deserializing data
    Json(serde_json::Error),
    /// Error while writing tuning logs
    Io(std::io::Error),
    /// Internal error, this is a bug in pairtune
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Error::EmptySearchSpace(e) => write!(f, "empty search space: {}", e),
            Error::Unsupported(e) => write!(f, "unsupported: {}", e),
            Error::Timer(e) => write!(f, "timer error: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Internal(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidParameter(_) |
            Error::EmptySearchSpace(_) |
            Error::Unsupported(_) |
            Error::Timer(_) |
            Error::Internal(_) => None,
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::Io(error)
    }
}
