#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),

    #[error("malformed write date: {0}")]
    Timestamp(String),

    /// The backing connection dropped or could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// An error reported by the database server, with its SQLSTATE code.
    #[error("database error: {message}")]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Backend(String),
}

impl Error {
    /// Returns `true` for connection-level failures that are expected to
    /// resolve on a fresh attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::Database {
                code: Some(code), ..
            } => is_connection_state(code),
            _ => false,
        }
    }

    /// The SQLSTATE code of a database error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// SQLSTATE class 08 (connection exception) and 57P01..57P03 (server
/// shutting down or not accepting connections yet).
fn is_connection_state(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}
