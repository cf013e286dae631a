use thiserror::Error;

/// Failures while turning an uploaded file into raw records.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file name does not carry the `.xlsx` extension.
    #[error("invalid file format, expected .xlsx: {0}")]
    Format(String),

    /// The workbook could not be read as tabular data.
    #[error("could not read the spreadsheet: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("row {index} is out of range (store has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Failures talking to the report service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure, bad status, or a body that is not the expected JSON.
    #[error("could not reach the report service: {0}")]
    Transport(String),

    /// The service answered with `success: false`; the message is kept verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("the report service URL is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("no preview content for '{0}'")]
    NotFound(String),
}
