use thiserror::Error;

/// Per-object failures raised while reading, decoding, writing or relocating
/// a record.
///
/// None of these abort a run. The pipeline retries read/decode/write failures
/// of every kind up to its attempt bound and reports the last one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The source key vanished between listing and read.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The payload does not parse or does not match its category schema.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Network or service-level failure on read, write or relocate.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// The destination backend refused the document.
    #[error("Rejected by remote: {0}")]
    RemoteRejected(String),
}

impl IngestError {
    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// The retry loop does not consult this; it only feeds log fields.
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::TransientIo(_) | IngestError::NotFound(_))
    }

    /// Short stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::NotFound(_) => "not_found",
            IngestError::MalformedRecord(_) => "malformed_record",
            IngestError::TransientIo(_) => "transient_io",
            IngestError::RemoteRejected(_) => "remote_rejected",
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::MalformedRecord(err.to_string())
    }
}
