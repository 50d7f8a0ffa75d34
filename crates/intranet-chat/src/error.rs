use thiserror::Error;

/// Failure reported by a collaborator (persistence, file storage).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found")]
    NotFound,

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("not authenticated")]
    Unauthenticated,
}

/// Reasons a submit is rejected or the create call fails. When this is
/// returned no optimistic message exists and the draft is left untouched.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("message has no content and no attachments")]
    EmptyMessage,

    #[error("no channel is active")]
    NoActiveChannel,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("'{file_name}' ({file_size} bytes) is already attached")]
    DuplicateAttachment { file_name: String, file_size: u64 },

    #[error("creating the message failed: {0}")]
    Create(#[source] ServiceError),
}

/// Per-file upload failure. The `Display` text is what the upload task shows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadFailure {
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("upload failed: {0}")]
    Storage(#[from] ServiceError),
}
