use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent writer touched a document this transaction read. The
    /// transaction runner retries transparently.
    #[error("transaction conflict on {0}")]
    Conflict(String),

    /// The transaction closure asked for a retry (e.g. a capacity race was
    /// detected at write time). Never surfaced to callers.
    #[error("retry requested: {0}")]
    RetryRequested(String),

    #[error("transaction gave up after {0} attempts")]
    RetriesExhausted(u32),

    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: &'static str, id: String },

    /// Reads must come before writes inside a transaction.
    #[error("read after buffered write in collection '{0}'")]
    ReadAfterWrite(&'static str),

    /// An ordered query needs a declared index; callers typically fall back
    /// to an unordered scan and log a warning.
    #[error("no index '{index}' declared on collection '{collection}'")]
    MissingIndex {
        collection: &'static str,
        index: &'static str,
    },

    /// Non-retryable application abort raised inside a transaction closure.
    #[error("{0}")]
    Aborted(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::RetryRequested(_))
    }
}
