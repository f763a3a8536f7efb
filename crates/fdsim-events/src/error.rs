//! Event intake error types.

/// Errors from reading an analytics payload.
#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    /// The body is not a JSON array of event objects.
    #[error("Malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// An array element is not a JSON object.
    #[error("Event at index {index} is not a JSON object")]
    NotAnObject {
        /// Position in the batch.
        index: usize,
    },
}

/// Result type for event intake.
pub type EventsResult<T> = Result<T, EventsError>;
