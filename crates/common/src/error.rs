use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmirrorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// A second sync was triggered while one is in flight for the same object type.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network, rate-limit or 5xx failure that outlived the retry policy.
    #[error("upstream CRM error: {0}")]
    Upstream(String),

    /// One upstream record could not be projected into the typed mirror row.
    #[error("unexpected record shape: {0}")]
    DataShape(String),

    #[error("aggregation exceeded its {0}ms budget")]
    AggregationTimeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CrmirrorResult<T> = Result<T, CrmirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_budget() {
        let err = CrmirrorError::AggregationTimeout(5000);
        assert_eq!(err.to_string(), "aggregation exceeded its 5000ms budget");
    }

    #[test]
    fn conflict_message_is_prefixed() {
        let err = CrmirrorError::Conflict("contacts sync already running".to_string());
        assert_eq!(err.to_string(), "conflict: contacts sync already running");
    }
}
