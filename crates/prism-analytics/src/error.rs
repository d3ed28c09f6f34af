//! Analytics error types.

/// Errors raised while assembling a fetched record set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyticsError {
  /// A record does not have the shape every aggregate relies on.
  #[error("invariant violation in {record} '{id}': {message}")]
  InvariantViolation {
    record: &'static str,
    id: String,
    message: String,
  },
}

impl AnalyticsError {
  pub(crate) fn violation(record: &'static str, id: &str, message: impl Into<String>) -> Self {
    Self::InvariantViolation {
      record,
      id: id.to_string(),
      message: message.into(),
    }
  }
}
