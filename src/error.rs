// ⚠️ Domain errors for the mutation API
// The engine core never fails; these only come from edits requested by collaborators.

use crate::item::ItemId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriageError {
    #[error("item {0} not found")]
    UnknownItem(ItemId),

    #[error("item {0} cannot reference itself")]
    SelfReference(ItemId),

    #[error("parent item {0} not found")]
    UnknownParent(ItemId),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },
}

impl TriageError {
    pub fn invalid(field: &str, value: &str) -> Self {
        TriageError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Lookup failures (as opposed to rejected values)
    pub fn is_not_found(&self) -> bool {
        matches!(self, TriageError::UnknownItem(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(TriageError::UnknownItem(4).to_string(), "item 4 not found");
        assert_eq!(
            TriageError::invalid("urgency", "alta").to_string(),
            "invalid value for urgency: \"alta\""
        );
        assert!(TriageError::UnknownItem(1).is_not_found());
        assert!(!TriageError::SelfReference(1).is_not_found());
    }
}
