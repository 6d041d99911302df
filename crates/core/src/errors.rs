use thiserror::Error;

/// Client-input failures raised by the core. The HTTP layer maps these to
/// 4xx responses; nothing in here represents a system fault.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid offer amount: {0}")]
    InvalidAmount(String),
    #[error("load not found: {0}")]
    LoadNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::DomainError;

    #[test]
    fn error_messages_name_the_offending_input() {
        let invalid = DomainError::InvalidAmount("twelve hundred".to_string());
        assert_eq!(invalid.to_string(), "invalid offer amount: twelve hundred");

        let missing = DomainError::LoadNotFound("L999".to_string());
        assert_eq!(missing.to_string(), "load not found: L999");
    }
}
