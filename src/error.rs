use thiserror::Error;

/// Failures the desk engine distinguishes between.
///
/// `Transport` covers anything that went wrong talking to the remote
/// services and is always recoverable. `Validation` is raised locally before
/// any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeskError {
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
}

impl DeskError {
    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        DeskError::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DeskError::Validation(message.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DeskError::Transport { .. })
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            DeskError::Transport { .. } => "transport",
            DeskError::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_names_the_operation() {
        let err = DeskError::transport("fetch market", "connection refused");
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "fetch market failed: connection refused");
        assert_eq!(err.kind_label(), "transport");
    }

    #[test]
    fn validation_error_displays_its_message() {
        let err = DeskError::validation("nothing selected");
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "nothing selected");
    }
}
