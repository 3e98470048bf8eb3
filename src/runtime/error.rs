use thiserror::Error;

/// Failure raised while executing synthesized code.
///
/// `Exception` carries a Python-style exception class name so messages read
/// the way the generated code expects (`ValueError: ...`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("{kind}: {message}")]
    Exception { kind: String, message: String },
    #[error("execution exceeded the step budget of {limit}")]
    StepLimitExceeded { limit: u64 },
    #[error("maximum recursion depth of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },
    #[error("{0}")]
    Host(String),
}

impl RuntimeError {
    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Exception {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::exception("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::exception("ValueError", message)
    }

    pub fn name_error(name: &str) -> Self {
        Self::exception("NameError", format!("name '{name}' is not defined"))
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::exception("AttributeError", message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::exception("IndexError", message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::exception("KeyError", message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::exception("ZeroDivisionError", message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::exception("OverflowError", message)
    }

    pub fn memory_error(message: impl Into<String>) -> Self {
        Self::exception("MemoryError", message)
    }

    /// Exception class name, or `None` for interpreter limits.
    pub fn kind(&self) -> Option<&str> {
        match self {
            RuntimeError::Exception { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
