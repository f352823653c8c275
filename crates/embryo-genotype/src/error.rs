//! Error types for genotype operations

use serde::{Deserialize, Serialize};

/// Hard cap that development ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Cells,
    LinksPerCell,
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Cells => write!(f, "organism cell cap ({})", crate::MAX_CELLS),
            Limit::LinksPerCell => write!(f, "per-cell link cap ({})", crate::MAX_LINKS_PER_CELL),
        }
    }
}

/// Errors that can occur while parsing, developing or editing a genotype
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenoError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Semantic error at offset {offset}: {message}")]
    Semantic { offset: usize, message: String },

    #[error("Resource exhausted at offset {offset}: {limit}")]
    ResourceExhausted { offset: usize, limit: Limit },

    #[error("Operation failed after {attempts} attempts")]
    OperationFailed { attempts: usize },
}

impl GenoError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        GenoError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn semantic(offset: usize, message: impl Into<String>) -> Self {
        GenoError::Semantic {
            offset,
            message: message.into(),
        }
    }

    /// Genotype position the error refers to, if any
    pub fn offset(&self) -> Option<usize> {
        match self {
            GenoError::Syntax { offset, .. }
            | GenoError::Semantic { offset, .. }
            | GenoError::ResourceExhausted { offset, .. } => Some(*offset),
            GenoError::OperationFailed { .. } => None,
        }
    }
}

/// Result type alias for genotype operations
pub type GenoResult<T> = Result<T, GenoError>;
