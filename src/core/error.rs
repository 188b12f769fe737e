//! Engine error taxonomy

use miette::Diagnostic;
use rusqlite::ErrorCode;
use thiserror::Error;

use crate::core::identity::{ContainerId, EntryId, IdParseError};

/// Why a parent reference was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidParentReason {
    /// Parent lives in a different container
    CrossContainer,
    /// Entry named as its own parent
    SelfParent,
    /// Parent is a descendant of the entry
    Cycle,
    /// Ancestor chain of the parent already loops
    CorruptChain,
}

impl std::fmt::Display for InvalidParentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidParentReason::CrossContainer => write!(f, "parent belongs to another container"),
            InvalidParentReason::SelfParent => write!(f, "an entry cannot be its own parent"),
            InvalidParentReason::Cycle => write!(f, "parent is a descendant of the entry"),
            InvalidParentReason::CorruptChain => write!(f, "ancestor chain of the parent loops"),
        }
    }
}

/// Errors surfaced by the entry store and the engine built on it
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("entry not found: {0}")]
    #[diagnostic(code(navtree::not_found::entry))]
    EntryNotFound(EntryId),

    #[error("container not found: {0}")]
    #[diagnostic(code(navtree::not_found::container))]
    ContainerNotFound(ContainerId),

    #[error("parent entry not found: {0}")]
    #[diagnostic(code(navtree::not_found::parent))]
    ParentNotFound(EntryId),

    #[error("invalid parent {parent}: {reason}")]
    #[diagnostic(code(navtree::invalid_parent))]
    InvalidParent {
        parent: EntryId,
        reason: InvalidParentReason,
    },

    #[error("index constraint violated: {0}")]
    #[diagnostic(
        code(navtree::constraint),
        help("the sibling group was renumbered concurrently outside the engine")
    )]
    ConstraintViolation(String),

    #[error("index arithmetic overflowed (base {base}, step {step})")]
    #[diagnostic(
        code(navtree::index_overflow),
        help("configure a smaller index base or step for this family")
    )]
    IndexOverflow { base: i64, step: i64 },

    #[error("store is busy: {0}")]
    #[diagnostic(code(navtree::busy), help("the operation was not applied; retry it"))]
    Busy(String),

    #[error("store schema version {found} does not match expected version {expected}")]
    #[diagnostic(code(navtree::schema))]
    SchemaMismatch { found: i32, expected: i32 },

    #[error("store connection lock poisoned")]
    #[diagnostic(code(navtree::lock))]
    LockPoisoned,

    #[error("storage error: {0}")]
    #[diagnostic(code(navtree::storage))]
    Storage(rusqlite::Error),

    #[error(transparent)]
    #[diagnostic(code(navtree::invalid_id))]
    InvalidId(#[from] IdParseError),
}

impl EngineError {
    /// True for every "id does not resolve" failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::EntryNotFound(_)
                | EngineError::ContainerNotFound(_)
                | EngineError::ParentNotFound(_)
        )
    }

    /// True when re-issuing the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Busy(_))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => EngineError::ConstraintViolation(err.to_string()),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                EngineError::Busy(err.to_string())
            }
            _ => EngineError::Storage(err),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
