use thiserror::Error;

/// Errors returned by the closure-table APIs.
#[derive(Debug, Error)]
pub enum ClosureTreeError {
    #[error("closure-table supports PostgreSQL and SQLite connections only")]
    UnsupportedBackend,

    #[error("node has no rows in the closure table")]
    NodeNotInTree,

    #[error("target node has no rows in the closure table")]
    TargetNotInTree,

    #[error("cannot move a node under itself or one of its descendants")]
    CyclicMove,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("statement construction failed: {0}")]
    QueryBuilder(#[from] sea_orm::sea_query::error::Error),

    #[error("closure-table invariant violation: {0}")]
    Invariant(String),
}

impl ClosureTreeError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    /// `true` for the two presence categories raised by structural mutations.
    pub fn is_not_in_tree(&self) -> bool {
        matches!(self, Self::NodeNotInTree | Self::TargetNotInTree)
    }

    /// Entity saves rejected by `ActiveModelBehavior::before_save` surface as
    /// `DbErr::Custom`; keep those apart from storage failures.
    pub(crate) fn from_save(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::Custom(message) => Self::Validation(message),
            other => Self::Database(other),
        }
    }
}
