use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptError {
    #[error("hypergraph optimizer does not support more than {limit} tables in one query block (found {found})")]
    TooManyTables { found: usize, limit: usize },
    #[error("hypergraph optimizer does not support more than {limit} WHERE/ON predicates (found {found})")]
    TooManyPredicates { found: usize, limit: usize },
    /// Cast insertion or constant caching failed for a condition.
    #[error("failed to rewrite condition {condition}")]
    Rewrite {
        condition: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type OptResult<T> = Result<T, OptError>;
