use thiserror::Error;

/// Persistence failures surfaced by the warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("schema initialization failed on {table}: {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

impl WarehouseError {
    /// Whether a retry within the same batch has a chance of succeeding.
    /// Constraint violations and other database-reported errors do not.
    pub fn is_transient(&self) -> bool {
        let source = match self {
            Self::Connect(e) | Self::Query(e) | Self::Schema { source: e, .. } => e,
        };
        matches!(
            source,
            sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        )
    }
}
