use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order '{order_id}' has no submitted attribution data")]
    OrderNotSubmitted { order_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AttributionResult<T> = Result<T, AttributionError>;
