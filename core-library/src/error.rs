use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("No {entity_type} stored with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Refusing to store {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Stored media record could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
