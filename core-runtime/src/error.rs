use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
