use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image could not be decoded: {0}")]
    Decode(String),

    #[error("Image could not be encoded: {0}")]
    Encode(String),

    #[error("Invalid image status: {0}")]
    InvalidStatus(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
