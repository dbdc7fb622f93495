use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Reference photo missing: {}", .0.display())]
    ReferencePhotoMissing(PathBuf),

    #[error("Comparator error: {0}")]
    Comparator(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),
}

pub type Result<T> = std::result::Result<T, VoteError>;
