use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid data format at line {line}: {reason}")]
    InvalidFormat {
        line: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
