// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Structural problems with a proposed record, found before any network I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload must not be empty")]
    EmptyPayload,
    #[error("payload contains reserved character {0:?}")]
    ReservedCharacter(char),
    #[error("payload must not start or end with whitespace")]
    PaddedPayload,
    #[error("a record needs two distinct parties, both are {0}")]
    SameParty(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("unknown update type {0:?}")]
    UnknownUpdateType(String),
    #[error("transaction must carry exactly one output, found {0}")]
    OutputCount(usize),
}

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("public key bytes do not form a valid ed25519 key")]
    InvalidKey,
    #[error("signature does not verify")]
    BadSignature,
    #[error("codec error: {0}")]
    Codec(String),
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
