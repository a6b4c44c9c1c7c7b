// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! cosign-kernel: records, parties, transactions and fault policies shared by
//! every node taking part in the two-party commitment protocol. No I/O.

pub mod error;
pub mod types;
pub mod record;
pub mod transaction;
pub mod event;
pub mod fault;
pub mod message;
pub mod view;

pub use error::{KernelError, KernelResult, ValidationError};
pub use record::Record;

#[cfg(test)]
pub mod tests;
