// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod enums;
pub mod id;
pub mod party;

pub use enums::{Action, StatusFilter, UpdateType};
pub use id::{CorrelationId, RecordId, TxId};
pub use party::{Party, PartyKey, PartyKeys};
