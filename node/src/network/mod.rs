// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Party-to-party sessions, the in-process transport and name resolution.

pub mod directory;
pub mod memory;
pub mod session;

pub use directory::{Directory, DirectoryError, NetworkDirectory};
pub use memory::InMemoryNetwork;
pub use session::{Session, SessionError};

/// Which responder an inbound session should be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Commit,
    Query,
}

#[derive(Debug)]
pub struct InboundSession {
    pub kind: FlowKind,
    pub session: Session,
}
