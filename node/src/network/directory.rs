// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::RwLock;

use cosign_kernel::types::Party;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("no party named {0:?}")]
    NotFound(String),
    #[error("{matches} parties named {name:?}")]
    Ambiguous { name: String, matches: usize },
}

impl DirectoryError {
    pub fn name(&self) -> &str {
        match self {
            DirectoryError::NotFound(name) => name,
            DirectoryError::Ambiguous { name, .. } => name,
        }
    }
}

/// Maps display names to parties.
pub trait Directory: Send + Sync {
    /// The unique party with this display name.
    fn resolve_by_display_name(&self, name: &str) -> Result<Party, DirectoryError>;
}

/// Directory of every party registered on the network.
#[derive(Debug, Default)]
pub struct NetworkDirectory {
    parties: RwLock<Vec<Party>>,
}

impl NetworkDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party. Re-registering the same key replaces the entry.
    pub fn register(&self, party: Party) {
        if let Ok(mut parties) = self.parties.write() {
            parties.retain(|p| p.key != party.key);
            parties.push(party);
        }
    }

    pub fn parties(&self) -> Vec<Party> {
        self.parties.read().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Directory for NetworkDirectory {
    fn resolve_by_display_name(&self, name: &str) -> Result<Party, DirectoryError> {
        let parties = self
            .parties
            .read()
            .map_err(|_| DirectoryError::NotFound(name.to_string()))?;
        let mut matches = parties.iter().filter(|p| p.name == name);
        match (matches.next(), matches.count()) {
            (Some(party), 0) => Ok(party.clone()),
            (None, _) => Err(DirectoryError::NotFound(name.to_string())),
            (Some(_), rest) => Err(DirectoryError::Ambiguous {
                name: name.to_string(),
                matches: rest + 1,
            }),
        }
    }
}
