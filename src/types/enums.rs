// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record tags.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Action tag carried by a record. Anything other than `Nothing` asks the
/// tracker to inject a one-time quarantine fault when the record is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    Nothing,
    ThrowQuarantine,
    PartyAThrowQuarantine,
    PartyBThrowQuarantine,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Nothing,
        Action::ThrowQuarantine,
        Action::PartyAThrowQuarantine,
        Action::PartyBThrowQuarantine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Nothing => "Nothing",
            Action::ThrowQuarantine => "ThrowQuarantine",
            Action::PartyAThrowQuarantine => "PartyAThrowQuarantine",
            Action::PartyBThrowQuarantine => "PartyBThrowQuarantine",
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Nothing
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownAction(s.to_string()))
    }
}

/// Whether a commit event announces a new version or the supersession of one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateType {
    Produced,
    Consumed,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Produced => "PRODUCED",
            UpdateType::Consumed => "CONSUMED",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PRODUCED" => Ok(UpdateType::Produced),
            "CONSUMED" => Ok(UpdateType::Consumed),
            other => Err(ValidationError::UnknownUpdateType(other.to_string())),
        }
    }
}

/// Store lookup filter over a version's status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusFilter {
    Unconsumed,
    Consumed,
    All,
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::All
    }
}
