// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fault injection policies.
//!
//! Each non-trivial [`Action`] maps to one [`FaultPolicy`]. A policy is a pure
//! predicate over the local identity and the committed record; firing the fault
//! (dedup, logging, raising) is the tracker's job.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::types::{Action, Party};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultPolicy {
    /// Fire on every node that commits the record.
    Unconditional,
    /// Fire only on the node that is `party_a`.
    PartyAOnly,
    /// Fire only on the node that is `party_b`.
    PartyBOnly,
}

impl FaultPolicy {
    pub fn for_action(action: Action) -> Option<Self> {
        match action {
            Action::Nothing => None,
            Action::ThrowQuarantine => Some(FaultPolicy::Unconditional),
            Action::PartyAThrowQuarantine => Some(FaultPolicy::PartyAOnly),
            Action::PartyBThrowQuarantine => Some(FaultPolicy::PartyBOnly),
        }
    }

    pub fn applies(&self, local: &Party, record: &Record) -> bool {
        match self {
            FaultPolicy::Unconditional => true,
            FaultPolicy::PartyAOnly => record.party_a == *local,
            FaultPolicy::PartyBOnly => record.party_b == *local,
        }
    }

    /// The policy that fires for `record` on the node identified by `local`, if any.
    pub fn triggered(local: &Party, record: &Record) -> Option<Self> {
        Self::for_action(record.action).filter(|p| p.applies(local, record))
    }
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultPolicy::Unconditional => "ThrowQuarantine",
            FaultPolicy::PartyAOnly => "PartyAThrowQuarantine",
            FaultPolicy::PartyBOnly => "PartyBThrowQuarantine",
        })
    }
}
