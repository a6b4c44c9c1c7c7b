pub mod message_tests;

use crate::record::Record;
use crate::types::{Action, PartyKeys, RecordId};

pub(crate) fn keys(name: &str, seed: u8) -> PartyKeys {
    PartyKeys::from_seed(name, [seed; 32])
}

pub(crate) fn sample_record(a: &PartyKeys, b: &PartyKeys, action: Action) -> Record {
    Record::new(
        RecordId::new(),
        "some data",
        a.party().clone(),
        b.party().clone(),
        action,
    )
}
