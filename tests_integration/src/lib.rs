//! Integration Test Utilities
//!
//! Shared fixtures for the cross-crate scenario tests under `tests/`.
//!
//! ## Test Philosophy
//!
//! - **Whole operations**: every scenario drives the public `DataModel` API
//!   through a `History`, the way an editor would
//! - **Identity by digest**: "nothing changed" means the SHA-256 of the bytes
//!   and the run table are both unchanged
//! - **Invariants over examples**: relocation and round-trip rules are also
//!   checked with generated inputs

use rom_store::History;
use run_format::{parse_table_format, NamedLists};
use run_model::{DataModel, ModelError, Run, WriteOutcome};
use sha2::{Digest, Sha256};

/// Option list used by the enum scenarios
pub fn option_lists() -> NamedLists {
    let mut lists = NamedLists::new();
    lists.set_list("options", ["None", "Something Else"]);
    lists
}

/// A model over `length` filler bytes, with [`option_lists`] loaded
pub fn test_model(length: usize) -> (DataModel, History<Run>) {
    model_from(vec![0xFF; length])
}

/// A model over `data`, with [`option_lists`] loaded
pub fn model_from(data: Vec<u8>) -> (DataModel, History<Run>) {
    let model = DataModel::new(data).with_lists(option_lists());
    let history = History::new(model.settings().history_capacity);
    (model, history)
}

/// Declares a table from format text and commits it as one change
pub fn declare(
    model: &mut DataModel,
    history: &mut History<Run>,
    address: usize,
    format: &str,
) -> Result<WriteOutcome, ModelError> {
    let format = parse_table_format(format, model.lists())?;
    let outcome = model.declare_table(history.current_change(), address, format)?;
    history.commit();
    Ok(outcome)
}

/// Bytes and run table of a model at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub digest: String,
    pub runs: Vec<Run>,
    pub anchors: Vec<(usize, String)>,
}

impl Snapshot {
    pub fn of(model: &DataModel) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(model.store().as_slice())),
            runs: model.runs().cloned().collect(),
            anchors: model
                .registry()
                .anchors()
                .map(|(address, name)| (address, name.to_string()))
                .collect(),
        }
    }
}

/// Every pointer location in the model that currently resolves to `target`
pub fn pointers_to(model: &DataModel, target: usize) -> Vec<usize> {
    model
        .runs()
        .flat_map(Run::pointer_locations)
        .filter(|source| model.read_pointer(*source).ok().and_then(|p| p.address()) == Some(target))
        .collect()
}
