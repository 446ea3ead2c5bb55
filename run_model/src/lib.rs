//! # Run Model
//!
//! A byte store seen as a graph of typed, named runs.
//!
//! ## Philosophy
//!
//! - **Addresses, not references**: runs and pointers refer to data by
//!   integer address, so moving data is rewriting integers.
//! - **One delta per operation**: every mutating call records into the
//!   caller's [`ModelDelta`]; a relocation with all its pointer rewrites is
//!   a single undoable unit.
//! - **Outcomes, not callbacks**: writes return a [`WriteOutcome`] listing
//!   relocations and dangling-pointer warnings for collaborators to act on.
//!
//! ## Example
//!
//! ```
//! use run_model::{DataModel, ModelDelta};
//! use rom_store::History;
//!
//! let mut model = DataModel::new(vec![0xFF; 0x100]);
//! let mut history = History::new(model.settings().history_capacity);
//!
//! model
//!     .apply_anchor_declaration(history.current_change(), 0x10, "^stats[hp: atk.]2")
//!     .unwrap();
//! model.write_value(history.current_change(), 0x10, 2, 45).unwrap();
//! assert_eq!(model.serialize_run(0x10).unwrap(), "45, 255\n65535, 255");
//!
//! history.undo(&mut model);
//! assert!(model.get_named_run("stats").is_none());
//! ```

pub mod error;
pub mod model;
pub mod outcome;
pub mod registry;
mod repointer;
pub mod run;
mod tables;

pub use error::ModelError;
pub use model::{DataModel, ModelDelta};
pub use outcome::{DanglingPointerWarning, Relocation, WriteOutcome};
pub use registry::RunRegistry;
pub use run::{CountField, Run, RunFormat, TableRun};
