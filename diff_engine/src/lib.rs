//! # Diff Engine
//!
//! Compares two equally sized byte buffers and reports a bounded, ordered
//! list of differing ranges, plus a side-by-side view over them.
//!
//! ## Philosophy
//!
//! - **Bounded work**: the segment cap is the only limit on output size; a
//!   truncated diff says so in its summary instead of erroring.
//! - **Read-only**: neither input is mutated.
//! - **All or nothing**: buffers of different lengths are rejected up front
//!   with no partial result.
//!
//! ## Example
//!
//! ```
//! use diff_engine::DiffEngine;
//! use model_settings::DiffSettings;
//!
//! let left = vec![0u8; 0x200];
//! let mut right = left.clone();
//! right[0] = 1;
//!
//! let engine = DiffEngine::new(DiffSettings::default());
//! let result = engine.diff(&left, &right).unwrap();
//! assert_eq!(result.segments().len(), 1);
//! assert_eq!(result.summary(), "Found 1 changes");
//!
//! let view = engine.view(&result, 16, 16);
//! assert_eq!(view.width(), 33);
//! assert!(view.is_selected(17, 0));
//! ```

pub mod engine;
pub mod view;

pub use engine::{DiffEngine, DiffError, DiffResult, DiffSegment};
pub use view::{DiffRow, DiffSide, DiffView};
