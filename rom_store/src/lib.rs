//! # ROM Store
//!
//! The mutable byte buffer behind a loaded ROM image, and the change log
//! that makes every mutation of it reversible.
//!
//! ## Philosophy
//!
//! **Every write is attributable.**
//!
//! The buffer cannot be written directly. All mutation goes through a
//! [`ChangeDelta`], which remembers the before and after value of each byte,
//! of the buffer length, and of any run-table entries touched by the same
//! logical operation. A [`History`] orders committed deltas and moves an undo
//! cursor across them.
//!
//! ## Design
//!
//! - **ByteStore**: index-addressed growable buffer, never shrinks on its own
//! - **ChangeDelta**: append-only record of one logical operation
//! - **History**: bounded undo/redo stacks of committed deltas
//! - **DeltaTarget**: seam through which a delta is replayed onto a model

pub mod byte_store;
pub mod delta;
pub mod history;

pub use byte_store::{value_to_le_bytes, ByteStore, StoreError};
pub use delta::{ByteChange, ChangeDelta, DeltaTarget, LengthChange};
pub use history::History;
