//! # Core Types
//!
//! This crate defines the fundamental types shared by every layer of the
//! structured ROM editor.
//!
//! ## Philosophy
//!
//! - **Addresses are integers**: runs and pointers refer to data by offset,
//!   never by reference, so relocating data is only a matter of rewriting numbers.
//! - **Null is explicit**: a pointer that leads nowhere is `Pointer::Null`,
//!   not a magic address threaded through call sites.
//!
//! ## Key Types
//!
//! - [`Pointer`]: a decoded 4-byte pointer value
//! - [`ByteRange`]: a half-open address range
//! - [`DeltaId`]: identity of one undoable change

pub mod ids;
pub mod pointer;
pub mod range;

pub use ids::DeltaId;
pub use pointer::{Pointer, POINTER_SIZE, ROM_BASE, ROM_LIMIT};
pub use range::ByteRange;
