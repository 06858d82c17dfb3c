//! External collaborator interfaces.
//!
//! The engine never talks to a concrete browser, model provider, or storage
//! backend directly; it goes through the traits in this crate. Production
//! hosts plug in their own implementations, while the in-memory ones in
//! [`memory`] back tests and offline development.

pub mod errors;
pub mod memory;
mod traits;

pub use errors::*;
pub use memory::{FailingModel, FileStore, MemoryStore, StaticModel, StaticSurface};
pub use traits::*;
