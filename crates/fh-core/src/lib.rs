#![deny(missing_docs)]
//! Core types, errors, and constants shared by the flat-histogram launch
//! orchestrator crates.

pub mod constants;
pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use constants::ConstantsTable;
pub use errors::{ErrorInfo, FhError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_node_seed, RngHandle};
pub use types::NodeId;
