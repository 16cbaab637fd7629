//! Agents built on the state-graph runtime.
//!
//! - [`tog`]: Tree-of-Graphs reasoning over a knowledge graph
//!   (resolve → explore ⟲ → check_sufficiency → synthesize).

pub mod tog;
