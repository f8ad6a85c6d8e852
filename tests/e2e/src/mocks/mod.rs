//! Deterministic collaborator fakes

mod fixtures;

pub use fixtures::{HashEmbedder, ScriptedCurator, TEST_DIMENSIONS};
