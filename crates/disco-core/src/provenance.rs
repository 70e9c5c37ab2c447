//! Provenance and schema descriptors attached to discretization results.

use serde::{Deserialize, Serialize};

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes and documentation updates.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Content hashes tying a discretization to its exact inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiscretizationProvenance {
    /// Schema version of the result payload.
    pub schema_version: SchemaVersion,
    /// Hash of the raw input raster.
    pub input_hash: String,
    /// Hash of the encoded method records in canonical (category, variable) order.
    pub table_hash: String,
    /// Hash of the run options.
    pub opts_hash: String,
    /// Hash of the produced states raster.
    pub states_hash: String,
}
