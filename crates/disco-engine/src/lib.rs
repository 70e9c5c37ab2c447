#![deny(missing_docs)]
#![doc = "Validates method tables, orders them by dependency and discretizes rasters into integer states."]

/// Run options and their serde defaults.
pub mod config;
/// Ordered execution of encoded methods over a raster.
pub mod dispatch;
/// Method-name parsing, payload typing and cross-row validation.
pub mod encode;
/// Canonical hashing helpers.
pub mod hash;
/// Raster and method-table canonicalisation.
pub mod normalize;
/// Result records and provenance.
pub mod report;
/// Canonical JSON and YAML helpers.
pub mod serde;
/// Input method table rows and parameters.
pub mod table;

pub use config::{ConvergencePolicy, DiscretizeOpts};
pub use disco_binning::MinimizerOpts;
pub use disco_core::{DiscError, ErrorInfo, Raster, SampleAxis, Tensor3, VarRef};
pub use dispatch::discretize;
pub use encode::{encode, execution_order, EncodedMethod, MethodKind, MixtureWeights};
pub use normalize::{normalize, Normalized, TargetRow};
pub use report::{Discretization, MethodResult};
pub use table::{MethodRow, MethodTable, Param};
