#![deny(missing_docs)]
#![doc = "Core error, raster and provenance types shared by the disco discretization crates."]

pub mod errors;
pub mod provenance;
pub mod raster;

pub use errors::{DiscError, ErrorInfo};
pub use provenance::{DiscretizationProvenance, SchemaVersion};
pub use raster::{Raster, SampleAxis, Slice2, Tensor3, VarRef};
