//! Coordinate reference system resolution and transformations.
//!
//! Web Mercator math is implemented analytically. Arbitrary source CRSs are
//! resolved through an EPSG registry (embedded definitions plus optional
//! on-disk overrides) and transformed with proj4rs.

pub mod error;
pub mod gcp;
pub mod mercator;
pub mod registry;
pub mod transform;

pub use error::ProjectionError;
pub use gcp::fit_affine;
pub use registry::{CrsDefinition, CrsRegistry};
pub use transform::CrsTransformer;
