//! Georeference interchange: extract a raster's georeferencing to a JSON
//! document and embed a document into a copy of a raster.

pub mod document;
pub mod embed;
pub mod extract;
pub mod summary;

pub use document::{GeoreferenceDocument, FORMAT_TAG};
pub use embed::{embed, EmbedReport};
pub use extract::extract;
pub use summary::summarize;
