//! Remote media catalog: fetching and normalization
//!
//! Collection endpoints answer with one of several JSON shapes (flat URL
//! lists, lists of objects, `{"cameras": [...]}` or `{"images": [...]}`).
//! Every shape is reduced to a list of [`MediaDescriptor`]s whose identity
//! is the canonical resource URL.

mod descriptor;
mod fetcher;
mod parse;
pub mod video;

pub use descriptor::{MediaDescriptor, MediaKind};
pub use fetcher::CatalogFetcher;
pub use parse::parse_catalog;
