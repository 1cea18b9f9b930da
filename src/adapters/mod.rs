// Adapters layer: concrete implementations for external systems (vendor files, working store, reference service).

pub mod files;
pub mod http;
pub mod storage;

pub use files::ShapefileSource;
pub use http::HttpReferenceSource;
pub use storage::SqliteStore;
