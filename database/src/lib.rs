//! Persistence of accounting records into the `jobreport` table.

pub mod error;
pub mod schema;
pub mod store;
pub mod watermark;

pub use error::{StoreError, WatermarkError};
pub use schema::Table;
pub use store::{Store, StoreConfig, DEFAULT_COMMIT_EVERY};
pub use watermark::{resolve_watermark, Watermark};
