//! Control-plane catalog: typed accessors over the `ctl_*`/`log_*` tables that drive
//! every stage's "what work is left to do?" query.

pub mod batch;
pub mod error;
pub mod models;
pub mod pool;
pub mod schema;
pub mod store;

pub use batch::mint_batch_id;
pub use error::{CatalogError, Result};
pub use models::*;
pub use pool::{CatalogBackend, CatalogConfig, CatalogPool};
pub use store::CatalogStore;
