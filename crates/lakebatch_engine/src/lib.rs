//! Bronze/Silver/Gold engines and the Stage Coordinator that drives them.
//!
//! [`frame`] holds the in-memory row representation every engine reads and writes;
//! [`bronze`], [`silver`], and [`gold`]/[`transform`] implement the three medallion
//! stages in that shape; [`stage_coordinator`] bounds how many datasets run at once
//! within a stage and stops a batch the moment any one of them fails.

pub mod bronze;
pub mod custom_sql;
pub mod error;
pub mod frame;
pub mod gold;
pub mod silver;
pub mod snapshot;
pub mod stage_coordinator;
pub mod transform;

pub use error::{EngineError, Result};
pub use frame::Frame;
