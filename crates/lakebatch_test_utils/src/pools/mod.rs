//! Database connection pool factories.

pub mod postgres;
