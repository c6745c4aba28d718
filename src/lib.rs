pub mod config;
pub mod error;
pub mod host;
pub mod module;
pub mod sync;
pub mod workspace;
