//! Shared fixtures for integration tests

pub mod host;

#[allow(unused_imports)]
pub use host::{CountingPackages, TestHost, install, lua_ls};
