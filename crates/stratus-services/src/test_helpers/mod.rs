//! Test helpers for service unit tests
//!
//! In-memory persistence stores, an in-memory storage adapter and fixtures, so the services
//! can be exercised without a database or provider account.

pub mod fixtures;
pub mod mock_repositories;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_repositories::*;
pub use mock_storage::*;
