//! Data models
//!
//! Storage accounts, routing rules, media groups and the media catalog, plus the request and
//! response types the orchestration layer accepts.

mod actor;
mod media;
mod media_group;
mod routing_rule;
mod storage_account;
pub mod upload;

pub use actor::*;
pub use media::*;
pub use media_group::*;
pub use routing_rule::*;
pub use storage_account::*;
pub use upload::*;
