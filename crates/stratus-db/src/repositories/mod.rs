//! Postgres implementations of the persistence traits.

mod media;
mod media_group;
mod routing_rule;
mod storage_account;

pub use media::{MediaRepository, MediaRow};
pub use media_group::MediaGroupRepository;
pub use routing_rule::{RoutingRuleRepository, RoutingRuleRow};
pub use storage_account::{StorageAccountRepository, StorageAccountRow};
