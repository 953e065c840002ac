//! Users, roles and the permissions they carry.

#[cfg(test)]
pub(crate) mod memory;
pub mod permission;
pub mod repo;
pub mod role;
pub mod services;
mod slug;
pub mod store;
pub mod user;

pub use permission::{Permission, PermissionCode, PermissionSet};
pub use repo::PgAccountStore;
pub use role::Role;
pub use store::{AccountStore, StoreError};
pub use user::{NewUser, User, WriteKind};
