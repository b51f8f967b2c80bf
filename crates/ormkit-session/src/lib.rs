//! Session layer for OrmKit.
//!
//! [`Session`] fronts a [`Provider`](ormkit_core::Provider) with the
//! engine's persistence semantics: merges that cascade over the object
//! graph with batch-scoped cross-reference validation and dependency
//! ordering, an identity cache keeping one shared instance per database
//! row, typed reads with depth-one relation loading, and declarative
//! transaction scopes.
//!
//! A session is single-threaded by contract: the identity cache and the
//! last-error slot belong to one unit of work. Share the
//! [`MetadataCache`](ormkit_core::MetadataCache) between sessions
//! instead; derivation is pure and the cache is safe to share.

pub mod config;
pub mod identity;
pub mod plan;
pub mod select;
pub mod session;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use config::SessionConfig;
pub use identity::IdentityCache;
pub use plan::{MergeItem, MergeMode, Violation};
pub use select::Select;
pub use session::Session;
pub use transaction::{Disposition, Propagation, TransactionToken};
