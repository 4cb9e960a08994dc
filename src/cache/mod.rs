//! Staffetta cache subsystem.
//!
//! Implements the stale-while-revalidate delivery path:
//!
//! - **Policy**: decides whether a request may use the cache at all
//! - **Key**: canonical lookup identity, shared by GET and HEAD
//! - **Freshness**: last-refresh timestamp against a fixed window
//! - **Refresh**: detached fetch-and-replace of stale entries
//! - **Gateway**: per-request orchestration of the above
//!
//! The storage engine and the origin transport are consumed through the
//! [`ResponseStore`] and [`crate::infra::origin::Origin`] traits so they
//! can be faked in tests.

mod freshness;
mod gateway;
mod key;
mod policy;
mod refresh;
mod store;

pub use freshness::{FRESHNESS_WINDOW, Freshness, LAST_REFRESH, evaluate, now_unix_ms};
pub use gateway::{Gateway, GatewayError};
pub use key::CacheKey;
pub use policy::is_cacheable;
pub use store::{CachedEntry, MemoryStore, ResponseStore};
