pub mod api;
pub mod cache;
pub mod identity;
pub mod store;

pub use api::{ApiClient, ApiError, StatusBackend};
pub use cache::{Invalidation, QueryCache, QueryKey, ResourceKind};
pub use identity::{IdentityError, IdentityProvider, LocalIdentity, Membership};
pub use store::{Query, StatusStore, StoreError};
