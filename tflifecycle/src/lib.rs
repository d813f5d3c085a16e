//! tflifecycle - resource lifecycle engine for Terraform providers
//!
//! Create, read, update, delete, import and export orchestration over
//! remote APIs that are eventually consistent: bounded polling, semantic
//! read-after-write checks, membership reconciliation and paginated export.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Lifecycle engine
pub mod consistency;
pub mod controller;
pub mod data_source;
pub mod export;
pub mod membership;
pub mod retry;

// Helper modules
pub mod registry;
pub mod validator;

// Re-exports for convenience
pub use consistency::{CheckMode, ConsistencyCheck, Mismatch, Verdict};
pub use context::Context;
pub use controller::{ManagedResource, Page, ResourceController};
pub use data_source::{lookup_by_name, DataSource};
pub use error::{LifecycleError, Operation, RemoteError, Result};
pub use export::{ResourceIdMetaMap, ResourceMeta};
pub use membership::{reconcile_members, Member, MembershipClient};
pub use registry::{Lifecycle, ResourceRegistry};
pub use retry::{retry, RetryError, Timeouts};
pub use schema::{AttributeBuilder, AttributeType, DescriptorBuilder, ResourceDescriptor};
pub use types::{Dynamic, ObjectBuilder, State};
