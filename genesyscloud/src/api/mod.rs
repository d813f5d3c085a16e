pub mod authorization;
pub mod client;
pub mod common;
pub mod error;
pub mod journey;
pub mod pool;
pub mod routing;
pub mod telephony;

pub use client::{Client, RetryConfig};
pub use common::{ApiQueryParams, DomainEntityRef, EntityListing, PaginationParams};
pub use error::ApiError;
