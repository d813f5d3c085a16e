//! Read-only lookups

use crate::context::Context;
use crate::error::{LifecycleError, RemoteError, Result};
use crate::retry::{self, RetryError};
use crate::schema::ResourceDescriptor;
use crate::types::State;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[async_trait]
pub trait DataSource: Send + Sync {
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Resolve `config` against the remote system. The returned state
    /// carries the id of the object found.
    async fn read(&self, ctx: &Context, config: &State) -> Result<State>;
}

/// Poll `find` until it reports the id of the object named `name`. A
/// recently created object may take a while to show up in searches, so
/// "not found" is retried until `timeout`.
pub async fn lookup_by_name<F, Fut>(
    ctx: &Context,
    timeout: Duration,
    interval: Duration,
    name: &str,
    mut find: F,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Option<String>, RemoteError>>,
{
    retry::retry(ctx, timeout, interval, |_| {
        let found = find();
        async move {
            match found.await {
                Ok(Some(id)) => Ok(id),
                Ok(None) => Err(RetryError::retryable(LifecycleError::NotFound {
                    id: name.to_string(),
                })),
                Err(e) => Err(RetryError::non_retryable(e)),
            }
        }
    })
    .await
}
