//! Paginated enumeration for bulk export

use crate::controller::ManagedResource;
use crate::error::{LifecycleError, Result};
use futures::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub name: String,
}

/// Remote identifier to metadata, as consumed by bulk-import tooling
pub type ResourceIdMetaMap = BTreeMap<String, ResourceMeta>;

/// Lazily walk every page of `resource`, starting from page 1 on each call.
///
/// Stops at the first empty page, or after the last page when the backend
/// reports a page count. Objects without an id are skipped.
pub fn list_all<R: ManagedResource>(
    resource: &R,
    page_size: u32,
) -> impl Stream<Item = Result<(String, ResourceMeta)>> + Send + '_ {
    stream::try_unfold(Some(1u32), move |next| async move {
        let Some(page_number) = next else {
            return Ok(None);
        };
        tracing::debug!(
            "Listing {} page {}",
            resource.descriptor().type_name,
            page_number
        );
        let page = resource.list(page_number, page_size).await?;
        if page.entities.is_empty() {
            return Ok(None);
        }
        let next = match page.page_count {
            Some(count) if page_number >= count => None,
            _ => Some(page_number + 1),
        };
        Ok::<_, LifecycleError>(Some((page.entities, next)))
    })
    .map_ok(|entities| stream::iter(entities.into_iter().map(Ok::<_, LifecycleError>)))
    .try_flatten()
    .try_filter_map(move |payload| {
        let entry = resource.id_of(&payload).map(|id| {
            let name = resource.name_of(&payload);
            (id, ResourceMeta { name })
        });
        futures::future::ready(Ok(entry))
    })
}

pub async fn collect_all<R: ManagedResource>(
    resource: &R,
    page_size: u32,
) -> Result<ResourceIdMetaMap> {
    let entries: ResourceIdMetaMap = list_all(resource, page_size).try_collect().await?;
    tracing::info!(
        "Exported {} {} objects",
        entries.len(),
        resource.descriptor().type_name
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Page;
    use crate::error::RemoteError;
    use crate::schema::{DescriptorBuilder, ResourceDescriptor};
    use crate::types::State;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves `total` numbered objects, then empty pages; optionally reports
    /// a page count that may disagree with the data.
    struct Numbered {
        descriptor: ResourceDescriptor,
        total: u32,
        reported_pages: Option<u32>,
        list_calls: AtomicU32,
    }

    impl Numbered {
        fn new(total: u32, reported_pages: Option<u32>) -> Self {
            Self {
                descriptor: DescriptorBuilder::new("test_numbered").build(),
                total,
                reported_pages,
                list_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ManagedResource for Numbered {
        type Payload = u32;

        fn descriptor(&self) -> &ResourceDescriptor {
            &self.descriptor
        }

        fn build(&self, _desired: &State) -> Result<u32> {
            Ok(0)
        }

        fn flatten(&self, _payload: &u32, _state: &mut State) -> Result<()> {
            Ok(())
        }

        fn id_of(&self, payload: &u32) -> Option<String> {
            Some(format!("id-{:03}", payload))
        }

        fn name_of(&self, payload: &u32) -> String {
            format!("object {}", payload)
        }

        async fn get(&self, _id: &str) -> std::result::Result<u32, RemoteError> {
            Err(RemoteError::status(404, "unused"))
        }

        async fn list(
            &self,
            page_number: u32,
            page_size: u32,
        ) -> std::result::Result<Page<u32>, RemoteError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let start = (page_number - 1) * page_size;
            let end = (start + page_size).min(self.total);
            let page = Page::new((start..end.max(start)).collect());
            Ok(match self.reported_pages {
                Some(count) => page.with_page_count(count),
                None => page,
            })
        }

        async fn create(&self, _payload: &u32) -> std::result::Result<u32, RemoteError> {
            Err(RemoteError::status(405, "unused"))
        }

        async fn update(&self, _id: &str, _payload: &u32) -> std::result::Result<u32, RemoteError> {
            Err(RemoteError::status(405, "unused"))
        }

        async fn delete(&self, _id: &str) -> std::result::Result<(), RemoteError> {
            Err(RemoteError::status(405, "unused"))
        }
    }

    #[tokio::test]
    async fn collects_every_page_until_empty() {
        let resource = Numbered::new(300, None);

        let manifest = collect_all(&resource, 100).await.unwrap();

        assert_eq!(manifest.len(), 300);
        assert_eq!(manifest["id-000"].name, "object 0");
        assert_eq!(manifest["id-299"].name, "object 299");
        // three full pages and the empty one that ends the walk
        assert_eq!(resource.list_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn honours_reported_page_count() {
        let resource = Numbered::new(1000, Some(2));

        let manifest = collect_all(&resource, 100).await.unwrap();

        assert_eq!(manifest.len(), 200);
        assert_eq!(resource.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listing_is_lazy_and_restartable() {
        let resource = Numbered::new(250, None);

        let first: Vec<_> = list_all(&resource, 100).take(5).collect().await;
        assert_eq!(first.len(), 5);
        assert_eq!(resource.list_calls.load(Ordering::SeqCst), 1);

        let again = collect_all(&resource, 100).await.unwrap();
        assert_eq!(again.len(), 250);
    }

    #[tokio::test]
    async fn empty_backend_yields_empty_manifest() {
        let resource = Numbered::new(0, None);
        assert!(collect_all(&resource, 100).await.unwrap().is_empty());
    }
}
