//! Registration table of resource and data source types
//!
//! Built once at process start by the provider and passed by reference to
//! whoever dispatches lifecycle calls by type name.

use crate::context::Context;
use crate::controller::{ManagedResource, ResourceController};
use crate::data_source::DataSource;
use crate::error::{LifecycleError, Result};
use crate::export::ResourceIdMetaMap;
use crate::schema::ResourceDescriptor;
use crate::types::State;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Object-safe view of a [`ResourceController`]
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn descriptor(&self) -> &ResourceDescriptor;

    async fn create(&self, ctx: &Context, state: &mut State) -> Result<()>;

    async fn read(&self, ctx: &Context, state: &mut State) -> Result<()>;

    async fn update(&self, ctx: &Context, prior: &mut State, desired: &State) -> Result<()>;

    async fn delete(&self, ctx: &Context, state: &mut State) -> Result<()>;

    async fn import(&self, ctx: &Context, id: &str) -> Result<State>;

    async fn export(&self) -> Result<ResourceIdMetaMap>;
}

#[async_trait]
impl<R: ManagedResource> Lifecycle for ResourceController<R> {
    fn descriptor(&self) -> &ResourceDescriptor {
        ResourceController::descriptor(self)
    }

    async fn create(&self, ctx: &Context, state: &mut State) -> Result<()> {
        ResourceController::create(self, ctx, state).await
    }

    async fn read(&self, ctx: &Context, state: &mut State) -> Result<()> {
        ResourceController::read(self, ctx, state).await
    }

    async fn update(&self, ctx: &Context, prior: &mut State, desired: &State) -> Result<()> {
        ResourceController::update(self, ctx, prior, desired).await
    }

    async fn delete(&self, ctx: &Context, state: &mut State) -> Result<()> {
        ResourceController::delete(self, ctx, state).await
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<State> {
        ResourceController::import(self, ctx, id).await
    }

    async fn export(&self) -> Result<ResourceIdMetaMap> {
        ResourceController::export(self).await
    }
}

#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Arc<dyn Lifecycle>>,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the descriptor's type name, replacing any earlier entry.
    pub fn register_resource(&mut self, lifecycle: impl Lifecycle + 'static) -> &mut Self {
        let name = lifecycle.descriptor().type_name.clone();
        tracing::debug!("Registering resource {}", name);
        self.resources.insert(name, Arc::new(lifecycle));
        self
    }

    pub fn register_data_source(&mut self, data_source: impl DataSource + 'static) -> &mut Self {
        let name = data_source.descriptor().type_name.clone();
        tracing::debug!("Registering data source {}", name);
        self.data_sources.insert(name, Arc::new(data_source));
        self
    }

    pub fn resource(&self, type_name: &str) -> Result<Arc<dyn Lifecycle>> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownResourceType(type_name.to_string()))
    }

    pub fn data_source(&self, type_name: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownResourceType(type_name.to_string()))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().map(String::as_str)
    }

    /// Export manifests for every registered resource type, keyed by type name.
    pub async fn export_all(&self) -> Result<BTreeMap<String, ResourceIdMetaMap>> {
        let mut manifests = BTreeMap::new();
        for (type_name, lifecycle) in &self.resources {
            manifests.insert(type_name.clone(), lifecycle.export().await?);
        }
        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DescriptorBuilder;

    struct Constant {
        descriptor: ResourceDescriptor,
    }

    #[async_trait]
    impl DataSource for Constant {
        fn descriptor(&self) -> &ResourceDescriptor {
            &self.descriptor
        }

        async fn read(&self, _ctx: &Context, config: &State) -> Result<State> {
            let mut state = config.clone();
            state.set_id("const-1");
            Ok(state)
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_type_name() {
        let mut registry = ResourceRegistry::new();
        registry.register_data_source(Constant {
            descriptor: DescriptorBuilder::new("test_constant").build(),
        });

        let ds = registry.data_source("test_constant").unwrap();
        let state = ds.read(&Context::new(), &State::new()).await.unwrap();
        assert_eq!(state.id(), Some("const-1"));
        assert_eq!(registry.data_source_types().collect::<Vec<_>>(), vec!["test_constant"]);
    }

    #[test]
    fn unknown_type_is_reported() {
        let registry = ResourceRegistry::new();
        let err = registry.resource("test_missing").err().unwrap();
        assert!(matches!(err, LifecycleError::UnknownResourceType(ref t) if t == "test_missing"));
        assert!(registry.resource_types().next().is_none());
    }
}
