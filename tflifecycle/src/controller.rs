//! Generic CRUD orchestration
//!
//! A resource type plugs into the engine by implementing [`ManagedResource`]:
//! a descriptor, payload conversion in both directions, and thin remote
//! calls. [`ResourceController`] sequences those calls with validation,
//! retries, consistency checks and error wrapping so that every resource
//! type gets the same lifecycle semantics.

use crate::consistency::{CheckMode, ConsistencyCheck, Verdict};
use crate::context::Context;
use crate::error::{LifecycleError, Operation, RemoteError, Result};
use crate::export::{self, ResourceIdMetaMap};
use crate::retry::{self, RetryError, Timeouts};
use crate::schema::ResourceDescriptor;
use crate::types::State;
use async_trait::async_trait;

type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub entities: Vec<T>,
    /// Total page count when the backend reports one
    pub page_count: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(entities: Vec<T>) -> Self {
        Self {
            entities,
            page_count: None,
        }
    }

    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = Some(page_count);
        self
    }
}

/// Per-type glue between the lifecycle engine and a remote API.
#[async_trait]
pub trait ManagedResource: Send + Sync + 'static {
    /// Wire representation of one remote object
    type Payload: Clone + Send + Sync + 'static;

    /// Updates must carry the server's current version stamp
    const VERSIONED: bool = false;

    fn descriptor(&self) -> &ResourceDescriptor;

    /// Desired state to wire payload
    fn build(&self, desired: &State) -> Result<Self::Payload>;

    /// Wire payload to state; attributes the payload does not carry are left as is
    fn flatten(&self, payload: &Self::Payload, state: &mut State) -> Result<()>;

    fn id_of(&self, payload: &Self::Payload) -> Option<String>;

    /// Human-readable name used in export manifests
    fn name_of(&self, payload: &Self::Payload) -> String;

    async fn get(&self, id: &str) -> RemoteResult<Self::Payload>;

    async fn list(&self, page_number: u32, page_size: u32) -> RemoteResult<Page<Self::Payload>>;

    async fn create(&self, payload: &Self::Payload) -> RemoteResult<Self::Payload>;

    async fn update(&self, id: &str, payload: &Self::Payload) -> RemoteResult<Self::Payload>;

    async fn delete(&self, id: &str) -> RemoteResult<()>;

    fn version_of(&self, _payload: &Self::Payload) -> Option<i64> {
        None
    }

    fn set_version(&self, _payload: &mut Self::Payload, _version: i64) {}

    /// Soft-deleted objects that the backend still returns
    fn is_deleted(&self, _payload: &Self::Payload) -> bool {
        false
    }

    /// Runs after a successful create or update, before the read-back.
    async fn after_write(&self, _id: &str, _desired: &State) -> Result<()> {
        Ok(())
    }

    /// Additional remote reads folded into state after `flatten`.
    async fn read_related(&self, _id: &str, _state: &mut State) -> RemoteResult<()> {
        Ok(())
    }
}

pub struct ResourceController<R> {
    resource: R,
    timeouts: Timeouts,
}

impl<R: ManagedResource> ResourceController<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        self.resource.descriptor()
    }

    pub fn type_name(&self) -> &str {
        &self.resource.descriptor().type_name
    }

    fn fail(&self, operation: Operation, id: &str) -> impl Fn(LifecycleError) -> LifecycleError + '_ {
        let id = id.to_string();
        move |err| err.during(operation, self.type_name(), &id)
    }

    /// Create the remote object and read it back. The id is stored as soon
    /// as the backend assigns it, so a failing read-back still leaves the
    /// object tracked.
    pub async fn create(&self, ctx: &Context, state: &mut State) -> Result<()> {
        let fail = self.fail(Operation::Create, state.id().unwrap_or("(new)"));

        self.descriptor().validate(state).map_err(&fail)?;
        let payload = self.resource.build(state).map_err(&fail)?;

        tracing::debug!("Creating {}", self.type_name());
        let created = self
            .resource
            .create(&payload)
            .await
            .map_err(|e| fail(e.into()))?;
        let id = self.resource.id_of(&created).ok_or_else(|| {
            fail(LifecycleError::validation(
                "create response did not carry an id",
            ))
        })?;
        tracing::info!("Created {} {}", self.type_name(), id);
        state.set_id(id.as_str());

        let fail = self.fail(Operation::Create, &id);
        self.resource.after_write(&id, state).await.map_err(&fail)?;
        self.read_with(ctx, state, CheckMode::AfterWrite)
            .await
            .map_err(&fail)
    }

    /// Refresh from the remote object. A missing or soft-deleted object
    /// clears the id without error.
    pub async fn read(&self, ctx: &Context, state: &mut State) -> Result<()> {
        let id = state.id().unwrap_or_default().to_string();
        self.read_with(ctx, state, CheckMode::Refresh)
            .await
            .map_err(self.fail(Operation::Read, &id))
    }

    /// Apply `desired` to the object tracked by `prior`. On failure `prior`
    /// is left untouched.
    pub async fn update(&self, ctx: &Context, prior: &mut State, desired: &State) -> Result<()> {
        let id = prior
            .id()
            .ok_or_else(|| LifecycleError::validation("cannot update a resource without an id"))?
            .to_string();
        let fail = self.fail(Operation::Update, &id);

        self.descriptor().validate(desired).map_err(&fail)?;
        let payload = self.resource.build(desired).map_err(&fail)?;

        let resource = &self.resource;
        let id_ref = id.as_str();
        let payload_ref = &payload;
        retry::retry_when(
            ctx,
            RemoteError::is_version_conflict,
            self.timeouts.update_attempts,
            self.timeouts.poll_interval,
            move || async move {
                let mut payload = payload_ref.clone();
                if R::VERSIONED {
                    let current = resource.get(id_ref).await?;
                    if let Some(version) = resource.version_of(&current) {
                        resource.set_version(&mut payload, version);
                    }
                }
                resource.update(id_ref, &payload).await
            },
        )
        .await
        .map_err(|e| match e {
            LifecycleError::Transport(e) if e.is_version_conflict() => {
                fail(LifecycleError::VersionConflict { id: id.clone() })
            }
            e => fail(e),
        })?;
        tracing::info!("Updated {} {}", self.type_name(), id);

        let mut next = desired.clone();
        next.set_id(id.as_str());
        self.resource.after_write(&id, &next).await.map_err(&fail)?;
        self.read_with(ctx, &mut next, CheckMode::AfterWrite)
            .await
            .map_err(&fail)?;

        *prior = next;
        Ok(())
    }

    /// Delete and wait until the object is gone. A 404 from the delete call
    /// itself means someone else already removed it.
    pub async fn delete(&self, ctx: &Context, state: &mut State) -> Result<()> {
        let Some(id) = state.id().map(str::to_string) else {
            return Ok(());
        };
        let fail = self.fail(Operation::Delete, &id);

        match self.resource.delete(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} already deleted", self.type_name(), id);
            }
            Err(e) => return Err(fail(e.into())),
        }

        let resource = &self.resource;
        let id_ref = id.as_str();
        retry::retry(
            ctx,
            self.timeouts.delete,
            self.timeouts.poll_interval,
            move |_| async move {
                match resource.get(id_ref).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(RetryError::non_retryable(e)),
                    Ok(payload) if resource.is_deleted(&payload) => Ok(()),
                    Ok(_) => Err(RetryError::retryable(LifecycleError::StillExists {
                        id: id_ref.to_string(),
                    })),
                }
            },
        )
        .await
        .map_err(&fail)?;

        tracing::info!("Deleted {} {}", self.type_name(), id);
        state.clear_id();
        Ok(())
    }

    /// Adopt an existing object by bare id.
    pub async fn import(&self, ctx: &Context, id: &str) -> Result<State> {
        let fail = self.fail(Operation::Import, id);
        let mut state = State::with_id(id);
        self.read_with(ctx, &mut state, CheckMode::Refresh)
            .await
            .map_err(&fail)?;
        if state.id().is_none() {
            return Err(fail(LifecycleError::NotFound { id: id.to_string() }));
        }
        Ok(state)
    }

    /// Identifier to name manifest of every object of this type.
    pub async fn export(&self) -> Result<ResourceIdMetaMap> {
        export::collect_all(&self.resource, export::DEFAULT_PAGE_SIZE)
            .await
            .map_err(self.fail(Operation::Export, "*"))
    }

    async fn read_with(&self, ctx: &Context, state: &mut State, mode: CheckMode) -> Result<()> {
        let id = state
            .id()
            .ok_or_else(|| LifecycleError::validation("cannot read a resource without an id"))?
            .to_string();

        let check = ConsistencyCheck::new(self.descriptor(), state, mode);
        let resource = &self.resource;
        let base: &State = state;
        let check_ref = &check;
        let id_ref = id.as_str();

        let observed = retry::retry(
            ctx,
            self.timeouts.read,
            self.timeouts.poll_interval,
            move |attempt| async move {
                let payload = match resource.get(id_ref).await {
                    Ok(payload) => payload,
                    Err(e) if e.is_not_found() && mode == CheckMode::Refresh => return Ok(None),
                    Err(e) => return Err(retry::classify_read_after_write(e)),
                };
                if resource.is_deleted(&payload) {
                    return Ok(None);
                }

                let mut scratch = base.clone();
                resource
                    .flatten(&payload, &mut scratch)
                    .map_err(RetryError::NonRetryable)?;
                match resource.read_related(id_ref, &mut scratch).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() && mode == CheckMode::Refresh => return Ok(None),
                    Err(e) => return Err(retry::classify_read_after_write(e)),
                }

                match check_ref.check_state(&scratch) {
                    Verdict::Consistent => Ok(Some(scratch)),
                    Verdict::Pending(mismatch) if attempt.is_final() => {
                        tracing::warn!(
                            "Accepting {} for {}: '{}' still reads {} (expected {})",
                            id_ref,
                            resource.descriptor().type_name,
                            mismatch.attribute,
                            mismatch.actual,
                            mismatch.expected
                        );
                        Ok(Some(scratch))
                    }
                    Verdict::Drifted(mismatch) if attempt.is_final() => {
                        Err(RetryError::NonRetryable(mismatch.into_error(id_ref)))
                    }
                    Verdict::Pending(mismatch) | Verdict::Drifted(mismatch) => {
                        Err(RetryError::Retryable(mismatch.into_error(id_ref)))
                    }
                }
            },
        )
        .await?;

        match observed {
            Some(observed) => *state = observed,
            None => {
                tracing::info!(
                    "{} {} no longer exists, removing from state",
                    self.type_name(),
                    id
                );
                state.clear_id();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, DescriptorBuilder};
    use crate::validator::NumberRangeValidator;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: Option<String>,
        name: String,
        label: Option<String>,
        weight: i64,
        version: i64,
        active: bool,
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// In-memory backend with knobs for the usual eventual-consistency symptoms
    struct Widgets {
        descriptor: ResourceDescriptor,
        store: Mutex<BTreeMap<String, Widget>>,
        graveyard: Mutex<BTreeMap<String, Widget>>,
        next_id: AtomicU32,
        invisible_reads: AtomicU32,
        stale_reads: AtomicU32,
        stale_name: Mutex<Option<String>>,
        stale_label: Mutex<Option<String>>,
        conflicts: AtomicU32,
        lingering_reads: AtomicU32,
        missing_related: AtomicU32,
        soft_delete: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Widgets {
        fn new() -> Self {
            Self {
                descriptor: DescriptorBuilder::new("test_widget")
                    .attribute(AttributeBuilder::string("name").required())
                    .attribute(
                        AttributeBuilder::string("label")
                            .optional()
                            .eventually_consistent(),
                    )
                    .attribute(
                        AttributeBuilder::int("weight")
                            .optional()
                            .validator(NumberRangeValidator {
                                min: Some(1.0),
                                max: Some(3.0),
                            }),
                    )
                    .attribute(AttributeBuilder::int("version").computed())
                    .build(),
                store: Mutex::new(BTreeMap::new()),
                graveyard: Mutex::new(BTreeMap::new()),
                next_id: AtomicU32::new(1),
                invisible_reads: AtomicU32::new(0),
                stale_reads: AtomicU32::new(0),
                stale_name: Mutex::new(None),
                stale_label: Mutex::new(None),
                conflicts: AtomicU32::new(0),
                lingering_reads: AtomicU32::new(0),
                missing_related: AtomicU32::new(0),
                soft_delete: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn seed(&self, name: &str) -> String {
            let id = format!("w{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.store.lock().unwrap().insert(
                id.clone(),
                Widget {
                    id: Some(id.clone()),
                    name: name.to_string(),
                    label: None,
                    weight: 1,
                    version: 1,
                    active: true,
                },
            );
            id
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
        }
    }

    #[async_trait]
    impl ManagedResource for Widgets {
        type Payload = Widget;
        const VERSIONED: bool = true;

        fn descriptor(&self) -> &ResourceDescriptor {
            &self.descriptor
        }

        fn build(&self, desired: &State) -> Result<Widget> {
            Ok(Widget {
                id: desired.id().map(str::to_string),
                name: desired.require_string("name")?,
                label: desired.get_string("label")?,
                weight: desired.get_i64("weight")?.unwrap_or(1),
                version: 0,
                active: true,
            })
        }

        fn flatten(&self, payload: &Widget, state: &mut State) -> Result<()> {
            state.set("name", payload.name.as_str());
            state.set("label", payload.label.clone());
            state.set("weight", payload.weight);
            state.set("version", payload.version);
            Ok(())
        }

        fn id_of(&self, payload: &Widget) -> Option<String> {
            payload.id.clone()
        }

        fn name_of(&self, payload: &Widget) -> String {
            payload.name.clone()
        }

        async fn get(&self, id: &str) -> RemoteResult<Widget> {
            self.record("get");
            if take(&self.invisible_reads) {
                return Err(RemoteError::status(404, "not yet visible"));
            }
            if let Some(gone) = self.graveyard.lock().unwrap().get(id) {
                if self.soft_delete {
                    return Ok(Widget {
                        active: false,
                        ..gone.clone()
                    });
                }
                if take(&self.lingering_reads) {
                    return Ok(gone.clone());
                }
                return Err(RemoteError::status(404, "not found"));
            }
            let mut widget = self
                .store
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| RemoteError::status(404, "not found"))?;
            if take(&self.stale_reads) {
                if let Some(name) = self.stale_name.lock().unwrap().clone() {
                    widget.name = name;
                }
                if let Some(label) = self.stale_label.lock().unwrap().clone() {
                    widget.label = Some(label);
                }
            }
            Ok(widget)
        }

        async fn list(&self, page_number: u32, page_size: u32) -> RemoteResult<Page<Widget>> {
            self.record("list");
            let store = self.store.lock().unwrap();
            let skip = ((page_number - 1) * page_size) as usize;
            Ok(Page::new(
                store.values().skip(skip).take(page_size as usize).cloned().collect(),
            ))
        }

        async fn create(&self, payload: &Widget) -> RemoteResult<Widget> {
            self.record("create");
            let id = format!("w{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let widget = Widget {
                id: Some(id.clone()),
                version: 1,
                ..payload.clone()
            };
            self.store.lock().unwrap().insert(id, widget.clone());
            Ok(widget)
        }

        async fn update(&self, id: &str, payload: &Widget) -> RemoteResult<Widget> {
            self.record("update");
            if take(&self.conflicts) {
                // someone else bumped the version in between
                if let Some(w) = self.store.lock().unwrap().get_mut(id) {
                    w.version += 1;
                }
            }
            let mut store = self.store.lock().unwrap();
            let current = store
                .get_mut(id)
                .ok_or_else(|| RemoteError::status(404, "not found"))?;
            if current.version != payload.version {
                return Err(RemoteError::status(409, "version mismatch"));
            }
            *current = Widget {
                id: Some(id.to_string()),
                version: current.version + 1,
                ..payload.clone()
            };
            Ok(current.clone())
        }

        async fn delete(&self, id: &str) -> RemoteResult<()> {
            self.record("delete");
            let removed = self
                .store
                .lock()
                .unwrap()
                .remove(id)
                .ok_or_else(|| RemoteError::status(404, "not found"))?;
            self.graveyard.lock().unwrap().insert(id.to_string(), removed);
            Ok(())
        }

        fn version_of(&self, payload: &Widget) -> Option<i64> {
            Some(payload.version)
        }

        fn set_version(&self, payload: &mut Widget, version: i64) {
            payload.version = version;
        }

        fn is_deleted(&self, payload: &Widget) -> bool {
            !payload.active
        }

        async fn read_related(&self, _id: &str, _state: &mut State) -> RemoteResult<()> {
            self.record("read_related");
            if take(&self.missing_related) {
                return Err(RemoteError::status(404, "parent removed"));
            }
            Ok(())
        }
    }

    fn desired(name: &str) -> State {
        State::new().with("name", name).with("weight", 2i64)
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_out_read_after_write_lag() {
        let widgets = Widgets::new();
        widgets.invisible_reads.store(2, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let mut state = desired("alpha");
        controller.create(&Context::new(), &mut state).await.unwrap();

        assert_eq!(state.id(), Some("w1"));
        assert_eq!(state.get_i64("version").unwrap(), Some(1));
        assert_eq!(controller.resource().count("create"), 1);
        assert_eq!(controller.resource().count("get"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn create_rejects_invalid_config_without_remote_calls() {
        let controller = ResourceController::new(Widgets::new());
        let mut state = State::new().with("weight", 9i64);

        let err = controller
            .create(&Context::new(), &mut state)
            .await
            .unwrap_err();

        assert!(matches!(err.root(), LifecycleError::Validation(_)));
        assert!(err.to_string().contains("name is required"));
        assert!(controller.resource().calls.lock().unwrap().is_empty());
        assert!(state.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn read_after_write_polls_until_consistent() {
        let widgets = Widgets::new();
        widgets.stale_reads.store(3, Ordering::SeqCst);
        *widgets.stale_name.lock().unwrap() = Some("old".to_string());
        let controller = ResourceController::new(widgets);

        let mut state = desired("alpha");
        controller.create(&Context::new(), &mut state).await.unwrap();

        assert_eq!(state.get_string("name").unwrap().as_deref(), Some("alpha"));
        assert_eq!(controller.resource().count("get"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_drift_surfaces_as_mismatch() {
        let widgets = Widgets::new();
        widgets.stale_reads.store(u32::MAX, Ordering::SeqCst);
        *widgets.stale_name.lock().unwrap() = Some("old".to_string());
        let controller = ResourceController::new(widgets).with_timeouts(Timeouts {
            read: Duration::from_secs(5),
            ..Timeouts::default()
        });

        let start = Instant::now();
        let mut state = desired("alpha");
        let err = controller
            .create(&Context::new(), &mut state)
            .await
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(5));
        match err.root() {
            LifecycleError::ConsistencyMismatch {
                id,
                attribute,
                expected,
                actual,
            } => {
                assert_eq!(id, "w1");
                assert_eq!(attribute, "name");
                assert_eq!(expected.as_string(), Some("alpha"));
                assert_eq!(actual.as_string(), Some("old"));
            }
            other => panic!("Expected ConsistencyMismatch, got {:?}", other),
        }
        let msg = err.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("test_widget"));
        // id stays tracked after a failed read-back
        assert_eq!(state.id(), Some("w1"));
    }

    #[tokio::test(start_paused = true)]
    async fn lagging_eventual_attribute_is_accepted_at_deadline() {
        let widgets = Widgets::new();
        widgets.stale_reads.store(u32::MAX, Ordering::SeqCst);
        *widgets.stale_label.lock().unwrap() = Some("stale".to_string());
        let controller = ResourceController::new(widgets).with_timeouts(Timeouts {
            read: Duration::from_secs(3),
            ..Timeouts::default()
        });

        let mut state = desired("alpha").with("label", "fresh");
        controller.create(&Context::new(), &mut state).await.unwrap();

        assert_eq!(state.get_string("label").unwrap().as_deref(), Some("stale"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_reports_drift_without_retrying() {
        let widgets = Widgets::new();
        let id = widgets.seed("changed-remotely");
        let controller = ResourceController::new(widgets);

        let mut state = desired("alpha");
        state.set_id(id.as_str());
        controller.read(&Context::new(), &mut state).await.unwrap();

        assert_eq!(
            state.get_string("name").unwrap().as_deref(),
            Some("changed-remotely")
        );
        assert_eq!(controller.resource().count("get"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_of_missing_object_clears_id() {
        let controller = ResourceController::new(Widgets::new());
        let mut state = desired("alpha");
        state.set_id("w404");

        controller.read(&Context::new(), &mut state).await.unwrap();
        assert!(state.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_clears_id_when_related_reads_disappear() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.missing_related.store(u32::MAX, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let mut state = desired("alpha");
        state.set_id(id.as_str());
        let start = Instant::now();
        controller.read(&Context::new(), &mut state).await.unwrap();

        assert!(state.id().is_none());
        assert_eq!(controller.resource().count("read_related"), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn update_stops_retrying_conflicts_once_cancelled() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.conflicts.store(u32::MAX, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);
        let ctx = Context::new();
        ctx.cancel();

        let mut prior = desired("alpha");
        prior.set_id(id.as_str());
        let before = prior.clone();
        let err = controller
            .update(&ctx, &mut prior, &desired("beta"))
            .await
            .unwrap_err();

        assert!(matches!(err.root(), LifecycleError::Cancelled));
        assert_eq!(prior, before);
        assert_eq!(controller.resource().count("update"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_conflict_retries_respect_context_deadline() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.conflicts.store(u32::MAX, Ordering::SeqCst);
        let controller = ResourceController::new(widgets).with_timeouts(Timeouts {
            update_attempts: 10,
            ..Timeouts::default()
        });
        let ctx = Context::with_timeout(Duration::from_millis(1500));

        let mut prior = desired("alpha");
        prior.set_id(id.as_str());
        let err = controller
            .update(&ctx, &mut prior, &desired("beta"))
            .await
            .unwrap_err();

        assert!(matches!(err.root(), LifecycleError::Transport(_)));
        assert_eq!(err.remote_status(), Some(409));
        assert_eq!(controller.resource().count("update"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn update_retries_version_conflicts() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.conflicts.store(2, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let mut prior = desired("alpha");
        prior.set_id(id.as_str());
        controller
            .update(&Context::new(), &mut prior, &desired("beta"))
            .await
            .unwrap();

        assert_eq!(prior.get_string("name").unwrap().as_deref(), Some("beta"));
        assert_eq!(prior.id(), Some(id.as_str()));
        assert_eq!(controller.resource().count("update"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_leaves_prior_state_untouched() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.conflicts.store(u32::MAX, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let mut prior = desired("alpha");
        prior.set_id(id.as_str());
        let before = prior.clone();

        let err = controller
            .update(&Context::new(), &mut prior, &desired("beta"))
            .await
            .unwrap_err();

        assert!(matches!(err.root(), LifecycleError::VersionConflict { .. }));
        assert_eq!(prior, before);
        assert_eq!(controller.resource().count("update"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_polls_until_gone() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.lingering_reads.store(2, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let mut state = State::with_id(id.as_str());
        controller.delete(&Context::new(), &mut state).await.unwrap();

        assert!(state.id().is_none());
        assert_eq!(controller.resource().count("get"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_accepts_soft_deleted_object() {
        let mut widgets = Widgets::new();
        widgets.soft_delete = true;
        let id = widgets.seed("alpha");
        let controller = ResourceController::new(widgets);

        let mut state = State::with_id(id.as_str());
        controller.delete(&Context::new(), &mut state).await.unwrap();
        assert!(state.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_times_out_when_object_lingers() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        widgets.lingering_reads.store(u32::MAX, Ordering::SeqCst);
        let controller = ResourceController::new(widgets);

        let start = Instant::now();
        let mut state = State::with_id(id.as_str());
        let err = controller
            .delete(&Context::new(), &mut state)
            .await
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(matches!(err.root(), LifecycleError::StillExists { .. }));
        assert_eq!(state.id(), Some(id.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_already_removed_object_succeeds() {
        let controller = ResourceController::new(Widgets::new());
        let mut state = State::with_id("w404");

        controller.delete(&Context::new(), &mut state).await.unwrap();
        assert!(state.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn import_reads_existing_object() {
        let widgets = Widgets::new();
        let id = widgets.seed("alpha");
        let controller = ResourceController::new(widgets);

        let state = controller.import(&Context::new(), &id).await.unwrap();
        assert_eq!(state.id(), Some(id.as_str()));
        assert_eq!(state.get_string("name").unwrap().as_deref(), Some("alpha"));
    }

    #[tokio::test(start_paused = true)]
    async fn import_of_missing_object_is_not_found() {
        let controller = ResourceController::new(Widgets::new());

        let err = controller
            .import(&Context::new(), "w404")
            .await
            .unwrap_err();

        assert!(matches!(err.root(), LifecycleError::NotFound { .. }));
        assert!(err.to_string().contains("import"));
        assert!(err.to_string().contains("w404"));
    }

    #[tokio::test]
    async fn export_lists_every_object() {
        let widgets = Widgets::new();
        widgets.seed("alpha");
        widgets.seed("beta");
        let controller = ResourceController::new(widgets);

        let manifest = controller.export().await.unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest["w1"].name, "alpha");
        assert_eq!(manifest["w2"].name, "beta");
    }
}
