//! Managed resource types

pub mod journey_action_map;
pub mod journey_segment;
pub mod routing_queue;

pub use journey_action_map::JourneyActionMap;
pub use journey_segment::JourneySegmentResource;
pub use routing_queue::RoutingQueue;

use crate::api::DomainEntityRef;
use tflifecycle::{Result, State};

pub(crate) fn ref_id(entity: Option<&DomainEntityRef>) -> Option<String> {
    entity.and_then(|e| e.id.clone())
}

/// Reference built from a string attribute holding an object id
pub(crate) fn ref_from(state: &State, name: &str) -> Result<Option<DomainEntityRef>> {
    Ok(DomainEntityRef::from_id(state.get_string(name)?))
}

pub(crate) fn refs_from_ids(ids: Vec<String>) -> Vec<DomainEntityRef> {
    ids.into_iter().map(DomainEntityRef::id).collect()
}

pub(crate) fn ids_of(refs: &[DomainEntityRef]) -> Vec<String> {
    refs.iter().filter_map(|r| r.id.clone()).collect()
}
