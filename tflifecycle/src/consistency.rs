//! Read-after-write consistency checking
//!
//! Backends that are eventually consistent can return stale data right after
//! a write. A `ConsistencyCheck` holds the desired state captured before the
//! read and compares it to what was just flattened from the remote object.
//! The read loop turns a disagreement into a retryable failure, so drift
//! detection becomes a bounded poll-until-consistent step.
//!
//! Attributes the configuration leaves unset are never compared: an absence
//! of opinion is not a mismatch.

use crate::error::LifecycleError;
use crate::schema::{AttributeSchema, AttributeType, ResourceDescriptor};
use crate::types::{Dynamic, State};
use std::collections::BTreeMap;

const FLOAT_TOLERANCE: f64 = 1e-9;

/// Whether the read follows a write made in the same operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Read following create/update: disagreement is propagation lag until
    /// proven otherwise
    AfterWrite,
    /// Plain refresh or import: any difference is real drift and is handed
    /// to Terraform unchanged
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub attribute: String,
    pub expected: Dynamic,
    pub actual: Dynamic,
}

impl Mismatch {
    pub fn into_error(self, id: &str) -> LifecycleError {
        LifecycleError::ConsistencyMismatch {
            id: id.to_string(),
            attribute: self.attribute,
            expected: self.expected,
            actual: self.actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Consistent,
    /// Only attributes known to be eventually consistent disagree
    Pending(Mismatch),
    /// An attribute without known propagation lag disagrees
    Drifted(Mismatch),
}

impl Verdict {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Verdict::Consistent)
    }
}

pub struct ConsistencyCheck<'a> {
    descriptor: &'a ResourceDescriptor,
    desired: State,
    mode: CheckMode,
}

impl<'a> ConsistencyCheck<'a> {
    /// Snapshot `desired` before the remote read; later changes to the
    /// caller's state do not affect the comparison.
    pub fn new(descriptor: &'a ResourceDescriptor, desired: &State, mode: CheckMode) -> Self {
        Self {
            descriptor,
            desired: desired.clone(),
            mode,
        }
    }

    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    pub fn check_state(&self, observed: &State) -> Verdict {
        if self.mode == CheckMode::Refresh {
            return Verdict::Consistent;
        }

        let mut pending = None;
        for attribute in &self.descriptor.attributes {
            if attribute.is_computed_only() {
                continue;
            }
            let Some(expected) = self.desired.get(&attribute.name) else {
                continue;
            };
            let actual = observed.get(&attribute.name).unwrap_or(&Dynamic::Null);

            if values_match(&attribute.r#type, expected, actual) {
                continue;
            }

            let mismatch = Mismatch {
                attribute: attribute.name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            };
            if !attribute.eventually_consistent {
                tracing::debug!(
                    "Attribute {} of {} disagrees: expected {}, got {}",
                    mismatch.attribute,
                    self.descriptor.type_name,
                    mismatch.expected,
                    mismatch.actual
                );
                return Verdict::Drifted(mismatch);
            }
            pending.get_or_insert(mismatch);
        }

        match pending {
            Some(mismatch) => Verdict::Pending(mismatch),
            None => Verdict::Consistent,
        }
    }
}

fn is_unset(value: &Dynamic) -> bool {
    match value {
        Dynamic::Null => true,
        Dynamic::List(items) => items.is_empty(),
        _ => false,
    }
}

fn values_match(r#type: &AttributeType, expected: &Dynamic, actual: &Dynamic) -> bool {
    if expected.is_null() {
        return true;
    }
    if is_unset(expected) && is_unset(actual) {
        return true;
    }

    match (r#type, expected, actual) {
        (AttributeType::Set(inner), Dynamic::List(exp), Dynamic::List(act)) => {
            unordered_match(inner, exp, act)
        }
        (AttributeType::List(inner), Dynamic::List(exp), Dynamic::List(act)) => {
            exp.len() == act.len()
                && exp.iter().zip(act).all(|(e, a)| values_match(inner, e, a))
        }
        (AttributeType::Object(fields), Dynamic::Map(exp), Dynamic::Map(act)) => {
            objects_match(fields, exp, act)
        }
        (AttributeType::Map(inner), Dynamic::Map(exp), Dynamic::Map(act)) => {
            exp.len() == act.len()
                && exp
                    .iter()
                    .all(|(k, e)| act.get(k).is_some_and(|a| values_match(inner, e, a)))
        }
        (_, Dynamic::Number(e), Dynamic::Number(a)) => (e - a).abs() < FLOAT_TOLERANCE,
        (_, Dynamic::Map(exp), Dynamic::Map(act)) => exp
            .iter()
            .all(|(k, e)| values_match(&AttributeType::String, e, act.get(k).unwrap_or(&Dynamic::Null))),
        _ => expected == actual,
    }
}

fn objects_match(
    fields: &[AttributeSchema],
    expected: &BTreeMap<String, Dynamic>,
    actual: &BTreeMap<String, Dynamic>,
) -> bool {
    fields.iter().filter(|f| !f.is_computed_only()).all(|field| {
        match expected.get(&field.name) {
            None => true,
            Some(e) => values_match(
                &field.r#type,
                e,
                actual.get(&field.name).unwrap_or(&Dynamic::Null),
            ),
        }
    })
}

/// Multiset comparison: every expected element pairs with a distinct actual one.
fn unordered_match(inner: &AttributeType, expected: &[Dynamic], actual: &[Dynamic]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    let mut used = vec![false; actual.len()];
    expected.iter().all(|e| {
        let found = actual
            .iter()
            .enumerate()
            .find(|(idx, a)| !used[*idx] && values_match(inner, e, a))
            .map(|(idx, _)| idx);
        match found {
            Some(idx) => {
                used[idx] = true;
                true
            }
            None => false,
        }
    })
}
