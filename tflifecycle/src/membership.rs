//! Set-membership reconciliation
//!
//! Parent objects such as queues or groups carry member lists that the
//! remote API only lets us change through bulk add/remove calls of bounded
//! size, plus a per-member rank. Reconciliation diffs the current members
//! against the configured ones and issues the minimum set of calls.

use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_RANK: i64 = 1;
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub rank: i64,
}

impl Member {
    pub fn new(id: impl Into<String>, rank: i64) -> Self {
        Self {
            id: id.into(),
            rank,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    pub remove: Vec<String>,
    pub add: Vec<Member>,
    pub rank_updates: Vec<Member>,
}

impl MembershipPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty() && self.rank_updates.is_empty()
    }
}

/// Diff `current` against `desired`, preserving input order. Members present
/// in both with the same rank are left alone.
pub fn plan_membership(current: &[Member], desired: &[Member]) -> MembershipPlan {
    let current_ranks: HashMap<&str, i64> =
        current.iter().map(|m| (m.id.as_str(), m.rank)).collect();
    let desired_ids: HashSet<&str> = desired.iter().map(|m| m.id.as_str()).collect();

    let mut plan = MembershipPlan {
        remove: current
            .iter()
            .filter(|m| !desired_ids.contains(m.id.as_str()))
            .map(|m| m.id.clone())
            .collect(),
        ..MembershipPlan::default()
    };

    for member in desired {
        match current_ranks.get(member.id.as_str()) {
            None => {
                plan.add.push(member.clone());
                // additions always land with the default rank
                if member.rank != DEFAULT_RANK {
                    plan.rank_updates.push(member.clone());
                }
            }
            Some(rank) if *rank != member.rank => plan.rank_updates.push(member.clone()),
            Some(_) => {}
        }
    }

    plan
}

/// Slices of at most `size` items in original order.
pub fn chunked<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

#[async_trait]
pub trait MembershipClient: Send + Sync {
    async fn list_members(&self, parent_id: &str) -> std::result::Result<Vec<Member>, RemoteError>;

    async fn add_members(
        &self,
        parent_id: &str,
        member_ids: &[String],
    ) -> std::result::Result<(), RemoteError>;

    async fn remove_members(
        &self,
        parent_id: &str,
        member_ids: &[String],
    ) -> std::result::Result<(), RemoteError>;

    async fn set_member_rank(
        &self,
        parent_id: &str,
        member: &Member,
    ) -> std::result::Result<(), RemoteError>;
}

/// Bring the members of `parent_id` in line with `desired`. `None` means the
/// configuration does not manage membership and nothing is touched.
///
/// Removals run first, then additions, then rank fixups.
pub async fn reconcile_members<C: MembershipClient + ?Sized>(
    client: &C,
    parent_id: &str,
    desired: Option<&[Member]>,
    batch_size: usize,
) -> Result<MembershipPlan> {
    let Some(desired) = desired else {
        return Ok(MembershipPlan::default());
    };

    let current = client.list_members(parent_id).await?;
    let plan = plan_membership(&current, desired);
    if plan.is_empty() {
        return Ok(plan);
    }

    tracing::debug!(
        "Reconciling members of {}: {} to remove, {} to add, {} rank updates",
        parent_id,
        plan.remove.len(),
        plan.add.len(),
        plan.rank_updates.len()
    );

    for batch in chunked(&plan.remove, batch_size) {
        client.remove_members(parent_id, batch).await?;
    }

    let added: Vec<String> = plan.add.iter().map(|m| m.id.clone()).collect();
    for batch in chunked(&added, batch_size) {
        client.add_members(parent_id, batch).await?;
    }

    for member in &plan.rank_updates {
        client.set_member_rank(parent_id, member).await?;
    }

    Ok(plan)
}
