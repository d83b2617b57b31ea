//! Shared group membership: which live sessions receive a group's frames.
//!
//! Each member is a bounded `mpsc` sender; the paired receiver is drained by
//! that session's socket loop. A full channel is the "receive buffer full"
//! condition the delivery layer reacts to.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::groups::GroupId;

/// What travels over a member channel: a serialized frame, or the signal to
/// close the connection.
#[derive(Debug, Clone)]
pub enum OutboundPayload {
    Frame(Arc<str>),
    Close,
}

pub type MemberSender = mpsc::Sender<OutboundPayload>;

/// Concurrent group → members map. Safe under join/leave from unrelated
/// connections.
pub struct GroupHub {
    groups: DashMap<GroupId, HashMap<String, MemberSender>>,
}

impl GroupHub {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Add a session to a group. Re-joining replaces the previous sender.
    pub fn join(&self, group: &GroupId, session_id: &str, tx: MemberSender) {
        self.groups
            .entry(group.clone())
            .or_default()
            .insert(session_id.to_string(), tx);
    }

    /// Remove a session from a group. Idempotent: leaving a group the session
    /// never joined, or one already vacated, is a no-op.
    pub fn leave(&self, group: &GroupId, session_id: &str) {
        let emptied = match self.groups.get_mut(group) {
            Some(mut members) => {
                members.remove(session_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.groups.remove_if(group, |_, members| members.is_empty());
        }
    }

    /// Snapshot of a group's members.
    pub fn members(&self, group: &GroupId) -> Vec<(String, MemberSender)> {
        self.groups
            .get(group)
            .map(|members| {
                members
                    .iter()
                    .map(|(id, tx)| (id.clone(), tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn member_count(&self, group: &GroupId) -> usize {
        self.groups.get(group).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for GroupHub {
    fn default() -> Self {
        Self::new()
    }
}
