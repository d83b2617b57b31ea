//! Per-connection session state.

use std::sync::atomic::{AtomicBool, Ordering};

use super::groups::{self, GroupId};
use super::hub::{GroupHub, MemberSender};

/// State for one live websocket connection. Lifecycle: created while
/// connecting, `join`ed into its groups, `close`d exactly once on disconnect.
pub struct ChatSession {
    /// Unique session identifier (`ses_`-prefixed ULID).
    pub session_id: String,
    pub room_id: i64,
    pub user_id: i64,
    /// Protocol version the client identified with.
    pub handler_version: i32,
    groups: [GroupId; 3],
    closed: AtomicBool,
}

impl ChatSession {
    pub fn new(room_id: i64, user_id: i64, handler_version: i32) -> Self {
        Self {
            session_id: lagoon_common::id::prefixed_ulid(lagoon_common::id::prefix::SESSION),
            room_id,
            user_id,
            handler_version,
            groups: groups::groups_for_session(room_id, user_id, handler_version),
            closed: AtomicBool::new(false),
        }
    }

    pub fn groups(&self) -> &[GroupId; 3] {
        &self.groups
    }

    /// Register this session with all three of its address groups.
    pub fn join(&self, hub: &GroupHub, tx: MemberSender) {
        for group in &self.groups {
            hub.join(group, &self.session_id, tx.clone());
        }
    }

    /// Leave every joined group. Idempotent: a second close is a no-op, and
    /// leaving an already-vacated group never fails.
    pub fn close(&self, hub: &GroupHub) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for group in &self.groups {
            hub.leave(group, &self.session_id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
