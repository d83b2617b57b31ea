//! Retry/backoff delivery over group membership.
//!
//! Room-wide chat messages are user-visible content and must not vanish when
//! a receiver is momentarily saturated; presence/typing signals are not worth
//! blocking retries. The two policies are `MustAttempt` and `BestEffort`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time;

use super::groups::GroupId;
use super::hub::{GroupHub, MemberSender, OutboundPayload};

/// Delivery guarantee for a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Hand off once per member; a full buffer is dropped silently.
    BestEffort,
    /// Retry full buffers per the policy; exhaustion is an error.
    MustAttempt,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery to member {member} of {group} failed: buffer full after {attempts} attempts")]
    BufferExhausted {
        group: String,
        member: String,
        attempts: usize,
    },
    #[error("member {member} of {group} is gone")]
    MemberGone { group: String, member: String },
}

/// Why a single handoff attempt did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportError {
    Full,
    Gone,
}

/// Bounded retry schedule for `MustAttempt` sends.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt `attempt` (0-indexed):
    /// `base_delay * 2^attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.base_delay * 2u32.pow(attempt as u32)
    }
}

/// Drives `try_once` until it succeeds, the transport reports the member
/// gone, or the policy's attempts are exhausted. Only `Full` is retried.
async fn send_with_retry<F>(policy: &RetryPolicy, mut try_once: F) -> Result<(), TransportError>
where
    F: FnMut() -> Result<(), TransportError>,
{
    for attempt in 0..policy.max_attempts {
        match try_once() {
            Ok(()) => return Ok(()),
            Err(TransportError::Gone) => return Err(TransportError::Gone),
            Err(TransportError::Full) => {
                if attempt + 1 == policy.max_attempts {
                    break;
                }
                time::sleep(policy.delay(attempt)).await;
            }
        }
    }
    Err(TransportError::Full)
}

fn try_handoff(tx: &MemberSender, payload: &OutboundPayload) -> Result<(), TransportError> {
    tx.try_send(payload.clone()).map_err(|err| match err {
        TrySendError::Full(_) => TransportError::Full,
        TrySendError::Closed(_) => TransportError::Gone,
    })
}

/// Fanout layer: resolves a group to its members and hands the payload to
/// each member's channel under the requested guarantee.
pub struct DeliveryChannel {
    hub: Arc<GroupHub>,
    policy: RetryPolicy,
    dropped: AtomicU64,
}

impl DeliveryChannel {
    pub fn new(hub: Arc<GroupHub>) -> Self {
        Self::with_policy(hub, RetryPolicy::default())
    }

    pub fn with_policy(hub: Arc<GroupHub>, policy: RetryPolicy) -> Self {
        Self {
            hub,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Best-effort sends dropped so far because a member buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deliver a payload to every current member of `group`.
    ///
    /// Member sends run concurrently; one member backing off never delays the
    /// others, and there is no rollback across members. With several failures
    /// the first is returned and the rest are logged.
    pub async fn send(
        &self,
        group: &GroupId,
        payload: OutboundPayload,
        mode: SendMode,
    ) -> Result<(), DeliveryError> {
        let members = self.hub.members(group);
        match mode {
            SendMode::BestEffort => {
                for (member, tx) in members {
                    match try_handoff(&tx, &payload) {
                        Ok(()) => {}
                        Err(TransportError::Full) => {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(%group, %member, "best-effort send dropped: buffer full");
                        }
                        Err(TransportError::Gone) => {}
                    }
                }
                Ok(())
            }
            SendMode::MustAttempt => {
                let sends = members.into_iter().map(|(member, tx)| {
                    let payload = payload.clone();
                    let policy = self.policy;
                    async move {
                        let result =
                            send_with_retry(&policy, || try_handoff(&tx, &payload)).await;
                        (member, result)
                    }
                });

                let mut first_failure = None;
                for (member, result) in join_all(sends).await {
                    let err = match result {
                        Ok(()) => continue,
                        Err(TransportError::Full) => DeliveryError::BufferExhausted {
                            group: group.to_string(),
                            member,
                            attempts: self.policy.max_attempts,
                        },
                        Err(TransportError::Gone) => DeliveryError::MemberGone {
                            group: group.to_string(),
                            member,
                        },
                    };
                    tracing::warn!(%group, error = %err, "guaranteed-attempt send failed");
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
                match first_failure {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }

    /// Hand a payload to one specific member channel (a session's own reply
    /// channel), under the same guarantees as a group send.
    pub async fn send_direct(
        &self,
        session_id: &str,
        tx: &MemberSender,
        payload: OutboundPayload,
        mode: SendMode,
    ) -> Result<(), DeliveryError> {
        match mode {
            SendMode::BestEffort => {
                if let Err(TransportError::Full) = try_handoff(tx, &payload) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(session_id, "best-effort reply dropped: buffer full");
                }
                Ok(())
            }
            SendMode::MustAttempt => send_with_retry(&self.policy, || try_handoff(tx, &payload))
                .await
                .map_err(|err| match err {
                    TransportError::Full => DeliveryError::BufferExhausted {
                        group: format!("session:{session_id}"),
                        member: session_id.to_string(),
                        attempts: self.policy.max_attempts,
                    },
                    TransportError::Gone => DeliveryError::MemberGone {
                        group: format!("session:{session_id}"),
                        member: session_id.to_string(),
                    },
                }),
        }
    }
}
