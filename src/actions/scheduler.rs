use super::catalogue::ActionDefinition;
use crate::game::geometry::Vec2;
use crate::protocol::{EntityId, Millis, QueuedActionSnapshot};

/// An accepted action waiting for its execution delay.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    /// Insertion sequence; the resolution tie-break.
    pub seq: u64,
    pub actor: EntityId,
    pub action: ActionDefinition,
    pub target_id: Option<EntityId>,
    pub target_position: Option<Vec2>,
    pub accepted_at: Millis,
    pub resolve_at: Millis,
}

impl QueuedAction {
    pub fn snapshot(&self) -> QueuedActionSnapshot {
        QueuedActionSnapshot {
            actor: self.actor.clone(),
            action_id: self.action.id.clone(),
            target_id: self.target_id.clone(),
            target_position: self.target_position,
            accepted_at: self.accepted_at,
            resolve_at: self.resolve_at,
        }
    }
}

/// Scene-owned timer that removes a status effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryTimer {
    pub entity: EntityId,
    pub tag: String,
    pub fire_at: Millis,
}

/// Pending actions and status-expiry timers for one scene. Dropped with the
/// scene, so nothing here outlives a room transition.
#[derive(Debug, Default)]
pub struct ActionScheduler {
    queue: Vec<QueuedAction>,
    next_seq: u64,
    timers: Vec<ExpiryTimer>,
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self, actor: &str) -> bool {
        self.queue.iter().any(|q| q.actor == actor)
    }

    pub fn pending(&self, actor: &str) -> Option<&QueuedAction> {
        self.queue.iter().find(|q| q.actor == actor)
    }

    pub fn queued(&self) -> &[QueuedAction] {
        &self.queue
    }

    pub fn snapshots(&self) -> Vec<QueuedActionSnapshot> {
        self.queue.iter().map(QueuedAction::snapshot).collect()
    }

    /// Appends an accepted action. Callers check the single-flight rule first;
    /// a second entry for the same actor is a programming error.
    pub fn enqueue(
        &mut self,
        actor: EntityId,
        action: ActionDefinition,
        target_id: Option<EntityId>,
        target_position: Option<Vec2>,
        now: Millis,
    ) -> &QueuedAction {
        assert!(
            !self.has_pending(&actor),
            "single-flight violated: {} already has a queued action",
            actor
        );

        let seq = self.next_seq;
        self.next_seq += 1;
        let resolve_at = now + action.delay;
        self.queue.push(QueuedAction {
            seq,
            actor,
            action,
            target_id,
            target_position,
            accepted_at: now,
            resolve_at,
        });
        &self.queue[self.queue.len() - 1]
    }

    /// Removes the actor's pending action, if any.
    pub fn cancel(&mut self, actor: &str) -> Option<QueuedAction> {
        let idx = self.queue.iter().position(|q| q.actor == actor)?;
        Some(self.queue.remove(idx))
    }

    /// Removes and returns every action with `resolve_at <= now`, in insertion order.
    pub fn take_due(&mut self, now: Millis) -> Vec<QueuedAction> {
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|q| q.resolve_at <= now);
        self.queue = waiting;
        due
    }

    pub fn schedule_expiry(&mut self, entity: EntityId, tag: String, fire_at: Millis) {
        self.timers.retain(|t| !(t.entity == entity && t.tag == tag));
        self.timers.push(ExpiryTimer { entity, tag, fire_at });
    }

    /// Removes and returns due timers, earliest first.
    pub fn take_due_expiries(&mut self, now: Millis) -> Vec<ExpiryTimer> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|t| t.fire_at <= now);
        self.timers = waiting;
        due.sort_by_key(|t| t.fire_at);
        due
    }

    pub fn cancel_timers_for(&mut self, entity: &str) {
        self.timers.retain(|t| t.entity != entity);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
