use tracing::debug;

use crate::ecs::world::Scene;
use crate::protocol::{EntityId, Millis};

#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredEffect {
    pub entity: EntityId,
    pub tag: String,
}

/// Fires every expiry timer due at `now` and strips the matching effects.
/// Timers whose entity has since left the scene do nothing.
pub fn status_system(scene: &mut Scene, now: Millis) -> Vec<ExpiredEffect> {
    let mut expired = Vec::new();
    for timer in scene.scheduler.take_due_expiries(now) {
        if scene.registry.expire_effect(&timer.entity, &timer.tag, now) {
            debug!(entity = %timer.entity, tag = %timer.tag, "status effect expired");
            expired.push(ExpiredEffect {
                entity: timer.entity,
                tag: timer.tag,
            });
        }
    }
    expired
}
