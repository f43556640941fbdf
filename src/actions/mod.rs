pub mod catalogue;
pub mod scheduler;

use catalogue::{ActionCatalogue, ActionDefinition};

use crate::ecs::world::Scene;
use crate::error::ActionRejected;
use crate::game::geometry::{distance, Vec2};
use crate::protocol::{ActionKind, Millis, TargetKind};

/// Catalogue entries whose cooldown has elapsed for `entity`. Unknown entity
/// yields nothing.
pub fn available_actions<'c>(
    scene: &Scene,
    catalogue: &'c ActionCatalogue,
    entity: &str,
    now: Millis,
) -> Vec<&'c ActionDefinition> {
    if !scene.registry.contains(entity) {
        return Vec::new();
    }
    catalogue
        .iter()
        .filter(|def| scene.registry.cooldown_remaining(entity, &def.id, def.cooldown, now) == Some(0))
        .collect()
}

/// Validates a request and, on success, queues it with
/// `resolve_at = now + delay`. A rejection leaves the scene untouched.
pub fn request_action(
    scene: &mut Scene,
    catalogue: &ActionCatalogue,
    actor: &str,
    action_id: &str,
    target_id: Option<&str>,
    target_position: Option<Vec2>,
    now: Millis,
) -> Result<(), ActionRejected> {
    let actor_state = scene
        .registry
        .get(actor)
        .ok_or_else(|| ActionRejected::UnknownEntity(actor.to_string()))?;
    if !actor_state.is_alive() {
        return Err(ActionRejected::ActorDefeated(actor.to_string()));
    }

    let def = catalogue
        .get(action_id)
        .ok_or_else(|| ActionRejected::UnknownAction(action_id.to_string()))?;

    let remaining = scene
        .registry
        .cooldown_remaining(actor, &def.id, def.cooldown, now)
        .unwrap_or(0);
    if remaining > 0 {
        return Err(ActionRejected::OnCooldown {
            action: def.id.clone(),
            remaining,
        });
    }

    if scene.scheduler.has_pending(actor) {
        return Err(ActionRejected::SlotOccupied(actor.to_string()));
    }

    if target_position.is_some_and(|p| !p.is_finite()) {
        return Err(ActionRejected::InvalidPosition);
    }

    let target_pos = match target_id {
        Some(tid) => {
            if tid == actor && def.target == TargetKind::Single {
                return Err(ActionRejected::InvalidTarget(tid.to_string()));
            }
            if !scene.registry.is_alive(tid) {
                return Err(ActionRejected::InvalidTarget(tid.to_string()));
            }
            scene.registry.position(tid)
        }
        None => None,
    };

    match def.target {
        TargetKind::Single => {
            let Some(tp) = target_pos else {
                return Err(ActionRejected::MissingTarget(def.id.clone()));
            };
            check_range(def, actor_state.position, tp)?;
        }
        TargetKind::Area => {
            let centre = target_position.or(target_pos).unwrap_or(actor_state.position);
            check_range(def, actor_state.position, centre)?;
        }
        TargetKind::SelfOnly => {
            if def.kind == ActionKind::Move && target_position.is_none() {
                return Err(ActionRejected::MissingTarget(def.id.clone()));
            }
        }
    }

    scene.scheduler.enqueue(
        actor.to_string(),
        def.clone(),
        target_id.map(str::to_string),
        target_position,
        now,
    );
    if def.kind == ActionKind::Attack {
        scene.start_combat(now);
    }
    Ok(())
}

fn check_range(def: &ActionDefinition, from: Vec2, to: Vec2) -> Result<(), ActionRejected> {
    let Some(range) = def.range else {
        return Ok(());
    };
    let d = distance(from, to);
    if d > range {
        return Err(ActionRejected::OutOfRange { distance: d, range });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::catalogue::{BASIC_ATTACK, DASH, EVADE, HEAVY_ATTACK, RANGED_ATTACK};
    use super::*;
    use crate::config::EngineConfig;
    use crate::game::rooms::{EntityData, PlayerProfile, RoomData};
    use crate::protocol::{Category, PLAYER_ID};

    fn mob(id: &str, x: f32, y: f32) -> EntityData {
        EntityData {
            id: id.into(),
            category: Category::Hostile,
            x,
            y,
            hp: 100,
            attack: 0,
            defense: 5,
            attack_range: 15.0,
            move_speed: None,
        }
    }

    fn scene() -> Scene {
        let mut room = RoomData::new("hall");
        room.entities = vec![mob("mob_1", 55.0, 50.0), mob("mob_far", 50.0, 90.0)];
        Scene::build(&room, &EngineConfig::default(), &PlayerProfile::default(), None, 1).unwrap()
    }

    #[test]
    fn accepted_request_is_queued_with_delay() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 1000).unwrap();
        let q = s.scheduler.pending(PLAYER_ID).unwrap();
        assert_eq!(q.resolve_at, 2000);
        assert_eq!(q.target_id.as_deref(), Some("mob_1"));
        assert!(s.combat_active);
        assert_eq!(s.combat_started_at, Some(1000));
    }

    #[test]
    fn rejections_do_not_mutate() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        let cases = [
            (request_action(&mut s, &cat, "ghost", BASIC_ATTACK, Some("mob_1"), None, 0),
             ActionRejected::UnknownEntity("ghost".into())),
            (request_action(&mut s, &cat, PLAYER_ID, "fireball", Some("mob_1"), None, 0),
             ActionRejected::UnknownAction("fireball".into())),
            (request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, None, None, 0),
             ActionRejected::MissingTarget(BASIC_ATTACK.into())),
            (request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some(PLAYER_ID), None, 0),
             ActionRejected::InvalidTarget(PLAYER_ID.into())),
            (request_action(&mut s, &cat, PLAYER_ID, DASH, None, None, 0),
             ActionRejected::MissingTarget(DASH.into())),
            (request_action(&mut s, &cat, PLAYER_ID, DASH, None, Some(Vec2::new(50.0, f32::INFINITY)), 0),
             ActionRejected::InvalidPosition),
        ];
        for (result, expected) in cases {
            assert_eq!(result, Err(expected));
        }
        assert!(s.scheduler.queued().is_empty());
        assert!(!s.combat_active);
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        let err = request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_far"), None, 0).unwrap_err();
        assert!(matches!(err, ActionRejected::OutOfRange { range, .. } if range == 15.0));
        // 40 units is within the ranged attack's reach.
        request_action(&mut s, &cat, PLAYER_ID, RANGED_ATTACK, Some("mob_far"), None, 0).unwrap();
    }

    #[test]
    fn area_attack_checks_centre_range() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        let err = request_action(&mut s, &cat, PLAYER_ID, HEAVY_ATTACK, None, Some(Vec2::new(50.0, 80.0)), 0)
            .unwrap_err();
        assert!(matches!(err, ActionRejected::OutOfRange { .. }));
        request_action(&mut s, &cat, PLAYER_ID, HEAVY_ATTACK, None, None, 0).unwrap();
    }

    #[test]
    fn single_flight_keeps_first_request() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 0).unwrap();
        let err = request_action(&mut s, &cat, PLAYER_ID, EVADE, None, None, 10).unwrap_err();
        assert_eq!(err, ActionRejected::SlotOccupied(PLAYER_ID.into()));
        assert_eq!(s.scheduler.queued().len(), 1);
        assert_eq!(s.scheduler.pending(PLAYER_ID).unwrap().action.id, BASIC_ATTACK);
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        s.registry.record_cooldown(PLAYER_ID, BASIC_ATTACK, 1000).unwrap();
        let err = request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 2999).unwrap_err();
        assert_eq!(
            err,
            ActionRejected::OnCooldown {
                action: BASIC_ATTACK.into(),
                remaining: 1
            }
        );
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 3000).unwrap();
    }

    #[test]
    fn available_actions_filters_cooldowns() {
        let mut s = scene();
        let cat = ActionCatalogue::default();
        assert_eq!(available_actions(&s, &cat, PLAYER_ID, 0).len(), cat.len());
        s.registry.record_cooldown(PLAYER_ID, EVADE, 0).unwrap();
        let ids: Vec<&str> = available_actions(&s, &cat, PLAYER_ID, 100)
            .into_iter()
            .map(|d| d.id.as_str())
            .collect();
        assert!(!ids.contains(&EVADE));
        assert_eq!(ids.len(), cat.len() - 1);
        assert!(available_actions(&s, &cat, "ghost", 0).is_empty());
    }
}
