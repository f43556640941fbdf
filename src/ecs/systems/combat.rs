use tracing::debug;

use crate::actions::scheduler::QueuedAction;
use crate::config::EngineConfig;
use crate::ecs::components::StatusEffect;
use crate::ecs::world::Scene;
use crate::game::collision::MoveResolution;
use crate::game::geometry::{distance, normalize, Vec2};
use crate::game::movement::step_entity;
use crate::protocol::{ActionId, ActionKind, EntityId, Millis, TargetKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Damage dealt to each target, in hit order.
    Hits(Vec<Hit>),
    EffectApplied { target: EntityId, tag: String, until: Millis },
    Moved { to: Vec2 },
    /// Nothing happened: actor or target gone, or the move was blocked.
    Fizzled(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub target: EntityId,
    pub damage: i32,
    pub remaining_hp: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAction {
    pub actor: EntityId,
    pub action_id: ActionId,
    pub outcome: ActionOutcome,
}

/// The result of resolving every due action for one tick.
#[derive(Debug, Default)]
pub struct CombatResult {
    pub resolved: Vec<ResolvedAction>,
    pub defeated: Vec<EntityId>,
    pub log_entries: Vec<String>,
}

/// `max(1, damage + attack - defense)`.
pub fn compute_damage(action_damage: i32, attacker_attack: i32, target_defense: i32) -> i32 {
    (action_damage + attacker_attack - target_defense).max(1)
}

/// Resolves all queued actions with `resolve_at <= now`, in insertion order.
///
/// The actor's cooldown is stamped with `now` whatever the outcome. Targets
/// brought to 0 hp are removed at once, so later actions in the same batch
/// cannot hit them and their own pending actions fizzle.
pub fn combat_system(scene: &mut Scene, config: &EngineConfig, now: Millis) -> CombatResult {
    let mut result = CombatResult::default();

    for queued in scene.scheduler.take_due(now) {
        if !scene.registry.is_alive(&queued.actor) {
            result.resolved.push(ResolvedAction {
                actor: queued.actor.clone(),
                action_id: queued.action.id.clone(),
                outcome: ActionOutcome::Fizzled("actor defeated"),
            });
            continue;
        }
        let _ = scene.registry.record_cooldown(&queued.actor, &queued.action.id, now);

        let outcome = match queued.action.kind {
            ActionKind::Attack => resolve_attack(scene, &queued),
            ActionKind::Ability => resolve_ability(scene, &queued, now),
            ActionKind::Move => resolve_move(scene, config, &queued),
        };

        if let ActionOutcome::Hits(hits) = &outcome {
            for hit in hits {
                result.log_entries.push(format!(
                    "[combat] {} hits {} with {} for {}",
                    queued.actor, hit.target, queued.action.id, hit.damage
                ));
            }
        }

        for id in scene.remove_defeated() {
            result.log_entries.push(format!("[combat] {} defeated", id));
            result.defeated.push(id);
        }

        debug!(actor = %queued.actor, action = %queued.action.id, ?outcome, "resolved action");
        result.resolved.push(ResolvedAction {
            actor: queued.actor,
            action_id: queued.action.id,
            outcome,
        });
    }

    result
}

fn resolve_attack(scene: &mut Scene, queued: &QueuedAction) -> ActionOutcome {
    let Some(action_damage) = queued.action.damage else {
        return ActionOutcome::Fizzled("no damage");
    };
    let Some(actor) = scene.registry.get(&queued.actor) else {
        return ActionOutcome::Fizzled("actor defeated");
    };

    let targets: Vec<EntityId> = match queued.action.target {
        TargetKind::Single => match &queued.target_id {
            Some(t) if scene.registry.is_alive(t) => vec![t.clone()],
            _ => return ActionOutcome::Fizzled("target gone"),
        },
        TargetKind::Area => {
            let centre = queued
                .target_position
                .or_else(|| queued.target_id.as_deref().and_then(|t| scene.registry.position(t)))
                .unwrap_or(actor.position);
            let radius = queued.action.radius.unwrap_or(0.0);
            scene
                .registry
                .query(|e| {
                    e.is_alive()
                        && e.id != actor.id
                        && e.category != actor.category
                        && distance(e.position, centre) <= radius
                })
                .into_iter()
                .map(|e| e.id)
                .collect()
        }
        TargetKind::SelfOnly => return ActionOutcome::Fizzled("attack without target"),
    };

    let mut hits = Vec::with_capacity(targets.len());
    for target in targets {
        let defense = scene.registry.effective_defense(&target).unwrap_or(0);
        let damage = compute_damage(action_damage, actor.attack, defense);
        if let Ok(remaining_hp) = scene.registry.apply_damage(&target, damage) {
            hits.push(Hit { target, damage, remaining_hp });
        }
    }
    ActionOutcome::Hits(hits)
}

fn resolve_ability(scene: &mut Scene, queued: &QueuedAction, now: Millis) -> ActionOutcome {
    let Some(effect) = &queued.action.effect else {
        return ActionOutcome::Fizzled("no effect");
    };
    let target = match queued.action.target {
        TargetKind::SelfOnly => queued.actor.clone(),
        _ => match &queued.target_id {
            Some(t) if scene.registry.is_alive(t) => t.clone(),
            _ => return ActionOutcome::Fizzled("target gone"),
        },
    };

    let until = now + effect.duration;
    let applied = scene.registry.add_effect(
        &target,
        StatusEffect {
            tag: effect.tag.to_string(),
            expires_at: until,
            defense_bonus: effect.defense_bonus,
        },
    );
    if applied.is_err() {
        return ActionOutcome::Fizzled("target gone");
    }
    scene
        .scheduler
        .schedule_expiry(target.clone(), effect.tag.to_string(), until);

    ActionOutcome::EffectApplied {
        target,
        tag: effect.tag.to_string(),
        until,
    }
}

/// Moves the actor toward its target position, at most `range` units. The
/// path is walked in short collision-checked steps so thin walls stop it, and
/// it ends at the first step that is not a clean move. Never crosses a gate.
fn resolve_move(scene: &mut Scene, config: &EngineConfig, queued: &QueuedAction) -> ActionOutcome {
    let (Some(goal), Some(from)) = (queued.target_position, scene.registry.position(&queued.actor)) else {
        return ActionOutcome::Fizzled("no destination");
    };
    let offset = goal.sub(from);
    let reach = queued.action.range.map_or(offset.length(), |r| offset.length().min(r));
    let max_step = config.min_separation.min(config.obstacle_buffer).max(0.1);
    let steps = (reach / max_step).ceil().max(1.0) as usize;
    let step_delta = normalize(offset).scale(reach / steps as f32);

    let mut moved_to = None;
    for _ in 0..steps {
        let step = match step_entity(scene, config, &queued.actor, step_delta, false) {
            Ok(step) => step,
            Err(_) => return ActionOutcome::Fizzled("actor defeated"),
        };
        match step.resolution {
            MoveResolution::Direct(p) => moved_to = Some(p),
            MoveResolution::Slid(p) => {
                moved_to = Some(p);
                break;
            }
            MoveResolution::Idle | MoveResolution::Rejected => break,
        }
    }

    match moved_to {
        Some(to) => ActionOutcome::Moved { to },
        None => ActionOutcome::Fizzled("blocked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalogue::{ActionCatalogue, BASIC_ATTACK, DASH, EVADE, HEAVY_ATTACK};
    use crate::actions::request_action;
    use crate::game::collision::Obstacle;
    use crate::game::geometry::Rect;
    use crate::game::rooms::{EntityData, PlayerProfile, RoomData};
    use crate::protocol::{Category, PLAYER_ID};

    fn entity(id: &str, category: Category, x: f32, y: f32, hp: i32, defense: i32) -> EntityData {
        EntityData {
            id: id.into(),
            category,
            x,
            y,
            hp,
            attack: 4,
            defense,
            attack_range: 15.0,
            move_speed: None,
        }
    }

    fn scene(entities: Vec<EntityData>) -> Scene {
        let mut room = RoomData::new("hall");
        room.entities = entities;
        Scene::build(&room, &EngineConfig::default(), &PlayerProfile::default(), None, 1).unwrap()
    }

    #[test]
    fn damage_has_a_floor_of_one() {
        assert_eq!(compute_damage(20, 10, 5), 25);
        assert_eq!(compute_damage(5, 0, 50), 1);
        assert_eq!(compute_damage(0, 0, 0), 1);
    }

    #[test]
    fn nothing_resolves_before_delay() {
        let mut s = scene(vec![entity("mob_1", Category::Hostile, 55.0, 50.0, 100, 5)]);
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 0).unwrap();
        let r = combat_system(&mut s, &EngineConfig::default(), 999);
        assert!(r.resolved.is_empty());
        assert!(s.scheduler.has_pending(PLAYER_ID));
    }

    #[test]
    fn lethal_hit_removes_target_and_its_queue() {
        let mut s = scene(vec![entity("mob_1", Category::Hostile, 55.0, 50.0, 10, 0)]);
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 0).unwrap();
        request_action(&mut s, &cat, "mob_1", BASIC_ATTACK, Some(PLAYER_ID), None, 500).unwrap();

        let r = combat_system(&mut s, &EngineConfig::default(), 1000);
        assert_eq!(r.defeated, vec!["mob_1".to_string()]);
        assert!(s.registry.get("mob_1").is_none());
        assert!(!s.scheduler.has_pending("mob_1"));
        assert_eq!(s.registry.player().unwrap().hp, 100);

        let err = request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 5000).unwrap_err();
        assert_eq!(err, crate::error::ActionRejected::InvalidTarget("mob_1".into()));
    }

    #[test]
    fn simultaneous_actions_resolve_in_insertion_order() {
        let mut s = scene(vec![entity("mob_1", Category::Hostile, 55.0, 50.0, 10, 0)]);
        let cat = ActionCatalogue::default();
        // Both become due at 1000; the player was first, so mob_1 dies before swinging.
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 0).unwrap();
        s.scheduler.cancel("mob_1");
        let basic = cat.get(BASIC_ATTACK).unwrap().clone();
        s.scheduler.enqueue("mob_1".into(), basic, Some(PLAYER_ID.into()), None, 0);

        let r = combat_system(&mut s, &EngineConfig::default(), 1000);
        assert_eq!(r.resolved.len(), 2);
        assert_eq!(r.resolved[0].actor, PLAYER_ID);
        assert_eq!(r.resolved[1].outcome, ActionOutcome::Fizzled("actor defeated"));
        assert_eq!(s.registry.player().unwrap().hp, 100);
    }

    #[test]
    fn fizzled_attack_still_sets_cooldown() {
        let mut s = scene(vec![entity("mob_1", Category::Hostile, 55.0, 50.0, 100, 0)]);
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, BASIC_ATTACK, Some("mob_1"), None, 0).unwrap();
        s.remove_entity("mob_1").unwrap();

        let r = combat_system(&mut s, &EngineConfig::default(), 1200);
        assert_eq!(r.resolved[0].outcome, ActionOutcome::Fizzled("target gone"));
        assert_eq!(s.registry.player().unwrap().cooldowns.get(BASIC_ATTACK), Some(&1200));
    }

    #[test]
    fn area_attack_hits_other_categories_in_radius() {
        let mut s = scene(vec![
            entity("mob_1", Category::Hostile, 56.0, 50.0, 100, 0),
            entity("mob_2", Category::Hostile, 50.0, 57.0, 100, 0),
            entity("mob_far", Category::Hostile, 80.0, 80.0, 100, 0),
        ]);
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, HEAVY_ATTACK, None, None, 0).unwrap();
        let r = combat_system(&mut s, &EngineConfig::default(), 1500);
        match &r.resolved[0].outcome {
            ActionOutcome::Hits(hits) => {
                let ids: Vec<&str> = hits.iter().map(|h| h.target.as_str()).collect();
                assert_eq!(ids, vec!["mob_1", "mob_2"]);
                // 35 + 10 attack - 0 defense
                assert!(hits.iter().all(|h| h.damage == 45));
            }
            other => panic!("expected hits, got {:?}", other),
        }
        assert_eq!(s.registry.get("mob_far").unwrap().hp, 100);
    }

    #[test]
    fn evade_grants_timed_defense() {
        let mut s = scene(vec![entity("mob_1", Category::Hostile, 55.0, 50.0, 100, 0)]);
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, EVADE, None, None, 0).unwrap();
        let r = combat_system(&mut s, &EngineConfig::default(), 100);
        assert_eq!(
            r.resolved[0].outcome,
            ActionOutcome::EffectApplied {
                target: PLAYER_ID.into(),
                tag: "evasive".into(),
                until: 1600
            }
        );
        assert_eq!(s.registry.effective_defense(PLAYER_ID), Some(2 + 10));
        assert_eq!(s.scheduler.pending_timers(), 1);
    }

    #[test]
    fn dash_moves_at_most_its_range() {
        let mut s = scene(Vec::new());
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, DASH, None, Some(Vec2::new(50.0, 10.0)), 0).unwrap();
        let r = combat_system(&mut s, &EngineConfig::default(), 200);
        match r.resolved[0].outcome {
            ActionOutcome::Moved { to } => {
                assert!((to.x - 50.0).abs() < 1e-4);
                assert!((to.y - 30.0).abs() < 1e-3);
            }
            ref other => panic!("expected a move, got {:?}", other),
        }
    }

    #[test]
    fn dash_stops_at_a_wall() {
        let mut room = RoomData::new("hall");
        room.obstacles = vec![Obstacle::wall(Rect::new(0.0, 38.0, 100.0, 40.0))];
        let mut s = Scene::build(&room, &EngineConfig::default(), &PlayerProfile::default(), None, 1).unwrap();
        let cat = ActionCatalogue::default();
        request_action(&mut s, &cat, PLAYER_ID, DASH, None, Some(Vec2::new(50.0, 10.0)), 0).unwrap();
        combat_system(&mut s, &EngineConfig::default(), 200);

        let y = s.registry.player().unwrap().position.y;
        // Wall plus buffer covers y 36.5..41.5; the player stays on the near side.
        assert!(y > 41.5 && y < 50.0, "player ended at y = {}", y);
    }
}
