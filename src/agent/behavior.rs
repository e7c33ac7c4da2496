use std::ops::RangeInclusive;

use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::agent::{Agent, AgentId, BehaviorState, Category, Inventory, MoveReason, MovementDecision, Species};
use crate::config::simulation::SimulationConfig;
use crate::world::coords::{Direction, TilePos};

/// Radius within which an agent notices other agents.
const SENSE_RADIUS: u32 = 6;
/// Same-species agents within this radius count toward a crowd.
const CROWD_RADIUS: u32 = 2;
const CROWD_SIZE: usize = 3;
/// Distance band at which a same-species neighbor is worth approaching.
const APPROACH_BAND: RangeInclusive<u32> = 3..=6;

/// The agent's only window onto the world. Agent logic asks these
/// questions and never touches chunk storage.
pub trait Surroundings {
    /// Terrain and points of interest allow standing at `pos`. Agents and
    /// the player are ignored.
    fn is_walkable(&self, pos: TilePos) -> bool;

    /// Collision predicate: nothing other than `mover` blocks `pos`.
    fn is_free(&self, pos: TilePos, mover: AgentId) -> bool;

    /// Speculative predicate: `mover` may claim `pos` this tick, either
    /// because it is free or because its occupant is moving away.
    fn may_claim(&self, pos: TilePos, mover: AgentId) -> bool {
        self.is_free(pos, mover)
    }
}

/// Per-tick snapshot of an active agent, by id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: AgentId,
    pub tile: TilePos,
    pub species: Species,
    pub breed_ready: bool,
}

pub struct DecisionContext<'a> {
    pub bucket: u64,
    pub player: Option<TilePos>,
    pub inventory: &'a Inventory,
    pub neighbors: &'a [Neighbor],
    pub config: &'a SimulationConfig,
}

/// Seed for an agent's decision in a time bucket. Stable across runs.
pub fn decision_seed(spawn: TilePos, bucket: u64) -> u64 {
    (spawn.x as i64 as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(spawn.y as i64 as u64)
        .wrapping_mul(1442695040888963407)
        .wrapping_add(bucket)
        .wrapping_mul(6364136223846793005)
}

/// Decision for this bucket, reusing the cached one when the agent has not
/// moved since it was computed.
pub fn decide_memoized(
    id: AgentId,
    agent: &Agent,
    ctx: &DecisionContext,
    view: &impl Surroundings,
) -> MovementDecision {
    if let Some(cached) = agent.decision {
        if cached.bucket == ctx.bucket && cached.origin == agent.tile() {
            return cached;
        }
    }
    decide(id, agent, ctx, view)
}

/// Compute where `agent` wants to go. Deterministic in (agent, context,
/// surroundings).
pub fn decide(
    id: AgentId,
    agent: &Agent,
    ctx: &DecisionContext,
    view: &impl Surroundings,
) -> MovementDecision {
    let origin = agent.tile();
    let make = |target: Option<TilePos>, face: Option<Direction>, reason: MoveReason| {
        MovementDecision {
            origin,
            target,
            face,
            reason,
            bucket: ctx.bucket,
        }
    };

    if !agent.is_alive() {
        return make(None, None, MoveReason::Idle);
    }

    // Special states take priority over the weighted roll.
    if let BehaviorState::Fleeing { threat, .. } = agent.state {
        return make(step_away(origin, &[threat], view), None, MoveReason::Flee);
    }

    if let Some(player) = ctx.player {
        let dist = origin.manhattan(player);
        match agent.category() {
            Category::Hostile if dist <= ctx.config.aggro_radius => {
                return if dist <= 1 {
                    make(None, origin.direction_to(player), MoveReason::Attack)
                } else {
                    make(step_toward(origin, player, view), None, MoveReason::Chase)
                };
            }
            Category::Animal
                if dist <= ctx.config.follow_radius
                    && agent
                        .species
                        .attractant()
                        .is_some_and(|item| ctx.inventory.holds(item)) =>
            {
                return if dist <= 1 {
                    make(None, origin.direction_to(player), MoveReason::Follow)
                } else {
                    make(step_toward(origin, player, view), None, MoveReason::Follow)
                };
            }
            _ => {}
        }
    }

    let nearby: Vec<&Neighbor> = ctx
        .neighbors
        .iter()
        .filter(|n| n.id != id && n.tile.chebyshev(origin) <= SENSE_RADIUS)
        .collect();

    if agent.can_breed() {
        let mate = nearby.iter().find(|n| {
            n.species == agent.species && n.breed_ready && n.tile.manhattan(origin) == 1
        });
        if let Some(mate) = mate {
            return make(None, origin.direction_to(mate.tile), MoveReason::Court);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(decision_seed(agent.spawn, ctx.bucket));

    let crowd: Vec<TilePos> = nearby
        .iter()
        .filter(|n| n.species == agent.species && n.tile.chebyshev(origin) <= CROWD_RADIUS)
        .map(|n| n.tile)
        .collect();
    let nearest = nearby
        .iter()
        .min_by_key(|n| n.tile.manhattan(origin))
        .map(|n| n.tile);
    let kin = nearby
        .iter()
        .filter(|n| {
            n.species == agent.species && APPROACH_BAND.contains(&n.tile.manhattan(origin))
        })
        .min_by_key(|n| n.tile.manhattan(origin))
        .map(|n| n.tile);

    let idle_weight = match agent.category() {
        Category::Friendly => 4,
        _ => 1,
    };
    let options: [(MoveReason, u32); 6] = [
        (MoveReason::EscapeCrowd, if crowd.len() >= CROWD_SIZE { 3 } else { 0 }),
        (
            MoveReason::AvoidNeighbor,
            if nearest.is_some_and(|n| n.manhattan(origin) <= 1) { 2 } else { 0 },
        ),
        (MoveReason::Explore, 2),
        (MoveReason::Approach, if kin.is_some() { 2 } else { 0 }),
        (MoveReason::RandomWalk, 2),
        (MoveReason::Idle, idle_weight),
    ];
    let reason = match WeightedIndex::new(options.iter().map(|(_, w)| *w)) {
        Ok(dist) => options[dist.sample(&mut rng)].0,
        Err(_) => MoveReason::Idle,
    };

    let target = match reason {
        MoveReason::EscapeCrowd => step_away(origin, &crowd, view),
        MoveReason::AvoidNeighbor => nearest.and_then(|n| step_away(origin, &[n], view)),
        MoveReason::Explore => explore(id, origin, ctx.neighbors, view, &mut rng),
        MoveReason::Approach => kin.and_then(|k| step_toward(origin, k, view)),
        MoveReason::RandomWalk => {
            let dir = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
            let to = origin.offset(dir);
            view.is_walkable(to).then_some(to)
        }
        _ => None,
    };
    let reason = if target.is_some() { reason } else { MoveReason::Idle };
    make(target, None, reason)
}

/// Behavior state implied by a decision.
pub fn next_state(agent: &Agent, decision: &MovementDecision, player: Option<TilePos>) -> BehaviorState {
    if !agent.is_alive() {
        return BehaviorState::Dead;
    }
    match decision.reason {
        MoveReason::Flee => agent.state,
        MoveReason::Follow => match player {
            Some(toward) => BehaviorState::Following { toward },
            None => BehaviorState::Idle,
        },
        MoveReason::Chase | MoveReason::Attack => BehaviorState::Attacking,
        MoveReason::Court | MoveReason::Idle => BehaviorState::Idle,
        MoveReason::EscapeCrowd
        | MoveReason::AvoidNeighbor
        | MoveReason::Explore
        | MoveReason::Approach
        | MoveReason::RandomWalk => BehaviorState::Wandering,
    }
}

/// Walkable neighbor strictly closer to `goal`; first in direction order on ties.
pub fn step_toward(origin: TilePos, goal: TilePos, view: &impl Surroundings) -> Option<TilePos> {
    let current = origin.manhattan(goal);
    origin
        .neighbors()
        .into_iter()
        .filter(|p| view.is_walkable(*p) && p.manhattan(goal) < current)
        .min_by_key(|p| p.manhattan(goal))
}

/// Walkable neighbor that increases total distance from `threats` the most.
pub fn step_away(origin: TilePos, threats: &[TilePos], view: &impl Surroundings) -> Option<TilePos> {
    if threats.is_empty() {
        return None;
    }
    let spread = |p: TilePos| -> u32 { threats.iter().map(|t| p.manhattan(*t)).sum() };
    let current = spread(origin);
    let mut best: Option<(TilePos, u32)> = None;
    for p in origin.neighbors() {
        if !view.is_walkable(p) {
            continue;
        }
        let s = spread(p);
        if s > current && best.is_none_or(|(_, b)| s > b) {
            best = Some((p, s));
        }
    }
    best.map(|(p, _)| p)
}

/// A free adjacent tile, preferring those with the fewest agents around.
fn explore(
    id: AgentId,
    origin: TilePos,
    neighbors: &[Neighbor],
    view: &impl Surroundings,
    rng: &mut impl Rng,
) -> Option<TilePos> {
    let scored: Vec<(TilePos, usize)> = origin
        .neighbors()
        .into_iter()
        .filter(|p| view.is_free(*p, id))
        .map(|p| {
            let company = neighbors
                .iter()
                .filter(|n| n.id != id && n.tile.chebyshev(p) <= 1)
                .count();
            (p, company)
        })
        .collect();
    let least = scored.iter().map(|(_, c)| *c).min()?;
    let roomiest: Vec<TilePos> = scored
        .into_iter()
        .filter(|(_, c)| *c == least)
        .map(|(p, _)| p)
        .collect();
    roomiest.choose(rng).copied()
}
