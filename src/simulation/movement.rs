use std::collections::HashMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::agent::behavior::{
    decide_memoized, decision_seed, next_state, DecisionContext, Neighbor, Surroundings,
};
use crate::agent::{AgentId, Inventory, MoveReason, MovementDecision};
use crate::config::simulation::SimulationConfig;
use crate::world::coords::{Direction, TilePos};
use crate::world::World;

/// How many occupants deep a vacate chain may be resolved.
const MAX_CHAIN_DEPTH: usize = 8;

/// One declared move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intention {
    pub agent: AgentId,
    pub from: TilePos,
    pub to: TilePos,
    pub reason: MoveReason,
    pub bucket: u64,
}

/// Tick-scoped record of declared moves.
#[derive(Debug, Clone, Default)]
pub struct IntentionTable {
    /// Target tile -> last agent to declare it.
    by_target: HashMap<TilePos, AgentId>,
    by_agent: HashMap<AgentId, usize>,
    order: Vec<Intention>,
}

impl IntentionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intention. A later declaration for the same target
    /// replaces the earlier claimant; one per agent.
    pub fn declare(&mut self, intention: Intention) {
        if self.by_agent.contains_key(&intention.agent) {
            debug!(agent = ?intention.agent, "Duplicate intention ignored");
            return;
        }
        if let Some(previous) = self.by_target.insert(intention.to, intention.agent) {
            debug!(
                agent = ?intention.agent,
                previous = ?previous,
                to = %intention.to,
                "Target contested"
            );
        }
        self.by_agent.insert(intention.agent, self.order.len());
        self.order.push(intention);
    }

    pub fn claimant(&self, target: TilePos) -> Option<AgentId> {
        self.by_target.get(&target).copied()
    }

    pub fn intention_of(&self, agent: AgentId) -> Option<&Intention> {
        self.by_agent.get(&agent).map(|&i| &self.order[i])
    }

    /// Intentions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Intention> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Read-only window onto the world for agent decisions.
pub struct WorldView<'a> {
    world: &'a World,
    intentions: Option<&'a IntentionTable>,
}

impl<'a> WorldView<'a> {
    pub fn new(world: &'a World) -> Self {
        Self {
            world,
            intentions: None,
        }
    }

    /// Let `may_claim` see tiles whose occupants have declared a move away.
    pub fn with_intentions(mut self, table: &'a IntentionTable) -> Self {
        self.intentions = Some(table);
        self
    }
}

impl Surroundings for WorldView<'_> {
    fn is_walkable(&self, pos: TilePos) -> bool {
        self.world.is_walkable(pos)
    }

    fn is_free(&self, pos: TilePos, mover: AgentId) -> bool {
        !self.world.is_occupied_by_others(pos, Some(mover))
    }

    fn may_claim(&self, pos: TilePos, mover: AgentId) -> bool {
        if self.is_free(pos, mover) {
            return true;
        }
        let leaving = match (self.world.living_agent_at(pos), self.intentions) {
            (Some(occupant), Some(table)) => {
                table.intention_of(occupant).is_some_and(|i| i.to != pos)
            }
            _ => false,
        };
        leaving && self.world.is_walkable(pos)
    }
}

// === Phase 1 ===

/// Decide for every ready agent in `active` and declare the moves.
/// `active` must be in enumeration order; declaration follows it.
pub fn collect_intentions(
    world: &mut World,
    active: &[AgentId],
    bucket: u64,
    inventory: &Inventory,
    config: &SimulationConfig,
) -> IntentionTable {
    let player = world.player();
    let neighbors: Vec<Neighbor> = active
        .iter()
        .filter_map(|&id| {
            world.agent(id).map(|a| Neighbor {
                id,
                tile: a.tile(),
                species: a.species,
                breed_ready: a.can_breed(),
            })
        })
        .collect();

    let decisions: Vec<(AgentId, MovementDecision)> = {
        let view = WorldView::new(world);
        let ctx = DecisionContext {
            bucket,
            player,
            inventory,
            neighbors: &neighbors,
            config,
        };
        active
            .iter()
            .filter_map(|&id| {
                let agent = world.agent(id)?;
                agent
                    .is_ready()
                    .then(|| (id, decide_memoized(id, agent, &ctx, &view)))
            })
            .collect()
    };

    let mut table = IntentionTable::new();
    for (id, decision) in decisions {
        let Some(agent) = world.agent_mut(id) else {
            continue;
        };
        agent.state = next_state(agent, &decision, player);
        if let Some(face) = decision.face {
            agent.facing = face;
        }
        agent.decision = Some(decision);
        match decision.target {
            Some(to) => table.declare(Intention {
                agent: id,
                from: decision.origin,
                to,
                reason: decision.reason,
                bucket,
            }),
            None => agent.since_progress = 0.0,
        }
    }
    trace!(declared = table.len(), "Intentions collected");
    table
}

// === Phase 2 ===

/// Counts from one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Single moves committed, chained ones included.
    pub commits: u32,
    /// Two-agent exchanges.
    pub swaps: u32,
    /// Commits that needed the occupant resolved first.
    pub chain_moves: u32,
    pub rejections: u32,
    /// Rejected agents that escaped through the stuck fallback.
    pub fallbacks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    InProgress,
    Moved,
    Stayed,
}

struct Resolver<'a> {
    world: &'a mut World,
    table: &'a IntentionTable,
    config: &'a SimulationConfig,
    status: Vec<Status>,
    report: ResolutionReport,
}

/// Commit the declared moves in declaration order.
pub fn execute_intentions(
    world: &mut World,
    table: &IntentionTable,
    config: &SimulationConfig,
) -> ResolutionReport {
    let mut resolver = Resolver {
        world,
        table,
        config,
        status: vec![Status::Pending; table.len()],
        report: ResolutionReport::default(),
    };
    for idx in 0..table.len() {
        resolver.resolve(idx, 0);
    }
    resolver.report
}

impl Resolver<'_> {
    fn index_of(&self, agent: AgentId) -> Option<usize> {
        self.table.by_agent.get(&agent).copied()
    }

    fn is_pending(&self, agent: AgentId) -> bool {
        self.index_of(agent)
            .is_some_and(|i| self.status[i] == Status::Pending)
    }

    /// Resolve one intention; true if its agent ended up on a new tile.
    fn resolve(&mut self, idx: usize, depth: usize) -> bool {
        match self.status[idx] {
            Status::Moved => return true,
            Status::Stayed | Status::InProgress => return false,
            Status::Pending => {}
        }
        self.status[idx] = Status::InProgress;
        let intention = self.table.order[idx];

        let in_place = match self.world.agent_mut(intention.agent) {
            Some(agent) if agent.is_alive() && agent.tile() == intention.from => {
                if let Some(dir) = intention.from.direction_to(intention.to) {
                    agent.facing = dir;
                }
                true
            }
            _ => false,
        };
        if !in_place {
            self.status[idx] = Status::Stayed;
            return false;
        }

        if self.attempt(idx, intention, depth) {
            return true;
        }
        if self.try_fallback(intention) {
            self.status[idx] = Status::Moved;
            return true;
        }
        self.reject(intention);
        self.status[idx] = Status::Stayed;
        false
    }

    fn attempt(&mut self, idx: usize, intention: Intention, depth: usize) -> bool {
        let Intention { agent: id, from, to, .. } = intention;
        if !self.world.is_walkable(to) {
            return false;
        }
        if !self.world.is_occupied_by_others(to, Some(id)) {
            return self.commit(idx, intention, false);
        }
        let claimable = WorldView::new(self.world)
            .with_intentions(self.table)
            .may_claim(to, id);
        if !claimable {
            return false;
        }
        let Some(blocker) = self.world.living_agent_at(to) else {
            return false;
        };
        let Some(blocker_idx) = self.index_of(blocker) else {
            return false;
        };
        if !self.is_pending(blocker) {
            return false;
        }

        let blocker_target = self.table.order[blocker_idx].to;
        if blocker_target == from {
            return self.swap(idx, blocker_idx);
        }
        if depth >= MAX_CHAIN_DEPTH {
            debug!(agent = ?id, depth, "Vacate chain too deep");
            return false;
        }
        self.resolve(blocker_idx, depth + 1);
        if self.world.is_occupied_by_others(to, Some(id)) {
            return false;
        }
        self.commit(idx, intention, true)
    }

    fn commit(&mut self, idx: usize, intention: Intention, chained: bool) -> bool {
        if !self
            .world
            .move_agent_between_tiles(intention.agent, intention.from, intention.to)
        {
            return false;
        }
        self.settle(intention.agent);
        self.status[idx] = Status::Moved;
        self.report.commits += 1;
        if chained {
            self.report.chain_moves += 1;
        }
        trace!(agent = ?intention.agent, from = %intention.from, to = %intention.to, chained, "Move committed");
        true
    }

    fn swap(&mut self, idx: usize, other_idx: usize) -> bool {
        let (a, b) = (self.table.order[idx], self.table.order[other_idx]);
        if !self.world.swap_agents(a.agent, b.agent) {
            return false;
        }
        if let (Some(agent), Some(dir)) = (self.world.agent_mut(b.agent), b.from.direction_to(b.to)) {
            agent.facing = dir;
        }
        self.settle(a.agent);
        self.settle(b.agent);
        self.status[idx] = Status::Moved;
        self.status[other_idx] = Status::Moved;
        self.report.swaps += 1;
        trace!(a = ?a.agent, b = ?b.agent, "Agents swapped");
        true
    }

    /// Bookkeeping after a committed move.
    fn settle(&mut self, id: AgentId) {
        if let Some(agent) = self.world.agent_mut(id) {
            agent.move_cooldown = agent.species.move_interval();
            agent.since_progress = 0.0;
            agent.decision = None;
        }
    }

    /// Any free adjacent tile, tried in a seeded order, for an agent that
    /// has gone too long without progress.
    fn try_fallback(&mut self, intention: Intention) -> bool {
        let Some(agent) = self.world.agent(intention.agent) else {
            return false;
        };
        if agent.since_progress < self.config.stuck_threshold_secs {
            return false;
        }
        let mut rng =
            ChaCha8Rng::seed_from_u64(decision_seed(agent.spawn, intention.bucket) ^ 0x9e37_79b9);
        let mut dirs = Direction::ALL;
        dirs.shuffle(&mut rng);

        let escape = dirs.into_iter().map(|d| intention.from.offset(d)).find(|p| {
            *p != intention.to && !self.world.is_occupied_by_others(*p, Some(intention.agent))
        });
        let Some(to) = escape else {
            return false;
        };
        if !self
            .world
            .move_agent_between_tiles(intention.agent, intention.from, to)
        {
            return false;
        }
        if let (Some(agent), Some(dir)) = (
            self.world.agent_mut(intention.agent),
            intention.from.direction_to(to),
        ) {
            agent.facing = dir;
        }
        self.settle(intention.agent);
        self.report.fallbacks += 1;
        debug!(agent = ?intention.agent, from = %intention.from, to = %to, "Stuck agent took fallback move");
        true
    }

    fn reject(&mut self, intention: Intention) {
        if let Some(agent) = self.world.agent_mut(intention.agent) {
            agent.move_cooldown = agent.species.move_interval() * self.config.retry_fraction;
        }
        self.report.rejections += 1;
        trace!(
            agent = ?intention.agent,
            to = %intention.to,
            claimant = ?self.table.claimant(intention.to),
            "Move rejected"
        );
    }
}
