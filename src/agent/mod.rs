pub mod behavior;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::world::coords::{Direction, TilePos};

new_key_type! {
    /// Stable handle for agents in the world's arena.
    pub struct AgentId;
}

// === Enums ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Animal,
    Friendly,
    Hostile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Rabbit,
    Deer,
    Sheep,
    Camel,
    Trader,
    Wolf,
    Slime,
}

impl Species {
    pub fn category(self) -> Category {
        match self {
            Species::Rabbit | Species::Deer | Species::Sheep | Species::Camel => Category::Animal,
            Species::Trader => Category::Friendly,
            Species::Wolf | Species::Slime => Category::Hostile,
        }
    }

    pub fn max_health(self) -> f32 {
        match self {
            Species::Rabbit => 4.0,
            Species::Deer => 10.0,
            Species::Sheep => 8.0,
            Species::Camel => 14.0,
            Species::Trader => 20.0,
            Species::Wolf => 12.0,
            Species::Slime => 6.0,
        }
    }

    /// Seconds between moves on the full cadence.
    pub fn move_interval(self) -> f32 {
        match self {
            Species::Rabbit => 0.4,
            Species::Deer => 0.5,
            Species::Wolf => 0.45,
            Species::Sheep | Species::Camel => 0.8,
            Species::Trader => 1.2,
            Species::Slime => 1.0,
        }
    }

    /// Item that makes an animal follow a player carrying it.
    pub fn attractant(self) -> Option<&'static str> {
        match self {
            Species::Rabbit => Some("carrot"),
            Species::Deer | Species::Sheep => Some("wheat"),
            Species::Camel => Some("cactus_fruit"),
            Species::Trader | Species::Wolf | Species::Slime => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Species::Rabbit => 'r',
            Species::Deer => 'd',
            Species::Sheep => 's',
            Species::Camel => 'c',
            Species::Trader => 'M',
            Species::Wolf => 'W',
            Species::Slime => 'S',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BehaviorState {
    Idle,
    Wandering,
    Fleeing { threat: TilePos, remaining: f32 },
    Following { toward: TilePos },
    Attacking,
    Dead,
}

/// Why an agent chose its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveReason {
    Flee,
    Follow,
    Chase,
    Attack,
    Court,
    EscapeCrowd,
    AvoidNeighbor,
    Explore,
    Approach,
    RandomWalk,
    Idle,
}

/// A computed movement decision, memoized per (bucket, origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementDecision {
    pub origin: TilePos,
    pub target: Option<TilePos>,
    /// Facing to adopt when no move is requested (courting, attacking).
    pub face: Option<Direction>,
    pub reason: MoveReason,
    pub bucket: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreedingRequest {
    pub partner: AgentId,
    pub offspring: Species,
    pub tile: TilePos,
}

// === Agent ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub species: Species,
    pub position: Vec2,
    /// Where the agent entered the world; stable seed for its decisions.
    pub spawn: TilePos,
    pub health: f32,
    pub max_health: f32,
    pub state: BehaviorState,
    pub facing: Direction,
    pub decision: Option<MovementDecision>,
    pub move_cooldown: f32,
    /// Seconds spent wanting to move without committing a move.
    pub since_progress: f32,
    pub breed_cooldown: f32,
    pub breeding: Option<BreedingRequest>,
}

impl Agent {
    pub fn new(species: Species, spawn: TilePos) -> Self {
        let max_health = species.max_health();
        Self {
            species,
            position: tile_center(spawn),
            spawn,
            health: max_health,
            max_health,
            state: BehaviorState::Idle,
            facing: Direction::Down,
            decision: None,
            move_cooldown: 0.0,
            since_progress: 0.0,
            breed_cooldown: 0.0,
            breeding: None,
        }
    }

    pub fn category(&self) -> Category {
        self.species.category()
    }

    pub fn tile(&self) -> TilePos {
        TilePos::new(self.position.x.round() as i32, self.position.y.round() as i32)
    }

    pub fn is_alive(&self) -> bool {
        self.state != BehaviorState::Dead
    }

    pub fn can_breed(&self) -> bool {
        self.is_alive()
            && self.category() == Category::Animal
            && self.breed_cooldown <= 0.0
            && self.breeding.is_none()
    }

    /// The tile this agent is looking at.
    pub fn facing_tile(&self) -> TilePos {
        self.tile().offset(self.facing)
    }

    /// Advance per-agent timers. Fleeing ends when its timer runs out;
    /// time without progress accrues while a move target is outstanding.
    pub fn tick_timers(&mut self, dt: f32) {
        self.move_cooldown = (self.move_cooldown - dt).max(0.0);
        self.breed_cooldown = (self.breed_cooldown - dt).max(0.0);
        if self.decision.is_some_and(|d| d.target.is_some()) {
            self.since_progress += dt;
        }
        if let BehaviorState::Fleeing { threat, remaining } = self.state {
            let remaining = remaining - dt;
            self.state = if remaining > 0.0 {
                BehaviorState::Fleeing { threat, remaining }
            } else {
                BehaviorState::Idle
            };
        }
    }

    pub fn is_ready(&self) -> bool {
        self.is_alive() && self.move_cooldown <= 0.0
    }
}

/// Tile-aligned continuous position for a tile.
pub fn tile_center(pos: TilePos) -> Vec2 {
    Vec2::new(pos.x as f32, pos.y as f32)
}

/// What the player is carrying, as seen by agents this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<(String, u32)>,
}

impl Inventory {
    pub fn with_item(name: &str, count: u32) -> Self {
        Self {
            items: vec![(name.to_string(), count)],
        }
    }

    pub fn holds(&self, name: &str) -> bool {
        self.items.iter().any(|(item, count)| item == name && *count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_is_tile_aligned_at_full_health() {
        let agent = Agent::new(Species::Deer, TilePos::new(-4, 9));
        assert_eq!(agent.tile(), TilePos::new(-4, 9));
        assert_eq!(agent.health, agent.max_health);
        assert_eq!(agent.category(), Category::Animal);
        assert!(agent.is_ready());
        assert!(agent.can_breed());
    }

    #[test]
    fn flee_times_out_to_idle() {
        let mut agent = Agent::new(Species::Rabbit, TilePos::new(0, 0));
        agent.state = BehaviorState::Fleeing {
            threat: TilePos::new(1, 0),
            remaining: 0.5,
        };
        agent.tick_timers(0.3);
        assert!(matches!(agent.state, BehaviorState::Fleeing { .. }));
        agent.tick_timers(0.3);
        assert_eq!(agent.state, BehaviorState::Idle);
    }

    #[test]
    fn cooldowns_never_go_negative() {
        let mut agent = Agent::new(Species::Wolf, TilePos::new(0, 0));
        agent.move_cooldown = 0.2;
        agent.breed_cooldown = 0.1;
        agent.tick_timers(1.0);
        assert_eq!(agent.move_cooldown, 0.0);
        assert_eq!(agent.breed_cooldown, 0.0);
        assert!(!agent.can_breed(), "wolves are not animals");
    }

    #[test]
    fn progress_clock_runs_only_with_a_target() {
        let mut agent = Agent::new(Species::Sheep, TilePos::new(0, 0));
        agent.tick_timers(1.0);
        assert_eq!(agent.since_progress, 0.0);
        agent.decision = Some(MovementDecision {
            origin: TilePos::new(0, 0),
            target: Some(TilePos::new(1, 0)),
            face: None,
            reason: MoveReason::Explore,
            bucket: 0,
        });
        agent.tick_timers(0.5);
        agent.tick_timers(0.5);
        assert_eq!(agent.since_progress, 1.0);
    }

    #[test]
    fn inventory_holds_only_positive_counts() {
        let mut inv = Inventory::with_item("wheat", 2);
        assert!(inv.holds("wheat"));
        assert!(!inv.holds("carrot"));
        inv.items[0].1 = 0;
        assert!(!inv.holds("wheat"));
    }
}
