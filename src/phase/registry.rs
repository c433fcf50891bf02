//! Capability registry.
//!
//! Modules live in a stable arena in registration order. The registry maps
//! each [`Capability`] to the arena indices of the enabled modules that
//! declare it. Lookups are cached until the next phase change or module
//! toggle, then rebuilt in arena order, so subscriber order never changes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::rules::RuleModule;

/// A contract a rule module may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    /// `pre/on/post` at game start.
    GameStart,
    /// `pre/on/post` at round start.
    RoundStart,
    /// `pre/on/post` at round end.
    RoundEnd,
    /// `pre/on/post` at game end.
    GameEnd,
    /// `pre/on/post` when a player spawns.
    PlayerSpawn,
    /// Post-only `TeamAssigned(player, team)`.
    TeamAssigned,
    /// Post-only `TeamSwap()`.
    TeamSwap,
    /// Post-only bomb plant/defuse/detonation events.
    BombEvents,
    /// Post-only `PlayerKilled(victim, attacker)`.
    PlayerKilled,
    /// Post-only `OnConnect(player)` then `OnJoined(player)`.
    PlayerJoined,
    /// Polled `ShouldRoundEnd()`.
    RoundEndCondition,
    /// Polled `ShouldGameEnd()`.
    GameEndCondition,
}

impl Capability {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GameStart => "game_start",
            Self::RoundStart => "round_start",
            Self::RoundEnd => "round_end",
            Self::GameEnd => "game_end",
            Self::PlayerSpawn => "player_spawn",
            Self::TeamAssigned => "team_assigned",
            Self::TeamSwap => "team_swap",
            Self::BombEvents => "bomb_events",
            Self::PlayerKilled => "player_killed",
            Self::PlayerJoined => "player_joined",
            Self::RoundEndCondition => "round_end_condition",
            Self::GameEndCondition => "game_end_condition",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a registered module: its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

struct ModuleSlot {
    module: Box<dyn RuleModule>,
    enabled: bool,
}

/// Ordered arena of rule modules with a per-capability subscriber cache.
#[derive(Default)]
pub struct CapabilityRegistry {
    slots: Vec<ModuleSlot>,
    cache: HashMap<Capability, Vec<usize>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("modules", &self.names())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a module, enabled. Registration order is subscriber order.
    pub fn register(&mut self, module: Box<dyn RuleModule>) -> ModuleId {
        let id = ModuleId(self.slots.len());
        debug!(module = module.name(), index = id.0, "module registered");
        self.slots.push(ModuleSlot {
            module,
            enabled: true,
        });
        self.cache.clear();
        id
    }

    /// Enables or disables a module. Returns `false` for an unknown id.
    pub fn set_enabled(&mut self, id: ModuleId, enabled: bool) -> bool {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return false;
        };
        if slot.enabled != enabled {
            slot.enabled = enabled;
            debug!(module = slot.module.name(), enabled, "module toggled");
            self.cache.clear();
        }
        true
    }

    /// Returns `true` if the module exists and is enabled.
    #[must_use]
    pub fn is_enabled(&self, id: ModuleId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.enabled)
    }

    /// Drops every cached subscriber list.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Ordered snapshot of the enabled subscribers of `capability`.
    ///
    /// The snapshot is a copy; toggles after this call do not change it.
    pub fn snapshot(&mut self, capability: Capability) -> Vec<usize> {
        let slots = &self.slots;
        self.cache
            .entry(capability)
            .or_insert_with(|| {
                slots
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.enabled && s.module.capabilities().contains(&capability))
                    .map(|(i, _)| i)
                    .collect()
            })
            .clone()
    }

    /// Mutable access to the modules of a snapshot, in snapshot order.
    ///
    /// Each module is yielded at most once, so the borrows are disjoint and
    /// may be held concurrently.
    pub fn modules_mut<'a>(
        &'a mut self,
        snapshot: &'a [usize],
    ) -> impl Iterator<Item = &'a mut Box<dyn RuleModule>> + 'a {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| snapshot.binary_search(i).is_ok())
            .map(|(_, s)| &mut s.module)
    }

    /// All modules in registration order, enabled or not.
    pub fn modules(&self) -> impl Iterator<Item = &dyn RuleModule> {
        self.slots.iter().map(|s| s.module.as_ref())
    }

    /// Looks a module up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.slots
            .iter()
            .position(|s| s.module.name() == name)
            .map(ModuleId)
    }

    /// Module names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.module.name()).collect()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
