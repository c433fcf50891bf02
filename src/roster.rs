//! Teams, players and inventories.
//!
//! The roster is the host's player directory and inventory store. Rule
//! modules reach it through [`crate::context::MatchContext::roster`]; nothing
//! outside the host mutates it.

use serde::{Deserialize, Serialize};

// ============================================================================
// Team
// ============================================================================

/// Team assignment of a player.
///
/// `A` and `B` are symmetric; scenario modules assign roles to them
/// (the bomb scenario treats `A` as the planting side by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Spectating or not yet placed.
    #[default]
    Unassigned,
    /// First team.
    A,
    /// Second team.
    B,
}

impl Team {
    /// The two playing teams, in check order.
    pub const PLAYING: [Self; 2] = [Self::A, Self::B];

    /// Returns the opposing team. `Unassigned` has no opponent.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
            Self::Unassigned => Self::Unassigned,
        }
    }

    /// Returns `true` for `A` and `B`.
    #[must_use]
    pub const fn is_playing(self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unassigned => "unassigned",
            Self::A => "a",
            Self::B => "b",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Stable player identifier, allocated by the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Network connection owning a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

/// How an external caller refers to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerRef {
    /// Direct player id.
    Id(PlayerId),
    /// The player owned by this connection.
    Connection(ConnectionId),
}

impl From<PlayerId> for PlayerRef {
    fn from(id: PlayerId) -> Self {
        Self::Id(id)
    }
}

impl std::fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Connection(c) => write!(f, "connection#{}", c.0),
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Inventory slot a weapon occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSlot {
    /// Rifles, SMGs.
    #[default]
    Primary,
    /// Pistols.
    Secondary,
    /// Knives; never dropped.
    Melee,
    /// Grenades and gadgets.
    Utility,
    /// Objective items such as the bomb.
    Special,
}

/// A weapon instance held by a player or lying in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Weapon {
    /// Resource name, e.g. `"ak47"` or `"bomb"`.
    pub kind: String,
    /// Slot the weapon occupies.
    pub slot: WeaponSlot,
    /// Destroyed between rounds when set.
    pub round_scoped: bool,
}

impl Weapon {
    /// Creates a persistent weapon instance.
    #[must_use]
    pub fn new(kind: impl Into<String>, slot: WeaponSlot) -> Self {
        Self {
            kind: kind.into(),
            slot,
            round_scoped: false,
        }
    }
}

/// Per-player inventory: cash and held weapons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    cash: u32,
    weapons: Vec<Weapon>,
}

impl Inventory {
    /// Current cash.
    #[must_use]
    pub const fn cash(&self) -> u32 {
        self.cash
    }

    /// Held weapons in pickup order.
    #[must_use]
    pub fn weapons(&self) -> &[Weapon] {
        &self.weapons
    }

    /// Removes every weapon. Cash is kept.
    pub fn clear(&mut self) {
        self.weapons.clear();
    }

    /// Overwrites the cash balance.
    pub fn set_cash(&mut self, amount: u32) {
        self.cash = amount;
    }

    /// Adds to the cash balance, saturating.
    pub fn give_cash(&mut self, amount: u32) {
        self.cash = self.cash.saturating_add(amount);
    }

    /// Adds a weapon.
    pub fn give_weapon(&mut self, weapon: Weapon) {
        self.weapons.push(weapon);
    }

    /// Returns `true` if a weapon of this kind is held.
    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.weapons.iter().any(|w| w.kind == kind)
    }

    /// Removes every weapon of the given kind; returns how many were removed.
    pub fn remove_weapon(&mut self, kind: &str) -> usize {
        let before = self.weapons.len();
        self.weapons.retain(|w| w.kind != kind);
        before - self.weapons.len()
    }

    /// Destroys round-scoped weapons.
    pub fn purge_round_scoped(&mut self) {
        self.weapons.retain(|w| !w.round_scoped);
    }
}

// ============================================================================
// Spawn point
// ============================================================================

/// Where a player (re)spawns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World position.
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler rotation in degrees (pitch, yaw, roll).
    #[serde(default)]
    pub rotation: [f32; 3],
    /// Free-form tags, e.g. `"bombsite_a"`.
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================================================
// Player
// ============================================================================

/// Host-side state of one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    /// Stable id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Owning network connection, `None` for bots.
    pub connection: Option<ConnectionId>,
    /// Current team.
    pub team: Team,
    /// Whether the player is alive this round.
    pub alive: bool,
    /// Last assigned spawn point.
    pub spawn: Option<SpawnPoint>,
    /// Cash and weapons.
    pub inventory: Inventory,
}

// ============================================================================
// Roster
// ============================================================================

/// Ordered player directory.
///
/// Iteration order is join order, which keeps every team-wide operation
/// deterministic.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
    next_id: u64,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unassigned player and returns its id.
    pub fn join(&mut self, name: impl Into<String>, connection: Option<ConnectionId>) -> PlayerId {
        self.next_id += 1;
        let id = PlayerId(self.next_id);
        self.players.push(Player {
            id,
            name: name.into(),
            connection,
            team: Team::Unassigned,
            alive: false,
            spawn: None,
            inventory: Inventory::default(),
        });
        id
    }

    /// Resolves a player reference by owning connection or id.
    #[must_use]
    pub fn find(&self, player: PlayerRef) -> Option<&Player> {
        self.players.iter().find(|p| matches_ref(p, player))
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, player: PlayerRef) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| matches_ref(p, player))
    }

    /// Looks a player up by id.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.find(PlayerRef::Id(id))
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.find_mut(PlayerRef::Id(id))
    }

    /// All players, including spectators.
    pub fn all(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Mutable iterator over all players.
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Players assigned to a team (not spectating).
    pub fn active(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.team.is_playing())
    }

    /// Players on the given team.
    pub fn on_team(&self, team: Team) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(move |p| p.team == team)
    }

    /// Ids of players on the given team, in join order.
    #[must_use]
    pub fn ids_on_team(&self, team: Team) -> Vec<PlayerId> {
        self.on_team(team).map(|p| p.id).collect()
    }

    /// Grants `amount` to every player on `team`.
    pub fn give_team_income(&mut self, team: Team, amount: u32) {
        self.players
            .iter_mut()
            .filter(|p| p.team == team)
            .for_each(|p| p.inventory.give_cash(amount));
    }

    /// Destroys round-scoped weapons in every inventory.
    pub fn purge_round_scoped(&mut self) {
        self.players
            .iter_mut()
            .for_each(|p| p.inventory.purge_round_scoped());
    }

    /// Number of players, spectators included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` when nobody has joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

fn matches_ref(player: &Player, reference: PlayerRef) -> bool {
    match reference {
        PlayerRef::Id(id) => player.id == id,
        PlayerRef::Connection(conn) => player.connection == Some(conn),
    }
}
