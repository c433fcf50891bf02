//! Match configuration schema.
//!
//! ```yaml
//! match:
//!   name: dust-scrim
//!   tick: 16ms
//!   seed: 7
//! players:
//!   - { name: alice, team: a }
//!   - { name: bob, team: b }
//! rules:
//!   round_limit: { max_rounds: 30 }
//!   half_time_swap: {}
//!   round_time_limit: { duration: 1m55s }
//!   team_elimination: {}
//!   bomb_defusal: {}
//! ```
//!
//! Each present `rules` block installs its module; absent blocks install
//! nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::roster::{SpawnPoint, Team, WeaponSlot};

// ============================================================================
// Root
// ============================================================================

/// A complete match configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    /// Match settings.
    #[serde(rename = "match")]
    pub settings: MatchSettings,

    /// Players seated before the match starts.
    #[serde(default)]
    pub players: Vec<PlayerConfig>,

    /// Rule modules to install.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Weapon kinds every player starts with; never dropped on death.
    #[serde(default)]
    pub default_equipment: Vec<String>,

    /// Per-team spawn points.
    #[serde(default)]
    pub spawns: SpawnsConfig,
}

/// The `match:` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchSettings {
    /// Match name.
    pub name: String,

    /// Wait between round-end polls.
    #[serde(default = "default_tick", with = "duration_str")]
    pub tick: Duration,

    /// Seed of the match random source; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// A seated player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerConfig {
    /// Display name; unique within the match.
    pub name: String,

    /// Initial team.
    #[serde(default)]
    pub team: Team,
}

/// Spawn points per playing team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnsConfig {
    /// Team `A` spawns.
    #[serde(default)]
    pub a: Vec<SpawnPoint>,

    /// Team `B` spawns.
    #[serde(default)]
    pub b: Vec<SpawnPoint>,
}

impl SpawnsConfig {
    /// Returns `true` when no spawn point is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.a.is_empty() && self.b.is_empty()
    }
}

// ============================================================================
// Rules
// ============================================================================

/// The `rules:` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respawn: Option<RespawnConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_time_limit: Option<RoundTimeLimitConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_elimination: Option<TeamEliminationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bomb_defusal: Option<BombDefusalConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_limit: Option<RoundLimitConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_time_swap: Option<HalfTimeSwapConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_weapon: Option<SpecialWeaponConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_dropper: Option<EquipmentDropperConfig>,
}

/// Ends the game after a fixed number of rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoundLimitConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for RoundLimitConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

/// Swaps teams at half time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HalfTimeSwapConfig {
    /// Toast shown before the last round of the first half.
    #[serde(default = "default_final_round_toast")]
    pub final_round_toast: String,
}

impl Default for HalfTimeSwapConfig {
    fn default() -> Self {
        Self {
            final_round_toast: default_final_round_toast(),
        }
    }
}

/// Ends the round when the clock runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoundTimeLimitConfig {
    #[serde(default = "default_round_duration", with = "duration_str")]
    pub duration: Duration,

    /// Team awarded the round on timeout.
    #[serde(default = "default_timeout_winner")]
    pub timeout_winner: Team,
}

impl Default for RoundTimeLimitConfig {
    fn default() -> Self {
        Self {
            duration: default_round_duration(),
            timeout_winner: default_timeout_winner(),
        }
    }
}

/// Ends the round when a team is wiped out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamEliminationConfig {}

/// Bomb scenario and its economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BombDefusalConfig {
    /// Planting team; the other team defends.
    pub attackers: Team,
    pub start_money: u32,
    pub default_win_income: u32,
    pub bomb_detonated_income: u32,
    pub bomb_defused_income: u32,
    pub base_loss_income: u32,
    pub loss_bonus_increment: u32,
    pub max_loss_streak_level: u32,
}

impl Default for BombDefusalConfig {
    fn default() -> Self {
        Self {
            attackers: Team::A,
            start_money: 800,
            default_win_income: 3250,
            bomb_detonated_income: 3500,
            bomb_defused_income: 3500,
            base_loss_income: 1400,
            loss_bonus_increment: 500,
            max_loss_streak_level: 4,
        }
    }
}

/// Hands one special weapon to a random member of a team every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialWeaponConfig {
    /// Weapon kind; the module does nothing when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,

    /// Receiving team.
    #[serde(default = "default_special_team")]
    pub team: Team,

    /// Slot of the granted weapon.
    #[serde(default = "default_special_slot")]
    pub slot: WeaponSlot,
}

impl Default for SpecialWeaponConfig {
    fn default() -> Self {
        Self {
            weapon: None,
            team: default_special_team(),
            slot: default_special_slot(),
        }
    }
}

/// Drops non-default weapons when a player dies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquipmentDropperConfig {}

/// Revives and places every team member before each round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespawnConfig {}

// ============================================================================
// Defaults
// ============================================================================

const fn default_tick() -> Duration {
    Duration::from_millis(16)
}

const fn default_max_rounds() -> u32 {
    30
}

fn default_final_round_toast() -> String {
    "Final round of the first half".to_string()
}

const fn default_round_duration() -> Duration {
    Duration::from_secs(115)
}

const fn default_timeout_winner() -> Team {
    Team::B
}

const fn default_special_team() -> Team {
    Team::A
}

const fn default_special_slot() -> WeaponSlot {
    WeaponSlot::Special
}

/// Human-readable durations (`"1m55s"`, `"16ms"`).
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes a duration as a humantime string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Parses a humantime string.
    ///
    /// # Errors
    ///
    /// Fails on malformed durations.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg: MatchConfig = serde_yaml::from_str("match:\n  name: m\n").unwrap();
        assert_eq!(cfg.settings.tick, Duration::from_millis(16));
        assert!(cfg.settings.seed.is_none());
        assert!(cfg.players.is_empty());
        assert!(cfg.rules.round_limit.is_none());
        assert!(cfg.spawns.is_empty());
    }

    #[test]
    fn test_empty_rule_blocks_take_defaults() {
        let yaml = "match: { name: m }\nrules:\n  round_limit: {}\n  bomb_defusal: {}\n  round_time_limit: {}\n";
        let cfg: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.rules.round_limit.unwrap().max_rounds, 30);
        let bomb = cfg.rules.bomb_defusal.unwrap();
        assert_eq!(bomb, BombDefusalConfig::default());
        assert_eq!(bomb.max_loss_streak_level, 4);
        let clock = cfg.rules.round_time_limit.unwrap();
        assert_eq!(clock.duration, Duration::from_secs(115));
        assert_eq!(clock.timeout_winner, Team::B);
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = "match: { name: m, tick: 250ms }\nrules:\n  round_time_limit: { duration: 1m30s }\n";
        let cfg: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.settings.tick, Duration::from_millis(250));
        assert_eq!(
            cfg.rules.round_time_limit.unwrap().duration,
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = "match: { name: m, tick: soon }\n";
        assert!(serde_yaml::from_str::<MatchConfig>(yaml).is_err());
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let yaml = "match: { name: m }\nrules:\n  capture_the_flag: {}\n";
        assert!(serde_yaml::from_str::<MatchConfig>(yaml).is_err());
    }

    #[test]
    fn test_spawn_points_parse() {
        let yaml = "match: { name: m }\nspawns:\n  a:\n    - { position: [1.0, 2.0, 0.0], tags: [t_spawn] }\n";
        let cfg: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.spawns.a.len(), 1);
        assert_eq!(cfg.spawns.a[0].tags, vec!["t_spawn".to_string()]);
        assert!(cfg.spawns.b.is_empty());
    }

    #[test]
    fn test_duration_serializes_as_text() {
        let settings = MatchSettings {
            name: "m".to_string(),
            tick: Duration::from_millis(16),
            seed: None,
        };
        let yaml = serde_yaml::to_string(&settings).unwrap();
        assert!(yaml.contains("tick: 16ms"));
    }
}
