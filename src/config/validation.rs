//! Configuration validation.
//!
//! Semantic checks on a deserialized [`MatchConfig`]. Validation collects
//! every issue instead of stopping at the first one.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{BombDefusalConfig, MatchConfig, SpecialWeaponConfig};
use crate::error::{Severity, ValidationIssue};

/// Loss-streak caps above this are accepted but flagged.
const LOSS_STREAK_WARN_ABOVE: u32 = 10;

/// Ticks longer than this are accepted but flagged.
const TICK_WARN_ABOVE: Duration = Duration::from_secs(1);

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &MatchConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_settings(config);
        self.validate_players(config, limits);
        self.validate_rules(config, limits);
        self.validate_equipment(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_settings(&mut self, config: &MatchConfig) {
        if config.settings.name.trim().is_empty() {
            self.add_error("match.name", "match name is required and cannot be empty");
        }
        if config.settings.tick.is_zero() {
            self.add_error("match.tick", "tick must be greater than zero");
        } else if config.settings.tick > TICK_WARN_ABOVE {
            self.add_warning("match.tick", "tick is unusually long (> 1s)");
        }
    }

    fn validate_players(&mut self, config: &MatchConfig, limits: &ConfigLimits) {
        if config.players.len() > limits.max_players {
            self.add_error(
                "players",
                &format!(
                    "too many players: {} (max {})",
                    config.players.len(),
                    limits.max_players
                ),
            );
        }

        let mut seen = HashSet::new();
        for (i, player) in config.players.iter().enumerate() {
            let path = format!("players[{i}].name");
            if player.name.trim().is_empty() {
                self.add_error(&path, "player name cannot be empty");
            } else if !seen.insert(player.name.as_str()) {
                self.add_error(&path, &format!("duplicate player name '{}'", player.name));
            }
        }
    }

    fn validate_rules(&mut self, config: &MatchConfig, limits: &ConfigLimits) {
        let rules = &config.rules;

        if let Some(limit) = &rules.round_limit {
            if limit.max_rounds == 0 {
                self.add_error("rules.round_limit.max_rounds", "must be at least 1");
            } else if limit.max_rounds > limits.max_rounds {
                self.add_error(
                    "rules.round_limit.max_rounds",
                    &format!("{} exceeds the limit of {}", limit.max_rounds, limits.max_rounds),
                );
            }
        } else {
            self.add_warning(
                "rules",
                "no round_limit configured; the match only ends when forced",
            );
        }

        if rules.half_time_swap.is_some() && rules.round_limit.is_none() {
            self.add_error("rules.half_time_swap", "half_time_swap requires round_limit");
        }

        if let Some(bomb) = &rules.bomb_defusal {
            if rules.round_time_limit.is_none() {
                self.add_error("rules.bomb_defusal", "bomb_defusal requires round_time_limit");
            }
            if rules.team_elimination.is_none() {
                self.add_error("rules.bomb_defusal", "bomb_defusal requires team_elimination");
            }
            if rules
                .round_time_limit
                .as_ref()
                .is_some_and(|clock| clock.timeout_winner == bomb.attackers)
            {
                self.add_warning(
                    "rules.round_time_limit.timeout_winner",
                    "timeouts are awarded to the planting team",
                );
            }
            self.validate_bomb_defusal(bomb);
        }

        if let Some(clock) = &rules.round_time_limit {
            if clock.duration.is_zero() {
                self.add_error("rules.round_time_limit.duration", "must be greater than zero");
            }
            if !clock.timeout_winner.is_playing() {
                self.add_error("rules.round_time_limit.timeout_winner", "must be 'a' or 'b'");
            }
        }

        if let Some(special) = &rules.special_weapon {
            self.validate_special_weapon(special);
        }
    }

    fn validate_bomb_defusal(&mut self, bomb: &BombDefusalConfig) {
        if !bomb.attackers.is_playing() {
            self.add_error("rules.bomb_defusal.attackers", "must be 'a' or 'b'");
        }
        if bomb.max_loss_streak_level > LOSS_STREAK_WARN_ABOVE {
            self.add_warning(
                "rules.bomb_defusal.max_loss_streak_level",
                &format!(
                    "loss streak cap {} is unusually high (> {LOSS_STREAK_WARN_ABOVE})",
                    bomb.max_loss_streak_level
                ),
            );
        }
    }

    fn validate_special_weapon(&mut self, special: &SpecialWeaponConfig) {
        if !special.team.is_playing() {
            self.add_error("rules.special_weapon.team", "must be 'a' or 'b'");
        }
        match special.weapon.as_deref() {
            Some(w) if w.trim().is_empty() => {
                self.add_error("rules.special_weapon.weapon", "weapon cannot be empty");
            }
            None => self.add_warning(
                "rules.special_weapon.weapon",
                "no weapon configured; the allocator does nothing",
            ),
            Some(_) => {}
        }
    }

    fn validate_equipment(&mut self, config: &MatchConfig) {
        let mut seen = HashSet::new();
        for (i, kind) in config.default_equipment.iter().enumerate() {
            if !seen.insert(kind.as_str()) {
                self.add_warning(
                    &format!("default_equipment[{i}]"),
                    &format!("duplicate default equipment '{kind}'"),
                );
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
