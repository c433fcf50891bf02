//! Spawn point assignment.
//!
//! The spawn assigner is a required single-instance collaborator. When the
//! host is built without one, [`AnySpawnAssigner`] is installed as the
//! documented fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::roster::{Player, SpawnPoint, Team};

/// Chooses where a player spawns.
pub trait SpawnAssigner: Send + Sync {
    /// Returns the spawn point for `player`.
    fn spawn_point(&self, player: &Player) -> SpawnPoint;
}

/// Fallback assigner: everyone spawns at the origin with no tags.
#[derive(Debug, Default)]
pub struct AnySpawnAssigner;

impl SpawnAssigner for AnySpawnAssigner {
    fn spawn_point(&self, _player: &Player) -> SpawnPoint {
        SpawnPoint::default()
    }
}

/// Per-team spawn lists, handed out round-robin.
///
/// A team without configured points falls back to the origin.
#[derive(Debug, Default)]
pub struct TeamSpawnAssigner {
    points: HashMap<Team, Vec<SpawnPoint>>,
    cursors: HashMap<Team, AtomicUsize>,
}

impl TeamSpawnAssigner {
    /// Creates an assigner from per-team point lists.
    #[must_use]
    pub fn new(points: HashMap<Team, Vec<SpawnPoint>>) -> Self {
        let cursors = points.keys().map(|t| (*t, AtomicUsize::new(0))).collect();
        Self { points, cursors }
    }
}

impl SpawnAssigner for TeamSpawnAssigner {
    fn spawn_point(&self, player: &Player) -> SpawnPoint {
        let (Some(list), Some(cursor)) = (
            self.points.get(&player.team),
            self.cursors.get(&player.team),
        ) else {
            return SpawnPoint::default();
        };
        if list.is_empty() {
            return SpawnPoint::default();
        }
        let i = cursor.fetch_add(1, Ordering::Relaxed) % list.len();
        list[i].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;

    fn point(x: f32) -> SpawnPoint {
        SpawnPoint {
            position: [x, 0.0, 0.0],
            ..SpawnPoint::default()
        }
    }

    #[test]
    fn test_round_robin_per_team() {
        let mut roster = Roster::new();
        let id = roster.join("alice", None);
        roster.get_mut(id).unwrap().team = Team::A;
        let player = roster.get(id).unwrap();

        let assigner = TeamSpawnAssigner::new(HashMap::from([(Team::A, vec![point(1.0), point(2.0)])]));
        assert_eq!(assigner.spawn_point(player).position[0], 1.0);
        assert_eq!(assigner.spawn_point(player).position[0], 2.0);
        assert_eq!(assigner.spawn_point(player).position[0], 1.0);
    }

    #[test]
    fn test_unconfigured_team_gets_origin() {
        let mut roster = Roster::new();
        let id = roster.join("bob", None);
        roster.get_mut(id).unwrap().team = Team::B;
        let assigner = TeamSpawnAssigner::new(HashMap::from([(Team::A, vec![point(1.0)])]));
        assert_eq!(assigner.spawn_point(roster.get(id).unwrap()), SpawnPoint::default());
    }
}
