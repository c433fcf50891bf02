//! Structured match event stream.
//!
//! Discrete, typed events emitted by the host. Events are serialized as
//! newline-delimited JSON (JSONL) with a monotonically increasing sequence
//! number. Write failures are swallowed; the event stream never takes the
//! match down.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::phase::MatchPhase;
use crate::roster::{PlayerId, Team};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A match event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The host started driving a match.
    MatchStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Match id.
        match_id: Uuid,
        /// Configured match name.
        name: String,
        /// Registered rule modules in registration order.
        modules: Vec<String>,
    },

    /// The match entered a new phase.
    PhaseEntered {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Phase left.
        from: MatchPhase,
        /// Phase entered.
        to: MatchPhase,
        /// Completed rounds at the time of the transition.
        round: u32,
    },

    /// A round-end condition fired.
    RoundEnded {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Round number being settled (1-based).
        round: u32,
        /// Module whose condition fired.
        decided_by: String,
        /// Winning team, if the condition named one.
        winner: Option<Team>,
    },

    /// Income was paid to a team.
    IncomeGranted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Receiving team.
        team: Team,
        /// Amount per player.
        amount: u32,
        /// Why the income was paid.
        reason: String,
    },

    /// Teams switched sides.
    TeamsSwapped {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Completed rounds at the swap.
        round: u32,
        /// Players moved.
        players: usize,
    },

    /// The bomb was planted.
    BombPlanted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Planting player.
        planter: PlayerId,
        /// Planting team.
        team: Team,
    },

    /// The bomb exploded or was defused.
    BombResolved {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// `"detonated"` or `"defused"`.
        outcome: String,
    },

    /// One or more `on` callbacks failed during a dispatch.
    DispatchFailed {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Capability being dispatched.
        capability: String,
        /// Names of the failing modules.
        modules: Vec<String>,
    },

    /// The match reached `Ended`.
    MatchEnded {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Completed rounds.
        rounds: u32,
        /// Team with more round wins, if any.
        winner: Option<Team>,
        /// Whether the administrative override ended the match.
        forced: bool,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe JSONL event writer.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter writing to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter writing to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards every event.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter writing to a new file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes one event line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
