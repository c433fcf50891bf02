//! Three-stage dispatch as seen from real modules inside a running match.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use roundkeeper::config::schema::RoundLimitConfig;
use roundkeeper::context::MatchContext;
use roundkeeper::error::RuleError;
use roundkeeper::phase::{Capability, MatchBuilder, MatchPhase, ModuleId};
use roundkeeper::roster::Team;
use roundkeeper::rules::{RoundLimit, RuleModule, Verdict};

use common::{Journal, Recorder, entries, journal, step_until};

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{entry} missing from {log:?}"))
}

/// Ends every round on the first poll.
struct Referee;

impl RuleModule for Referee {
    fn name(&self) -> &'static str {
        "referee"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundEndCondition]
    }

    fn should_round_end(&mut self, _ctx: &MatchContext) -> Result<Verdict, RuleError> {
        Ok(Verdict::won_by(Team::A))
    }
}

/// Enables another module from inside its own round-start `pre` stage.
struct Enabler {
    target: Arc<Mutex<Option<ModuleId>>>,
    journal: Journal,
}

impl RuleModule for Enabler {
    fn name(&self) -> &'static str {
        "enabler"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart]
    }

    fn pre_round_start(&mut self, ctx: &MatchContext) {
        self.journal
            .lock()
            .unwrap()
            .push("enabler.pre_round_start".to_string());
        if let Some(id) = *self.target.lock().unwrap() {
            ctx.set_module_enabled(id, true);
        }
    }
}

#[tokio::test]
async fn test_stages_barrier_across_modules() {
    let log = journal();
    let mut game = MatchBuilder::new("barrier")
        .module(Box::new(Recorder::new("slow", Duration::from_millis(30), &log)))
        .module(Box::new(Recorder::new("fast", Duration::from_millis(1), &log)))
        .build()
        .unwrap();

    step_until(&mut game, MatchPhase::DuringRound).await;
    let log = entries(&log);

    // pre in registration order, then every on, then post in order.
    assert_eq!(
        log,
        vec![
            "slow.pre_round_start",
            "fast.pre_round_start",
            "slow.on_round_start.start",
            "fast.on_round_start.start",
            "fast.on_round_start.end",
            "slow.on_round_start.end",
            "slow.post_round_start",
            "fast.post_round_start",
        ]
    );
}

#[tokio::test]
async fn test_failed_on_stage_still_reaches_post() {
    let log = journal();
    let mut failing = Recorder::new("failing", Duration::from_millis(1), &log);
    failing.fail_on = true;
    let mut game = MatchBuilder::new("failure")
        .module(Box::new(failing))
        .module(Box::new(Recorder::new("steady", Duration::from_millis(5), &log)))
        .build()
        .unwrap();

    step_until(&mut game, MatchPhase::DuringRound).await;
    let log = entries(&log);

    assert!(
        position(&log, "steady.on_round_start.end") < position(&log, "failing.post_round_start")
    );
    assert!(log.contains(&"steady.post_round_start".to_string()));
    assert_eq!(game.phase(), MatchPhase::DuringRound);
}

#[tokio::test]
async fn test_enabled_mid_dispatch_joins_next_dispatch() {
    let log = journal();
    let target = Arc::new(Mutex::new(None));
    let mut game = MatchBuilder::new("toggle")
        .tick(Duration::from_millis(1))
        .module(Box::new(Enabler {
            target: Arc::clone(&target),
            journal: Arc::clone(&log),
        }))
        .module(Box::new(Recorder::new("late", Duration::ZERO, &log)))
        .module(Box::new(Referee))
        .module(Box::new(RoundLimit::new(RoundLimitConfig { max_rounds: 1 })))
        .build()
        .unwrap();

    let late = game.module_id("late").unwrap();
    game.set_module_enabled(late, false);
    *target.lock().unwrap() = Some(late);

    step_until(&mut game, MatchPhase::Ended).await;
    let log = entries(&log);

    assert_eq!(log[0], "enabler.pre_round_start");
    assert!(!log.iter().any(|e| e.starts_with("late.") && e.contains("round_start")));
    assert!(log.contains(&"late.pre_round_end".to_string()));
    assert!(log.contains(&"late.post_round_end".to_string()));
}

#[tokio::test]
async fn test_disabled_module_stops_receiving() {
    let log = journal();
    let mut game = MatchBuilder::new("mute")
        .tick(Duration::from_millis(1))
        .module(Box::new(Recorder::new("muted", Duration::ZERO, &log)))
        .module(Box::new(Referee))
        .module(Box::new(RoundLimit::new(RoundLimitConfig { max_rounds: 3 })))
        .build()
        .unwrap();

    step_until(&mut game, MatchPhase::PostRound).await;
    let muted = game.module_id("muted").unwrap();
    assert!(game.set_module_enabled(muted, false));
    step_until(&mut game, MatchPhase::Ended).await;

    let log = entries(&log);
    assert_eq!(log.iter().filter(|e| *e == "muted.pre_round_start").count(), 1);
    assert!(!log.iter().any(|e| e.contains("round_end")));
    assert_eq!(game.summary().rounds, 3);
}
