//! Phase dispatcher.
//!
//! A dispatch runs three stages over a capability's subscriber snapshot:
//!
//! 1. `pre` on every subscriber, sequentially, in snapshot order.
//! 2. `on` on every subscriber concurrently; the dispatcher waits for all
//!    of them, failed or not, before moving on.
//! 3. `post` on every subscriber, sequentially, in snapshot order.
//!
//! Failed `on` callbacks are collected into a [`DispatchReport`] and logged.
//! Sibling callbacks are not cancelled and nothing is rolled back.
//! There is no timeout: an `on` callback that never completes stalls the
//! dispatch.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, error};

use crate::context::MatchContext;
use crate::error::RuleError;
use crate::observability::events::Event;
use crate::observability::metrics;
use crate::roster::{PlayerId, Team};
use crate::rules::{BombEvent, RuleModule};

use super::registry::{Capability, CapabilityRegistry};

// ============================================================================
// Hooks
// ============================================================================

/// Binds a capability to the module callbacks of its three stages.
pub trait Hook {
    /// Capability whose subscribers receive this hook.
    const CAPABILITY: Capability;

    /// Synchronous stage run before any `on`.
    fn pre(&self, _module: &mut dyn RuleModule, _ctx: &MatchContext) {}

    /// Suspendable stage run concurrently across subscribers.
    fn on<'a>(
        &'a self,
        _module: &'a mut dyn RuleModule,
        _ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        Box::pin(futures::future::ready(Ok(())))
    }

    /// Synchronous stage run after every `on` has completed.
    fn post(&self, _module: &mut dyn RuleModule, _ctx: &MatchContext) {}
}

/// Game start.
#[derive(Debug, Clone, Copy)]
pub struct GameStart;

impl Hook for GameStart {
    const CAPABILITY: Capability = Capability::GameStart;

    fn pre(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.pre_game_start(ctx);
    }

    fn on<'a>(
        &'a self,
        module: &'a mut dyn RuleModule,
        ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        module.on_game_start(ctx)
    }

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.post_game_start(ctx);
    }
}

/// Round start.
#[derive(Debug, Clone, Copy)]
pub struct RoundStart;

impl Hook for RoundStart {
    const CAPABILITY: Capability = Capability::RoundStart;

    fn pre(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.pre_round_start(ctx);
    }

    fn on<'a>(
        &'a self,
        module: &'a mut dyn RuleModule,
        ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        module.on_round_start(ctx)
    }

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.post_round_start(ctx);
    }
}

/// Round end.
#[derive(Debug, Clone, Copy)]
pub struct RoundEnd;

impl Hook for RoundEnd {
    const CAPABILITY: Capability = Capability::RoundEnd;

    fn pre(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.pre_round_end(ctx);
    }

    fn on<'a>(
        &'a self,
        module: &'a mut dyn RuleModule,
        ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        module.on_round_end(ctx)
    }

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.post_round_end(ctx);
    }
}

/// Game end.
#[derive(Debug, Clone, Copy)]
pub struct GameEnd;

impl Hook for GameEnd {
    const CAPABILITY: Capability = Capability::GameEnd;

    fn pre(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.pre_game_end(ctx);
    }

    fn on<'a>(
        &'a self,
        module: &'a mut dyn RuleModule,
        ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        module.on_game_end(ctx)
    }

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.post_game_end(ctx);
    }
}

/// A player (re)spawned.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSpawn(pub PlayerId);

impl Hook for PlayerSpawn {
    const CAPABILITY: Capability = Capability::PlayerSpawn;

    fn pre(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.pre_player_spawn(ctx, self.0);
    }

    fn on<'a>(
        &'a self,
        module: &'a mut dyn RuleModule,
        ctx: &'a MatchContext,
    ) -> BoxFuture<'a, Result<(), RuleError>> {
        module.on_player_spawn(ctx, self.0)
    }

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.post_player_spawn(ctx, self.0);
    }
}

/// Post-only: a player joined a team.
#[derive(Debug, Clone, Copy)]
pub struct TeamAssigned(pub PlayerId, pub Team);

impl Hook for TeamAssigned {
    const CAPABILITY: Capability = Capability::TeamAssigned;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_team_assigned(ctx, self.0, self.1);
    }
}

/// Post-only: teams switched sides.
#[derive(Debug, Clone, Copy)]
pub struct TeamSwap;

impl Hook for TeamSwap {
    const CAPABILITY: Capability = Capability::TeamSwap;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_team_swap(ctx);
    }
}

/// Post-only: bomb plant, defuse or detonation.
#[derive(Debug, Clone, Copy)]
pub struct BombNotice(pub BombEvent);

impl Hook for BombNotice {
    const CAPABILITY: Capability = Capability::BombEvents;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_bomb_event(ctx, self.0);
    }
}

/// Post-only: a player died.
#[derive(Debug, Clone, Copy)]
pub struct PlayerKilled {
    /// Player who died.
    pub victim: PlayerId,
    /// Killer, if any.
    pub attacker: Option<PlayerId>,
}

impl Hook for PlayerKilled {
    const CAPABILITY: Capability = Capability::PlayerKilled;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_player_killed(ctx, self.victim, self.attacker);
    }
}

/// Post-only: a player is in the directory but not yet published.
#[derive(Debug, Clone, Copy)]
pub struct PlayerConnect(pub PlayerId);

impl Hook for PlayerConnect {
    const CAPABILITY: Capability = Capability::PlayerJoined;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_connect(ctx, self.0);
    }
}

/// Post-only: a player has joined and been published.
#[derive(Debug, Clone, Copy)]
pub struct PlayerJoined(pub PlayerId);

impl Hook for PlayerJoined {
    const CAPABILITY: Capability = Capability::PlayerJoined;

    fn post(&self, module: &mut dyn RuleModule, ctx: &MatchContext) {
        module.on_joined(ctx, self.0);
    }
}

// ============================================================================
// Report
// ============================================================================

/// A failed `on` callback.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    /// Module whose callback failed.
    pub module: &'static str,
    /// Error it returned.
    pub error: RuleError,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Dispatched capability.
    pub capability: Capability,
    /// Number of subscribers in the snapshot.
    pub subscribers: usize,
    /// Failed `on` callbacks in snapshot order.
    pub failures: Vec<DispatchFailure>,
    /// Wall time spent in all three stages.
    pub duration: Duration,
}

impl DispatchReport {
    /// Returns `true` when every `on` callback succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Runs `pre`, `on` and `post` of `hook` over the capability's subscribers.
pub async fn dispatch<H: Hook + Sync>(
    registry: &mut CapabilityRegistry,
    ctx: &MatchContext,
    hook: &H,
) -> DispatchReport {
    let started = Instant::now();
    let snapshot = registry.snapshot(H::CAPABILITY);
    debug!(
        capability = %H::CAPABILITY,
        subscribers = snapshot.len(),
        "dispatch"
    );

    for module in registry.modules_mut(&snapshot) {
        hook.pre(module.as_mut(), ctx);
    }

    let (names, pending): (Vec<&'static str>, Vec<_>) = registry
        .modules_mut(&snapshot)
        .map(|module| (module.name(), hook.on(module.as_mut(), ctx)))
        .unzip();
    let results = join_all(pending).await;

    for module in registry.modules_mut(&snapshot) {
        hook.post(module.as_mut(), ctx);
    }

    let failures: Vec<DispatchFailure> = names
        .into_iter()
        .zip(results)
        .filter_map(|(module, r)| r.err().map(|error| DispatchFailure { module, error }))
        .collect();

    let report = DispatchReport {
        capability: H::CAPABILITY,
        subscribers: snapshot.len(),
        failures,
        duration: started.elapsed(),
    };
    surface(&report, ctx);
    report
}

/// Runs only the `post` stage of `hook`, for notification capabilities.
pub fn notify<H: Hook>(registry: &mut CapabilityRegistry, ctx: &MatchContext, hook: &H) -> usize {
    let snapshot = registry.snapshot(H::CAPABILITY);
    for module in registry.modules_mut(&snapshot) {
        hook.post(module.as_mut(), ctx);
    }
    snapshot.len()
}

fn surface(report: &DispatchReport, ctx: &MatchContext) {
    metrics::record_dispatch(report.capability, report.duration, report.failures.len());
    if report.is_clean() {
        return;
    }
    for failure in &report.failures {
        error!(
            capability = %report.capability,
            module = failure.module,
            error = %failure.error,
            "on-stage callback failed"
        );
    }
    ctx.emit(Event::DispatchFailed {
        timestamp: Utc::now(),
        capability: report.capability.to_string(),
        modules: report
            .failures
            .iter()
            .map(|f| f.module.to_string())
            .collect(),
    });
}
