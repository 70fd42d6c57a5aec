//! Timed coin generator.
//!
//! A user picks a duration, starts the generator and claims the coins once it
//! is done. State lives in the `generator` profile domain; the completion timer
//! only lives in memory and is rebuilt by [`GeneratorService::resume_all`].

use crate::{
    core::{
        clock::Clock,
        profiles::{Profiles, Record, RecordDefaults},
        session::MessageRef,
        store::Domain,
        wallet::{Currency, CurrencyChange, WalletStats},
    },
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Only generator tier so far (Bronze).
pub const GENERATOR_TIER: u32 = 1;

/// Tunables of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// Coins produced per minute before multipliers
    pub rate_per_minute: u64,
    /// Lockout after stopping early
    pub cooldown: Duration,
    /// Shortest accepted run, minutes
    pub min_minutes: u32,
    /// Longest accepted run, minutes
    pub max_minutes: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            rate_per_minute: 10,
            cooldown: Duration::from_secs(60 * 60),
            min_minutes: 10,
            max_minutes: 480,
        }
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Producing until `ends_at`
    Running,
    /// Finished, waiting for the claim
    ReadyClaim,
    /// Stopped early, waiting for the claim
    Stopped,
}

/// One generator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorRun {
    /// Start time, ms since epoch
    pub started_at: i64,
    /// Planned end, ms since epoch
    pub ends_at: i64,
    /// Planned length
    pub duration_minutes: u32,
    /// Lifecycle
    pub status: RunStatus,
    /// Coins waiting to be claimed
    #[serde(default)]
    pub generated_amount: u64,
    /// Multiplier applied on completion
    #[serde(default = "unit_multiplier")]
    pub total_multiplier: f64,
    /// Channel of the generator message
    #[serde(default)]
    pub channel_id: Option<u64>,
    /// Generator message, refreshed on completion
    #[serde(default)]
    pub message_id: Option<u64>,
}

impl GeneratorRun {
    /// Message showing this run, if known.
    #[must_use]
    pub fn message(&self) -> Option<MessageRef> {
        Some(MessageRef {
            channel_id: self.channel_id?,
            message_id: self.message_id?,
        })
    }

    /// Whether the coins are ready to claim.
    #[must_use]
    pub fn is_claimable(&self) -> bool {
        matches!(self.status, RunStatus::ReadyClaim | RunStatus::Stopped)
    }
}

const fn unit_multiplier() -> f64 {
    1.0
}

/// Persisted generator record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorState {
    /// Generator tier
    pub tier: u32,
    /// No new run before this time, ms since epoch
    pub cooldown_ends_at: i64,
    /// Duration chosen in setup, consumed by start
    pub pending_duration_minutes: Option<u32>,
    /// DM the user on completion
    pub notify_dm: bool,
    /// Multiplier of the location the run was started in
    pub location_multiplier: f64,
    /// Current run
    pub run: Option<GeneratorRun>,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            tier: GENERATOR_TIER,
            cooldown_ends_at: 0,
            pending_duration_minutes: None,
            notify_dm: true,
            location_multiplier: 1.0,
            run: None,
        }
    }
}

impl GeneratorState {
    /// Whether a new run is blocked at `now_ms`.
    #[must_use]
    pub const fn on_cooldown(&self, now_ms: i64) -> bool {
        now_ms < self.cooldown_ends_at
    }
}

impl Record for GeneratorState {
    fn domain() -> Domain {
        Domain::Generator
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.tier = GENERATOR_TIER;
        self.cooldown_ends_at = self.cooldown_ends_at.max(0);
        self.pending_duration_minutes = self.pending_duration_minutes.filter(|m| *m > 0);
        if !self.location_multiplier.is_finite() {
            self.location_multiplier = 1.0;
        }
        if let Some(run) = &mut self.run {
            run.duration_minutes = run.duration_minutes.max(1);
            if !run.total_multiplier.is_finite() {
                run.total_multiplier = 1.0;
            }
        }
    }
}

/// Parses a duration such as `"30m"`, `"1.5h"` or `"45"` into whole minutes.
///
/// Hours are rounded to the nearest minute. Values outside
/// `[settings.min_minutes, settings.max_minutes]` are rejected.
pub fn parse_duration(input: &str, settings: &GeneratorSettings) -> Result<u32> {
    let input = input.trim().to_lowercase();
    let (number, per_unit) = input
        .strip_suffix('h')
        .map(|n| (n, 60.0))
        .or_else(|| input.strip_suffix('m').map(|n| (n, 1.0)))
        .unwrap_or((input.as_str(), 1.0));

    let out_of_range = || Error::InvalidInput {
        message: format!(
            "You cannot put a time that is either below {}m or above {}m!",
            settings.min_minutes, settings.max_minutes
        ),
    };
    let value: f64 = number.trim().parse().map_err(|_| out_of_range())?;
    let minutes = (value * per_unit).round();
    if !minutes.is_finite()
        || minutes < f64::from(settings.min_minutes)
        || minutes > f64::from(settings.max_minutes)
    {
        return Err(out_of_range());
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(minutes as u32)
}

/// Result of pressing start.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorStart {
    /// Run started
    Started(GeneratorState),
    /// No duration picked yet
    NoDuration,
    /// A run exists already
    AlreadyRunning(GeneratorState),
    /// Still cooling down
    OnCooldown {
        /// End of the cooldown, ms since epoch
        ends_at: i64,
    },
}

/// Result of setting up a duration.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorSetup {
    /// Duration stored
    Set(GeneratorState),
    /// A run exists already
    Busy,
}

/// Result of a claim.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorClaim {
    /// Coins paid into the wallet
    Claimed {
        /// Coins paid
        amount: u64,
        /// State after the claim
        state: GeneratorState,
    },
    /// No finished or stopped run
    NothingToClaim,
}

/// Emitted when a run finishes on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorEvent {
    /// Owner
    pub user_id: String,
    /// State after completion
    pub state: GeneratorState,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct ServiceInner {
    profiles: Arc<Profiles>,
    clock: Arc<dyn Clock>,
    settings: GeneratorSettings,
    timers: Mutex<HashMap<String, Timer>>,
    next_generation: AtomicU64,
    events: Option<UnboundedSender<GeneratorEvent>>,
}

/// Generator operations plus completion timers.
#[derive(Clone)]
pub struct GeneratorService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for GeneratorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorService")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl GeneratorService {
    /// Creates the service. Completion events go to `events` when given.
    #[must_use]
    pub fn new(
        profiles: Arc<Profiles>,
        clock: Arc<dyn Clock>,
        settings: GeneratorSettings,
        events: Option<UnboundedSender<GeneratorEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                profiles,
                clock,
                settings,
                timers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> GeneratorSettings {
        self.inner.settings
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<String, Timer>> {
        match self.inner.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reads the user's generator.
    pub async fn state(&self, user_id: &str) -> Result<GeneratorState> {
        self.inner.profiles.read(user_id).await
    }

    /// Stores the duration typed in setup.
    #[instrument(skip(self))]
    pub async fn set_duration(&self, user_id: &str, input: &str) -> Result<GeneratorSetup> {
        let minutes = parse_duration(input, &self.inner.settings)?;
        self.inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                if state.run.is_some() {
                    return GeneratorSetup::Busy;
                }
                state.pending_duration_minutes = Some(minutes);
                GeneratorSetup::Set(state.clone())
            })
            .await
    }

    /// Turns DM notifications on or off.
    pub async fn set_notify(&self, user_id: &str, enabled: bool) -> Result<GeneratorState> {
        self.inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                state.notify_dm = enabled;
                state.clone()
            })
            .await
    }

    /// Starts a run with the pending duration and schedules its completion.
    #[instrument(skip(self))]
    pub async fn start(&self, user_id: &str, message: Option<MessageRef>) -> Result<GeneratorStart> {
        let now = self.now_ms();
        let outcome = self
            .inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                if state.run.is_some() {
                    return GeneratorStart::AlreadyRunning(state.clone());
                }
                if state.on_cooldown(now) {
                    return GeneratorStart::OnCooldown {
                        ends_at: state.cooldown_ends_at,
                    };
                }
                let Some(minutes) = state.pending_duration_minutes.take() else {
                    return GeneratorStart::NoDuration;
                };
                state.location_multiplier = 1.0;
                state.run = Some(GeneratorRun {
                    started_at: now,
                    ends_at: now + i64::from(minutes) * 60_000,
                    duration_minutes: minutes,
                    status: RunStatus::Running,
                    generated_amount: 0,
                    total_multiplier: state.location_multiplier,
                    channel_id: message.map(|m| m.channel_id),
                    message_id: message.map(|m| m.message_id),
                });
                GeneratorStart::Started(state.clone())
            })
            .await?;

        if let GeneratorStart::Started(GeneratorState { run: Some(run), .. }) = &outcome {
            info!(user_id, minutes = run.duration_minutes, "Generator started");
            self.schedule(user_id, run);
        }
        Ok(outcome)
    }

    /// Stops a running generator early.
    ///
    /// Pays only the base rate for whole minutes elapsed and starts the
    /// cooldown. Returns `None` when nothing is running.
    #[instrument(skip(self))]
    pub async fn stop(&self, user_id: &str) -> Result<Option<GeneratorState>> {
        let now = self.now_ms();
        let settings = self.inner.settings;
        let stopped = self
            .inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                let run = state.run.as_mut().filter(|run| run.status == RunStatus::Running)?;
                #[allow(clippy::cast_sign_loss)]
                let elapsed_minutes = ((now - run.started_at).max(0) / 60_000) as u64;
                run.status = RunStatus::Stopped;
                run.generated_amount = elapsed_minutes * settings.rate_per_minute;
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let cooldown_ms = settings.cooldown.as_millis() as i64;
                state.cooldown_ends_at = now + cooldown_ms;
                Some(state.clone())
            })
            .await?;

        if stopped.is_some() {
            self.cancel(user_id);
        }
        Ok(stopped)
    }

    /// Pays a finished or stopped run into the wallet and clears it.
    #[instrument(skip(self))]
    pub async fn claim(&self, user_id: &str) -> Result<GeneratorClaim> {
        let taken = self
            .inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                if !state.run.as_ref().is_some_and(GeneratorRun::is_claimable) {
                    return None;
                }
                let run = state.run.take()?;
                state.pending_duration_minutes = None;
                Some((run.generated_amount, state.clone()))
            })
            .await?;

        let Some((amount, state)) = taken else {
            return Ok(GeneratorClaim::NothingToClaim);
        };
        let delta = i64::try_from(amount).map_err(|_| Error::InvalidInput {
            message: format!("Generated amount {amount} is too large"),
        })?;
        let change = self
            .inner
            .profiles
            .update(user_id, |wallet: &mut WalletStats| wallet.add_currency(Currency::Coins, delta))
            .await?;
        if let CurrencyChange::Insufficient { .. } = change {
            warn!("Generator payout of {amount} for {user_id} was rejected by the wallet");
        }
        info!(user_id, amount, "Generator claimed");
        Ok(GeneratorClaim::Claimed { amount, state })
    }

    /// Marks the run started at `started_at` as ready to claim.
    ///
    /// Called by the completion timer; does nothing when the run was stopped,
    /// claimed or replaced in the meantime.
    pub async fn complete(&self, user_id: &str, started_at: i64) -> Result<Option<GeneratorState>> {
        let rate = self.inner.settings.rate_per_minute;
        let completed = self
            .inner
            .profiles
            .update(user_id, |state: &mut GeneratorState| {
                let run = state
                    .run
                    .as_mut()
                    .filter(|run| run.status == RunStatus::Running && run.started_at == started_at)?;
                run.status = RunStatus::ReadyClaim;
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let amount = (f64::from(run.duration_minutes) * rate as f64 * run.total_multiplier).floor() as u64;
                run.generated_amount = amount;
                Some(state.clone())
            })
            .await?;

        if let Some(state) = &completed {
            info!(user_id, "Generator finished");
            if let Some(events) = &self.inner.events {
                let _ = events.send(GeneratorEvent {
                    user_id: user_id.to_string(),
                    state: state.clone(),
                });
            }
        }
        Ok(completed)
    }

    /// Reschedules every running generator, e.g. after a restart.
    ///
    /// Runs whose end already passed complete right away.
    pub async fn resume_all(&self) -> Result<usize> {
        let mut resumed = 0;
        for (user_id, state) in self.inner.profiles.list::<GeneratorState>().await? {
            if let Some(run) = state.run.filter(|run| run.status == RunStatus::Running) {
                self.schedule(&user_id, &run);
                resumed += 1;
            }
        }
        if resumed > 0 {
            info!("Resumed {resumed} running generators");
        }
        Ok(resumed)
    }

    /// Number of pending completion timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers().len()
    }

    fn schedule(&self, user_id: &str, run: &GeneratorRun) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        #[allow(clippy::cast_sign_loss)]
        let delay = Duration::from_millis((run.ends_at - self.now_ms()).max(0) as u64);
        let service = self.clone();
        let user = user_id.to_string();
        let started_at = run.started_at;

        // The entry must exist before the task can look for it.
        let mut timers = self.timers();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut timers = service.timers();
                let current = timers.get(&user).is_some_and(|t| t.generation == generation);
                if current {
                    timers.remove(&user);
                }
                current
            };
            if !current {
                return;
            }
            if let Err(e) = service.complete(&user, started_at).await {
                warn!("Failed to complete generator for {user}: {e}");
            }
        });

        if let Some(previous) = timers.insert(user_id.to_string(), Timer { generation, handle }) {
            previous.handle.abort();
        }
    }

    fn cancel(&self, user_id: &str) {
        if let Some(timer) = self.timers().remove(user_id) {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::test_utils::{json_profiles, memory_profiles};
    use tokio::sync::mpsc;

    fn service(profiles: Profiles, clock: Arc<ManualClock>) -> GeneratorService {
        GeneratorService::new(Arc::new(profiles), clock, GeneratorSettings::default(), None)
    }

    #[test]
    fn test_parse_duration_accepts_minutes_and_hours() {
        let settings = GeneratorSettings::default();
        assert_eq!(parse_duration("30m", &settings).unwrap(), 30);
        assert_eq!(parse_duration(" 1.5H ", &settings).unwrap(), 90);
        assert_eq!(parse_duration("45", &settings).unwrap(), 45);
        assert_eq!(parse_duration("8h", &settings).unwrap(), 480);
    }

    #[test]
    fn test_parse_duration_rejects_out_of_range_and_garbage() {
        let settings = GeneratorSettings::default();
        for input in ["5m", "9h", "abc", "", "-20"] {
            assert!(
                matches!(parse_duration(input, &settings), Err(Error::InvalidInput { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_setup_leaves_state_untouched() -> Result<()> {
        let generators = service(memory_profiles().await?, Arc::new(ManualClock::new(0)));
        assert!(generators.set_duration("u", "2m").await.is_err());
        assert_eq!(generators.state("u").await?.pending_duration_minutes, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_requires_duration() -> Result<()> {
        let generators = service(memory_profiles().await?, Arc::new(ManualClock::new(0)));
        assert_eq!(generators.start("u", None).await?, GeneratorStart::NoDuration);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_pays_elapsed_minutes_and_starts_cooldown() -> Result<()> {
        let clock = Arc::new(ManualClock::new(1_000));
        let generators = service(memory_profiles().await?, Arc::clone(&clock));
        generators.set_duration("u", "60m").await?;
        assert!(matches!(generators.start("u", None).await?, GeneratorStart::Started(_)));
        assert_eq!(generators.pending_timers(), 1);

        clock.advance(12 * 60_000 + 30_000);
        let state = generators.stop("u").await?.unwrap();
        let run = state.run.unwrap();
        assert_eq!(run.status, RunStatus::Stopped);
        assert_eq!(run.generated_amount, 120);
        assert_eq!(generators.pending_timers(), 0);

        let GeneratorClaim::Claimed { amount, .. } = generators.claim("u").await? else {
            panic!("stopped run should be claimable");
        };
        assert_eq!(amount, 120);
        let wallet: WalletStats = generators.inner.profiles.read("u").await?;
        assert_eq!(wallet.coins, 120);

        generators.set_duration("u", "10m").await?;
        assert!(matches!(generators.start("u", None).await?, GeneratorStart::OnCooldown { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() -> Result<()> {
        let generators = service(memory_profiles().await?, Arc::new(ManualClock::new(0)));
        generators.set_duration("u", "10m").await?;
        generators.start("u", None).await?;

        assert_eq!(generators.complete("u", 12_345).await?, None);
        let state = generators.complete("u", 0).await?.unwrap();
        assert_eq!(state.run.as_ref().unwrap().status, RunStatus::ReadyClaim);
        assert_eq!(state.run.unwrap().generated_amount, 100);
        // already completed
        assert_eq!(generators.complete("u", 0).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_without_run() -> Result<()> {
        let generators = service(memory_profiles().await?, Arc::new(ManualClock::new(0)));
        assert_eq!(generators.claim("u").await?, GeneratorClaim::NothingToClaim);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_timer_fires_event() -> Result<()> {
        let (_dir, profiles) = json_profiles();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = Arc::new(ManualClock::new(0));
        let generators = GeneratorService::new(
            Arc::new(profiles),
            Arc::clone(&clock) as Arc<dyn Clock>,
            GeneratorSettings::default(),
            Some(tx),
        );
        generators.set_duration("u", "10m").await?;
        generators.start("u", None).await?;

        clock.advance(10 * 60_000);
        tokio::time::sleep(Duration::from_secs(601)).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, "u");
        let run = event.state.run.unwrap();
        assert_eq!(run.status, RunStatus::ReadyClaim);
        assert_eq!(run.generated_amount, 100);
        assert_eq!(generators.pending_timers(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_all_reschedules_running_runs() -> Result<()> {
        let (_dir, profiles) = json_profiles();
        let profiles = Arc::new(profiles);
        let clock = Arc::new(ManualClock::new(0));
        let first = GeneratorService::new(
            Arc::clone(&profiles),
            Arc::clone(&clock) as Arc<dyn Clock>,
            GeneratorSettings::default(),
            None,
        );
        first.set_duration("u", "10m").await?;
        first.start("u", None).await?;
        first.cancel("u");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let restarted = GeneratorService::new(profiles, clock, GeneratorSettings::default(), Some(tx));
        assert_eq!(restarted.resume_all().await?, 1);
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(rx.recv().await.unwrap().user_id, "u");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_resume_completes_runs_already_past_due() -> Result<()> {
        let (_dir, profiles) = json_profiles();
        let profiles = Arc::new(profiles);
        let clock = Arc::new(ManualClock::new(0));
        let first = GeneratorService::new(
            Arc::clone(&profiles),
            Arc::clone(&clock) as Arc<dyn Clock>,
            GeneratorSettings::default(),
            None,
        );
        let users: Vec<String> = (0..40).map(|i| format!("user{i}")).collect();
        for user in &users {
            first.set_duration(user, "10m").await?;
            first.start(user, None).await?;
            first.cancel(user);
        }
        clock.advance(30 * 60_000);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let restarted = GeneratorService::new(Arc::clone(&profiles), clock, GeneratorSettings::default(), Some(tx));
        assert_eq!(restarted.resume_all().await?, users.len());
        for _ in &users {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.state.run.unwrap().status, RunStatus::ReadyClaim);
        }
        assert_eq!(restarted.pending_timers(), 0);
        for user in &users {
            let state: GeneratorState = profiles.read(user).await?;
            assert_eq!(state.run.unwrap().status, RunStatus::ReadyClaim);
        }
        Ok(())
    }
}
