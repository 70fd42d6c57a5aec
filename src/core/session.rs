//! In-memory gathering sessions and their timers.
//!
//! At most one session exists per `(user, activity)`. Sessions are never
//! persisted; a restart drops them. Every timer captures the session id and a
//! timer generation when it is scheduled and only acts if both still match.

use crate::core::{activity::Activity, clock::Clock, loot::LootOutcome};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Timing parameters for gathering sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Absolute session length
    pub duration: Duration,
    /// Idle time after which the session is dropped
    pub inactivity: Duration,
    /// Delay before the starting screen flips to the active view
    pub start_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5 * 60),
            inactivity: Duration::from_secs(30),
            start_delay: Duration::from_secs(3),
        }
    }
}

/// Discord message a session is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Channel id
    pub channel_id: u64,
    /// Message id
    pub message_id: u64,
}

/// Lifecycle phase of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Showing the starting screen
    Starting,
    /// Accepting swings
    Active,
}

/// One user's gathering run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheringSession {
    /// Unique per registry, used by timers to detect replacement
    pub session_id: u64,
    /// Owner
    pub user_id: String,
    /// Activity being played
    pub activity: Activity,
    /// Current layer
    pub layer: i64,
    /// Remaining health of the current layer
    pub health: i64,
    /// Health pool of the current layer
    pub max_health: i64,
    /// Start time, ms since epoch
    pub started_at: i64,
    /// Hard end time, ms since epoch
    pub expires_at: i64,
    /// Loot awarded for the last cleared layer
    pub loot: Option<LootOutcome>,
    /// Loot pre-rolled for the current layer
    pub pending_loot: Option<LootOutcome>,
    /// Phase
    pub phase: Phase,
    /// Message the session is displayed in
    pub message: Option<MessageRef>,
}

impl GatheringSession {
    /// Applies one swing of `damage`. Health never drops below 0.
    ///
    /// When the layer is cleared the pending loot (or a fresh roll for the
    /// current layer) is returned for committing, the layer advances, health
    /// resets and the next layer's loot is pre-rolled.
    pub fn apply_damage<F>(&mut self, damage: i64, mut roll: F) -> Option<LootOutcome>
    where
        F: FnMut(i64) -> LootOutcome,
    {
        self.health = (self.health - damage.max(0)).max(0);
        if self.health > 0 {
            return None;
        }
        let loot = self
            .pending_loot
            .take()
            .unwrap_or_else(|| roll(self.layer));
        self.layer += 1;
        self.max_health = self.activity.max_health(self.layer);
        self.health = self.max_health;
        self.loot = Some(loot.clone());
        self.pending_loot = Some(roll(self.layer));
        Some(loot)
    }

    /// Whether the hard duration has passed at `now_ms`.
    #[must_use]
    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Why a session ended without the user pressing stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// No action within the inactivity window
    Inactive,
    /// Hard duration passed
    Expired,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The start delay passed; render the active view
    Revealed(GatheringSession),
    /// The session was discarded by a timer; render the idle view
    Ended {
        /// Owner
        user_id: String,
        /// Activity
        activity: Activity,
        /// Message to reset, if known
        message: Option<MessageRef>,
        /// Cause
        reason: EndReason,
    },
}

/// Outcome of [`SessionRegistry::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was created
    Started(GatheringSession),
    /// An unexpired session already exists
    AlreadyActive {
        /// When the existing session ends
        expires_at: i64,
    },
}

type SessionKey = (String, Activity);

struct Entry {
    session: GatheringSession,
    generation: u64,
    inactivity_timer: Option<JoinHandle<()>>,
    reveal_timer: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel_timers(&mut self) {
        if let Some(handle) = self.inactivity_timer.take() {
            handle.abort();
        }
        if let Some(handle) = self.reveal_timer.take() {
            handle.abort();
        }
    }
}

struct RegistryInner {
    sessions: Mutex<HashMap<SessionKey, Entry>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    events: Option<UnboundedSender<SessionEvent>>,
}

/// Owner of every live gathering session.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Creates an empty registry. Timer-driven changes are reported on `events`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
        events: Option<UnboundedSender<SessionEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                clock,
                settings,
                events,
            }),
        }
    }

    /// Timing parameters.
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.inner.settings
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, Entry>> {
        match self.inner.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.inner.events {
            // A closed receiver only means nobody renders timer updates.
            let _ = events.send(event);
        }
    }

    /// Creates a session at layer 0 unless an unexpired one exists.
    ///
    /// Schedules the start-delay reveal and the first inactivity timer.
    pub fn start(
        &self,
        user_id: &str,
        activity: Activity,
        message: Option<MessageRef>,
        pending_loot: Option<LootOutcome>,
    ) -> StartOutcome {
        let now = self.inner.clock.now_ms();
        let key = (user_id.to_string(), activity);
        let mut sessions = self.sessions();

        if let Some(existing) = sessions.get_mut(&key) {
            if !existing.session.is_expired(now) {
                return StartOutcome::AlreadyActive {
                    expires_at: existing.session.expires_at,
                };
            }
            existing.cancel_timers();
            sessions.remove(&key);
        }

        let duration_ms = i64::try_from(self.inner.settings.duration.as_millis()).unwrap_or(i64::MAX);
        let max_health = activity.max_health(0);
        let session = GatheringSession {
            session_id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: user_id.to_string(),
            activity,
            layer: 0,
            health: max_health,
            max_health,
            started_at: now,
            expires_at: now.saturating_add(duration_ms),
            loot: None,
            pending_loot,
            phase: Phase::Starting,
            message,
        };
        let mut entry = Entry {
            session: session.clone(),
            generation: 0,
            inactivity_timer: None,
            reveal_timer: None,
        };
        entry.reveal_timer = Some(self.spawn_reveal(&key, session.session_id));
        entry.inactivity_timer = Some(self.spawn_inactivity(&key, session.session_id, 0));
        sessions.insert(key, entry);

        info!(user_id, activity = activity.key(), "Gathering session started");
        StartOutcome::Started(session)
    }

    /// Snapshot of the session, if any.
    #[must_use]
    pub fn get(&self, user_id: &str, activity: Activity) -> Option<GatheringSession> {
        self.sessions()
            .get(&(user_id.to_string(), activity))
            .map(|entry| entry.session.clone())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `action` on a live, unexpired session and resets its inactivity timer.
    ///
    /// An expired session is discarded and `None` is returned, as for a
    /// missing one.
    pub fn with_live<R, F>(&self, user_id: &str, activity: Activity, action: F) -> Option<(R, GatheringSession)>
    where
        F: FnOnce(&mut GatheringSession) -> R,
    {
        let now = self.inner.clock.now_ms();
        let key = (user_id.to_string(), activity);
        let mut sessions = self.sessions();

        let entry = sessions.get_mut(&key)?;
        if entry.session.is_expired(now) {
            entry.cancel_timers();
            sessions.remove(&key);
            debug!(user_id, activity = activity.key(), "Session expired on action");
            return None;
        }

        let result = action(&mut entry.session);
        self.reschedule_inactivity(&key, entry);
        Some((result, entry.session.clone()))
    }

    /// Resets the inactivity window of a live session. Returns `false` if none exists.
    pub fn touch(&self, user_id: &str, activity: Activity) -> bool {
        let key = (user_id.to_string(), activity);
        let mut sessions = self.sessions();
        match sessions.get_mut(&key) {
            Some(entry) => {
                self.reschedule_inactivity(&key, entry);
                true
            }
            None => false,
        }
    }

    /// Overwrites the last-cleared loot of session `session_id`.
    ///
    /// Returns `false` when that session is gone or was replaced. Timers are
    /// left alone; this is bookkeeping, not player activity.
    pub fn set_loot(&self, user_id: &str, activity: Activity, session_id: u64, loot: Option<LootOutcome>) -> bool {
        let mut sessions = self.sessions();
        match sessions.get_mut(&(user_id.to_string(), activity)) {
            Some(entry) if entry.session.session_id == session_id => {
                entry.session.loot = loot;
                true
            }
            _ => false,
        }
    }

    /// Discards a session and cancels its timers. Returns `false` if none existed.
    pub fn destroy(&self, user_id: &str, activity: Activity) -> bool {
        let removed = self.sessions().remove(&(user_id.to_string(), activity));
        match removed {
            Some(mut entry) => {
                entry.cancel_timers();
                info!(user_id, activity = activity.key(), layer = entry.session.layer, "Gathering session ended");
                true
            }
            None => false,
        }
    }

    /// Inactivity timer body: discards the session only if it is still the
    /// same session and no action happened since the timer was scheduled.
    pub fn expire_if_current(&self, user_id: &str, activity: Activity, session_id: u64, generation: u64) -> bool {
        let key = (user_id.to_string(), activity);
        let ended = {
            let mut sessions = self.sessions();
            let is_current = sessions
                .get(&key)
                .is_some_and(|entry| entry.session.session_id == session_id && entry.generation == generation);
            if !is_current {
                return false;
            }
            sessions.remove(&key)
        };
        let Some(mut entry) = ended else {
            return false;
        };
        // The inactivity handle belongs to the task running this code.
        entry.inactivity_timer = None;
        entry.cancel_timers();

        let reason = if entry.session.is_expired(self.inner.clock.now_ms()) {
            EndReason::Expired
        } else {
            EndReason::Inactive
        };
        info!(user_id, activity = activity.key(), ?reason, "Gathering session timed out");
        self.emit(SessionEvent::Ended {
            user_id: user_id.to_string(),
            activity,
            message: entry.session.message,
            reason,
        });
        true
    }

    /// Start-delay timer body: flips a still-current session to active.
    pub fn reveal_if_current(&self, user_id: &str, activity: Activity, session_id: u64) -> bool {
        let snapshot = {
            let mut sessions = self.sessions();
            let Some(entry) = sessions.get_mut(&(user_id.to_string(), activity)) else {
                return false;
            };
            if entry.session.session_id != session_id || entry.session.phase != Phase::Starting {
                return false;
            }
            entry.session.phase = Phase::Active;
            entry.reveal_timer = None;
            entry.session.clone()
        };
        self.emit(SessionEvent::Revealed(snapshot));
        true
    }

    fn reschedule_inactivity(&self, key: &SessionKey, entry: &mut Entry) {
        if let Some(handle) = entry.inactivity_timer.take() {
            handle.abort();
        }
        entry.generation += 1;
        entry.inactivity_timer = Some(self.spawn_inactivity(key, entry.session.session_id, entry.generation));
    }

    fn spawn_inactivity(&self, key: &SessionKey, session_id: u64, generation: u64) -> JoinHandle<()> {
        let registry = self.clone();
        let (user_id, activity) = key.clone();
        let delay = self.inner.settings.inactivity;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.expire_if_current(&user_id, activity, session_id, generation);
        })
    }

    fn spawn_reveal(&self, key: &SessionKey, session_id: u64) -> JoinHandle<()> {
        let registry = self.clone();
        let (user_id, activity) = key.clone();
        let delay = self.inner.settings.start_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.reveal_if_current(&user_id, activity, session_id);
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::loot::NORMAL_TIER;
    use tokio::sync::mpsc;

    fn loot(xp: u64) -> LootOutcome {
        LootOutcome {
            tier: NORMAL_TIER,
            items: Vec::new(),
            xp,
        }
    }

    fn registry(clock: Arc<ManualClock>) -> (SessionRegistry, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionRegistry::new(clock, SessionSettings::default(), Some(tx)), rx)
    }

    fn started(outcome: StartOutcome) -> GatheringSession {
        match outcome {
            StartOutcome::Started(session) => session,
            StartOutcome::AlreadyActive { .. } => panic!("expected a new session"),
        }
    }

    #[test]
    fn test_dig_layer_clears_after_two_max_swings() {
        let mut session = GatheringSession {
            session_id: 1,
            user_id: "u".into(),
            activity: Activity::Dig,
            layer: 0,
            health: 10,
            max_health: 10,
            started_at: 0,
            expires_at: 1,
            loot: None,
            pending_loot: Some(loot(7)),
            phase: Phase::Active,
            message: None,
        };
        assert!(session.apply_damage(5, |_| loot(0)).is_none());
        assert_eq!(session.health, 5);
        let awarded = session.apply_damage(5, |layer| loot(u64::try_from(layer).unwrap() * 100));
        assert_eq!(awarded, Some(loot(7)));
        assert_eq!(session.layer, 1);
        assert_eq!((session.health, session.max_health), (10, 10));
        // next layer pre-rolled for layer 1
        assert_eq!(session.pending_loot, Some(loot(100)));
        assert_eq!(session.loot, Some(loot(7)));
    }

    #[test]
    fn test_health_is_monotonic_until_layer_clears() {
        let mut session = GatheringSession {
            session_id: 1,
            user_id: "u".into(),
            activity: Activity::Mine,
            layer: 0,
            health: 10,
            max_health: 10,
            started_at: 0,
            expires_at: 1,
            loot: None,
            pending_loot: None,
            phase: Phase::Active,
            message: None,
        };
        let mut rolled_for = Vec::new();
        for damage in [2, 5, 3, 4, 1, 5, 5, 5, 5, 2, 3, 4] {
            let (layer, health) = (session.layer, session.health);
            let cleared = session.apply_damage(damage, |layer| {
                rolled_for.push(layer);
                loot(0)
            });
            if cleared.is_some() {
                assert_eq!(session.layer, layer + 1);
                assert_eq!(session.health, Activity::Mine.max_health(layer + 1));
            } else {
                assert_eq!(session.layer, layer);
                assert!(session.health < health);
                assert!(session.health > 0);
            }
        }
        // first clear rolls the missing loot for layer 0, then pre-rolls layer 1
        assert_eq!(&rolled_for[..2], &[0, 1]);
    }

    #[tokio::test]
    async fn test_start_is_exclusive_until_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (registry, _rx) = registry(Arc::clone(&clock));

        let first = started(registry.start("u", Activity::Dig, None, None));
        assert_eq!(first.expires_at, 1_000 + 300_000);
        assert_eq!(
            registry.start("u", Activity::Dig, None, None),
            StartOutcome::AlreadyActive { expires_at: first.expires_at }
        );
        // other activity is independent
        assert!(matches!(registry.start("u", Activity::Mine, None, None), StartOutcome::Started(_)));

        clock.advance(300_000);
        let second = started(registry.start("u", Activity::Dig, None, None));
        assert_ne!(second.session_id, first.session_id);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_action_after_expiry_discards_session() {
        let clock = Arc::new(ManualClock::new(0));
        let (registry, _rx) = registry(Arc::clone(&clock));
        registry.start("u", Activity::Mine, None, None);

        assert!(registry.with_live("u", Activity::Mine, |s| s.layer).is_some());
        clock.advance(300_000);
        assert!(registry.with_live("u", Activity::Mine, |s| s.layer).is_none());
        assert!(registry.get("u", Activity::Mine).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_ends_session_and_emits_event() {
        let clock = Arc::new(ManualClock::new(0));
        let (registry, mut rx) = registry(Arc::clone(&clock));
        let message = Some(MessageRef { channel_id: 1, message_id: 2 });
        registry.start("u", Activity::Dig, message, None);

        tokio::time::sleep(Duration::from_secs(3) + Duration::from_millis(10)).await;
        assert!(matches!(rx.recv().await, Some(SessionEvent::Revealed(s)) if s.phase == Phase::Active));

        tokio::time::sleep(Duration::from_secs(28)).await;
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Ended {
                user_id: "u".into(),
                activity: Activity::Dig,
                message,
                reason: EndReason::Inactive,
            })
        );
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_reset_inactivity_window() {
        let clock = Arc::new(ManualClock::new(0));
        let (registry, mut rx) = registry(Arc::clone(&clock));
        registry.start("u", Activity::Dig, None, None);

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(20)).await;
            assert!(registry.touch("u", Activity::Dig));
        }
        assert!(registry.get("u", Activity::Dig).is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(registry.get("u", Activity::Dig).is_none());
        // reveal, then exactly one end
        assert!(matches!(rx.recv().await, Some(SessionEvent::Revealed(_))));
        assert!(matches!(rx.recv().await, Some(SessionEvent::Ended { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timers() {
        let clock = Arc::new(ManualClock::new(0));
        let (registry, mut rx) = registry(Arc::clone(&clock));
        registry.start("u", Activity::Mine, None, None);
        assert!(registry.destroy("u", Activity::Mine));
        assert!(!registry.destroy("u", Activity::Mine));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_timer_does_not_touch_replacement() {
        let clock = Arc::new(ManualClock::new(0));
        let (registry, _rx) = registry(Arc::clone(&clock));
        let old = started(registry.start("u", Activity::Dig, None, None));
        registry.destroy("u", Activity::Dig);
        let new = started(registry.start("u", Activity::Dig, None, None));

        assert!(!registry.expire_if_current("u", Activity::Dig, old.session_id, 0));
        assert!(!registry.reveal_if_current("u", Activity::Dig, old.session_id));
        // an older generation of the live session is stale too
        registry.touch("u", Activity::Dig);
        assert!(!registry.expire_if_current("u", Activity::Dig, new.session_id, 0));
        assert!(registry.get("u", Activity::Dig).is_some());
        assert!(registry.expire_if_current("u", Activity::Dig, new.session_id, 1));
    }
}
