//! Channel giveaways with a claim window per winner.
//!
//! Giveaways are in-memory only. Each one moves `Open -> PendingClaim ->
//! Finished`; a winner who does not claim in time is skipped and the next
//! shuffled entrant gets the claim.

use crate::{
    core::{
        clock::Clock,
        random::RandomSource,
        session::MessageRef,
    },
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Claim window used when none is given.
pub const DEFAULT_CLAIM_WINDOW_MS: i64 = 5 * 60 * 1000;
/// Longest claim window.
pub const MAX_CLAIM_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
/// Most winners per giveaway.
pub const MAX_WINNERS: u32 = 5;

const END_TIME_FORMAT_HINT: &str = "Please provide a future end time in the format DD/MM/YYYY HH:MM UTC+n.";

/// Parses `"DD/MM/YYYY HH:MM UTC±H"` into ms since epoch.
pub fn parse_end_time(input: &str) -> Result<i64> {
    let invalid = || Error::InvalidInput {
        message: END_TIME_FORMAT_HINT.to_string(),
    };
    let (local, zone) = input.trim().rsplit_once(' ').ok_or_else(invalid)?;
    let offset = zone
        .get(..3)
        .filter(|prefix| prefix.eq_ignore_ascii_case("utc"))
        .and_then(|_| zone.get(3..))
        .filter(|offset| offset.starts_with(['+', '-']) && (2..=3).contains(&offset.len()))
        .and_then(|offset| offset.parse::<i64>().ok())
        .ok_or_else(invalid)?;
    let local = NaiveDateTime::parse_from_str(local.trim(), "%d/%m/%Y %H:%M").map_err(|_| invalid())?;
    Ok(local.and_utc().timestamp_millis() - offset * 60 * 60 * 1000)
}

/// Parses a claim window such as `"30s"`, `"5m"`, `"2h"` or `"1d"`, capped at one day.
pub fn parse_claim_window(input: &str) -> Result<i64> {
    let input = input.trim().to_lowercase();
    let invalid = || Error::InvalidInput {
        message: "Claim time must look like 30s, 5m, 2h or 1d.".to_string(),
    };
    let unit = input.chars().last().ok_or_else(invalid)?;
    let unit_ms: i64 = match unit {
        's' => 1000,
        'm' => 60 * 1000,
        'h' => 60 * 60 * 1000,
        'd' => MAX_CLAIM_WINDOW_MS,
        _ => return Err(invalid()),
    };
    let digits = &input[..input.len() - 1];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: i64 = digits.parse().map_err(|_| invalid())?;
    Ok(value.saturating_mul(unit_ms).min(MAX_CLAIM_WINDOW_MS))
}

/// Raw setup input as typed by the creator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiveawayRequest {
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// End time, `DD/MM/YYYY HH:MM UTC±H`
    pub end_time: String,
    /// Claim window, e.g. `5m`
    pub claim_time: Option<String>,
    /// Number of winners
    pub winners: i64,
    /// Free-form requirement text
    pub requirements: Option<String>,
    /// Channel the giveaway runs in
    pub channel_id: u64,
    /// Creating user
    pub creator_id: String,
}

/// Validated giveaway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiveawayConfig {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// End time, ms since epoch
    pub ends_at: i64,
    /// End time as typed
    pub end_display: String,
    /// Claim window, ms
    pub claim_window_ms: i64,
    /// Claim window as typed
    pub claim_display: String,
    /// Number of winners
    pub winner_count: u32,
    /// Requirement text
    pub requirements: String,
    /// Channel the giveaway runs in
    pub channel_id: u64,
    /// Creating user
    pub creator_id: String,
}

impl GiveawayConfig {
    /// Validates a request. Nothing is created when this fails.
    pub fn parse(request: GiveawayRequest, now_ms: i64) -> Result<Self> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput {
                message: "A giveaway needs a title.".to_string(),
            });
        }
        let ends_at = parse_end_time(&request.end_time)?;
        if ends_at <= now_ms {
            return Err(Error::InvalidInput {
                message: END_TIME_FORMAT_HINT.to_string(),
            });
        }
        let winner_count = u32::try_from(request.winners)
            .ok()
            .filter(|count| (1..=MAX_WINNERS).contains(count))
            .ok_or_else(|| Error::InvalidInput {
                message: format!("Amount of winners must be a number between 1 and {MAX_WINNERS}."),
            })?;
        let (claim_window_ms, claim_display) = match request.claim_time.as_deref().map(str::trim) {
            Some(input) if !input.is_empty() => (parse_claim_window(input)?, input.to_string()),
            _ => (DEFAULT_CLAIM_WINDOW_MS, "5m".to_string()),
        };
        let non_empty = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            title,
            description: non_empty(request.description).unwrap_or_else(|| "No description provided.".to_string()),
            thumbnail: non_empty(request.thumbnail),
            ends_at,
            end_display: request.end_time.trim().to_string(),
            claim_window_ms,
            claim_display,
            winner_count,
            requirements: non_empty(request.requirements).unwrap_or_else(|| "None".to_string()),
            channel_id: request.channel_id,
            creator_id: request.creator_id,
        })
    }
}

/// How a giveaway ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Nobody entered
    NoEntries,
    /// The winner claimed
    Claimed(String),
    /// Every drawn winner let the window pass
    Unclaimed,
}

/// Giveaway lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveawayPhase {
    /// Accepting entries
    Open,
    /// Waiting for `user_id` to claim
    PendingClaim {
        /// Current winner
        user_id: String,
        /// Claim deadline, ms since epoch
        deadline: i64,
        /// Winners still in line
        remaining: Vec<String>,
        /// Channel announcement of this winner
        announcement: Option<MessageRef>,
        /// Direct message carrying the claim button
        dm: Option<MessageRef>,
    },
    /// Done
    Finished(FinishReason),
}

/// One giveaway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Giveaway {
    /// Registry id
    pub id: u64,
    /// Settings
    pub config: GiveawayConfig,
    /// Entrants in entry order
    pub entries: Vec<String>,
    /// Winners who let their window pass
    pub skipped: Vec<String>,
    /// Lifecycle
    pub phase: GiveawayPhase,
    /// Message with the enter button
    pub entry_message: Option<MessageRef>,
    pub(crate) generation: u64,
}

/// Result of pressing enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Added to the entrants
    Entered,
    /// Was already in
    AlreadyEntered,
    /// Giveaway closed or gone
    Closed,
}

/// Result of pressing claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Prize claimed, giveaway finished
    Claimed {
        /// Giveaway after the claim
        giveaway: Giveaway,
        /// Announcement of the winner, for the final edit
        announcement: Option<MessageRef>,
    },
    /// The claim is not (or no longer) this user's
    NotActive,
}

/// Something the bot should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveawayEvent {
    /// Ended without entrants
    NoEntries(Giveaway),
    /// A winner was drawn and has until `deadline` to claim
    WinnerSelected {
        /// Giveaway after the draw
        giveaway: Giveaway,
        /// Winner
        user_id: String,
        /// Claim deadline, ms since epoch
        deadline: i64,
    },
    /// `user_id` let the window pass; a reroll follows
    ClaimExpired {
        /// Giveaway before the reroll
        giveaway: Giveaway,
        /// Skipped winner
        user_id: String,
    },
    /// Nobody claimed
    Unclaimed(Giveaway),
}

/// Fisher-Yates shuffle driven by `rng`.
pub fn shuffle<T>(items: &mut [T], rng: &dyn RandomSource) {
    for i in (1..items.len()).rev() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let j = ((rng.next_f64() * (i + 1) as f64).floor() as usize).min(i);
        items.swap(i, j);
    }
}

struct Slot {
    giveaway: Giveaway,
    timer: Option<JoinHandle<()>>,
}

impl Slot {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct RegistryInner {
    giveaways: Mutex<HashMap<u64, Slot>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    events: Option<UnboundedSender<GiveawayEvent>>,
}

/// Owns every running giveaway and its timers.
#[derive(Clone)]
pub struct GiveawayRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for GiveawayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiveawayRegistry")
            .field("giveaways", &self.len())
            .finish_non_exhaustive()
    }
}

impl GiveawayRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        events: Option<UnboundedSender<GiveawayEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                giveaways: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                clock,
                rng,
                events,
            }),
        }
    }

    fn giveaways(&self) -> MutexGuard<'_, HashMap<u64, Slot>> {
        match self.inner.giveaways.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: GiveawayEvent) {
        if let Some(events) = &self.inner.events {
            let _ = events.send(event);
        }
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Validates `request`, opens the giveaway and schedules its end.
    pub fn create(&self, request: GiveawayRequest) -> Result<Giveaway> {
        let config = GiveawayConfig::parse(request, self.now_ms())?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let giveaway = Giveaway {
            id,
            config,
            entries: Vec::new(),
            skipped: Vec::new(),
            phase: GiveawayPhase::Open,
            entry_message: None,
            generation: 1,
        };
        let timer = self.spawn_end(id, giveaway.generation, giveaway.config.ends_at);
        self.giveaways().insert(
            id,
            Slot {
                giveaway: giveaway.clone(),
                timer: Some(timer),
            },
        );
        info!(id, title = %giveaway.config.title, "Giveaway opened");
        Ok(giveaway)
    }

    /// Snapshot of a giveaway.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Giveaway> {
        self.giveaways().get(&id).map(|slot| slot.giveaway.clone())
    }

    /// Number of unfinished giveaways.
    #[must_use]
    pub fn len(&self) -> usize {
        self.giveaways().len()
    }

    /// Whether no giveaway is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remembers the message carrying the enter button.
    pub fn attach_entry_message(&self, id: u64, message: MessageRef) {
        if let Some(slot) = self.giveaways().get_mut(&id) {
            slot.giveaway.entry_message = Some(message);
        }
    }

    /// Remembers the announcement and DM sent for the current winner.
    /// Ignored when `user_id` is no longer the pending winner.
    pub fn attach_winner_messages(
        &self,
        id: u64,
        user_id: &str,
        announcement_ref: Option<MessageRef>,
        dm_ref: Option<MessageRef>,
    ) {
        let mut giveaways = self.giveaways();
        let Some(slot) = giveaways.get_mut(&id) else {
            return;
        };
        if let GiveawayPhase::PendingClaim {
            user_id: winner,
            announcement,
            dm,
            ..
        } = &mut slot.giveaway.phase
        {
            if winner == user_id {
                *announcement = announcement_ref;
                *dm = dm_ref;
            }
        }
    }

    /// Adds `user_id` to an open giveaway.
    pub fn enter(&self, id: u64, user_id: &str) -> EnterOutcome {
        let mut giveaways = self.giveaways();
        let Some(slot) = giveaways.get_mut(&id) else {
            return EnterOutcome::Closed;
        };
        if slot.giveaway.phase != GiveawayPhase::Open {
            return EnterOutcome::Closed;
        }
        if slot.giveaway.entries.iter().any(|entry| entry == user_id) {
            return EnterOutcome::AlreadyEntered;
        }
        slot.giveaway.entries.push(user_id.to_string());
        EnterOutcome::Entered
    }

    /// Claims the prize for the pending winner.
    pub fn claim(&self, id: u64, user_id: &str) -> ClaimOutcome {
        let mut giveaways = self.giveaways();
        let pending = giveaways.get(&id).is_some_and(|slot| {
            matches!(&slot.giveaway.phase, GiveawayPhase::PendingClaim { user_id: winner, .. } if winner == user_id)
        });
        if !pending {
            return ClaimOutcome::NotActive;
        }
        let Some(mut slot) = giveaways.remove(&id) else {
            return ClaimOutcome::NotActive;
        };
        slot.cancel_timer();
        let announcement = match &slot.giveaway.phase {
            GiveawayPhase::PendingClaim { announcement, .. } => *announcement,
            _ => None,
        };
        slot.giveaway.phase = GiveawayPhase::Finished(FinishReason::Claimed(user_id.to_string()));
        info!(id, user_id, "Giveaway claimed");
        ClaimOutcome::Claimed {
            giveaway: slot.giveaway,
            announcement,
        }
    }

    /// Closes entries and draws winners. Called by the end timer.
    ///
    /// Returns `false` when the giveaway is gone or already past this stage.
    pub fn close(&self, id: u64, generation: u64) -> bool {
        let mut giveaways = self.giveaways();
        let Some(slot) = giveaways.get_mut(&id) else {
            return false;
        };
        if slot.giveaway.generation != generation || slot.giveaway.phase != GiveawayPhase::Open {
            return false;
        }
        slot.timer = None;

        if slot.giveaway.entries.is_empty() {
            if let Some(mut slot) = giveaways.remove(&id) {
                slot.giveaway.phase = GiveawayPhase::Finished(FinishReason::NoEntries);
                info!(id, "Giveaway ended without entries");
                self.emit(GiveawayEvent::NoEntries(slot.giveaway));
            }
            return true;
        }

        let mut winners = slot.giveaway.entries.clone();
        shuffle(&mut winners, self.inner.rng.as_ref());
        winners.truncate(slot.giveaway.config.winner_count as usize);
        self.next_winner(&mut giveaways, id, winners);
        true
    }

    /// Skips a winner whose claim window passed. Called by the claim timer.
    pub fn expire_claim(&self, id: u64, generation: u64) -> bool {
        let mut giveaways = self.giveaways();
        let Some(slot) = giveaways.get_mut(&id) else {
            return false;
        };
        if slot.giveaway.generation != generation {
            return false;
        }
        let GiveawayPhase::PendingClaim {
            user_id, remaining, ..
        } = slot.giveaway.phase.clone()
        else {
            return false;
        };
        slot.timer = None;
        let snapshot = slot.giveaway.clone();
        slot.giveaway.skipped.push(user_id.clone());
        warn!(id, user_id = %user_id, "Giveaway winner did not claim in time");
        self.emit(GiveawayEvent::ClaimExpired {
            giveaway: snapshot,
            user_id,
        });
        self.next_winner(&mut giveaways, id, remaining);
        true
    }

    fn next_winner(&self, giveaways: &mut HashMap<u64, Slot>, id: u64, mut remaining: Vec<String>) {
        if remaining.is_empty() {
            if let Some(mut slot) = giveaways.remove(&id) {
                slot.cancel_timer();
                slot.giveaway.phase = GiveawayPhase::Finished(FinishReason::Unclaimed);
                info!(id, "Giveaway ended unclaimed");
                self.emit(GiveawayEvent::Unclaimed(slot.giveaway));
            }
            return;
        }
        let Some(slot) = giveaways.get_mut(&id) else {
            return;
        };
        let user_id = remaining.remove(0);
        let window = slot.giveaway.config.claim_window_ms;
        let deadline = self.now_ms() + window;
        slot.giveaway.generation += 1;
        slot.giveaway.phase = GiveawayPhase::PendingClaim {
            user_id: user_id.clone(),
            deadline,
            remaining,
            announcement: None,
            dm: None,
        };
        slot.cancel_timer();
        slot.timer = Some(self.spawn_claim_timeout(id, slot.giveaway.generation, window));
        self.emit(GiveawayEvent::WinnerSelected {
            giveaway: slot.giveaway.clone(),
            user_id,
            deadline,
        });
    }

    fn spawn_end(&self, id: u64, generation: u64, ends_at: i64) -> JoinHandle<()> {
        #[allow(clippy::cast_sign_loss)]
        let delay = Duration::from_millis((ends_at - self.now_ms()).max(0) as u64);
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.close(id, generation);
        })
    }

    fn spawn_claim_timeout(&self, id: u64, generation: u64, window_ms: i64) -> JoinHandle<()> {
        #[allow(clippy::cast_sign_loss)]
        let delay = Duration::from_millis(window_ms.max(0) as u64);
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.expire_claim(id, generation);
        })
    }

    /// Current timer generation of a giveaway, used by tests driving timers by hand.
    #[cfg(test)]
    fn generation(&self, id: u64) -> u64 {
        self.giveaways().get(&id).map_or(0, |slot| slot.giveaway.generation)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::random::FixedRandom;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn request(winners: i64) -> GiveawayRequest {
        GiveawayRequest {
            title: "Shiny pickaxe".to_string(),
            end_time: "05/11/2026 10:10 UTC+7".to_string(),
            claim_time: Some("1m".to_string()),
            winners,
            channel_id: 9,
            creator_id: "host".to_string(),
            ..GiveawayRequest::default()
        }
    }

    fn registry() -> (GiveawayRegistry, UnboundedReceiver<GiveawayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ends_at = parse_end_time("05/11/2026 10:10 UTC+7").unwrap();
        let clock = Arc::new(ManualClock::new(ends_at - 10_000));
        (GiveawayRegistry::new(clock, Arc::new(FixedRandom(0.0)), Some(tx)), rx)
    }

    #[test]
    fn test_parse_end_time_applies_offset() {
        let expected = Utc.with_ymd_and_hms(2026, 11, 5, 3, 10, 0).unwrap().timestamp_millis();
        assert_eq!(parse_end_time("05/11/2026 10:10 UTC+7").unwrap(), expected);
        let expected = Utc.with_ymd_and_hms(2026, 11, 5, 13, 10, 0).unwrap().timestamp_millis();
        assert_eq!(parse_end_time("05/11/2026 10:10 utc-3").unwrap(), expected);
    }

    #[test]
    fn test_parse_end_time_rejects_malformed_input() {
        for input in ["05/11/2026 10:10", "2026-11-05 10:10 UTC+7", "31/02/2026 10:10 UTC+1", "05/11/2026 10:10 UTC7", ""] {
            assert!(parse_end_time(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn test_parse_claim_window_units_and_cap() {
        assert_eq!(parse_claim_window("30s").unwrap(), 30_000);
        assert_eq!(parse_claim_window("5M").unwrap(), 300_000);
        assert_eq!(parse_claim_window("2h").unwrap(), 7_200_000);
        assert_eq!(parse_claim_window("3d").unwrap(), MAX_CLAIM_WINDOW_MS);
        assert!(parse_claim_window("5x").is_err());
        assert!(parse_claim_window("m").is_err());
    }

    #[test]
    fn test_config_rejects_bad_winner_count_and_past_end() {
        let now = parse_end_time("05/11/2026 10:10 UTC+7").unwrap() - 1;
        assert!(GiveawayConfig::parse(request(0), now).is_err());
        assert!(GiveawayConfig::parse(request(6), now).is_err());
        assert!(GiveawayConfig::parse(request(1), now + 1).is_err());

        let config = GiveawayConfig::parse(request(2), now).unwrap();
        assert_eq!(config.claim_window_ms, 60_000);
        assert_eq!(config.requirements, "None");
        assert_eq!(config.description, "No description provided.");
    }

    #[test]
    fn test_shuffle_with_fixed_draw() {
        let mut items = vec!["a", "b", "c"];
        shuffle(&mut items, &FixedRandom(0.0));
        assert_eq!(items, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_entries_are_unique_and_claim_finishes() {
        let (registry, mut rx) = registry();
        let giveaway = registry.create(request(1)).unwrap();
        assert_eq!(registry.enter(giveaway.id, "a"), EnterOutcome::Entered);
        assert_eq!(registry.enter(giveaway.id, "a"), EnterOutcome::AlreadyEntered);
        assert_eq!(registry.enter(giveaway.id, "b"), EnterOutcome::Entered);

        assert!(registry.close(giveaway.id, registry.generation(giveaway.id)));
        let GiveawayEvent::WinnerSelected { user_id, .. } = rx.recv().await.unwrap() else {
            panic!("expected a winner");
        };
        // [a, b] shuffled with 0.0 becomes [b, a]
        assert_eq!(user_id, "b");
        assert_eq!(registry.enter(giveaway.id, "c"), EnterOutcome::Closed);
        assert_eq!(registry.claim(giveaway.id, "a"), ClaimOutcome::NotActive);

        let posted = MessageRef {
            channel_id: 7,
            message_id: 70,
        };
        registry.attach_winner_messages(giveaway.id, "a", None, None);
        registry.attach_winner_messages(giveaway.id, "b", Some(posted), None);

        let ClaimOutcome::Claimed {
            giveaway: done,
            announcement,
        } = registry.claim(giveaway.id, "b")
        else {
            panic!("winner should be able to claim");
        };
        assert_eq!(announcement, Some(posted));
        assert_eq!(done.phase, GiveawayPhase::Finished(FinishReason::Claimed("b".to_string())));
        assert!(registry.is_empty());
        assert_eq!(registry.claim(giveaway.id, "b"), ClaimOutcome::NotActive);
    }

    #[tokio::test]
    async fn test_stale_close_is_ignored() {
        let (registry, _rx) = registry();
        let giveaway = registry.create(request(1)).unwrap();
        assert!(!registry.close(giveaway.id, 99));
        assert_eq!(registry.get(giveaway.id).unwrap().phase, GiveawayPhase::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_entries_ends_at_end_time() {
        let (registry, mut rx) = registry();
        registry.create(request(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(matches!(rx.recv().await.unwrap(), GiveawayEvent::NoEntries(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclaimed_winners_are_rerolled_until_none_left() {
        let (registry, mut rx) = registry();
        let giveaway = registry.create(request(2)).unwrap();
        registry.enter(giveaway.id, "a");
        registry.enter(giveaway.id, "b");
        registry.enter(giveaway.id, "c");

        tokio::time::sleep(Duration::from_secs(11)).await;
        // [a, b, c] shuffles to [b, c, a]; two winners
        assert!(matches!(rx.recv().await.unwrap(), GiveawayEvent::WinnerSelected { ref user_id, .. } if user_id == "b"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(matches!(rx.recv().await.unwrap(), GiveawayEvent::ClaimExpired { ref user_id, .. } if user_id == "b"));
        assert!(matches!(rx.recv().await.unwrap(), GiveawayEvent::WinnerSelected { ref user_id, .. } if user_id == "c"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(matches!(rx.recv().await.unwrap(), GiveawayEvent::ClaimExpired { ref user_id, .. } if user_id == "c"));
        let GiveawayEvent::Unclaimed(done) = rx.recv().await.unwrap() else {
            panic!("expected the giveaway to end unclaimed");
        };
        assert_eq!(done.skipped, vec!["b".to_string(), "c".to_string()]);
        assert!(registry.is_empty());
    }
}
