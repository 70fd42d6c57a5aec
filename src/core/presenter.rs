//! Pure view builders.
//!
//! Each function turns domain state into a [`View`]. Nothing here touches
//! storage or Discord, so every screen can be checked in a unit test.

use crate::core::{
    activity::Activity,
    catalog::{Catalog, FIST_ID, Item, ItemKind, Rarity},
    custom_id::{self, ComponentId},
    gathering::EquipSlot,
    generator::{GeneratorSettings, GeneratorState, RunStatus},
    giveaway::Giveaway,
    inventory::{InventoryEntry, PlayerProfile},
    item_upgrade::{Blocker, ITEM_UPGRADE_MAX_SLOTS, ItemUpgrade, UpgradeCost, UpgradePage, find_upgrade},
    market::{MarketLine, ShopListing, sell_price, totals},
    pets::{BattlePet, DEFAULT_TARGET, PetProfile, TEAM_SLOTS, battle_pets},
    progression::{ResourceProfile, progress_bar},
    session::GatheringSession,
    view::{Button, ButtonStyle, Select, SelectOption, View},
    wallet::{Currency, WalletStats},
};

/// Home and stat screens of both activities.
pub const HOME_THUMBNAIL: &str = "https://i.ibb.co/XkkgMzh5/SBDig.png";
const DIG_LAYER_THUMBNAIL: &str = "https://cdn.discordapp.com/emojis/1453258150697500702.png?size=240&quality=lossless";
const MINE_LAYER_THUMBNAIL: &str = "https://cdn.discordapp.com/emojis/1456946445818007657.png?size=240&quality=lossless";
const GENERATOR_THUMBNAIL: &str = "https://cdn.discordapp.com/emojis/1474305835474747515.png";

const GENERATOR_ACCENT: u32 = 0xCD_7F32;
const GIVEAWAY_ACCENT: u32 = 0x00_AA5B;
const ALERT_ACCENT: u32 = 0xFF_0000;
const NEUTRAL_ACCENT: u32 = 0xFF_FFFF;
const CLOSED_ACCENT: u32 = 0x00_0000;

/// Width of health and XP bars.
const BAR_WIDTH: usize = 20;

/// Screens reachable from the activity navigation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringPage {
    /// Start screen
    Home,
    /// Level and XP
    Stats,
    /// Loadout
    Equipment,
}

impl GatheringPage {
    /// Action segment of the navigation button id.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Stats => "stats",
            Self::Equipment => "equipment",
        }
    }
}

/// Prefix of an activity's select menus, e.g. `dig-select`.
#[must_use]
pub fn select_prefix(activity: Activity) -> String {
    format!("{}-select", activity.key())
}

fn action_id(activity: Activity, action: &str, user_id: &str) -> ComponentId {
    ComponentId::new(activity.key(), [action, user_id])
}

fn noun(activity: Activity) -> (&'static str, &'static str) {
    match activity {
        Activity::Dig => ("dig", "digging"),
        Activity::Mine => ("mine", "mining"),
    }
}

const fn layer_thumbnail(activity: Activity) -> &'static str {
    match activity {
        Activity::Dig => DIG_LAYER_THUMBNAIL,
        Activity::Mine => MINE_LAYER_THUMBNAIL,
    }
}

fn swing_button_label(activity: Activity) -> String {
    activity.swing_label().to_uppercase()
}

/// Discord relative timestamp for `ms` since epoch.
#[must_use]
pub fn relative_time(ms: i64) -> String {
    format!("<t:{}:R>", ms.div_euclid(1000))
}

/// `1h 2m 3s` / `2m 3s` countdown for a remaining duration.
#[must_use]
pub fn format_countdown(remaining_ms: i64) -> String {
    let secs = (remaining_ms.max(0) + 999) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else {
        format!("{m}m {s}s")
    }
}

/// Minutes as hours, one decimal unless whole.
#[must_use]
pub fn format_hours(minutes: u32) -> String {
    if minutes % 60 == 0 {
        format!("{}", minutes / 60)
    } else {
        format!("{:.1}", f64::from(minutes) / 60.0)
    }
}

fn nav_buttons(activity: Activity, user_id: &str, current: GatheringPage) -> Vec<Button> {
    let stat_label = format!("{} Stat", activity.swing_label());
    vec![
        Button::new(action_id(activity, "home", user_id), "Back", ButtonStyle::Secondary),
        Button::new(
            action_id(activity, "stats", user_id),
            stat_label,
            if current == GatheringPage::Stats {
                ButtonStyle::Danger
            } else {
                ButtonStyle::Secondary
            },
        )
        .disabled(current == GatheringPage::Stats),
        Button::new(
            action_id(activity, "equipment", user_id),
            "Equipment",
            if current == GatheringPage::Equipment {
                ButtonStyle::Danger
            } else {
                ButtonStyle::Secondary
            },
        )
        .disabled(current == GatheringPage::Equipment),
    ]
}

/// Idle screen with the start button.
#[must_use]
pub fn gathering_home(activity: Activity, user_id: &str) -> View {
    let (_, verb) = noun(activity);
    let title = match activity {
        Activity::Dig => "Digging",
        Activity::Mine => "Mining",
    };
    let label = swing_button_label(activity);
    View::new(activity.accent_color())
        .thumbnail(HOME_THUMBNAIL)
        .text(format!("## {title}\n-# Press {label} to start {verb}..."))
        .separator()
        .buttons(vec![
            Button::new(action_id(activity, "start", user_id), label, ButtonStyle::Danger),
            Button::new(
                action_id(activity, "stats", user_id),
                format!("{} Stat", activity.swing_label()),
                ButtonStyle::Secondary,
            ),
            Button::new(action_id(activity, "equipment", user_id), "Equipment", ButtonStyle::Secondary),
        ])
}

/// Level, XP bar and token count.
#[must_use]
pub fn gathering_stats(activity: Activity, user_id: &str, profile: &ResourceProfile) -> View {
    let name = activity.swing_label();
    let next = profile.next_level_requirement();
    #[allow(clippy::cast_precision_loss)]
    let percent = if next == 0 {
        0.0
    } else {
        profile.xp as f64 / next as f64 * 100.0
    };
    View::new(activity.accent_color())
        .thumbnail(HOME_THUMBNAIL)
        .text(format!(
            "## {name} Stat\n### {name} Level: {}\n-# {} `{} / {next} - {percent:.2}%`\n* {name} Upgrade Tokens: {}",
            profile.level,
            progress_bar(profile.xp, next, BAR_WIDTH),
            profile.xp,
            profile.upgrade_tokens(),
        ))
        .separator()
        .buttons(nav_buttons(activity, user_id, GatheringPage::Stats))
}

fn gear_options(activity: Activity, player: &PlayerProfile, catalog: &Catalog) -> Vec<SelectOption> {
    let equipped = player.gear_for(catalog, activity.key()).map(|item| item.id);
    let mut options = Vec::new();
    if let Some(fist) = catalog.get(FIST_ID).filter(|fist| fist.supports(activity.key())) {
        options.push(SelectOption::new(fist.name, fist.id, equipped.is_none()));
    }
    for stack in &player.gear_inventory {
        let Some(item) = catalog.get(&stack.id) else {
            continue;
        };
        if item.id != FIST_ID && item.supports(activity.key()) && stack.amount > 0 {
            options.push(SelectOption::new(item.name, item.id, equipped == Some(item.id)));
        }
    }
    if options.is_empty() {
        let label = match activity {
            Activity::Dig => "No digging gear available",
            Activity::Mine => "No mining gear available",
        };
        options.push(SelectOption::new(label, "none", true));
    }
    options.truncate(25);
    options
}

fn misc_options(activity: Activity, player: &PlayerProfile, catalog: &Catalog) -> Vec<SelectOption> {
    let mut options: Vec<SelectOption> = player
        .misc_inventory
        .iter()
        .filter_map(|stack| catalog.get(&stack.id))
        .filter(|item| item.supports(activity.key()))
        .map(|item| {
            SelectOption::new(
                item.name,
                item.id,
                player.misc_equipped.as_deref() == Some(item.id),
            )
        })
        .collect();
    if options.is_empty() {
        options.push(SelectOption::new("No misc available", "none", true));
    }
    options.truncate(25);
    options
}

/// Loadout screen with gear and misc selects.
#[must_use]
pub fn gathering_equipment(activity: Activity, user_id: &str, player: &PlayerProfile, catalog: &Catalog) -> View {
    let (_, verb) = noun(activity);
    let name = activity.swing_label();
    let gear = player.gear_for(catalog, activity.key()).map_or_else(
        || {
            catalog
                .get(FIST_ID)
                .filter(|fist| fist.supports(activity.key()))
                .map_or_else(|| "None".to_string(), Item::label)
        },
        Item::label,
    );
    let misc = player
        .misc_equipped
        .as_deref()
        .and_then(|id| catalog.get(id))
        .map_or_else(|| "None".to_string(), Item::label);

    let select = |slot: EquipSlot, placeholder: String, options: Vec<SelectOption>| {
        Select::single(
            ComponentId::new(&select_prefix(activity), [slot.key(), user_id]),
            placeholder,
            options,
        )
    };

    View::new(activity.accent_color())
        .thumbnail(HOME_THUMBNAIL)
        .text(format!(
            "## {name} Equipment\n### * Gear equipped: {gear}\n### * Misc equipped: {misc}"
        ))
        .separator()
        .text(format!(
            "### Selection Panel\n- Choose gear and misc options below to update your {verb} loadout."
        ))
        .select(select(EquipSlot::Gear, gear, gear_options(activity, player, catalog)))
        .select(select(
            EquipSlot::Misc,
            if misc == "None" { "No Misc equipped".to_string() } else { misc },
            misc_options(activity, player, catalog),
        ))
        .buttons(nav_buttons(activity, user_id, GatheringPage::Equipment))
}

/// Short screen shown while a session starts.
#[must_use]
pub fn gathering_starting(activity: Activity) -> View {
    let text = match activity {
        Activity::Dig => "You are going for a dig...",
        Activity::Mine => "You are preparing to mine...",
    };
    View::new(activity.accent_color())
        .thumbnail(layer_thumbnail(activity))
        .text(text)
}

/// In-progress screen: layer, health, reset time and last loot.
#[must_use]
pub fn gathering_active(session: &GatheringSession, catalog: &Catalog) -> View {
    let activity = session.activity;
    let (_, verb) = noun(activity);
    let mut lines = vec![
        format!("## You are {verb} - Layer {}", session.layer),
        format!(
            "-# {} - {}",
            progress_bar(
                u64::try_from(session.health).unwrap_or(0),
                u64::try_from(session.max_health).unwrap_or(0),
                BAR_WIDTH
            ),
            session.health
        ),
        format!("-# Reset {}", relative_time(session.expires_at)),
    ];
    if let Some(loot) = session.loot.as_ref().filter(|loot| !loot.items.is_empty()) {
        lines.push(format!("-# You earned these items from layer {}:", session.layer - 1));
        for entry in &loot.items {
            let label = catalog
                .get(entry.item_id)
                .map_or_else(|| "Unknown".to_string(), Item::label);
            lines.push(format!("-# {label} x{}", entry.amount));
        }
    }

    let stop_label = match activity {
        Activity::Dig => "Stop dig".to_string(),
        Activity::Mine => "Stop mining".to_string(),
    };
    View::new(activity.accent_color())
        .thumbnail(layer_thumbnail(activity))
        .text(lines.join("\n"))
        .separator()
        .buttons(vec![
            Button::new(
                action_id(activity, "swing", &session.user_id),
                swing_button_label(activity),
                ButtonStyle::Success,
            ),
            Button::new(action_id(activity, "stop", &session.user_id), stop_label, ButtonStyle::Secondary),
            Button::new(action_id(activity, "misc", &session.user_id), "Use Misc", ButtonStyle::Secondary)
                .disabled(true),
        ])
}

/// Rejection when a session is already running.
#[must_use]
pub fn already_active(activity: Activity) -> String {
    let (short, _) = noun(activity);
    format!("You already have an active {short}. Please finish it or wait for it to end before starting another.")
}

/// Rejection for someone else's buttons.
#[must_use]
pub fn not_your_session(activity: Activity) -> String {
    let (short, _) = noun(activity);
    format!("This isn't your {short} session.")
}

fn inventory_line(entry: &InventoryEntry) -> String {
    let title = format!("* ×{} {} {}", entry.amount, entry.name, entry.emoji);
    format!(
        "{}\n-# Rarity: {}\n-# Item type: {}",
        title.trim(),
        entry.rarity,
        entry.kind.label()
    )
}

/// Comma-separated kind keys, empty for "all kinds".
#[must_use]
pub fn encode_kinds(kinds: &[ItemKind]) -> String {
    kinds.iter().map(|kind| kind.key()).collect::<Vec<_>>().join(",")
}

/// Inverse of [`encode_kinds`]; unknown keys are ignored.
#[must_use]
pub fn decode_kinds(raw: &str) -> Vec<ItemKind> {
    raw.split(',').filter_map(ItemKind::from_key).collect()
}

/// One page of the inventory with type and page selects.
#[must_use]
pub fn inventory(
    user_id: &str,
    username: &str,
    player: &PlayerProfile,
    catalog: &Catalog,
    kinds: &[ItemKind],
    page: usize,
) -> View {
    let listing = player.page(catalog, kinds, page);
    let list_text = if listing.entries.is_empty() {
        "No items found for this page.".to_string()
    } else {
        listing
            .entries
            .iter()
            .map(inventory_line)
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let type_options = ItemKind::ALL
        .into_iter()
        .map(|kind| SelectOption::new(kind.label(), kind.key(), kinds.contains(&kind)))
        .collect();
    let type_select = Select {
        custom_id: ComponentId::new(custom_id::INVENTORY, ["type", user_id]).to_string(),
        placeholder: "Sort item type".to_string(),
        options: type_options,
        min_values: 0,
        max_values: u8::try_from(ItemKind::ALL.len()).unwrap_or(u8::MAX),
        disabled: false,
    };
    let page_options = (1..=listing.total_pages.min(25))
        .map(|n| SelectOption::new(format!("Page {n}"), n.to_string(), n == listing.page))
        .collect();
    let page_select = Select::single(
        ComponentId::new(custom_id::INVENTORY, ["page", &encode_kinds(kinds), user_id]),
        format!("Page {}", listing.page),
        page_options,
    );

    View::new(NEUTRAL_ACCENT)
        .text(format!(
            "### {username} inventory\n-# capacity: {} / {}\n-# T.Inventory Value: {}",
            listing.distinct_items, player.inventory_capacity, listing.total_value
        ))
        .separator()
        .text(list_text)
        .separator()
        .select(type_select)
        .select(page_select)
}

/// Catalog entry details.
#[must_use]
pub fn item_info(item: &Item) -> View {
    let mut lines = vec![
        format!("## {}", item.label()),
        format!("-# Rarity: {}", item.rarity),
        format!("-# Item type: {}", item.kind.label()),
        format!("-# Sell value: {} {}", item.sell_value, Currency::Coins.emoji()),
    ];
    if let Some(gear) = item.gear {
        lines.push(format!("-# Power: {} (+{} per level)", gear.power, gear.power_per_level));
    }
    if !item.activity_tags.is_empty() {
        lines.push(format!("-# Used for: {}", item.activity_tags.join(", ")));
    }
    lines.push(format!("-# ID: `{}`", item.id));
    View::new(NEUTRAL_ACCENT).text(lines.join("\n"))
}

/// Balances of every currency.
#[must_use]
pub fn wallet(username: &str, stats: &WalletStats) -> View {
    let mut text = format!("### {username} Wallet");
    for currency in Currency::ALL {
        text.push_str(&format!("\n## {} {}", currency.emoji(), stats.balance(currency)));
    }
    text.push_str(&format!("\n-# Wallet level {}", stats.level));
    View::new(NEUTRAL_ACCENT).text(text)
}

fn generator_header(username: &str, state: &GeneratorState) -> Vec<String> {
    vec![
        format!("## {username}'s Generators"),
        format!("### Tier {} - Bronze Coin Generation:", state.tier),
    ]
}

fn generator_upgrade_button(user_id: &str) -> Button {
    Button::new(ComponentId::new("generator-upgrade", [user_id]), "Upgrades", ButtonStyle::Secondary).disabled(true)
}

/// Generator screen for the current state: setup, running or done.
#[must_use]
pub fn generator(
    user_id: &str,
    username: &str,
    channel_id: Option<u64>,
    state: &GeneratorState,
    settings: &GeneratorSettings,
    now_ms: i64,
) -> View {
    let coin = Currency::Coins.emoji();
    let mut lines = generator_header(username, state);
    let view = View::new(GENERATOR_ACCENT).thumbnail(GENERATOR_THUMBNAIL);

    match &state.run {
        Some(run) if run.status == RunStatus::Running => {
            lines.push(format!(
                "* Generating {} {coin} / m [×{}]",
                settings.rate_per_minute, run.total_multiplier
            ));
            if let Some(channel) = run.channel_id {
                lines.push(format!("* Location: <#{channel}> - ×{}", state.location_multiplier));
            }
            lines.push(format!(
                "* Time left: {} ({})",
                format_countdown(run.ends_at - now_ms),
                relative_time(run.ends_at)
            ));
            view.text(lines.join("\n")).separator().buttons(vec![
                Button::new(
                    ComponentId::new(custom_id::GENERATOR_STOP, [user_id]),
                    "Stop generate",
                    ButtonStyle::Danger,
                ),
                generator_upgrade_button(user_id),
            ])
        }
        Some(run) => {
            lines.push(format!(
                "* Your generators has generated {} {coin} after {}h.",
                run.generated_amount,
                format_hours(run.duration_minutes)
            ));
            view.text(lines.join("\n")).separator().buttons(vec![
                Button::new(
                    ComponentId::new(custom_id::GENERATOR_CLAIM, [user_id]),
                    "CLAIM",
                    ButtonStyle::Success,
                ),
                generator_upgrade_button(user_id),
            ])
        }
        None => {
            let cooldown_minutes = u32::try_from(settings.cooldown.as_secs() / 60).unwrap_or(u32::MAX);
            lines.push(format!("* Generating {} / m", settings.rate_per_minute));
            lines.push(format!("* Cooldown: {}h", format_hours(cooldown_minutes)));
            lines.push(format!(
                "* Time: {}",
                state
                    .pending_duration_minutes
                    .map_or_else(|| "?".to_string(), |m| format!("{}h", format_hours(m)))
            ));
            if let Some(channel) = channel_id {
                lines.push(format!("* Location: <#{channel}> - ×{}", state.location_multiplier));
            }
            let on_cooldown = state.on_cooldown(now_ms);
            if on_cooldown {
                lines.push(format!("-# Cooling down, ready {}", relative_time(state.cooldown_ends_at)));
            }
            let label = if state.pending_duration_minutes.is_some() {
                "Start"
            } else {
                "Set-up"
            };
            view.text(lines.join("\n"))
                .separator()
                .text("### Ingredients need:\n* N/A")
                .separator()
                .buttons(vec![
                    Button::new(
                        ComponentId::new(custom_id::GENERATOR_START, [user_id]),
                        label,
                        ButtonStyle::Success,
                    )
                    .disabled(on_cooldown),
                    generator_upgrade_button(user_id),
                ])
        }
    }
}

/// Confirmation before stopping a generator early.
#[must_use]
pub fn generator_stop_confirm(user_id: &str) -> View {
    View::new(ALERT_ACCENT)
        .text(
            "Are you sure you wanna **STOP** generating?\n-# This will cause the cooldown to activate later, and you'll only earn the base amount based on the time elapsed.",
        )
        .separator()
        .buttons(vec![
            Button::new(ComponentId::new(custom_id::GENERATOR_STOP_YES, [user_id]), "yes", ButtonStyle::Danger),
            Button::new(ComponentId::new(custom_id::GENERATOR_STOP_NO, [user_id]), "no", ButtonStyle::Secondary),
        ])
}

/// Public giveaway card with the enter button.
#[must_use]
pub fn giveaway_entry(giveaway: &Giveaway) -> View {
    let config = &giveaway.config;
    let mut view = View::new(GIVEAWAY_ACCENT).text(format!(
        "## `{}`\n-# * Giveaway ends `{}`\n-# * Claim time `{}`\n-# * Winner amount `{}`\n-# * Requirement: `{}`",
        config.title, config.end_display, config.claim_display, config.winner_count, config.requirements
    ));
    if let Some(thumbnail) = &config.thumbnail {
        view = view.thumbnail(thumbnail.clone());
    }
    view.text(format!("`{}`", config.description)).buttons(vec![Button::new(
        ComponentId::new(custom_id::GIVEAWAY_ENTER, [giveaway.id.to_string()]),
        "Enter",
        ButtonStyle::Success,
    )])
}

/// Giveaway card after entries closed.
#[must_use]
pub fn giveaway_closed(giveaway: &Giveaway) -> View {
    let config = &giveaway.config;
    View::new(CLOSED_ACCENT).text(format!(
        "## `{}`\n-# Entries closed - {} entered",
        config.title,
        giveaway.entries.len()
    ))
}

/// How a winner announcement ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerStatus {
    /// Waiting for the claim
    Claiming,
    /// Claimed in time
    Claimed,
    /// Window passed
    Rerolling,
}

/// Channel announcement of a winner.
#[must_use]
pub fn giveaway_winner(giveaway: &Giveaway, user_id: &str, status: WinnerStatus) -> View {
    let (footer, accent) = match status {
        WinnerStatus::Claiming => ("Claiming...", GIVEAWAY_ACCENT),
        WinnerStatus::Claimed => ("Claimed! Giveaway ends!", GIVEAWAY_ACCENT),
        WinnerStatus::Rerolling => ("Didn't claim, REROLLING...", ALERT_ACCENT),
    };
    View::new(accent).text(format!(
        "### Congrat, **<@{user_id}>** you have won the {}'s Giveaway!\n-# {footer}",
        giveaway.config.title
    ))
}

/// Announcement when nobody entered or claimed.
#[must_use]
pub fn giveaway_no_winner() -> View {
    View::new(CLOSED_ACCENT).text("### No one claimed the giveaway, giveaway ends.")
}

/// Direct message to a drawn winner. `deadline` is only shown while claiming.
#[must_use]
pub fn giveaway_claim_dm(giveaway: &Giveaway, user_id: &str, deadline: i64, status: WinnerStatus) -> View {
    let (label, style, disabled) = match status {
        WinnerStatus::Claiming => ("Claim the prize", ButtonStyle::Success, false),
        WinnerStatus::Claimed => ("Claimed!", ButtonStyle::Success, true),
        WinnerStatus::Rerolling => ("Rerolled, late claim", ButtonStyle::Danger, true),
    };
    let mut text = format!(
        "You have been selected as a winner for **{}**!",
        giveaway.config.title
    );
    if status == WinnerStatus::Claiming {
        text.push_str(&format!("\n\nReroll {}", relative_time(deadline)));
    }
    View::new(GIVEAWAY_ACCENT).text(text).buttons(vec![
        Button::new(
            ComponentId::new(custom_id::GIVEAWAY_CLAIM, [giveaway.id.to_string(), user_id.to_string()]),
            label,
            style,
        )
        .disabled(disabled),
    ])
}

fn upgrade_cost_line(cost: &UpgradeCost) -> String {
    match *cost {
        UpgradeCost::Currency(currency, amount) => format!("* {amount} {}", currency.emoji()),
        UpgradeCost::Tokens(activity, amount) => format!("* {amount} {} Upgrade Tokens", activity.swing_label()),
    }
}

fn upgrade_home_button(user_id: &str) -> Button {
    Button::new(ComponentId::new(custom_id::ITEM_UPGRADE, [user_id]), "Back", ButtonStyle::Secondary)
}

/// Running upgrade slots with claim buttons and the slot picker.
#[must_use]
pub fn item_upgrade_home(user_id: &str, player: &PlayerProfile, now_ms: i64) -> View {
    let mut lines = vec![
        if player.upgrade_slots.is_empty() {
            "## You have no active upgrade.".to_string()
        } else {
            "## Item Upgrade".to_string()
        },
        format!(
            "-# You have used {} / {ITEM_UPGRADE_MAX_SLOTS} upgrade slots",
            player.upgrade_slots.len()
        ),
    ];
    let mut claims = Vec::new();
    for slot in &player.upgrade_slots {
        let name = find_upgrade(&slot.upgrade_key).map_or(slot.upgrade_key.as_str(), |upgrade| upgrade.name);
        if slot.is_ready(now_ms) {
            lines.push(format!("* Slot {}: {name} - ready to claim", slot.slot));
            claims.push(Button::new(
                ComponentId::new(custom_id::ITEM_UPGRADE_CLAIM, [user_id.to_string(), slot.slot.to_string()]),
                "Claim!",
                ButtonStyle::Success,
            ));
        } else {
            lines.push(format!("* Slot {}: {name} - done {}", slot.slot, relative_time(slot.ends_at)));
        }
    }

    let options = (1..=ITEM_UPGRADE_MAX_SLOTS)
        .map(|slot| SelectOption::new(format!("Slot {slot}"), slot.to_string(), false))
        .collect();
    let mut slot_select = Select::single(
        ComponentId::new(custom_id::ITEM_UPGRADE_SLOT, [user_id]),
        "Choose an upgrade slot",
        options,
    );
    slot_select.disabled = u32::try_from(player.upgrade_slots.len()).unwrap_or(u32::MAX) >= ITEM_UPGRADE_MAX_SLOTS;

    let mut view = View::new(NEUTRAL_ACCENT).text(lines.join("\n")).separator();
    if !claims.is_empty() {
        view = view.buttons(claims);
    }
    view.select(slot_select)
}

/// One page of upgrades the player can start in `slot`.
#[must_use]
pub fn item_upgrade_list(user_id: &str, slot: u32, listing: &UpgradePage) -> View {
    let slot_arg = slot.to_string();
    let mut text = format!(
        "## Slot {slot} - Select an item to upgrade\n-# Page {} / {}",
        listing.page, listing.total_pages
    );
    if listing.upgrades.is_empty() {
        text.push_str("\nNo upgrades available.");
    }
    for upgrade in &listing.upgrades {
        let costs: Vec<String> = upgrade.costs.iter().map(upgrade_cost_line).collect();
        text.push_str(&format!("\n### {}\n{}", upgrade.name, costs.join("\n")));
    }

    let mut view = View::new(NEUTRAL_ACCENT).text(text).separator();
    if !listing.upgrades.is_empty() {
        view = view.buttons(
            listing
                .upgrades
                .iter()
                .map(|upgrade| {
                    Button::new(
                        ComponentId::new(custom_id::ITEM_UPGRADE_SELECT, [user_id, slot_arg.as_str(), upgrade.key]),
                        upgrade.name,
                        ButtonStyle::Secondary,
                    )
                })
                .collect(),
        );
    }
    let page_button = |page: usize, label: &str| {
        Button::new(
            ComponentId::new(custom_id::ITEM_UPGRADE_PAGE, [user_id.to_string(), slot_arg.clone(), page.to_string()]),
            label,
            ButtonStyle::Primary,
        )
    };
    view.buttons(vec![
        upgrade_home_button(user_id),
        page_button(listing.page.saturating_sub(1), "Previous").disabled(listing.page <= 1),
        page_button(listing.page + 1, "Next").disabled(listing.page >= listing.total_pages),
    ])
}

/// Cost and confirm button of one upgrade.
#[must_use]
pub fn item_upgrade_detail(user_id: &str, slot: u32, upgrade: &ItemUpgrade, blocker: Option<&Blocker>) -> View {
    let costs: Vec<String> = upgrade.costs.iter().map(upgrade_cost_line).collect();
    let mut text = format!(
        "## You are upgrading {}\nUpgrading cost:\n{}\n-# Takes {}",
        upgrade.name,
        costs.join("\n"),
        format_countdown(upgrade.duration_secs * 1000)
    );
    if let Some(capacity) = upgrade.inventory_capacity {
        text.push_str(&format!("\n-# Inventory capacity becomes {capacity}"));
    }
    if let Some(blocker) = blocker {
        text.push_str(&format!("\n-# {blocker}"));
    }
    let label = match blocker {
        Some(Blocker::MissingRequirement(_)) => "Requirement not met",
        _ => "Upgrade?",
    };
    View::new(NEUTRAL_ACCENT).text(text).separator().buttons(vec![
        Button::new(
            ComponentId::new(
                custom_id::ITEM_UPGRADE_CONFIRM,
                [user_id.to_string(), slot.to_string(), upgrade.key.to_string()],
            ),
            label,
            ButtonStyle::Success,
        )
        .disabled(blocker.is_some()),
        Button::new(
            ComponentId::new(custom_id::ITEM_UPGRADE_PAGE, [user_id.to_string(), slot.to_string(), "1".to_string()]),
            "Back",
            ButtonStyle::Secondary,
        ),
    ])
}

fn market_line(line: &MarketLine) -> String {
    format!(
        "* {} {} • {} • ×{}",
        line.item.emoji, line.item.name, line.item.rarity, line.amount
    )
}

/// The user's sell list with sell and cancel buttons.
#[must_use]
pub fn market(user_id: &str, lines: &[MarketLine]) -> View {
    let (units, coins) = totals(lines);
    let list = if lines.is_empty() {
        "No items in your sell list.\n-# Add items with `/market add`.".to_string()
    } else {
        lines.iter().map(market_line).collect::<Vec<_>>().join("\n")
    };
    View::new(NEUTRAL_ACCENT)
        .text("## The Collector's Market\n-# Wanna sell something?")
        .separator()
        .text(list)
        .separator()
        .text(format!(
            "* Selling: {units} items\n* Total: {coins} {}",
            Currency::Coins.emoji()
        ))
        .buttons(vec![
            Button::new(ComponentId::new(custom_id::MARKET, ["sell", user_id]), "Sell", ButtonStyle::Danger)
                .disabled(lines.is_empty()),
            Button::new(ComponentId::new(custom_id::MARKET, ["cancel", user_id]), "Cancel", ButtonStyle::Secondary),
        ])
}

/// Confirmation before a sale. Carries the market message so it can be
/// refreshed afterwards.
#[must_use]
pub fn market_confirm(user_id: &str, channel_id: u64, message_id: u64) -> View {
    View::new(ALERT_ACCENT)
        .text("### Are you sure you want to sell these items?")
        .buttons(vec![
            Button::new(
                ComponentId::new(
                    custom_id::MARKET,
                    [
                        "confirm".to_string(),
                        channel_id.to_string(),
                        message_id.to_string(),
                        user_id.to_string(),
                    ],
                ),
                "YES",
                ButtonStyle::Danger,
            ),
            Button::new(ComponentId::new(custom_id::MARKET, ["deny", user_id]), "NO", ButtonStyle::Secondary),
        ])
}

/// What a sale paid.
#[must_use]
pub fn market_receipt(lines: &[MarketLine], coins: u64) -> View {
    let sold = lines
        .iter()
        .map(|line| {
            let price = sell_price(&line.item).unwrap_or(0);
            format!(
                "* {} {} ×{} - {} {}",
                line.item.emoji,
                line.item.name,
                line.amount,
                price.saturating_mul(u64::from(line.amount)),
                Currency::Coins.emoji()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    View::new(GIVEAWAY_ACCENT)
        .text(format!("## Selling Receipt\n{sold}"))
        .separator()
        .text(format!("* Earned: {coins} {}", Currency::Coins.emoji()))
}

/// Offers of the Collector's Shop shown per page.
pub const SHOP_PER_PAGE: usize = 5;

/// One page of the Collector's Shop with buy buttons.
#[must_use]
pub fn shop(user_id: &str, listing: &ShopListing, page: usize) -> View {
    let total_pages = listing.offers.len().div_ceil(SHOP_PER_PAGE).max(1);
    let page = page.clamp(1, total_pages);
    let offers: Vec<_> = listing
        .offers
        .iter()
        .skip((page - 1) * SHOP_PER_PAGE)
        .take(SHOP_PER_PAGE)
        .collect();

    let coin = Currency::Coins.emoji();
    let list = if offers.is_empty() {
        "You bought everything in stock. Come back after the restock!".to_string()
    } else {
        offers
            .iter()
            .map(|offer| {
                format!(
                    "* {} {} • {}\n-# {} {coin} • {} left",
                    offer.item.emoji, offer.item.name, offer.item.rarity, offer.price, offer.remaining
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut view = View::new(NEUTRAL_ACCENT)
        .text(format!(
            "## The Collector's Shop\n-# Restock #{} • next restock {}\n-# Page {page} / {total_pages}",
            listing.restock_count,
            relative_time(listing.next_restock_at)
        ))
        .separator()
        .text(list);
    let page_arg = page.to_string();
    if !offers.is_empty() {
        view = view.buttons(
            offers
                .iter()
                .map(|offer| {
                    Button::new(
                        ComponentId::new(custom_id::SHOP_BUY, [offer.item.id, page_arg.as_str(), user_id]),
                        format!("Buy {}", offer.item.name),
                        ButtonStyle::Success,
                    )
                })
                .collect(),
        );
    }
    if total_pages > 1 {
        let page_button = |target: usize, label: &str| {
            Button::new(
                ComponentId::new(custom_id::SHOP_PAGE, [target.to_string(), user_id.to_string()]),
                label,
                ButtonStyle::Primary,
            )
        };
        view = view.buttons(vec![
            page_button(page.saturating_sub(1), "Previous").disabled(page <= 1),
            page_button(page + 1, "Next").disabled(page >= total_pages),
        ]);
    }
    view
}

fn pet_stats(pet: &BattlePet) -> String {
    let skills = pet
        .definition
        .attacks
        .iter()
        .map(|attack| {
            format!(
                "* {}: {} - {} damage ({})",
                attack.name, attack.min_damage, attack.max_damage, attack.kind
            )
        })
        .collect::<Vec<_>>();
    format!(
        "Stat:\n* Health ❤️: {}\n* Damage ⚔️: {} - {} ×{}\n* Skills:\n{}",
        pet.max_health,
        pet.damage.0,
        pet.damage.1,
        pet.hits,
        if skills.is_empty() {
            "- None".to_string()
        } else {
            skills.join("\n")
        }
    )
}

/// Pet collection with rarity filter, pet picker and the selected pet's card.
#[must_use]
pub fn pet_army(
    user_id: &str,
    username: &str,
    profile: &PetProfile,
    rarity: Option<Rarity>,
    selected: Option<&str>,
) -> View {
    let owned = profile.inventory.len();
    let filtered = rarity.map(|rarity| profile.of_rarity(rarity)).unwrap_or_default();
    let chosen = selected
        .and_then(|id| filtered.iter().find(|pet| pet.instance_id == id))
        .and_then(|pet| BattlePet::new(pet, DEFAULT_TARGET).map(|stats| (*pet, stats)));

    let mut view = View::new(NEUTRAL_ACCENT);
    if let Some((pet, stats)) = &chosen {
        let progress = pet.next_level_xp().map_or_else(
            || format!("{} `Max`", progress_bar(1, 1, BAR_WIDTH)),
            |next| {
                #[allow(clippy::cast_precision_loss)]
                let percent = (pet.xp as f64 / next.max(1) as f64 * 100.0).min(100.0);
                format!(
                    "{} `{} / {next} - {percent:.2}%`",
                    progress_bar(pet.xp, next, BAR_WIDTH),
                    pet.xp
                )
            },
        );
        view = view
            .thumbnail(emoji_url(stats.definition.emoji))
            .text(format!(
                "## {username}'s Pet/Army\n-# You have {owned} pet/army\n### {}\n* Lv {}\n-# {progress}",
                stats.definition.name, pet.level
            ))
            .separator()
            .text(pet_stats(stats))
            .separator();
    }

    let team = battle_pets(profile).len();
    let rarity_select = Select::single(
        ComponentId::new(custom_id::PET_ARMY, ["rarity", user_id]),
        "Filter rarity",
        Rarity::ALL
            .into_iter()
            .map(|option| SelectOption::new(option.to_string(), option.to_string(), Some(option) == rarity))
            .collect(),
    );
    let rarity_arg = rarity.map_or_else(|| "none".to_string(), |rarity| rarity.to_string());
    let mut pet_select = Select::single(
        ComponentId::new(custom_id::PET_ARMY, ["pet", rarity_arg.as_str(), user_id]),
        if rarity.is_none() {
            "Filter Rarity first"
        } else if filtered.is_empty() {
            "You don't have any"
        } else {
            "Choose an army/pet"
        },
        if filtered.is_empty() {
            vec![SelectOption::new("You don't have any", "none", true)]
        } else {
            filtered
                .iter()
                .take(25)
                .map(|pet| {
                    let name = pet.definition().map_or(pet.id.as_str(), |def| def.name);
                    SelectOption::new(
                        format!("{name} (Lv {})", pet.level),
                        pet.instance_id.clone(),
                        Some(pet.instance_id.as_str()) == selected,
                    )
                })
                .collect()
        },
    );
    pet_select.disabled = filtered.is_empty();

    view = view
        .text(format!(
            "## {username}'s Pet/Army\n-# You have {owned} pet/army.\n-# Team: {team} / {}",
            TEAM_SLOTS
        ))
        .select(rarity_select)
        .select(pet_select);
    if let Some((pet, _)) = chosen {
        view = view.buttons(vec![Button::new(
            ComponentId::new(custom_id::PET_ARMY, ["action", pet.instance_id.as_str(), user_id]),
            "Choose action",
            ButtonStyle::Success,
        )]);
    }
    view
}

fn emoji_url(emoji: &str) -> String {
    let id: String = emoji
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    format!("https://cdn.discordapp.com/emojis/{id}.png")
}

/// Actions available on a pet.
pub const PET_ACTIONS: [&str; 2] = ["Feed", "Promote"];

/// Action picker for a selected pet.
#[must_use]
pub fn pet_action_prompt(user_id: &str) -> View {
    View::new(NEUTRAL_ACCENT).text("Choose an action").select(Select::single(
        ComponentId::new(custom_id::PET_ARMY, ["do", user_id]),
        "Actions",
        PET_ACTIONS
            .into_iter()
            .map(|action| SelectOption::new(action, action, false))
            .collect(),
    ))
}

/// Item picker for a pet action. No feeding or promotion items exist yet, so
/// the picker is always empty.
#[must_use]
pub fn pet_action_detail(user_id: &str, action: &str) -> View {
    let title = if action == "Promote" { "## Promoting" } else { "## Feeding" };
    let mut items = Select::single(
        ComponentId::new(custom_id::PET_ARMY, ["item", action, user_id]),
        "You don't have any",
        vec![SelectOption::new("You don't have any", "none", true)],
    );
    items.disabled = true;
    View::new(NEUTRAL_ACCENT).text(title).select(items)
}

/// Command overview.
#[must_use]
pub fn help() -> View {
    View::new(NEUTRAL_ACCENT).text(
        "## Commands\n\
         * `/dig` - dig through layers for materials and chests\n\
         * `/mine` - mine through rock for ores and gems\n\
         * `/inventory` - browse your items\n\
         * `/item_info` - look up an item\n\
         * `/wallet` - show balances\n\
         * `/generator` - run the Bronze Coin Generator\n\
         * `/item_upgrade` - upgrade your satchels and backpack\n\
         * `/market` - sell items at the Collector's Market\n\
         * `/shop` - buy from the Collector's Shop\n\
         * `/my_pet_army` - check your pets\n\
         * `/giveaway_start` - host a giveaway\n\
         * `/ping` - check the bot is alive",
    )
}
