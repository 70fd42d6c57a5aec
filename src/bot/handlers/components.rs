//! Button and select menu routing.
//!
//! [`route`] is free of serenity types: it maps a parsed custom id and the
//! clicking user to a [`Response`] plus any extra message edits. [`handle`]
//! is the thin serenity wrapper around it.

use crate::{
    bot::{BotData, GENERIC_APOLOGY, render},
    core::{
        activity::Activity,
        catalog::{ItemKind, Rarity},
        custom_id::{self, ComponentId},
        gathering::{EquipOutcome, EquipSlot, SwingOutcome},
        generator::{GeneratorClaim, GeneratorStart, GeneratorState},
        giveaway::{ClaimOutcome, EnterOutcome},
        inventory::PlayerProfile,
        item_upgrade::{UpgradeClaim, UpgradeStart, available_upgrades, check_start, find_upgrade, paginate},
        market::{PurchaseOutcome, SaleOutcome},
        pets::PetProfile,
        presenter::{self, PET_ACTIONS, WinnerStatus},
        session::{MessageRef, StartOutcome},
        view::{Response, View},
        wallet::Currency,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{error, instrument, warn};

const UNKNOWN_COMPONENT: &str = "This button is no longer supported.";
const NOT_YOURS: &str = "These buttons belong to someone else.";

/// A component click, stripped of Discord types.
#[derive(Debug, Clone)]
pub struct ComponentRequest<'a> {
    /// Raw custom id
    pub custom_id: &'a str,
    /// Clicking user
    pub user_id: &'a str,
    /// Display name of the clicking user
    pub username: &'a str,
    /// Message the component belongs to
    pub message: MessageRef,
    /// Selected values of a select menu
    pub values: &'a [String],
}

/// What a click produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Reply to the interaction itself
    pub response: Response,
    /// Other messages to update afterwards
    pub edits: Vec<(MessageRef, View)>,
}

impl From<Response> for Routed {
    fn from(response: Response) -> Self {
        Self {
            response,
            edits: Vec::new(),
        }
    }
}

fn owned_by(id: &ComponentId, user_id: &str) -> bool {
    id.owner() == Some(user_id)
}

/// Dispatches a click by custom id prefix.
#[instrument(skip(data, request), fields(custom_id = request.custom_id, user_id = request.user_id))]
pub async fn route(data: &BotData, request: ComponentRequest<'_>) -> Result<Routed> {
    let Some(id) = ComponentId::parse(request.custom_id) else {
        return Ok(Response::Notice(UNKNOWN_COMPONENT.to_string()).into());
    };

    if let Some(activity) = Activity::from_key(&id.prefix) {
        if !owned_by(&id, request.user_id) {
            return Ok(Response::Notice(presenter::not_your_session(activity)).into());
        }
        return gathering_action(data, &id, activity, &request).await;
    }
    if let Some(activity) = id.prefix.strip_suffix("-select").and_then(Activity::from_key) {
        if !owned_by(&id, request.user_id) {
            return Ok(Response::Notice(presenter::not_your_session(activity)).into());
        }
        return equip_selection(data, &id, activity, &request).await;
    }

    match id.prefix.as_str() {
        custom_id::GIVEAWAY_ENTER => Ok(giveaway_enter(data, &id, request.user_id).into()),
        _ if !owned_by(&id, request.user_id) => Ok(Response::Notice(NOT_YOURS.to_string()).into()),
        custom_id::INVENTORY => inventory_selection(data, &id, &request).await,
        custom_id::GENERATOR_START
        | custom_id::GENERATOR_STOP
        | custom_id::GENERATOR_STOP_YES
        | custom_id::GENERATOR_STOP_NO
        | custom_id::GENERATOR_CLAIM => generator_action(data, &id, &request).await,
        custom_id::GIVEAWAY_CLAIM => Ok(giveaway_claim(data, &id, request.user_id)),
        custom_id::ITEM_UPGRADE
        | custom_id::ITEM_UPGRADE_SLOT
        | custom_id::ITEM_UPGRADE_PAGE
        | custom_id::ITEM_UPGRADE_SELECT
        | custom_id::ITEM_UPGRADE_CONFIRM
        | custom_id::ITEM_UPGRADE_CLAIM => item_upgrade_action(data, &id, &request).await,
        custom_id::MARKET => market_action(data, &id, &request).await,
        custom_id::SHOP_BUY | custom_id::SHOP_PAGE => shop_action(data, &id, &request).await,
        custom_id::PET_ARMY => pet_army_action(data, &id, &request).await,
        _ => Ok(Response::Notice(UNKNOWN_COMPONENT.to_string()).into()),
    }
}

async fn gathering_action(
    data: &BotData,
    id: &ComponentId,
    activity: Activity,
    request: &ComponentRequest<'_>,
) -> Result<Routed> {
    let engine = &data.gathering;
    let user_id = request.user_id;
    let catalog = data.profiles.catalog();

    let response = match id.arg(0).unwrap_or_default() {
        "start" => match engine.start(user_id, activity, Some(request.message)) {
            StartOutcome::Started(_) => Response::Edit(presenter::gathering_starting(activity)),
            StartOutcome::AlreadyActive { .. } => Response::Notice(presenter::already_active(activity)),
        },
        "swing" => match engine.swing(user_id, activity).await? {
            SwingOutcome::NoSession => Response::Edit(presenter::gathering_home(activity, user_id)),
            SwingOutcome::Hit { session, .. } | SwingOutcome::LayerCleared { session, .. } => {
                Response::Edit(presenter::gathering_active(&session, catalog))
            }
        },
        "stop" => {
            engine.stop(user_id, activity);
            Response::Edit(presenter::gathering_home(activity, user_id))
        }
        "home" => match engine.registry().get(user_id, activity) {
            Some(session) => {
                engine.touch(user_id, activity);
                Response::Edit(presenter::gathering_active(&session, catalog))
            }
            None => Response::Edit(presenter::gathering_home(activity, user_id)),
        },
        "stats" => {
            engine.touch(user_id, activity);
            let profile = data.profiles.resource(user_id, activity).await?;
            Response::Edit(presenter::gathering_stats(activity, user_id, &profile))
        }
        "equipment" => {
            engine.touch(user_id, activity);
            let player: PlayerProfile = data.profiles.read(user_id).await?;
            Response::Edit(presenter::gathering_equipment(activity, user_id, &player, catalog))
        }
        other => {
            warn!(action = other, "Unknown gathering action");
            Response::Notice(UNKNOWN_COMPONENT.to_string())
        }
    };
    Ok(response.into())
}

async fn equip_selection(
    data: &BotData,
    id: &ComponentId,
    activity: Activity,
    request: &ComponentRequest<'_>,
) -> Result<Routed> {
    let Some(slot) = id.arg(0).and_then(EquipSlot::from_key) else {
        return Ok(Response::Notice(UNKNOWN_COMPONENT.to_string()).into());
    };
    let user_id = request.user_id;
    data.gathering.touch(user_id, activity);

    let player = match request.values.first().map(String::as_str) {
        Some(value) if value != "none" => match data.gathering.equip(user_id, activity, slot, value).await? {
            EquipOutcome::Equipped(player) | EquipOutcome::Rejected(player) => player,
        },
        _ => data.profiles.read(user_id).await?,
    };
    let view = presenter::gathering_equipment(activity, user_id, &player, data.profiles.catalog());
    Ok(Response::Edit(view).into())
}

async fn inventory_selection(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let (kinds, page) = match id.arg(0) {
        Some("type") => (
            request
                .values
                .iter()
                .filter_map(|value| ItemKind::from_key(value))
                .collect::<Vec<_>>(),
            1,
        ),
        Some("page") => (
            presenter::decode_kinds(id.arg(1).unwrap_or_default()),
            request
                .values
                .first()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(1),
        ),
        _ => return Ok(Response::Notice(UNKNOWN_COMPONENT.to_string()).into()),
    };
    let player: PlayerProfile = data.profiles.read(request.user_id).await?;
    let view = presenter::inventory(
        request.user_id,
        request.username,
        &player,
        data.profiles.catalog(),
        &kinds,
        page,
    );
    Ok(Response::Edit(view).into())
}

async fn generator_action(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let generators = &data.generators;
    let user_id = request.user_id;
    let render_state = |state: GeneratorState| {
        presenter::generator(
            user_id,
            request.username,
            Some(request.message.channel_id),
            &state,
            &generators.settings(),
            generators.now_ms(),
        )
    };

    let response = match id.prefix.as_str() {
        custom_id::GENERATOR_START => match generators.start(user_id, Some(request.message)).await? {
            GeneratorStart::Started(state) | GeneratorStart::AlreadyRunning(state) => {
                Response::Edit(render_state(state))
            }
            GeneratorStart::NoDuration => Response::Notice(
                "Pick a duration first with `/generator setup <time>`, e.g. `90m` or `2h`.".to_string(),
            ),
            GeneratorStart::OnCooldown { ends_at } => Response::Notice(format!(
                "Your generator is cooling down. It will be ready {}.",
                presenter::relative_time(ends_at)
            )),
        },
        custom_id::GENERATOR_STOP => Response::Edit(presenter::generator_stop_confirm(user_id)),
        custom_id::GENERATOR_STOP_YES => {
            let state = match generators.stop(user_id).await? {
                Some(state) => state,
                None => generators.state(user_id).await?,
            };
            Response::Edit(render_state(state))
        }
        custom_id::GENERATOR_CLAIM => match generators.claim(user_id).await? {
            GeneratorClaim::Claimed { state, .. } => Response::Edit(render_state(state)),
            GeneratorClaim::NothingToClaim => Response::Edit(render_state(generators.state(user_id).await?)),
        },
        _ => Response::Edit(render_state(generators.state(user_id).await?)),
    };
    Ok(response.into())
}

fn unknown() -> Routed {
    Response::Notice(UNKNOWN_COMPONENT.to_string()).into()
}

fn numeric_arg<T: std::str::FromStr>(id: &ComponentId, index: usize) -> Option<T> {
    id.arg(index).and_then(|raw| raw.parse().ok())
}

async fn item_upgrade_action(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let upgrades = &data.item_upgrades;
    let user_id = request.user_id;
    let list = |slot: u32, page: usize, player: &PlayerProfile| {
        let listing = paginate(&available_upgrades(player, ""), page);
        presenter::item_upgrade_list(user_id, slot, &listing)
    };

    let response = match id.prefix.as_str() {
        custom_id::ITEM_UPGRADE => {
            let (player, _) = upgrades.overview(user_id).await?;
            Response::Edit(presenter::item_upgrade_home(user_id, &player, upgrades.now_ms()))
        }
        custom_id::ITEM_UPGRADE_SLOT => {
            let Some(slot) = request.values.first().and_then(|value| value.parse::<u32>().ok()) else {
                return Ok(unknown());
            };
            let (player, _) = upgrades.overview(user_id).await?;
            Response::Edit(list(slot, 1, &player))
        }
        custom_id::ITEM_UPGRADE_PAGE => {
            let (Some(slot), Some(page)) = (numeric_arg::<u32>(id, 1), numeric_arg::<usize>(id, 2)) else {
                return Ok(unknown());
            };
            let (player, _) = upgrades.overview(user_id).await?;
            Response::Edit(list(slot, page, &player))
        }
        custom_id::ITEM_UPGRADE_SELECT => {
            let (Some(slot), Some(upgrade)) = (numeric_arg::<u32>(id, 1), id.arg(2).and_then(find_upgrade)) else {
                return Ok(unknown());
            };
            let (player, funds) = upgrades.overview(user_id).await?;
            let blocker = check_start(upgrade, slot, &player, &funds);
            Response::Edit(presenter::item_upgrade_detail(user_id, slot, upgrade, blocker.as_ref()))
        }
        custom_id::ITEM_UPGRADE_CONFIRM => {
            let (Some(slot), Some(key)) = (numeric_arg::<u32>(id, 1), id.arg(2)) else {
                return Ok(unknown());
            };
            match upgrades.start(user_id, slot, key).await? {
                UpgradeStart::Started { player, .. } => {
                    Response::Edit(presenter::item_upgrade_home(user_id, &player, upgrades.now_ms()))
                }
                UpgradeStart::Blocked(blocker) => Response::Notice(blocker.to_string()),
            }
        }
        custom_id::ITEM_UPGRADE_CLAIM => {
            let Some(slot) = numeric_arg::<u32>(id, 1) else {
                return Ok(unknown());
            };
            match upgrades.claim(user_id, slot).await? {
                UpgradeClaim::Claimed { player, .. } => {
                    Response::Edit(presenter::item_upgrade_home(user_id, &player, upgrades.now_ms()))
                }
                UpgradeClaim::NotReady { ends_at } => Response::Notice(format!(
                    "This upgrade is not done yet. It finishes {}.",
                    presenter::relative_time(ends_at)
                )),
                UpgradeClaim::EmptySlot => Response::Notice("Nothing is upgrading in that slot.".to_string()),
            }
        }
        _ => return Ok(unknown()),
    };
    Ok(response.into())
}

async fn market_action(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let market = &data.market;
    let user_id = request.user_id;
    let routed: Routed = match id.arg(0).unwrap_or_default() {
        "sell" => Response::Fresh(presenter::market_confirm(
            user_id,
            request.message.channel_id,
            request.message.message_id,
        ))
        .into(),
        "confirm" => {
            let (Some(channel_id), Some(message_id)) = (numeric_arg::<u64>(id, 1), numeric_arg::<u64>(id, 2)) else {
                return Ok(unknown());
            };
            match market.sell(user_id).await? {
                SaleOutcome::Sold { lines, coins, .. } => Routed {
                    response: Response::Edit(presenter::market_receipt(&lines, coins)),
                    edits: vec![(
                        MessageRef {
                            channel_id,
                            message_id,
                        },
                        presenter::market(user_id, &[]),
                    )],
                },
                SaleOutcome::Empty => Response::Notice("Your sell list is empty.".to_string()).into(),
                SaleOutcome::NotEnough => {
                    Response::Notice("You no longer have enough of those items.".to_string()).into()
                }
            }
        }
        "deny" => Response::Notice("Sale cancelled.".to_string()).into(),
        "cancel" => {
            market.clear_sell_list(user_id).await?;
            Routed {
                response: Response::Notice("Market selection cleared.".to_string()),
                edits: vec![(request.message, presenter::market(user_id, &[]))],
            }
        }
        _ => unknown(),
    };
    Ok(routed)
}

async fn shop_action(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let market = &data.market;
    let user_id = request.user_id;
    if id.prefix == custom_id::SHOP_PAGE {
        let page = numeric_arg::<usize>(id, 0).unwrap_or(1);
        let listing = market.shop(user_id).await?;
        return Ok(Response::Edit(presenter::shop(user_id, &listing, page)).into());
    }

    let (Some(item_id), Some(page)) = (id.arg(0), numeric_arg::<usize>(id, 1)) else {
        return Ok(unknown());
    };
    let coin = Currency::Coins.emoji();
    let notice = match market.buy(user_id, item_id).await? {
        PurchaseOutcome::Bought { item, price, balance } => {
            format!("You bought {} for {price} {coin}. You have {balance} {coin} left.", item.label())
        }
        PurchaseOutcome::NotListed => "That item is not in stock anymore.".to_string(),
        PurchaseOutcome::OutOfStock => "You already bought all of those this restock.".to_string(),
        PurchaseOutcome::Insufficient { balance, cost } => {
            format!("You need {cost} {coin} but only have {balance} {coin}.")
        }
        PurchaseOutcome::NoRoom => "Your inventory is full.".to_string(),
    };
    let listing = market.shop(user_id).await?;
    Ok(Routed {
        response: Response::Notice(notice),
        edits: vec![(request.message, presenter::shop(user_id, &listing, page))],
    })
}

async fn pet_army_action(data: &BotData, id: &ComponentId, request: &ComponentRequest<'_>) -> Result<Routed> {
    let user_id = request.user_id;
    let selected = request.values.first().map(String::as_str);
    let response = match id.arg(0).unwrap_or_default() {
        "rarity" => {
            let Some(rarity) = selected.and_then(Rarity::from_label) else {
                return Ok(unknown());
            };
            let profile: PetProfile = data.pets.collection(user_id).await?;
            Response::Edit(presenter::pet_army(user_id, request.username, &profile, Some(rarity), None))
        }
        "pet" => match selected {
            None | Some("none") => Response::Notice("You do not have any pets of this rarity.".to_string()),
            Some(instance_id) => {
                let rarity = id.arg(1).and_then(Rarity::from_label);
                let profile = data.pets.collection(user_id).await?;
                Response::Edit(presenter::pet_army(
                    user_id,
                    request.username,
                    &profile,
                    rarity,
                    Some(instance_id),
                ))
            }
        },
        "action" => Response::Fresh(presenter::pet_action_prompt(user_id)),
        "do" => match selected.filter(|action| PET_ACTIONS.contains(action)) {
            Some(action) => Response::Edit(presenter::pet_action_detail(user_id, action)),
            None => return Ok(unknown()),
        },
        "item" => Response::Edit(presenter::pet_action_detail(user_id, id.arg(1).unwrap_or_default())),
        _ => return Ok(unknown()),
    };
    Ok(response.into())
}

fn giveaway_enter(data: &BotData, id: &ComponentId, user_id: &str) -> Response {
    let outcome = id
        .arg(0)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map_or(EnterOutcome::Closed, |giveaway_id| data.giveaways.enter(giveaway_id, user_id));
    let text = match outcome {
        EnterOutcome::Entered => "You have entered the giveaway!",
        EnterOutcome::AlreadyEntered => "You have already entered this giveaway.",
        EnterOutcome::Closed => "This giveaway is no longer accepting entries.",
    };
    Response::Notice(text.to_string())
}

fn giveaway_claim(data: &BotData, id: &ComponentId, user_id: &str) -> Routed {
    let Some(giveaway_id) = id.arg(0).and_then(|raw| raw.parse::<u64>().ok()) else {
        return Response::Notice(UNKNOWN_COMPONENT.to_string()).into();
    };
    match data.giveaways.claim(giveaway_id, user_id) {
        ClaimOutcome::Claimed {
            giveaway,
            announcement,
        } => {
            let now = data.giveaways.now_ms();
            let dm = presenter::giveaway_claim_dm(&giveaway, user_id, now, WinnerStatus::Claimed);
            let edits = announcement
                .map(|target| {
                    (
                        target,
                        presenter::giveaway_winner(&giveaway, user_id, WinnerStatus::Claimed),
                    )
                })
                .into_iter()
                .collect();
            Routed {
                response: Response::Edit(dm),
                edits,
            }
        }
        ClaimOutcome::NotActive => Response::Notice("This claim request is no longer active.".to_string()).into(),
    }
}

/// Answers a component interaction.
///
/// Validation errors are shown to the user; anything else is logged and
/// answered with a generic apology.
pub async fn handle(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
) -> Result<()> {
    let values = match &component.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        _ => Vec::new(),
    };
    let user_id = component.user.id.to_string();
    let request = ComponentRequest {
        custom_id: &component.data.custom_id,
        user_id: &user_id,
        username: component.user.display_name(),
        message: MessageRef {
            channel_id: component.channel_id.get(),
            message_id: component.message.id.get(),
        },
        values: &values,
    };

    let routed = match route(data, request).await {
        Ok(routed) => routed,
        Err(Error::InvalidInput { message }) => Response::Notice(message).into(),
        Err(e) => {
            error!(custom_id = %component.data.custom_id, "Component handler failed: {e}");
            Response::Notice(GENERIC_APOLOGY.to_string()).into()
        }
    };

    let reply = match &routed.response {
        Response::Fresh(view) => render::fresh(view),
        Response::Edit(view) => render::update(view),
        Response::Notice(text) => render::notice(text),
    };
    component.create_response(&ctx.http, reply).await?;

    for (target, view) in &routed.edits {
        let result = serenity::ChannelId::new(target.channel_id)
            .edit_message(&ctx.http, serenity::MessageId::new(target.message_id), render::edit(view))
            .await;
        if let Err(e) = result {
            warn!(message_id = target.message_id, "Failed to update message: {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::AppConfig,
        core::{clock::ManualClock, random::FixedRandom, view::Block, wallet::WalletStats},
        test_utils::temp_json_store,
    };
    use std::sync::Arc;

    const MESSAGE: MessageRef = MessageRef {
        channel_id: 10,
        message_id: 20,
    };

    fn bot_data() -> (tempfile::TempDir, BotData) {
        let (dir, store) = temp_json_store();
        let (data, _streams) = BotData::new(
            AppConfig::default(),
            Arc::new(store),
            Arc::new(ManualClock::new(1_000)),
            Arc::new(FixedRandom(0.999)),
        )
        .unwrap();
        (dir, data)
    }

    async fn click(data: &BotData, custom_id: &str, user_id: &str, values: &[String]) -> Routed {
        route(
            data,
            ComponentRequest {
                custom_id,
                user_id,
                username: "alex",
                message: MESSAGE,
                values,
            },
        )
        .await
        .unwrap()
    }

    fn body(routed: &Routed) -> String {
        match &routed.response {
            Response::Edit(view) | Response::Fresh(view) => view.body(),
            Response::Notice(text) => text.clone(),
        }
    }

    #[tokio::test]
    async fn test_other_users_cannot_press_session_buttons() {
        let (_dir, data) = bot_data();
        let routed = click(&data, "dig:swing:42", "7", &[]).await;
        assert_eq!(routed.response, Response::Notice("This isn't your dig session.".to_string()));
        let routed = click(&data, "generator-claim:42", "7", &[]).await;
        assert_eq!(routed.response, Response::Notice(NOT_YOURS.to_string()));
    }

    #[tokio::test]
    async fn test_dig_start_swing_and_stop() {
        let (_dir, data) = bot_data();
        let started = click(&data, "dig:start:42", "42", &[]).await;
        assert!(body(&started).contains("You are going for a dig"));

        let again = click(&data, "dig:start:42", "42", &[]).await;
        assert!(matches!(again.response, Response::Notice(_)));

        let swung = click(&data, "dig:swing:42", "42", &[]).await;
        assert!(body(&swung).starts_with("## You are digging - Layer 0"));

        let stopped = click(&data, "dig:stop:42", "42", &[]).await;
        assert!(body(&stopped).starts_with("## Digging"));
        assert!(data.gathering.registry().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_type_filter_is_kept_in_page_select() {
        let (_dir, data) = bot_data();
        let routed = click(&data, "inventory:type:42", "42", &["material".to_string()]).await;
        let Response::Edit(view) = routed.response else {
            panic!("inventory should be edited in place");
        };
        let page = view
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Select(select) => Some(select),
                _ => None,
            })
            .nth(1)
            .unwrap();
        assert_eq!(page.custom_id, "inventory:page:material:42");
    }

    #[tokio::test]
    async fn test_generator_start_without_duration_asks_for_setup() {
        let (_dir, data) = bot_data();
        let routed = click(&data, "generator-start:42", "42", &[]).await;
        assert!(body(&routed).contains("/generator setup"));
    }

    #[tokio::test]
    async fn test_giveaway_buttons_on_unknown_giveaway() {
        let (_dir, data) = bot_data();
        let entered = click(&data, "giveaway-enter:99", "42", &[]).await;
        assert_eq!(body(&entered), "This giveaway is no longer accepting entries.");
        let claimed = click(&data, "giveaway-claim:99:42", "42", &[]).await;
        assert_eq!(body(&claimed), "This claim request is no longer active.");
    }

    #[tokio::test]
    async fn test_unknown_ids_get_a_notice() {
        let (_dir, data) = bot_data();
        for raw in ["", "shop:buy:42", "dig:dance:42"] {
            let routed = click(&data, raw, "42", &[]).await;
            assert_eq!(routed.response, Response::Notice(UNKNOWN_COMPONENT.to_string()), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_item_upgrade_confirm_spends_dig_tokens() -> Result<()> {
        let (_dir, data) = bot_data();
        data.profiles.add_xp("42", Activity::Dig, 1_000).await?;

        let stranger = click(&data, "item-upgrade-confirm:42:1:diggers_satchel", "7", &[]).await;
        assert_eq!(stranger.response, Response::Notice(NOT_YOURS.to_string()));

        let detail = click(&data, "item-upgrade-select:42:1:diggers_satchel", "42", &[]).await;
        let Response::Edit(view) = &detail.response else {
            panic!("detail should edit the upgrade message");
        };
        assert!(!view.all_buttons().next().unwrap().disabled);

        let confirmed = click(&data, "item-upgrade-confirm:42:1:diggers_satchel", "42", &[]).await;
        assert!(body(&confirmed).starts_with("## Item Upgrade"));
        assert!(body(&confirmed).contains("* Slot 1: Digger's Satchel"));
        let dig = data.profiles.resource("42", Activity::Dig).await?;
        assert_eq!(dig.upgrade_tokens_used, 5);
        let player: PlayerProfile = data.profiles.read("42").await?;
        assert_eq!(player.amount_of(Activity::Dig.token_item()), 0);

        let again = click(&data, "item-upgrade-confirm:42:1:diggers_satchel", "42", &[]).await;
        assert_eq!(body(&again), "This upgrade is already in progress.");
        let early = click(&data, "item-upgrade-claim:42:1", "42", &[]).await;
        assert!(body(&early).starts_with("This upgrade is not done yet."));
        Ok(())
    }

    #[tokio::test]
    async fn test_backpack_detail_is_locked_without_coins() -> Result<()> {
        let (_dir, data) = bot_data();
        let detail = click(&data, "item-upgrade-select:42:1:backpack_inventory_1", "42", &[]).await;
        let Response::Edit(view) = &detail.response else {
            panic!("detail should edit the upgrade message");
        };
        assert!(view.body().contains("You need 100000 Coins but only have 0."));
        assert!(view.all_buttons().next().unwrap().disabled);
        Ok(())
    }

    #[tokio::test]
    async fn test_market_sale_refreshes_the_market_message() -> Result<()> {
        let (_dir, data) = bot_data();
        let bone = data.profiles.catalog().get("ITBone").unwrap().clone();
        data.profiles
            .update("42", |player: &mut PlayerProfile| player.add_item(&bone, 2))
            .await?;
        data.market.add_to_sell_list("42", "bone - 2").await?;

        let prompt = click(&data, "market:sell:42", "42", &[]).await;
        let Response::Fresh(view) = &prompt.response else {
            panic!("sell should ask for confirmation in a new message");
        };
        let confirm_id = view.all_buttons().next().unwrap().custom_id.clone();
        assert_eq!(confirm_id, "market:confirm:10:20:42");

        let sold = click(&data, &confirm_id, "42", &[]).await;
        assert!(body(&sold).contains("* Earned: 24 🪙"));
        assert_eq!(sold.edits.len(), 1);
        assert_eq!(sold.edits[0].0, MESSAGE);
        assert!(sold.edits[0].1.body().contains("No items in your sell list."));
        let wallet: WalletStats = data.profiles.read("42").await?;
        assert_eq!(wallet.coins, 24);

        let empty = click(&data, &confirm_id, "42", &[]).await;
        assert_eq!(body(&empty), "Your sell list is empty.");
        Ok(())
    }

    #[tokio::test]
    async fn test_shop_purchase_without_coins_is_refused() -> Result<()> {
        let (_dir, data) = bot_data();
        let routed = click(&data, "shop-buy:ITWoodenSword:1:42", "42", &[]).await;
        assert_eq!(body(&routed), "You need 1000 🪙 but only have 0 🪙.");
        assert_eq!(routed.edits.len(), 1);

        data.profiles
            .update("42", |wallet: &mut WalletStats| wallet.coins = 1_000)
            .await?;
        let bought = click(&data, "shop-buy:ITWoodenSword:1:42", "42", &[]).await;
        assert!(body(&bought).starts_with("You bought"));
        let player: PlayerProfile = data.profiles.read("42").await?;
        assert_eq!(player.amount_of("ITWoodenSword"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_pet_army_filter_and_pick() -> Result<()> {
        let (_dir, data) = bot_data();
        assert!(data.pets.grant_owner_pet("42").await?);
        let instance_id = data.pets.collection("42").await?.inventory[0].instance_id.clone();

        let filtered = click(&data, "pet-army:rarity:42", "42", &["Secret".to_string()]).await;
        let Response::Edit(view) = &filtered.response else {
            panic!("rarity filter should edit the collection message");
        };
        let picker = view.all_selects().nth(1).unwrap();
        assert_eq!(picker.custom_id, "pet-army:pet:Secret:42");
        assert_eq!(picker.options[0].value, instance_id);

        let picked = click(&data, "pet-army:pet:Secret:42", "42", &[instance_id.clone()]).await;
        assert!(body(&picked).contains("### UFO"));

        let none = click(&data, "pet-army:pet:Common:42", "42", &["none".to_string()]).await;
        assert_eq!(body(&none), "You do not have any pets of this rarity.");
        let feed = click(&data, "pet-army:do:42", "42", &["Feed".to_string()]).await;
        assert!(body(&feed).starts_with("## Feeding"));
        Ok(())
    }
}
