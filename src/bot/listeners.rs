//! Background tasks that render timer-driven events.
//!
//! Sessions, generators and giveaways change state from their own timers.
//! Each service reports those changes on a channel; the tasks here edit or
//! post the matching Discord messages. Failed edits are logged and skipped.

use super::{BotData, EventStreams, render};
use crate::core::{
    generator::{GeneratorEvent, GeneratorService},
    giveaway::{GiveawayEvent, GiveawayPhase, GiveawayRegistry},
    presenter::{self, WinnerStatus},
    profiles::Profiles,
    session::{MessageRef, SessionEvent},
    view::View,
    wallet::Currency,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// Starts one task per event stream.
pub fn spawn(http: Arc<serenity::Http>, data: &BotData, streams: EventStreams) {
    let EventStreams {
        sessions,
        generators,
        giveaways,
    } = streams;
    tokio::spawn(session_events(Arc::clone(&http), Arc::clone(&data.profiles), sessions));
    tokio::spawn(generator_events(Arc::clone(&http), data.generators.clone(), generators));
    tokio::spawn(giveaway_events(http, data.giveaways.clone(), giveaways));
}

async fn edit(http: &serenity::Http, target: MessageRef, view: &View) {
    let result = serenity::ChannelId::new(target.channel_id)
        .edit_message(http, serenity::MessageId::new(target.message_id), render::edit(view))
        .await;
    if let Err(e) = result {
        warn!(channel_id = target.channel_id, message_id = target.message_id, "Failed to edit message: {e}");
    }
}

async fn post(http: &serenity::Http, channel_id: u64, view: &View) -> Option<MessageRef> {
    match serenity::ChannelId::new(channel_id)
        .send_message(http, render::message(view))
        .await
    {
        Ok(message) => Some(MessageRef {
            channel_id,
            message_id: message.id.get(),
        }),
        Err(e) => {
            warn!(channel_id, "Failed to post message: {e}");
            None
        }
    }
}

async fn direct_message(http: &serenity::Http, user_id: &str, builder: serenity::CreateMessage) -> Option<MessageRef> {
    let id = user_id.parse::<u64>().ok().filter(|id| *id != 0)?;
    let channel = match serenity::UserId::new(id).create_dm_channel(http).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!(user_id, "Failed to open DM channel: {e}");
            return None;
        }
    };
    match channel.id.send_message(http, builder).await {
        Ok(message) => Some(MessageRef {
            channel_id: channel.id.get(),
            message_id: message.id.get(),
        }),
        Err(e) => {
            warn!(user_id, "Failed to send DM: {e}");
            None
        }
    }
}

async fn display_name(http: &serenity::Http, user_id: &str) -> String {
    let Some(id) = user_id.parse::<u64>().ok().filter(|id| *id != 0) else {
        return user_id.to_string();
    };
    match http.get_user(serenity::UserId::new(id)).await {
        Ok(user) => user.global_name.unwrap_or(user.name),
        Err(_) => user_id.to_string(),
    }
}

async fn session_events(http: Arc<serenity::Http>, profiles: Arc<Profiles>, mut events: UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Revealed(session) => {
                if let Some(target) = session.message {
                    edit(&http, target, &presenter::gathering_active(&session, profiles.catalog())).await;
                }
            }
            SessionEvent::Ended {
                user_id,
                activity,
                message,
                reason,
            } => {
                debug!(user_id = %user_id, ?reason, "Resetting gathering message");
                if let Some(target) = message {
                    edit(&http, target, &presenter::gathering_home(activity, &user_id)).await;
                }
            }
        }
    }
}

async fn generator_events(
    http: Arc<serenity::Http>,
    generators: GeneratorService,
    mut events: UnboundedReceiver<GeneratorEvent>,
) {
    let settings = generators.settings();
    while let Some(GeneratorEvent { user_id, state }) = events.recv().await {
        let Some(run) = &state.run else {
            continue;
        };
        if let Some(target) = run.message() {
            let name = display_name(&http, &user_id).await;
            let view = presenter::generator(
                &user_id,
                &name,
                run.channel_id,
                &state,
                &settings,
                generators.now_ms(),
            );
            edit(&http, target, &view).await;
        }
        if state.notify_dm {
            let text = format!(
                "Your generators has finished! {} {} are ready to claim.",
                run.generated_amount,
                Currency::Coins.emoji()
            );
            direct_message(&http, &user_id, serenity::CreateMessage::new().content(text)).await;
        }
    }
}

async fn giveaway_events(
    http: Arc<serenity::Http>,
    registry: GiveawayRegistry,
    mut events: UnboundedReceiver<GiveawayEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            GiveawayEvent::NoEntries(giveaway) | GiveawayEvent::Unclaimed(giveaway) => {
                if let Some(target) = giveaway.entry_message {
                    edit(&http, target, &presenter::giveaway_closed(&giveaway)).await;
                }
                post(&http, giveaway.config.channel_id, &presenter::giveaway_no_winner()).await;
            }
            GiveawayEvent::WinnerSelected {
                giveaway,
                user_id,
                deadline,
            } => {
                if let Some(target) = giveaway.entry_message {
                    edit(&http, target, &presenter::giveaway_closed(&giveaway)).await;
                }
                let announcement = post(
                    &http,
                    giveaway.config.channel_id,
                    &presenter::giveaway_winner(&giveaway, &user_id, WinnerStatus::Claiming),
                )
                .await;
                let dm_view = presenter::giveaway_claim_dm(&giveaway, &user_id, deadline, WinnerStatus::Claiming);
                let dm = direct_message(&http, &user_id, render::message(&dm_view)).await;
                registry.attach_winner_messages(giveaway.id, &user_id, announcement, dm);
            }
            GiveawayEvent::ClaimExpired { giveaway, user_id } => {
                let GiveawayPhase::PendingClaim {
                    deadline,
                    announcement,
                    dm,
                    ..
                } = &giveaway.phase
                else {
                    continue;
                };
                if let Some(target) = announcement {
                    let view = presenter::giveaway_winner(&giveaway, &user_id, WinnerStatus::Rerolling);
                    edit(&http, *target, &view).await;
                }
                if let Some(target) = dm {
                    let view = presenter::giveaway_claim_dm(&giveaway, &user_id, *deadline, WinnerStatus::Rerolling);
                    edit(&http, *target, &view).await;
                }
            }
        }
    }
}
