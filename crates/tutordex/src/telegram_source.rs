//! Concrete [`TelegramSource`] backed by the Telegram Bot API via
//! `teloxide`. This is the one place the pipeline actually depends on the
//! client library; everywhere else talks to the `TelegramSource` trait.
//!
//! The Bot API only delivers updates from the moment the bot is added to a
//! channel forward — it has no `getHistory` equivalent, so [`history`]
//! can't be implemented against it. Backfill needs a user-account MTProto
//! client (e.g. `grammers`) wired in as a second `TelegramSource`
//! implementation; that's out of scope here (see DESIGN.md).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tutordex_collector::{CollectorError, RawUpdate, TelegramSource};

pub struct BotApiSource {
    bot: Bot,
    channels: Vec<String>,
}

impl BotApiSource {
    pub fn new(bot_token: impl Into<String>, channels: Vec<String>) -> Self {
        Self { bot: Bot::new(bot_token.into()), channels }
    }

    fn channel_allowed(&self, username: Option<&str>) -> bool {
        self.channels.is_empty()
            || username.is_some_and(|u| {
                self.channels.iter().any(|c| c.trim_start_matches('@') == u.trim_start_matches('@'))
            })
    }
}

#[async_trait]
impl TelegramSource for BotApiSource {
    async fn stream(&self) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError> {
        let bot = self.bot.clone();
        let channels = self.channels.clone();

        let listener = teloxide::update_listeners::polling_default(bot).await;
        let mapped = listener
            .filter_map(move |result| {
                let channels = channels.clone();
                async move {
                    match result {
                        Ok(update) => channel_post_to_raw_update(update.kind, &channels).map(Ok),
                        Err(err) => Some(Err(CollectorError::Network(err.to_string()))),
                    }
                }
            })
            .boxed();

        Ok(mapped)
    }

    /// The Bot API has no history endpoint; backfill needs a different
    /// [`TelegramSource`] implementation.
    async fn history(
        &self,
        _channel: &str,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError> {
        let _ = self.channel_allowed(None);
        Ok(stream::once(async {
            Err(CollectorError::Auth(
                "the Bot API source has no history endpoint; backfill requires an MTProto-based source".to_string(),
            ))
        })
        .boxed())
    }
}

fn channel_post_to_raw_update(kind: UpdateKind, channels: &[String]) -> Option<RawUpdate> {
    let message = match kind {
        UpdateKind::ChannelPost(msg) | UpdateKind::EditedChannelPost(msg) => msg,
        _ => return None,
    };

    let chat = &message.chat;
    let username = chat.username().map(|u| u.to_string());

    if !channels.is_empty() {
        let allowed = username
            .as_deref()
            .is_some_and(|u| channels.iter().any(|c| c.trim_start_matches('@') == u));
        if !allowed {
            return None;
        }
    }

    let raw_text = message.text().or_else(|| message.caption()).unwrap_or_default().to_string();
    let date = Utc.timestamp_opt(message.date.timestamp(), 0).single().unwrap_or_else(Utc::now);

    Some(RawUpdate {
        channel_id: chat.id.0,
        message_id: message.id.0 as i64,
        channel_username: username,
        channel_title: chat.title().map(|t| t.to_string()),
        date,
        raw_text,
        is_forwarded: message.forward_date().is_some(),
        is_deleted: false,
    })
}
