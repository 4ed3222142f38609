//! Chat-bot adapter: long-polls the chat platform and routes every update
//! through the attendance engine.

pub mod admin;
pub mod broadcast;
pub mod conversation;
pub mod keyboards;
pub mod telegram;
pub mod texts;
pub mod user;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use engine::AttendanceEngine;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AdminSet;
use conversation::Conversation;
use keyboards::{CANCEL_BUTTON, ENTER_CODE_BUTTON, MY_STATS_BUTTON};
use telegram::{BotError, BotResult, ChatApi, Message, ReplyMarkup, TelegramClient, Update};

/// Pause before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// In-flight update tasks, one chain per sender. Updates from one sender run
/// in arrival order; different senders run concurrently.
#[derive(Debug, Default)]
pub struct Lanes(HashMap<i64, JoinHandle<()>>);

impl Lanes {
    /// Forgets chains whose last task has finished.
    pub fn prune(&mut self) {
        self.0.retain(|_, task| !task.is_finished());
    }
}

pub struct Bot<A: ChatApi> {
    api: Arc<A>,
    engine: AttendanceEngine,
    admins: AdminSet,
    conversations: DashMap<i64, Conversation>,
    webapp_url: Option<String>,
    broadcast_delay: Duration,
}

impl<A: ChatApi> Bot<A> {
    pub fn new(
        api: A,
        engine: AttendanceEngine,
        admins: AdminSet,
        webapp_url: Option<String>,
    ) -> Self {
        Self {
            api: Arc::new(api),
            engine,
            admins,
            conversations: DashMap::new(),
            webapp_url,
            broadcast_delay: broadcast::BROADCAST_DELAY,
        }
    }

    #[cfg(test)]
    pub fn with_broadcast_delay(mut self, delay: Duration) -> Self {
        self.broadcast_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn conversation(&self, user_id: i64) -> Option<Conversation> {
        self.conversations
            .get(&user_id)
            .map(|entry| entry.value().clone())
    }

    fn set_conversation(&self, user_id: i64, conversation: Conversation) {
        self.conversations.insert(user_id, conversation);
    }

    fn clear_conversation(&self, user_id: i64) -> Option<Conversation> {
        self.conversations
            .remove(&user_id)
            .map(|(_, conversation)| conversation)
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(user_id)
    }

    fn main_menu(&self) -> ReplyMarkup {
        keyboards::main_menu(self.webapp_url.as_deref())
    }

    async fn reply(&self, chat_id: i64, text: &str, markup: Option<ReplyMarkup>) -> BotResult<()> {
        self.api.send_message(chat_id, text, markup).await?;
        Ok(())
    }

    /// Processes one update. Failures are logged and, for storage errors,
    /// answered with a generic message; they never propagate.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;

        let (chat_id, result) = if let Some(message) = update.message {
            (message.chat.id, self.handle_message(message).await)
        } else if let Some(callback) = update.callback_query {
            let chat_id = callback
                .message
                .as_ref()
                .map(|message| message.chat.id)
                .unwrap_or(callback.from.id);
            (chat_id, self.handle_callback(callback).await)
        } else {
            debug!("Skipping update {} without message or callback", update_id);
            return;
        };

        if let Err(e) = result {
            error!("Failed to handle update {}: {}", update_id, e);
            if matches!(e, BotError::Engine(_)) {
                if let Err(e) = self.api.send_message(chat_id, texts::INTERNAL_ERROR, None).await {
                    warn!("Failed to report error to chat {}: {}", chat_id, e);
                }
            }
        }
    }

    /// Spawns `update` behind the previous update from the same sender, so a
    /// stalled chat never holds up anyone else.
    pub fn dispatch(self: &Arc<Self>, lanes: &mut Lanes, update: Update) {
        let sender = update.sender_id();
        let previous = sender.and_then(|id| lanes.0.remove(&id));
        let bot = Arc::clone(self);

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!("Previous update task failed: {}", e);
                }
            }
            bot.handle_update(update).await;
        });

        if let Some(sender) = sender {
            lanes.0.insert(sender, task);
        }
    }

    async fn handle_message(&self, message: Message) -> BotResult<()> {
        let Some(from) = message.from.as_ref() else {
            return Ok(());
        };
        let user_id = from.id;
        let chat_id = message.chat.id;
        let text = message.text.as_deref().unwrap_or_default().trim();

        match text {
            "/start" => return self.on_start(user_id, chat_id).await,
            "/admin" => return self.on_admin(user_id, chat_id).await,
            "/cancel" | CANCEL_BUTTON => return self.on_cancel(user_id, chat_id).await,
            _ => {}
        }

        if let Some(state) = self.conversation(user_id) {
            return match state {
                Conversation::Registration(step) => {
                    self.on_registration_input(user_id, chat_id, step, text)
                        .await
                }
                Conversation::AwaitingCode { .. } => {
                    self.on_code_input(user_id, chat_id, text).await
                }
                Conversation::AdminDayCode { day } => {
                    self.on_day_code_input(user_id, chat_id, day, text).await
                }
                Conversation::AdminBroadcastText => {
                    self.on_broadcast_text(user_id, chat_id, text).await
                }
                Conversation::AdminBroadcastConfirm { .. } => {
                    self.reply(chat_id, texts::BROADCAST_USE_BUTTONS, None).await
                }
            };
        }

        match text {
            "/code" | ENTER_CODE_BUTTON => self.on_code_request(user_id, chat_id).await,
            "/stats" | MY_STATS_BUTTON => self.on_my_stats(user_id, chat_id).await,
            _ => {
                debug!("Ignoring message from user {}", user_id);
                Ok(())
            }
        }
    }
}

impl Bot<TelegramClient> {
    /// Long-polls for updates until the process stops. Returns only if the
    /// token is rejected at startup.
    pub async fn run(self: Arc<Self>) -> BotResult<()> {
        let me = self.api.get_me().await?;
        info!(
            "Chat bot @{} started ({} admin(s))",
            me.username.as_deref().unwrap_or(&me.first_name),
            self.admins.len()
        );

        let mut offset = 0;
        let mut lanes = Lanes::default();
        loop {
            match self.api.get_updates(offset).await {
                Ok(updates) => {
                    lanes.prune();
                    for update in updates {
                        offset = update.update_id + 1;
                        self.dispatch(&mut lanes, update);
                    }
                }
                Err(e) => {
                    warn!("Polling for updates failed: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}
