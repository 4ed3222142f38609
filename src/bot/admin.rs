//! Admin panel: day control, statistics, reports and broadcasts. Every entry
//! point checks the allow-list again.

use engine::{CloseOutcome, EngineError};
use tracing::{debug, info, instrument, warn};

use super::broadcast::{ProgressMessage, broadcast};
use super::conversation::Conversation;
use super::keyboards::{self, AdminAction};
use super::telegram::{BotResult, CallbackQuery, ChatApi, InlineKeyboardMarkup};
use super::texts;
use super::Bot;

/// Where a callback's answer is shown: the message carrying the buttons, or
/// a fresh message when the platform did not include it.
#[derive(Debug, Clone, Copy)]
struct Screen {
    chat_id: i64,
    message_id: Option<i64>,
}

impl<A: ChatApi> Bot<A> {
    #[instrument(skip(self))]
    pub(super) async fn on_admin(&self, user_id: i64, chat_id: i64) -> BotResult<()> {
        if !self.is_admin(user_id) {
            warn!("User {} requested the admin panel without access", user_id);
            return self.reply(chat_id, texts::NO_ACCESS, None).await;
        }
        self.clear_conversation(user_id);
        let text = self.admin_panel_text().await?;
        self.reply(chat_id, &text, Some(keyboards::admin_menu().into()))
            .await
    }

    async fn admin_panel_text(&self) -> BotResult<String> {
        let active = self.engine.status().await?;
        let registered = self.engine.store().count_users().await?;
        Ok(texts::admin_panel(active, registered as usize))
    }

    async fn show(
        &self,
        screen: Screen,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> BotResult<()> {
        match screen.message_id {
            Some(message_id) => {
                self.api
                    .edit_message(screen.chat_id, message_id, text, markup)
                    .await
            }
            None => {
                self.reply(screen.chat_id, text, markup.map(Into::into))
                    .await
            }
        }
    }

    /// Handles an inline button press.
    #[instrument(skip(self, callback), fields(user_id = callback.from.id))]
    pub(super) async fn handle_callback(&self, callback: CallbackQuery) -> BotResult<()> {
        let user_id = callback.from.id;
        let Some(action) = callback.data.as_deref().and_then(AdminAction::parse) else {
            debug!("Unknown callback data: {:?}", callback.data);
            return self.api.answer_callback(&callback.id, None, false).await;
        };

        if !self.is_admin(user_id) {
            warn!("User {} pressed admin button {:?} without access", user_id, action);
            return self
                .api
                .answer_callback(&callback.id, Some(texts::NO_ACCESS), true)
                .await;
        }

        let screen = Screen {
            chat_id: callback
                .message
                .as_ref()
                .map(|message| message.chat.id)
                .unwrap_or(user_id),
            message_id: callback.message.as_ref().map(|message| message.message_id),
        };
        debug!("Admin {} action {:?}", user_id, action);

        match action {
            AdminAction::Back => {
                self.clear_conversation(user_id);
                let text = self.admin_panel_text().await?;
                self.show(screen, &text, Some(keyboards::admin_menu())).await?;
            }
            AdminAction::NewDay => {
                let stats = self.engine.day_statistics().await?;
                let day_count = self.engine.config().day_count;
                let text = texts::days_overview(&stats, day_count);
                self.show(screen, &text, Some(keyboards::day_selection(day_count)))
                    .await?;
            }
            AdminAction::SelectDay(day) => {
                let day_count = self.engine.config().day_count;
                if !(1..=day_count).contains(&day) {
                    warn!("Admin {} selected day {} outside 1..={}", user_id, day, day_count);
                    return self
                        .api
                        .answer_callback(&callback.id, Some("Нет такого дня"), true)
                        .await;
                }
                self.set_conversation(user_id, Conversation::AdminDayCode { day });
                let text = format!(
                    "🔑 Введите код для Дня {day} (минимум {} символа):",
                    self.engine.config().min_code_len
                );
                self.show(screen, &text, Some(keyboards::back_to_admin())).await?;
            }
            AdminAction::CloseDay => match self.engine.close_active_day().await? {
                CloseOutcome::NothingToClose => {
                    return self
                        .api
                        .answer_callback(&callback.id, Some("Нет активного дня"), true)
                        .await;
                }
                CloseOutcome::Closed(day) => {
                    info!("Admin {} closed day {}", user_id, day);
                    let text = format!("🔒 День {day} закрыт.");
                    self.show(screen, &text, Some(keyboards::back_to_admin())).await?;
                    return self
                        .api
                        .answer_callback(&callback.id, Some("День закрыт!"), false)
                        .await;
                }
            },
            AdminAction::Stats => {
                let stats = self.engine.day_statistics().await?;
                self.show(
                    screen,
                    &texts::day_statistics(&stats),
                    Some(keyboards::back_to_admin()),
                )
                .await?;
            }
            AdminAction::Users => {
                let participants = self.engine.participants().await?;
                self.show(
                    screen,
                    &texts::participants(&participants),
                    Some(keyboards::back_to_admin()),
                )
                .await?;
            }
            AdminAction::FullReport => {
                let report = self.engine.full_report().await?;
                let text = texts::full_report(&report);
                let chunks = texts::split_chunks(&text, texts::MAX_MESSAGE_CHARS);
                if chunks.len() <= 1 {
                    self.show(screen, &text, Some(keyboards::back_to_admin())).await?;
                } else {
                    debug!("Full report split into {} messages", chunks.len());
                    self.show(screen, "📋 Отчёт большой, отправляю частями...", None)
                        .await?;
                    for chunk in &chunks {
                        self.reply(screen.chat_id, chunk, None).await?;
                    }
                    self.reply(
                        screen.chat_id,
                        "✅ Отчёт отправлен",
                        Some(keyboards::back_to_admin().into()),
                    )
                    .await?;
                }
            }
            AdminAction::Broadcast => {
                let recipients = self.engine.store().count_users().await?;
                self.set_conversation(user_id, Conversation::AdminBroadcastText);
                self.show(
                    screen,
                    &texts::broadcast_prompt(recipients as usize),
                    Some(keyboards::cancel_broadcast()),
                )
                .await?;
            }
            AdminAction::CancelBroadcast => {
                self.clear_conversation(user_id);
                let text = self.admin_panel_text().await?;
                self.show(screen, &text, Some(keyboards::admin_menu())).await?;
                return self
                    .api
                    .answer_callback(&callback.id, Some("Рассылка отменена"), false)
                    .await;
            }
            AdminAction::ConfirmBroadcast => {
                let Some(Conversation::AdminBroadcastConfirm { text }) =
                    self.clear_conversation(user_id)
                else {
                    return self
                        .api
                        .answer_callback(&callback.id, Some("Текст рассылки не найден"), true)
                        .await;
                };
                self.api.answer_callback(&callback.id, None, false).await?;
                return self.start_broadcast(screen, text).await;
            }
        }

        self.api.answer_callback(&callback.id, None, false).await
    }

    /// Opens the selected day with the typed code.
    #[instrument(skip(self, code))]
    pub(super) async fn on_day_code_input(
        &self,
        user_id: i64,
        chat_id: i64,
        day: i32,
        code: &str,
    ) -> BotResult<()> {
        if !self.is_admin(user_id) {
            warn!("User {} sent a day code without access", user_id);
            self.clear_conversation(user_id);
            return Ok(());
        }

        match self.engine.open_day(day, code).await {
            Ok(opened) => {
                self.clear_conversation(user_id);
                info!("Admin {} opened day {}", user_id, opened.day_number);
                let text =
                    texts::day_opened(opened.day_number, &opened.code, opened.previously_active);
                self.reply(chat_id, &text, None).await
            }
            Err(EngineError::CodeTooShort { min }) => {
                let text = format!("❌ Код должен содержать минимум {min} символа. Введите другой код:");
                self.reply(chat_id, &text, None).await
            }
            Err(EngineError::CodeInUse) => {
                self.reply(
                    chat_id,
                    "❌ Этот код уже используется другим днём. Введите другой код:",
                    None,
                )
                .await
            }
            Err(EngineError::DayOutOfRange { day, max }) => {
                self.clear_conversation(user_id);
                let text = format!("❌ День {day} вне диапазона 1..{max}. Используйте /admin.");
                self.reply(chat_id, &text, None).await
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, text))]
    pub(super) async fn on_broadcast_text(
        &self,
        user_id: i64,
        chat_id: i64,
        text: &str,
    ) -> BotResult<()> {
        if !self.is_admin(user_id) {
            warn!("User {} sent broadcast text without access", user_id);
            self.clear_conversation(user_id);
            return Ok(());
        }
        if text.is_empty() {
            return self
                .reply(chat_id, "Введите текст сообщения:", Some(keyboards::cancel_broadcast().into()))
                .await;
        }

        let recipients = self.engine.store().count_users().await?;
        self.set_conversation(
            user_id,
            Conversation::AdminBroadcastConfirm {
                text: text.to_string(),
            },
        );
        self.reply(
            chat_id,
            &texts::broadcast_preview(text, recipients as usize),
            Some(keyboards::confirm_broadcast().into()),
        )
        .await
    }

    /// Sends the broadcast in the background so the update loop keeps going.
    async fn start_broadcast(&self, screen: Screen, text: String) -> BotResult<()> {
        let recipients = self.engine.recipients().await?;
        let total = recipients.len();
        info!("Starting broadcast to {} recipients", total);

        self.show(screen, &texts::broadcast_progress(0, total), None)
            .await?;
        let progress = screen.message_id.map(|message_id| ProgressMessage {
            chat_id: screen.chat_id,
            message_id,
        });

        let api = self.api.clone();
        let delay = self.broadcast_delay;
        tokio::spawn(async move {
            let summary = broadcast(api.as_ref(), &recipients, &text, delay, progress).await;
            let report = texts::broadcast_summary(summary.sent, summary.failed);
            let result = match progress {
                Some(progress) => {
                    api.edit_message(
                        progress.chat_id,
                        progress.message_id,
                        &report,
                        Some(keyboards::back_to_admin()),
                    )
                    .await
                }
                None => api
                    .send_message(screen.chat_id, &report, Some(keyboards::back_to_admin().into()))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = result {
                warn!("Failed to report broadcast summary: {}", e);
            }
        });
        Ok(())
    }
}
