//! Participant-facing flows: registration, code entry and personal statistics.

use engine::{CheckInOutcome, CodePrompt, EngineError, RegistrationOutcome};
use tracing::{debug, info, instrument, warn};

use super::conversation::{Conversation, RegistrationStep, RegistrationTransition};
use super::keyboards;
use super::telegram::{BotResult, ChatApi};
use super::texts;
use super::Bot;

impl<A: ChatApi> Bot<A> {
    /// Greets a known participant or starts registration.
    #[instrument(skip(self))]
    pub(super) async fn on_start(&self, user_id: i64, chat_id: i64) -> BotResult<()> {
        self.clear_conversation(user_id);

        if let Some(user) = self.engine.get_user(user_id).await? {
            debug!("User {} is already registered", user_id);
            return self
                .reply(chat_id, &texts::welcome_back(&user), Some(self.main_menu()))
                .await;
        }

        info!("Starting registration for user {}", user_id);
        self.set_conversation(user_id, Conversation::Registration(RegistrationStep::LastName));
        self.reply(
            chat_id,
            texts::REGISTRATION_START,
            Some(keyboards::cancel_keyboard()),
        )
        .await
    }

    #[instrument(skip(self))]
    pub(super) async fn on_cancel(&self, user_id: i64, chat_id: i64) -> BotResult<()> {
        let Some(state) = self.clear_conversation(user_id) else {
            return Ok(());
        };
        debug!("Cancelled {:?} for user {}", state, user_id);

        if self.engine.get_user(user_id).await?.is_some() {
            self.reply(chat_id, texts::ACTION_CANCELLED, Some(self.main_menu()))
                .await
        } else {
            self.reply(
                chat_id,
                texts::REGISTRATION_CANCELLED,
                Some(keyboards::remove_keyboard()),
            )
            .await
        }
    }

    #[instrument(skip(self, step, input))]
    pub(super) async fn on_registration_input(
        &self,
        user_id: i64,
        chat_id: i64,
        step: RegistrationStep,
        input: &str,
    ) -> BotResult<()> {
        match step.advance(user_id, input) {
            RegistrationTransition::Rejected(step) => {
                let text = texts::registration_retry(&step);
                let markup = registration_keyboard(&step);
                self.set_conversation(user_id, Conversation::Registration(step));
                self.reply(chat_id, text, Some(markup)).await
            }
            RegistrationTransition::Advanced(step) => {
                let text = texts::registration_prompt(&step);
                let markup = registration_keyboard(&step);
                self.set_conversation(user_id, Conversation::Registration(step));
                self.reply(chat_id, text, Some(markup)).await
            }
            RegistrationTransition::Completed(new_user) => {
                self.clear_conversation(user_id);
                match self.engine.register(new_user).await {
                    Ok(RegistrationOutcome::Registered(user)) => {
                        info!("User {} registered", user_id);
                        self.reply(
                            chat_id,
                            &texts::registration_complete(&user),
                            Some(self.main_menu()),
                        )
                        .await
                    }
                    Ok(RegistrationOutcome::AlreadyRegistered) => {
                        self.reply(
                            chat_id,
                            texts::REGISTRATION_FAILED,
                            Some(keyboards::remove_keyboard()),
                        )
                        .await
                    }
                    Err(EngineError::Validation(reason)) => {
                        warn!("Registration of user {} rejected: {}", user_id, reason);
                        self.reply(
                            chat_id,
                            texts::REGISTRATION_FAILED,
                            Some(keyboards::remove_keyboard()),
                        )
                        .await
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub(super) async fn on_code_request(&self, user_id: i64, chat_id: i64) -> BotResult<()> {
        match self.engine.code_prompt(user_id).await? {
            CodePrompt::NotRegistered => self.reply(chat_id, texts::NOT_REGISTERED, None).await,
            CodePrompt::NoActiveDay => {
                self.reply(chat_id, texts::NO_ACTIVE_DAY, Some(self.main_menu()))
                    .await
            }
            CodePrompt::AlreadyMarked(day) => {
                self.reply(chat_id, &texts::already_marked(day), Some(self.main_menu()))
                    .await
            }
            CodePrompt::Ready(day) => {
                self.set_conversation(user_id, Conversation::AwaitingCode { day });
                self.reply(
                    chat_id,
                    &texts::enter_code(day),
                    Some(keyboards::cancel_keyboard()),
                )
                .await
            }
        }
    }

    /// Submits a typed code. Only a wrong code keeps the user in code entry.
    #[instrument(skip(self, code))]
    pub(super) async fn on_code_input(
        &self,
        user_id: i64,
        chat_id: i64,
        code: &str,
    ) -> BotResult<()> {
        let outcome = self.engine.check_in(user_id, code).await?;
        if outcome != CheckInOutcome::WrongCode {
            self.clear_conversation(user_id);
        }

        match outcome {
            CheckInOutcome::Marked { day, total_days } => {
                info!("User {} checked in on day {} via chat", user_id, day);
                let text = texts::marked(day, total_days, self.engine.config().day_count);
                self.reply(chat_id, &text, Some(self.main_menu())).await
            }
            CheckInOutcome::AlreadyMarked { day, .. } => {
                self.reply(chat_id, &texts::already_marked(day), Some(self.main_menu()))
                    .await
            }
            CheckInOutcome::WrongCode => {
                self.reply(chat_id, texts::WRONG_CODE, Some(keyboards::cancel_keyboard()))
                    .await
            }
            CheckInOutcome::NoActiveDay => {
                self.reply(chat_id, texts::DAY_CLOSED_MEANWHILE, Some(self.main_menu()))
                    .await
            }
            CheckInOutcome::NotRegistered => {
                self.reply(chat_id, texts::NOT_REGISTERED, Some(keyboards::remove_keyboard()))
                    .await
            }
        }
    }

    #[instrument(skip(self))]
    pub(super) async fn on_my_stats(&self, user_id: i64, chat_id: i64) -> BotResult<()> {
        match self.engine.user_statistics(user_id).await? {
            Some(stats) => {
                self.reply(chat_id, &texts::user_statistics(&stats), Some(self.main_menu()))
                    .await
            }
            None => self.reply(chat_id, texts::NOT_REGISTERED, None).await,
        }
    }
}

fn registration_keyboard(step: &RegistrationStep) -> super::telegram::ReplyMarkup {
    match step {
        RegistrationStep::MiddleName { .. } => keyboards::skip_keyboard(),
        _ => keyboards::cancel_keyboard(),
    }
}
