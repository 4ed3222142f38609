use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use axum::Router;
use engine::{AttendanceEngine, EngineConfig, NewUser, RegistrationOutcome, Store};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::bot::telegram::{
    BotError, BotResult, CallbackQuery, Chat, ChatApi, InlineKeyboardMarkup, Message, ReplyMarkup,
    TgUser, Update,
};
use crate::identity::InitDataVerifier;
use crate::router::create_router;
use crate::schemas::AppState;

pub const TEST_BOT_TOKEN: &str = "123456:TEST-TOKEN";

/// Create an in-memory SQLite database for testing.
///
/// The pool is limited to one connection: every `sqlite::memory:` connection
/// is a separate database.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub async fn setup_test_engine() -> AttendanceEngine {
    init_test_tracing();
    AttendanceEngine::new(Store::new(setup_test_db().await), EngineConfig::default())
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    AppState {
        engine: setup_test_engine().await,
        verifier: InitDataVerifier::new(TEST_BOT_TOKEN),
    }
}

/// Create axum app for testing; also returns the state to seed data through.
pub async fn setup_test_app() -> (Router, AppState) {
    let state = setup_test_app_state().await;
    let router = create_router(state.clone(), None);
    (router, state)
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is determined by the RUST_LOG environment variable,
/// defaulting to WARN if not set.
pub fn init_test_tracing() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub async fn register(engine: &AttendanceEngine, user_id: i64, last: &str, first: &str) {
    let outcome = engine
        .register(NewUser::new(user_id, last, first, None, "G-101"))
        .await
        .unwrap();
    assert!(matches!(outcome, RegistrationOutcome::Registered(_)));
}

/// Identity assertion for `user_id`, signed with [`TEST_BOT_TOKEN`].
pub fn signed_init_data(user_id: i64) -> String {
    let user = format!(r#"{{"id":{user_id},"first_name":"Test"}}"#);
    InitDataVerifier::new(TEST_BOT_TOKEN).sign(&[
        ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
        ("user", &user),
        ("auth_date", "1700000000"),
    ])
}

/// Everything the bot sent through a [`RecordingApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message {
        chat_id: i64,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
}

/// Chat transport that records instead of calling the network. Sends to
/// chats in `failing_chats` fail; sends to `stalled_chats` never complete.
#[derive(Debug, Default)]
pub struct RecordingApi {
    log: Mutex<Vec<Sent>>,
    next_message_id: AtomicI64,
    failing_chats: HashSet<i64>,
    stalled_chats: HashSet<i64>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(chats: impl IntoIterator<Item = i64>) -> Self {
        Self {
            failing_chats: chats.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn stalling(chats: impl IntoIterator<Item = i64>) -> Self {
        Self {
            stalled_chats: chats.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Texts of messages and edits addressed to `chat_id`, oldest first.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Message { chat_id: to, text, .. } | Sent::Edit { chat_id: to, text, .. }
                    if to == chat_id =>
                {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat_id: i64) -> Option<String> {
        self.texts_to(chat_id).pop()
    }

    pub fn callback_answers(&self) -> Vec<(Option<String>, bool)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::CallbackAnswer {
                    text, show_alert, ..
                } => Some((text, show_alert)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatApi for RecordingApi {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> BotResult<i64> {
        if self.stalled_chats.contains(&chat_id) {
            std::future::pending::<()>().await;
        }
        if self.failing_chats.contains(&chat_id) {
            return Err(BotError::Api {
                method: "sendMessage".to_string(),
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.log.lock().unwrap().push(Sent::Message {
            chat_id,
            text: text.to_string(),
            markup,
        });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> BotResult<()> {
        self.log.lock().unwrap().push(Sent::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> BotResult<()> {
        self.log.lock().unwrap().push(Sent::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }
}

fn tg_user(user_id: i64) -> TgUser {
    TgUser {
        id: user_id,
        first_name: format!("user{user_id}"),
        username: None,
    }
}

/// A private-chat text message from `user_id`.
pub fn text_update(user_id: i64, text: &str) -> Update {
    Update {
        update_id: 0,
        message: Some(Message {
            message_id: 1,
            from: Some(tg_user(user_id)),
            chat: Chat { id: user_id },
            text: Some(text.to_string()),
        }),
        callback_query: None,
    }
}

/// A button press by `user_id` on message 500 of their private chat.
pub fn callback_update(user_id: i64, data: &str) -> Update {
    Update {
        update_id: 0,
        message: None,
        callback_query: Some(CallbackQuery {
            id: format!("cb-{user_id}-{data}"),
            from: tg_user(user_id),
            message: Some(Message {
                message_id: 500,
                from: None,
                chat: Chat { id: user_id },
                text: None,
            }),
            data: Some(data.to_string()),
        }),
    }
}
