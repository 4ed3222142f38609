//! Helpers shared by the engine's unit tests.

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::attendance::{AttendanceEngine, EngineConfig};
use crate::store::{NewUser, Store};

/// Creates a migrated in-memory SQLite store.
///
/// The pool is limited to one connection so every task sees the same
/// in-memory database; concurrent callers still interleave between queries.
pub(crate) async fn setup_store() -> Store {
    init_test_tracing();

    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    Store::new(db)
}

pub(crate) async fn setup_engine() -> AttendanceEngine {
    AttendanceEngine::new(setup_store().await, EngineConfig::default())
}

pub(crate) fn new_user(user_id: i64, last_name: &str, first_name: &str) -> NewUser {
    NewUser::new(user_id, last_name, first_name, None, "G-101")
}

/// Stderr subscriber honouring RUST_LOG, WARN by default.
fn init_test_tracing() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    // Another test may already have installed the global subscriber.
    let _ = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();
}
