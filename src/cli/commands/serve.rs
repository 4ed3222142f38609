use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use super::initdb::run_migrations;
use crate::bot::Bot;
use crate::bot::telegram::TelegramClient;
use crate::config::{Settings, connect_database, initialize_app_state};
use crate::router::create_router;

pub async fn serve(settings: Settings, no_bot: bool) -> Result<()> {
    trace!("Entering serve function");
    info!("Rollcall starting up");
    debug!("Bind address: {}", settings.bind_address);
    debug!("Event days: {}", settings.day_count);

    let admins = match settings.admin_set() {
        Ok(admins) => admins,
        Err(e) => {
            error!("Invalid admin id list '{}': {}", settings.admin_ids, e);
            return Err(e.into());
        }
    };
    if admins.is_empty() {
        warn!("No admin ids configured; the admin panel is unreachable");
    } else {
        info!("{} admin(s) configured", admins.len());
    }

    let db = connect_database(&settings.database_url).await?;
    run_migrations(&db).await?;

    let state = initialize_app_state(db, &settings);
    let engine = state.engine.clone();
    debug!("Application state initialized successfully");

    trace!("Creating application router");
    let app = create_router(state, settings.webapp_dir.as_deref());
    if let Some(dir) = &settings.webapp_dir {
        info!("Serving mini-app files from {}", dir.display());
    }

    info!("Starting server on {}", settings.bind_address);
    let listener = match TcpListener::bind(&settings.bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", settings.bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", settings.bind_address, e);
            return Err(e.into());
        }
    };
    info!("Rollcall API server running on http://{}", settings.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", settings.bind_address);

    let api = async {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(anyhow::Error::from(e));
        }
        Ok(())
    };

    if no_bot {
        info!("Chat bot disabled");
        api.await?;
    } else {
        let client = TelegramClient::new(&settings.bot_token)?;
        let bot = Arc::new(Bot::new(client, engine, admins, settings.webapp_url.clone()));
        tokio::select! {
            result = api => result?,
            result = bot.run() => {
                if let Err(e) = &result {
                    error!("Chat bot stopped: {}", e);
                }
                result?
            }
        }
    }

    info!("Server shutdown gracefully");
    Ok(())
}
