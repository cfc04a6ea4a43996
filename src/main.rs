mod bot;
mod config;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use bot::{BotState, Delivery, InboundEvent, Store, TelegramClient};
use config::Config;

/// Commands shown in the Telegram command menu.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum MenuCommand {
    #[command(description = "start or restart the monthly submission")]
    Start,
    #[command(description = "delete your stored data")]
    Clear,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "meterbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("meterbot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting meterbot...");
    info!("Loaded config from {config_path}");

    let store = match Store::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "failed to open database '{}': {}",
                config.database_path.display(),
                e
            );
            std::process::exit(1);
        }
    };
    info!("Database ready at {}", config.database_path.display());

    if let Err(e) = bot.set_my_commands(MenuCommand::bot_commands()).await {
        warn!("Failed to register command menu: {e}");
    }

    let delivery: Arc<dyn Delivery> = Arc::new(TelegramClient::new(bot.clone()));
    let state = Arc::new(BotState::new(
        store,
        delivery,
        config.timezone,
        config.reminder_hour,
    ));

    bot::reminder::spawn(state.clone(), config.reminder_schedule.clone());
    bot::receipts::spawn(state.clone(), config.receipt_poll_interval);
    info!(
        "Reminders anchored at {:02}:00 {}; receipts checked every {:?}",
        config.reminder_hour, config.timezone, config.receipt_poll_interval
    );

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    // The submission flow is strictly one-on-one.
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return Ok(());
    }

    bot::router::handle_event(&state, telegram_to_event(&msg)).await;
    Ok(())
}

fn telegram_to_event(msg: &Message) -> InboundEvent {
    InboundEvent {
        chat_id: msg.chat.id.0,
        text: msg.text().map(String::from),
        contact: msg.contact().map(|c| c.phone_number.clone()),
    }
}
