//! channel-gate - background reconciliation service.
//!
//! Loads configuration, wires the adapters, then runs the expiry sweeper, the
//! reminder scheduler and the statistics report until Ctrl-C.

use std::sync::Arc;

use teloxide::Bot;
use tokio::sync::watch;

use channel_gate::adapters::{
    PostgresEntitlementStore, RecordingNotifier, StubChannelProvider, TelegramChannel,
    TelegramNotifier, YooKassaConfig, YooKassaGateway,
};
use channel_gate::application::{
    ExpirySweeper, ExpirySweeperConfig, ReconcileContext, ReconcileSettings,
    ReconciliationEngine, ReminderConfig, ReminderScheduler, StatsConfig, StatsReporter,
};
use channel_gate::config::AppConfig;
use channel_gate::ports::{ChannelProvider, Notifier};
use channel_gate::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server.log_level, config.server.log_json);
    tracing::info!(
        environment = ?config.server.environment,
        price_minor = config.subscription.price_minor,
        currency = %config.subscription.currency,
        "Starting channel-gate"
    );

    tracing::info!(database = %config.database.redacted_url(), "Connecting to database");
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }
    let store = Arc::new(PostgresEntitlementStore::new(pool));

    let mut yookassa = YooKassaConfig::new(
        config.payment.yookassa_shop_id.clone(),
        config.payment.yookassa_secret_key.clone(),
        config.payment.return_url.clone(),
    )
    .with_timeout(std::time::Duration::from_secs(config.payment.call_timeout_secs));
    if config.payment.is_custom_endpoint() {
        yookassa = yookassa.with_base_url(config.payment.api_base_url.clone());
    }
    let gateway = Arc::new(YooKassaGateway::new(yookassa));

    let (channel, notifier): (Arc<dyn ChannelProvider>, Arc<dyn Notifier>) =
        if config.telegram.has_bot() {
            let bot = Bot::new(config.telegram.bot_token.clone());
            (
                Arc::new(TelegramChannel::new(bot.clone(), config.telegram.channel_id)),
                Arc::new(TelegramNotifier::new(bot, config.telegram.admin_id_list())),
            )
        } else {
            tracing::warn!("No bot token configured; channel access and notifications are stubbed");
            (
                Arc::new(StubChannelProvider::new()),
                Arc::new(RecordingNotifier::new()),
            )
        };

    let settings = ReconcileSettings::from_config(&config)?;
    let ctx = ReconcileContext::new(store, gateway, channel, notifier, settings);
    let engine = Arc::new(ReconciliationEngine::new(Arc::new(ctx)));

    let sweeper = ExpirySweeper::new(
        Arc::clone(&engine),
        ExpirySweeperConfig::default()
            .with_interval(config.sweeper.interval())
            .with_concurrency(config.sweeper.concurrency),
    );
    let reminders = ReminderScheduler::new(
        Arc::clone(&engine),
        ReminderConfig {
            days: config.sweeper.reminder_day_list(),
            interval: config.sweeper.reminder_interval(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { sweeper.run(rx).await })
    };
    let reminder_task = {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { reminders.run(rx).await })
    };
    let mut tasks = vec![sweeper_task, reminder_task];

    match config.sweeper.stats_interval() {
        Some(interval) => {
            let reporter = StatsReporter::new(Arc::clone(&engine), StatsConfig { interval });
            tasks.push(tokio::spawn(async move { reporter.run(shutdown_rx).await }));
        }
        None => tracing::info!("Statistics reports disabled"),
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task ended abnormally");
        }
    }

    tracing::info!("channel-gate stopped");
    Ok(())
}
