use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inbox::badge::UnreadBadge;
use inbox::cli::{self, Commands};
use inbox::config::{self, Config};
use inbox::errors::SyncError;
use inbox::filter::{NotificationFilter, ReadFilter};
use inbox::models::notification::{ListQuery, Notification, NotificationId, NotificationType};
use inbox::sync::{EngineOptions, NoticeLevel, SyncEngine, SyncEvent};
use inbox::transport::http::HttpTransport;
use inbox::transport::NotificationTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // Export spans only when a collector is configured.
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "inbox"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let json_logs = std::env::var("INBOX_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (plain_layer, json_layer) = if json_logs {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "inbox=info".into()),
        ))
        .with(plain_layer)
        .with(json_layer)
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();
    let mut cfg = config::load()?;
    if let Some(url) = args.api_url {
        cfg.api_url = url;
    }
    if args.token.is_some() {
        cfg.api_token = args.token;
    }

    let transport: Arc<dyn NotificationTransport> = Arc::new(
        HttpTransport::new(
            &cfg.api_url,
            cfg.api_token.clone(),
            cfg.request_timeout,
            cfg.retry(),
        )
        .context("failed to build notification transport")?,
    );

    // Returning the error lets the runtime print it once, with its causes.
    run(args.command, &cfg, transport).await
}

async fn run(
    command: Commands,
    cfg: &Config,
    transport: Arc<dyn NotificationTransport>,
) -> anyhow::Result<()> {
    match command {
        Commands::List {
            kind,
            status,
            limit,
            offset,
        } => {
            let kind = kind.map(NotificationType::from);
            let query = ListQuery {
                notification_type: kind.clone(),
                is_read: match status {
                    ReadFilter::All => None,
                    ReadFilter::Unread => Some(false),
                    ReadFilter::Read => Some(true),
                },
                limit,
                offset,
            };
            let items = transport
                .list(&query)
                .await
                .context("failed to list notifications")?;
            // The store may ignore filters it does not know; apply them locally too.
            let items = NotificationFilter { kind, status }.apply(&items);
            if items.is_empty() {
                println!("No notifications");
            }
            for n in &items {
                print_notification(n);
            }
            Ok(())
        }
        Commands::Count => {
            let count = transport
                .fetch_unread_count()
                .await
                .context("failed to fetch unread count")?;
            println!("{}", count);
            Ok(())
        }
        Commands::Read { id } => {
            let id = NotificationId::from(id);
            let engine = mounted(cfg, transport.clone()).await;
            let result = match engine.mark_read(&id).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    println!("Notification {} is already read", id);
                    Ok(())
                }
                // Not on the first page; the store still knows it.
                Err(SyncError::NotFound(_)) => transport.mark_read(&id).await,
                Err(e) => Err(e),
            };
            engine.deactivate();
            result.context("failed to mark notification as read")
        }
        Commands::ReadAll => {
            let engine = mounted(cfg, transport).await;
            let result = engine.mark_all_read().await;
            engine.deactivate();
            result.context("failed to mark all notifications as read")?;
            println!("All notifications marked as read");
            Ok(())
        }
        Commands::Delete { id } => {
            let id = NotificationId::from(id);
            let engine = mounted(cfg, transport).await;
            let result = engine.delete(&id).await;
            let unread = engine.unread_count();
            engine.deactivate();
            result.context("failed to delete notification")?;
            println!("Deleted {} ({} unread)", id, unread);
            Ok(())
        }
        Commands::Clear => {
            let engine = mounted(cfg, transport).await;
            let result = engine.clear().await;
            engine.deactivate();
            result.context("failed to delete all notifications")?;
            println!("All notifications deleted");
            Ok(())
        }
        Commands::Watch { interval } => {
            let period = interval
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(cfg.poll_interval);
            watch(cfg, transport, period).await
        }
    }
}

async fn mounted(cfg: &Config, transport: Arc<dyn NotificationTransport>) -> SyncEngine {
    let engine = SyncEngine::new(
        transport,
        EngineOptions {
            poll_interval: cfg.poll_interval,
            policy: cfg.mutation_policy(),
            ..EngineOptions::default()
        },
    );
    if let Err(e) = engine.activate().await {
        tracing::warn!(error = %e, "initial notification load failed");
    }
    engine
}

async fn watch(
    cfg: &Config,
    transport: Arc<dyn NotificationTransport>,
    period: Duration,
) -> anyhow::Result<()> {
    let mut badge = UnreadBadge::mount(transport.clone(), period);
    let engine = SyncEngine::new(
        transport,
        EngineOptions {
            poll_interval: period,
            policy: cfg.mutation_policy(),
            ..EngineOptions::default()
        },
    );
    let mut events = engine.subscribe();
    let mut badge_rx = badge.subscribe();

    match engine.activate().await {
        Ok(total) => println!("Loaded {} notifications", total),
        Err(e) => eprintln!("Initial load failed: {}", e),
    }
    for n in engine.notifications() {
        print_notification(&n);
    }
    println!("Unread: {}", engine.unread_count());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = badge_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *badge_rx.borrow_and_update();
                println!("[badge] unread: {}", count);
            }
            event = events.recv() => match event {
                Ok(SyncEvent::UnreadChanged(count)) => println!("[inbox] unread: {}", count),
                Ok(SyncEvent::ListRefreshed { total }) => println!("[inbox] {} notifications", total),
                Ok(SyncEvent::Notice(notice)) => match notice.level {
                    NoticeLevel::Success => println!("{}", notice.message),
                    NoticeLevel::Error => eprintln!("{}", notice.message),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.deactivate();
    badge.unmount();
    println!("Stopped watching");
    Ok(())
}

fn print_notification(n: &Notification) {
    let mark = if n.is_read { " " } else { "*" };
    println!(
        "{} {:>6}  {:<20}  {}  {}: {}",
        mark,
        n.notification_id,
        n.notification_type,
        n.created_at.format("%Y-%m-%d %H:%M"),
        n.title,
        n.message
    );
}
