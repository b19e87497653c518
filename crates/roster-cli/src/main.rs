//! `roster` - record service for subjects and staff.
//!
//! # Usage
//!
//! ```text
//! # consume subject creation messages, one JSON object per stdin line
//! roster consume < subjects.jsonl
//!
//! # print a page of records as JSON lines
//! roster list subjects --page 1 --limit 20 --field first_name --value an
//! ```
//!
//! Configuration is read from the environment (and `.env`); see
//! [`config::ServiceConfig`].

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use config::ServiceConfig;
use roster_core::{ListRequest, Visibility};
use roster_service::{
    BrokerConsumer, BrokerProducer, ChannelBroker, ChannelProducer, CreationConsumer,
    ObjectStorage, RecordService, StaffView, SubjectView,
};
use roster_storage::{Database, StaffStore, SubjectStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "roster", about = "Record service for subjects and staff")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the subject creation consumer, feeding it JSON lines from stdin.
    Consume,

    /// Print one page of records as JSON lines.
    List {
        #[arg(value_enum)]
        kind: Kind,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// Column to prefix-match against `--value`.
        #[arg(long, default_value = "")]
        field: String,

        #[arg(long, default_value = "")]
        value: String,

        /// Comma-separated `column [asc|desc]` terms.
        #[arg(long, default_value = "")]
        order_by: String,

        /// Include soft-deleted records.
        #[arg(long)]
        include_deleted: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Subjects,
    Staff,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::from_env().context("reading configuration")?;

    init_tracing(&config);
    info!(
        app = %config.app,
        environment = %config.environment,
        version = roster_core::VERSION,
        "starting"
    );

    let db = Database::new(config.database_config())
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;

    let result = match args.command.unwrap_or(Command::Consume) {
        Command::Consume => consume(&config, &db).await,
        Command::List {
            kind,
            page,
            limit,
            field,
            value,
            order_by,
            include_deleted,
        } => {
            let request = ListRequest::new()
                .page(page, limit)
                .prefix(field, value)
                .order_by(order_by)
                .visibility(Visibility::from_include_deleted(include_deleted));
            list(&config, &db, kind, &request).await
        }
    };

    db.close().await;
    result
}

fn init_tracing(config: &ServiceConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if config.is_production() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn consume(config: &ServiceConfig, db: &Database) -> Result<()> {
    let service = Arc::new(RecordService::new(
        SubjectStore::new(db.pool().clone()),
        config.context_timeout,
    ));
    let consumer = CreationConsumer::new(service)
        .brokers(config.broker_addresses.clone())
        .topic(config.subject_create_topic.clone())
        .group_id(config.consumer_group.clone());

    let (mut broker, producer) = ChannelBroker::new(config.broker_capacity);
    let cancel = CancellationToken::new();

    let feeder = tokio::spawn(feed_stdin(
        producer,
        config.subject_create_topic.clone(),
        cancel.clone(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        signal_cancel.cancel();
    });

    consumer
        .run(&mut broker, cancel.clone())
        .await
        .context("running creation consumer")?;

    cancel.cancel();
    broker.close().await?;
    if let Err(err) = feeder.await {
        warn!(error = %err, "stdin feeder task failed");
    }

    for letter in broker.dead_letters() {
        error!(
            topic = %letter.message.topic,
            error = %letter.error,
            "message rejected"
        );
    }
    info!(
        delivered = broker.delivered(),
        rejected = broker.dead_letters().len(),
        "creation consumer stopped"
    );
    Ok(())
}

/// Forward each non-blank stdin line as one message until EOF or cancellation.
///
/// Meant for piped input: a pending interactive read cannot be interrupted,
/// so shutdown waits for the next line or EOF.
async fn feed_stdin(producer: ChannelProducer, topic: String, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                if let Err(err) = producer.send_raw(topic.clone(), Bytes::new(), line).await {
                    warn!(error = %err, "broker stopped accepting messages");
                    break;
                }
            }
            Ok(None) => {
                info!("stdin closed");
                break;
            }
            Err(err) => {
                error!(error = %err, "reading stdin failed");
                break;
            }
        }
    }

    if let Err(err) = producer.close().await {
        warn!(error = %err, "closing producer failed");
    }
}

async fn list(
    config: &ServiceConfig,
    db: &Database,
    kind: Kind,
    request: &ListRequest,
) -> Result<()> {
    let storage: &ObjectStorage = &config.object_storage;

    match kind {
        Kind::Subjects => {
            let service =
                RecordService::new(SubjectStore::new(db.pool().clone()), config.context_timeout);
            for subject in service.list(request).await? {
                println!("{}", serde_json::to_string(&SubjectView::new(&subject, storage))?);
            }
        }
        Kind::Staff => {
            let service =
                RecordService::new(StaffStore::new(db.pool().clone()), config.context_timeout);
            for staff in service.list(request).await? {
                println!("{}", serde_json::to_string(&StaffView::new(&staff, storage))?);
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
