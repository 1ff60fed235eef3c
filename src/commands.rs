use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use fsstore::config::Config;
use fsstore::observability::MetricsSnapshot;
use fsstore::poller::HeadPoller;
use fsstore::store::{EventStore, FsStore, TrimStats, retention};
use fsstore::stream::{self, EventStream};

use crate::cli::{AppendArgs, Commands, GetArgs, StreamArgs, TrimArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Serialize)]
struct StoreInfo {
    root: PathBuf,
    identity: Uuid,
    head: u64,
    tail: u64,
    sharder_order: u32,
    metrics: MetricsSnapshot,
}

pub async fn run(command: Commands, config: Config) -> Result<(), AnyError> {
    match command {
        Commands::Init => println!("{}", open(&config)?.identity()),
        Commands::Info => info(&config)?,
        Commands::Append(args) => append(&config, args)?,
        Commands::Get(args) => get(&config, args)?,
        Commands::Trim(args) => trim(&config, args)?,
        Commands::Stream(args) => stream_events(&config, args).await?,
        Commands::Scavenge => {
            let done = open(&config)?.scavenge();
            println!("{}", serde_json::json!({ "done": done }));
        }
        Commands::Config => print!("{}", toml::to_string(&config)?),
    }
    Ok(())
}

fn open(config: &Config) -> Result<FsStore, AnyError> {
    Ok(FsStore::open_with(&config.store.root, config.store_options())?)
}

fn info(config: &Config) -> Result<(), AnyError> {
    let info = store_info(&open(config)?)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Counters only cover what this process did, including opening the store.
fn store_info(store: &FsStore) -> Result<StoreInfo, AnyError> {
    Ok(StoreInfo {
        root: store.root().to_path_buf(),
        identity: store.identity(),
        head: store.head()?,
        tail: store.tail()?,
        sharder_order: store.sharder().order(),
        metrics: store.metrics(),
    })
}

fn append(config: &Config, args: AppendArgs) -> Result<(), AnyError> {
    let payload = match args.payload {
        Some(payload) => payload,
        None => {
            let mut payload = String::new();
            io::stdin().read_to_string(&mut payload)?;
            if payload.ends_with('\n') {
                payload.pop();
            }
            payload
        }
    };
    let position = open(config)?.append(&payload)?;
    println!("{position}");
    Ok(())
}

fn get(config: &Config, args: GetArgs) -> Result<(), AnyError> {
    match open(config)?.get(args.position)? {
        Some(payload) => {
            println!("{payload}");
            Ok(())
        }
        None => Err(format!("Event {} is not retained", args.position).into()),
    }
}

fn trim(config: &Config, args: TrimArgs) -> Result<(), AnyError> {
    let store = open(config)?;
    let mut removed = 0;
    if let Some(trim_id) = args.trim_id {
        removed += store.trim(trim_id)?.removed;
    }
    if let Some(size) = args.size {
        let upto = retention::keep_newest(store.head()?, size);
        removed += store.trim(upto)?.removed;
    }
    let stats = TrimStats {
        removed,
        tail: store.tail()?,
    };
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

async fn stream_events(config: &Config, args: StreamArgs) -> Result<(), AnyError> {
    let store: Arc<dyn EventStore> = Arc::new(open(config)?);
    let resume = args
        .resume_after
        .as_deref()
        .map(|arg| stream::parse_resume(arg, store.identity()))
        .transpose()?;
    let batch_size = config.stream.batch_size;

    let mut events = EventStream::new(Arc::clone(&store), resume, args.ids)?;
    events = drain(events, batch_size).await?;
    if !args.follow {
        return Ok(());
    }

    let poller = HeadPoller::spawn(
        Arc::clone(&store),
        config.stream.polling_interval.into(),
    )
    .await?;
    let mut heads = poller.subscribe();
    info!(sent = events.sent(), "Following event stream");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            changed = heads.changed() => {
                if changed.is_err() {
                    break;
                }
                events = drain(events, batch_size).await?;
            }
            _ = &mut shutdown => break,
        }
    }
    poller.shutdown();
    Ok(())
}

/// Print batches until the stream caught up with the head.
async fn drain(mut events: EventStream, batch_size: usize) -> Result<EventStream, AnyError> {
    loop {
        let before = events.sent();
        let (returned, lines) = tokio::task::spawn_blocking(move || {
            let lines = events.next_batch(batch_size);
            (events, lines)
        })
        .await?;
        events = returned;
        {
            let mut stdout = io::stdout().lock();
            for line in lines? {
                writeln!(stdout, "{line}")?;
            }
            stdout.flush()?;
        }
        if events.sent() == before {
            return Ok(events);
        }
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
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
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsstore::store::StoreOptions;
    use tempfile::TempDir;

    #[test]
    fn test_store_info_includes_metrics() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::open_with(temp.path(), StoreOptions::default()).unwrap();
        store.append("one").unwrap();
        store.append("two").unwrap();
        assert_eq!(store.get(7).unwrap(), None);

        let info = serde_json::to_value(store_info(&store).unwrap()).unwrap();
        assert_eq!(info["head"], 2);
        assert_eq!(info["tail"], 1);
        assert_eq!(info["identity"], store.identity().to_string());
        assert_eq!(info["metrics"]["appends"], 2);
        assert_eq!(info["metrics"]["misses"], 1);
        assert_eq!(info["metrics"]["head"]["updates"], 2);
    }
}
