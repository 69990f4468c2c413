use tokio::io::{BufReader, stdin, stdout};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use event_streams::shared::infrastructure::change_notifier::broadcast::BroadcastHub;
use event_streams::shared::infrastructure::durable_store::lazy::LazyStore;
use event_streams::shared::infrastructure::durable_store::redb_store::RedbDurableStore;
use event_streams::shell::config::Config;
use event_streams::shell::stdio::serve;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!(db_path = %config.db_path.display(), sessions = config.sessions, "Starting event store");

    let store_config = config.store();
    let store = LazyStore::new(move || RedbDurableStore::open(store_config.clone()));
    let hub = BroadcastHub::new(config.notify_capacity);

    serve(store, &hub, config.sessions, BufReader::new(stdin()), stdout()).await
}
