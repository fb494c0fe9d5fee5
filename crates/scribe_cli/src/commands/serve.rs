use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use console::Term;

use scribe::dedup::DedupCache;
use scribe::ingest::BatchWriter;
use scribe::store::RecordStore;
use scribe::webhook::{self, WebhookState};

use crate::commands::shared::build_store;
use crate::config;

pub(crate) async fn handle_serve(
    bind: Option<SocketAddr>,
    config: &config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(config)?;
    let secret = config.webhook_secret().expect(
        "No webhook secret configured. Set SCRIBE_WEBHOOK_SECRET or [webhook].secret in the config file.",
    );

    let addr: SocketAddr = match bind {
        Some(addr) => addr,
        None => config.webhook.bind.parse()?,
    };

    let dedup = Arc::new(DedupCache::default());
    let writer = Arc::new(BatchWriter::new(store as Arc<dyn RecordStore>, dedup));
    let state = WebhookState::new(secret, writer)
        .with_write_timeout(Duration::from_secs(config.webhook.write_timeout_secs));

    if Term::stdout().is_term() {
        println!("Webhook receiver listening on http://{addr}/webhook");
        println!("Press Ctrl+C to stop.");
    }

    webhook::serve(addr, state).await?;

    Ok(())
}
