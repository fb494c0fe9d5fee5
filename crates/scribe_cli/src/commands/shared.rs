//! Helpers shared by the backfill and serve commands.

use std::sync::Arc;

use url::Url;

use scribe::store::{HttpRecordStore, StoreConfig};

use crate::config;

/// Default collection name when none is configured.
const DEFAULT_COLLECTION: &str = "commits";

/// Build the record store client from configuration.
///
/// Missing credentials are fatal here, at startup, before any work starts.
pub(crate) fn build_store(
    config: &config::Config,
) -> Result<Arc<HttpRecordStore>, Box<dyn std::error::Error>> {
    let base_url = config.store.base_url.as_deref().expect(
        "No record store URL configured. Set SCRIBE_STORE_BASE_URL or [store].base_url in the config file.",
    );
    let token = config.store.token.as_deref().expect(
        "No record store token configured. Set SCRIBE_STORE_TOKEN or [store].token in the config file.",
    );
    let collection = config
        .store
        .collection
        .as_deref()
        .unwrap_or(DEFAULT_COLLECTION);

    let base_url: Url = base_url.parse()?;
    let mut store_config = StoreConfig::new(base_url, token, collection);
    if let Some(rps) = config.store.requests_per_second {
        store_config.requests_per_second = rps;
    }

    Ok(Arc::new(HttpRecordStore::new(store_config)?))
}
