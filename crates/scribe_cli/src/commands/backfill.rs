use std::sync::Arc;

use console::Term;

use scribe::commit::RepoId;
use scribe::dedup::DedupCache;
use scribe::ingest::{BatchWriter, WriteOptions};
use scribe::source::GitHubSource;
use scribe::store::RecordStore;
use scribe::sync::{BackfillMode, SyncEngine, SyncOptions};

use crate::commands::shared::build_store;
use crate::{BackfillOptions, config, progress};

pub(crate) async fn handle_backfill(
    repos: Vec<String>,
    opts: BackfillOptions,
    config: &config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let repos: Vec<RepoId> = repos
        .iter()
        .map(|r| r.parse())
        .collect::<Result<_, _>>()?;

    let store = build_store(config)?;
    let github_token = config.github_token().expect(
        "No GitHub token configured. Set SCRIBE_GITHUB_TOKEN or [github].token in the config file.",
    );
    let source = Arc::new(GitHubSource::new(&github_token)?);

    let dedup = Arc::new(DedupCache::default());
    let writer = BatchWriter::with_options(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        dedup,
        WriteOptions {
            skip_legacy_scan: opts.fast,
            ..WriteOptions::default()
        },
    );

    let options = SyncOptions {
        chunk_size: config.sync.chunk_size,
        overlap_days: config.sync.overlap_days,
        fallback_lookback_days: config.sync.fallback_lookback_days,
        ..SyncOptions::default()
    };
    let engine = SyncEngine::with_options(store, source, writer, options);

    let mode = match opts.months {
        Some(months) => BackfillMode::FixedWindow { months },
        None => BackfillMode::Incremental,
    };

    let is_tty = Term::stdout().is_term();
    if is_tty {
        match &mode {
            BackfillMode::FixedWindow { months } => {
                println!(
                    "Backfilling {} repositories over the last {} month(s)...\n",
                    repos.len(),
                    months
                );
            }
            BackfillMode::Incremental => {
                println!("Incrementally syncing {} repositories...\n", repos.len());
            }
        }
    }

    let callback = progress::reporter(is_tty);
    let stats = engine.sync_repositories(&repos, &mode, Some(&callback)).await;

    if is_tty {
        println!();
        println!(
            "Repositories: {} synced, {} failed",
            stats.successful, stats.failed
        );
        println!(
            "Commits:      {} fetched, {} written, {} skipped, {} errors",
            stats.fetched, stats.processed, stats.skipped, stats.errors
        );
    } else {
        tracing::info!(
            successful = stats.successful,
            failed = stats.failed,
            fetched = stats.fetched,
            processed = stats.processed,
            skipped = stats.skipped,
            errors = stats.errors,
            "Backfill complete"
        );
    }

    Ok(())
}
