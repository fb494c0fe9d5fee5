//! Terminal rendering of sync progress events.

use console::style;

use scribe::sync::{ProgressCallback, SyncProgress};

/// Build a progress callback that prints to the terminal when attached to
/// a TTY and logs through tracing otherwise.
pub(crate) fn reporter(is_tty: bool) -> ProgressCallback {
    Box::new(move |event| {
        if is_tty {
            print_event(&event);
        } else {
            log_event(&event);
        }
    })
}

fn print_event(event: &SyncProgress) {
    match event {
        SyncProgress::FetchingCommits { repository, since } => {
            println!("{} fetching commits since {}", style(repository).cyan(), since);
        }
        SyncProgress::FetchedPage {
            repository,
            page,
            count,
            total_so_far,
        } => {
            println!("  {repository}: page {page} (+{count}, {total_so_far} total)");
        }
        SyncProgress::DedupComplete {
            repository,
            known,
            complete,
        } => {
            if !complete {
                println!(
                    "  {} {repository}: dedup index incomplete ({known} known), duplicates possible",
                    style("!").yellow()
                );
            }
        }
        SyncProgress::WritingBatch {
            repository,
            candidates,
            skipped_cached,
        } => {
            println!("  {repository}: writing {candidates} new commits ({skipped_cached} already mirrored)");
        }
        SyncProgress::RepoSynced {
            repository,
            fetched,
            processed,
            skipped,
            errors,
        } => {
            println!(
                "{} {}: {} fetched, {} written, {} skipped, {} errors",
                style("✓").green(),
                repository,
                fetched,
                processed,
                skipped,
                errors
            );
        }
        SyncProgress::RepoFailed { repository, error } => {
            println!("{} {}: {}", style("✗").red(), repository, error);
        }
        SyncProgress::RateLimitBackoff {
            context,
            retry_after_ms,
            attempt,
        } => {
            println!(
                "  {} rate limited on {context}, retrying in {retry_after_ms}ms (attempt {attempt})",
                style("…").yellow()
            );
        }
        SyncProgress::Warning { message } => {
            println!("{} {}", style("warning:").yellow(), message);
        }
        _ => {}
    }
}

fn log_event(event: &SyncProgress) {
    match event {
        SyncProgress::RepoSynced {
            repository,
            fetched,
            processed,
            skipped,
            errors,
        } => {
            tracing::info!(
                repository = %repository,
                fetched = *fetched,
                processed = *processed,
                skipped = *skipped,
                errors = *errors,
                "Repository synced"
            );
        }
        SyncProgress::RepoFailed { repository, error } => {
            tracing::warn!(repository = %repository, error = %error, "Repository sync failed");
        }
        SyncProgress::Warning { message } => {
            tracing::warn!(message = %message, "Sync warning");
        }
        SyncProgress::RateLimitBackoff {
            context,
            retry_after_ms,
            attempt,
        } => {
            tracing::debug!(
                context = %context,
                retry_after_ms = *retry_after_ms,
                attempt = *attempt,
                "Rate limit backoff"
            );
        }
        _ => {}
    }
}
