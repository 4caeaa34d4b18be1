use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    forge::Forge,
    types::{
        BatchResult, BatchStatus, CommentId, Error, MatchSet, Outcome, OutcomeKind, PrScope,
        ReviewComment,
    },
};

/// What discovery found: the match set handed to the batch loop, plus the
/// matched comments as they looked at discovery time (for display only).
#[derive(Debug)]
pub struct Discovery {
    pub matches: MatchSet,
    pub comments: Vec<ReviewComment>,
}

/// Settings for one batch run.
#[derive(Debug)]
pub struct BatchOptions {
    pub reply_text: String,
    pub delay: Duration,
    pub cancel: CancellationToken,
}

impl BatchOptions {
    pub fn new(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            delay: Duration::from_millis(500),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Finds the review comments whose body contains `predicate`.
///
/// Fetches the whole paginated collection before filtering, and preserves
/// listing order. An empty result is a valid, non-error outcome.
pub async fn discover<F>(
    forge: &F,
    scope: &PrScope,
    predicate: &str,
) -> Result<Discovery, Error>
where
    F: Forge + Sync,
{
    if predicate.is_empty() {
        return Err(Error::InvalidArgument(
            "search text must not be empty".to_string(),
        ));
    }

    let all = forge.list_review_comments(scope).await?;
    let comments: Vec<ReviewComment> = all
        .into_iter()
        .filter(|comment| comment.body.contains(predicate))
        .collect();

    let matches = MatchSet {
        predicate: predicate.to_string(),
        entries: comments.iter().map(|c| c.id.to_string()).collect(),
    };

    debug!(%scope, predicate, matched = matches.len(), "discovery complete");
    Ok(Discovery { matches, comments })
}

/// Replies to and resolves every comment in the match set, one at a time.
///
/// Each item is re-fetched and re-validated against the predicate
/// immediately before it is mutated; the match set itself is only a hint. A
/// comment whose fresh body no longer matches aborts the whole batch
/// (fail-closed), because a divergence there means discovery can no longer
/// be trusted to have identified the right targets. Everything else is a
/// per-item soft failure: recorded, then on to the next item.
pub async fn process_batch<F>(
    forge: &F,
    scope: &PrScope,
    matches: &MatchSet,
    opts: &BatchOptions,
) -> Result<BatchResult, Error>
where
    F: Forge + Sync,
{
    if matches.predicate.is_empty() {
        return Err(Error::InvalidArgument(
            "match set has an empty predicate".to_string(),
        ));
    }
    if opts.reply_text.is_empty() {
        return Err(Error::InvalidArgument(
            "reply text must not be empty".to_string(),
        ));
    }

    let mut outcomes = Vec::new();

    for (index, raw_id) in matches.entries.iter().enumerate() {
        // Cancellation is honoured between items only; a validate+mutate
        // pair in flight always runs to completion.
        if opts.cancel.is_cancelled() {
            info!(processed = index, "cancellation requested, stopping batch");
            return Ok(BatchResult {
                outcomes,
                status: BatchStatus::Cancelled,
            });
        }

        if index > 0 && !opts.delay.is_zero() {
            tokio::time::sleep(opts.delay).await;
        }

        let id = match raw_id.parse::<CommentId>() {
            Ok(id) => id,
            Err(err) => {
                warn!(raw_id = %raw_id, %err, "skipping malformed comment id");
                outcomes.push(Outcome::new(raw_id, OutcomeKind::SkippedInvalidId));
                continue;
            }
        };

        let comment = match forge.get_review_comment(&scope.repo, id).await {
            Ok(Some(comment)) => comment,
            Ok(None) => {
                warn!(%id, "comment vanished since discovery, skipping");
                outcomes.push(Outcome::new(raw_id, OutcomeKind::SkippedNotFound));
                continue;
            }
            Err(err) => {
                warn!(%id, %err, "re-fetch failed, skipping");
                outcomes.push(Outcome::new(raw_id, OutcomeKind::SkippedNotFound));
                continue;
            }
        };

        if !comment.body.contains(&matches.predicate) {
            warn!(%id, "re-fetched body no longer contains the search text, aborting batch");
            return Ok(BatchResult {
                outcomes,
                status: BatchStatus::AbortedOnMismatch {
                    raw_id: raw_id.clone(),
                },
            });
        }

        // Reply first; its failure never blocks the resolve attempt.
        match forge.create_reply(scope, id, &opts.reply_text).await {
            Ok(reply) => {
                debug!(%id, reply_id = %reply.id, "replied");
                outcomes.push(Outcome::new(raw_id, OutcomeKind::Replied));
            }
            Err(err) => {
                warn!(%id, %err, "reply failed");
                outcomes.push(Outcome::new(raw_id, OutcomeKind::ReplyFailed));
            }
        }

        outcomes.push(resolve_containing_thread(forge, scope, id, raw_id).await);
    }

    Ok(BatchResult {
        outcomes,
        status: BatchStatus::Completed,
    })
}

// Thread membership is not indexed remotely, so this lists threads fresh and
// scans linearly for the comment: O(items x threads) across a batch.
async fn resolve_containing_thread<F>(
    forge: &F,
    scope: &PrScope,
    id: CommentId,
    raw_id: &str,
) -> Outcome
where
    F: Forge + Sync,
{
    let threads = match forge.list_review_threads(scope).await {
        Ok(threads) => threads,
        Err(err) => {
            warn!(%id, %err, "thread listing failed");
            return Outcome::new(raw_id, OutcomeKind::ResolveFailed);
        }
    };

    let Some(thread) = threads.iter().find(|thread| thread.contains(id)) else {
        warn!(%id, "no review thread contains this comment");
        return Outcome::new(raw_id, OutcomeKind::ResolveFailed);
    };

    if thread.is_resolved {
        debug!(%id, thread = %thread.id, "thread already resolved");
        return Outcome::new(raw_id, OutcomeKind::AlreadyResolved);
    }

    match forge.resolve_thread(&thread.id).await {
        Ok(true) => Outcome::new(raw_id, OutcomeKind::Resolved),
        Ok(false) => {
            warn!(%id, thread = %thread.id, "resolve mutation reported the thread unresolved");
            Outcome::new(raw_id, OutcomeKind::ResolveFailed)
        }
        Err(err) => {
            warn!(%id, thread = %thread.id, %err, "resolve mutation failed");
            Outcome::new(raw_id, OutcomeKind::ResolveFailed)
        }
    }
}
