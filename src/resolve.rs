use tracing::{debug, info, warn};

use crate::{
    forge::Forge,
    types::{CommentId, Error, PrScope},
};

/// Result of [`set_resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResolutionOutcome {
    /// The mutation was issued and the read-back state matches the target.
    Applied { resolved: bool },
    /// The thread was already in the requested state and the caller did not
    /// ask to proceed anyway.
    NoOp { resolved: bool },
}

/// Resolves or unresolves the thread containing one specific comment.
///
/// The existence re-fetch is mandatory and precedes any mutation attempt.
/// When the thread is already in the requested state, nothing is mutated
/// unless `proceed_on_noop` is set; callers wanting interactive behaviour
/// surface the [`SetResolutionOutcome::NoOp`] and call again after
/// confirmation. The mutation's read-back state is compared against the
/// target rather than assumed.
pub async fn set_resolution<F>(
    forge: &F,
    scope: &PrScope,
    raw_comment_id: &str,
    target_resolved: bool,
    proceed_on_noop: bool,
) -> Result<SetResolutionOutcome, Error>
where
    F: Forge + Sync,
{
    let id = raw_comment_id
        .trim()
        .parse::<CommentId>()
        .map_err(|err| Error::InvalidArgument(format!("comment id '{raw_comment_id}': {err}")))?;

    let comment = forge
        .get_review_comment(&scope.repo, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("review comment {id} not found")))?;
    debug!(%id, author = %comment.author, "comment exists");

    let threads = forge.list_review_threads(scope).await?;
    let thread = threads
        .iter()
        .find(|thread| thread.contains(id))
        .ok_or_else(|| Error::NotFound(format!("no review thread contains comment {id}")))?;

    if thread.is_resolved == target_resolved {
        if !proceed_on_noop {
            warn!(thread = %thread.id, resolved = thread.is_resolved, "thread already in the requested state, not mutating");
            return Ok(SetResolutionOutcome::NoOp {
                resolved: thread.is_resolved,
            });
        }
        info!(thread = %thread.id, "thread already in the requested state, re-applying anyway");
    }

    let actual = if target_resolved {
        forge.resolve_thread(&thread.id).await?
    } else {
        forge.unresolve_thread(&thread.id).await?
    };

    if actual != target_resolved {
        return Err(Error::MutationDidNotApply {
            thread_id: thread.id.clone(),
            expected: target_resolved,
            actual,
        });
    }

    Ok(SetResolutionOutcome::Applied { resolved: actual })
}
