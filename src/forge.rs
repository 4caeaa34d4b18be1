use async_trait::async_trait;

use crate::types::{CommentId, ForgeError, PrScope, Repo, ReviewComment, ReviewThread, ThreadId};

/// The remote review system consumed by this tool.
///
/// Everything the batch processor and the single-item resolver need from
/// GitHub sits behind this trait so both can run against a test double.
/// Existence checks are tri-state by construction: `Ok(Some)` found,
/// `Ok(None)` not found, `Err` remote failure.
#[async_trait]
pub trait Forge {
    /// Lists every review comment on the pull request. Paginated remotely;
    /// implementations consume all pages before returning.
    async fn list_review_comments(
        &self,
        scope: &PrScope,
    ) -> Result<Vec<ReviewComment>, ForgeError>;

    /// Fetches one review comment by identifier.
    async fn get_review_comment(
        &self,
        repo: &Repo,
        id: CommentId,
    ) -> Result<Option<ReviewComment>, ForgeError>;

    /// Posts a reply attached to an existing review comment.
    async fn create_reply(
        &self,
        scope: &PrScope,
        parent: CommentId,
        body: &str,
    ) -> Result<ReviewComment, ForgeError>;

    /// Lists every review thread on the pull request, each embedding its
    /// member comment ids and resolved flag. Threads are not indexed by
    /// comment remotely; callers join locally.
    async fn list_review_threads(&self, scope: &PrScope)
    -> Result<Vec<ReviewThread>, ForgeError>;

    /// Resolves the thread and returns the resolved flag read back from the
    /// mutation response.
    async fn resolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError>;

    /// Unresolves the thread and returns the resolved flag read back from
    /// the mutation response.
    async fn unresolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError>;
}
