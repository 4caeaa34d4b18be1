use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use prconv::{
    BatchOptions, BatchResult, BatchStatus, CommentId, Error, Forge, ForgeError, MatchSet,
    OutcomeKind, PrScope, Repo, ReviewComment, ReviewThread, SetResolutionOutcome, ThreadId,
    discover, process_batch, set_resolution,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    ListComments,
    GetComment(u64),
    CreateReply(u64),
    ListThreads,
    Resolve(String),
    Unresolve(String),
}

/// In-memory forge with call recording. The discovery listing and the
/// per-id "current" state are separate so tests can change or delete a
/// comment after discovery has seen it.
struct MockForge {
    listed: Vec<ReviewComment>,
    current: Mutex<HashMap<u64, ReviewComment>>,
    threads: Mutex<Vec<ReviewThread>>,
    fail_replies: bool,
    mutations_apply: bool,
    calls: Mutex<Vec<Call>>,
}

impl MockForge {
    fn new(comments: Vec<ReviewComment>, threads: Vec<ReviewThread>) -> Self {
        let current = comments
            .iter()
            .map(|comment| (comment.id.get(), comment.clone()))
            .collect();
        Self {
            listed: comments,
            current: Mutex::new(current),
            threads: Mutex::new(threads),
            fail_replies: false,
            mutations_apply: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_replies(mut self) -> Self {
        self.fail_replies = true;
        self
    }

    /// Mutations go through but report an unchanged thread state.
    fn stuck_mutations(mut self) -> Self {
        self.mutations_apply = false;
        self
    }

    fn set_current_body(&self, id: u64, body: &str) {
        let mut current = self.current.lock().unwrap();
        if let Some(comment) = current.get_mut(&id) {
            comment.body = body.to_string();
        }
    }

    fn delete_current(&self, id: u64) {
        self.current.lock().unwrap().remove(&id);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Forge for MockForge {
    async fn list_review_comments(
        &self,
        _scope: &PrScope,
    ) -> Result<Vec<ReviewComment>, ForgeError> {
        self.record(Call::ListComments);
        Ok(self.listed.clone())
    }

    async fn get_review_comment(
        &self,
        _repo: &Repo,
        id: CommentId,
    ) -> Result<Option<ReviewComment>, ForgeError> {
        self.record(Call::GetComment(id.get()));
        Ok(self.current.lock().unwrap().get(&id.get()).cloned())
    }

    async fn create_reply(
        &self,
        _scope: &PrScope,
        parent: CommentId,
        body: &str,
    ) -> Result<ReviewComment, ForgeError> {
        self.record(Call::CreateReply(parent.get()));
        if self.fail_replies {
            return Err(ForgeError::RemoteUnavailable("reply rejected".to_string()));
        }
        Ok(make_comment(900_000 + parent.get(), body))
    }

    async fn list_review_threads(&self, _scope: &PrScope) -> Result<Vec<ReviewThread>, ForgeError> {
        self.record(Call::ListThreads);
        Ok(self.threads.lock().unwrap().clone())
    }

    async fn resolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError> {
        self.record(Call::Resolve(thread.as_str().to_string()));
        let mut threads = self.threads.lock().unwrap();
        let found = threads
            .iter_mut()
            .find(|t| t.id == *thread)
            .ok_or_else(|| ForgeError::NotFound(format!("thread {thread}")))?;
        if self.mutations_apply {
            found.is_resolved = true;
        }
        Ok(found.is_resolved)
    }

    async fn unresolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError> {
        self.record(Call::Unresolve(thread.as_str().to_string()));
        let mut threads = self.threads.lock().unwrap();
        let found = threads
            .iter_mut()
            .find(|t| t.id == *thread)
            .ok_or_else(|| ForgeError::NotFound(format!("thread {thread}")))?;
        if self.mutations_apply {
            found.is_resolved = false;
        }
        Ok(found.is_resolved)
    }
}

fn scope() -> PrScope {
    PrScope::new(Repo::new("octo", "hello").unwrap(), 7)
}

fn make_comment(id: u64, body: &str) -> ReviewComment {
    ReviewComment {
        id: CommentId::new(id).unwrap(),
        author: "alice".to_string(),
        body: body.to_string(),
        path: Some("src/lib.rs".to_string()),
        line: Some(42),
        in_reply_to: None,
        created_at: Utc::now(),
    }
}

fn make_thread(id: &str, resolved: bool, comment_ids: &[u64]) -> ReviewThread {
    ReviewThread {
        id: ThreadId::new(id),
        is_resolved: resolved,
        path: Some("src/lib.rs".to_string()),
        line: Some(42),
        comment_ids: comment_ids
            .iter()
            .map(|&id| CommentId::new(id).unwrap())
            .collect(),
    }
}

fn quick_options(reply: &str) -> BatchOptions {
    BatchOptions::new(reply).with_delay(Duration::ZERO)
}

fn kinds(result: &BatchResult) -> Vec<OutcomeKind> {
    result.outcomes.iter().map(|o| o.kind).collect()
}

fn no_mutation_calls(calls: &[Call]) -> bool {
    calls
        .iter()
        .all(|call| !matches!(call, Call::CreateReply(_) | Call::Resolve(_) | Call::Unresolve(_)))
}

#[tokio::test]
async fn zero_matches_mean_zero_mutations() {
    let forge = MockForge::new(
        vec![make_comment(1, "contains BAR")],
        vec![make_thread("T1", false, &[1])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    assert!(discovery.matches.is_empty());

    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(result.status, BatchStatus::Completed);
    assert!(result.outcomes.is_empty());
    assert!(no_mutation_calls(&forge.calls()));
}

#[tokio::test]
async fn discover_filters_by_substring_in_listing_order() {
    let forge = MockForge::new(
        vec![
            make_comment(1, "contains FOO"),
            make_comment(2, "contains BAR"),
            make_comment(3, "FOO again"),
        ],
        vec![],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    assert_eq!(
        discovery.matches.entries,
        vec!["1".to_string(), "3".to_string()]
    );
    assert_eq!(discovery.comments.len(), 2);
}

#[tokio::test]
async fn discover_rejects_an_empty_predicate() {
    let forge = MockForge::new(vec![], vec![]);
    let result = discover(&forge, &scope(), "").await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn matching_comment_is_replied_to_and_resolved() {
    let forge = MockForge::new(
        vec![make_comment(1, "contains FOO"), make_comment(2, "contains BAR")],
        vec![make_thread("T1", false, &[1]), make_thread("T2", false, &[2])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    assert_eq!(discovery.matches.entries, vec!["1".to_string()]);

    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(kinds(&result), vec![OutcomeKind::Replied, OutcomeKind::Resolved]);

    let calls = forge.calls();
    assert!(calls.contains(&Call::CreateReply(1)));
    assert!(calls.contains(&Call::Resolve("T1".to_string())));
    assert!(!calls.contains(&Call::CreateReply(2)));
}

#[tokio::test]
async fn content_mismatch_aborts_before_mutating() {
    let forge = MockForge::new(
        vec![make_comment(1, "contains FOO"), make_comment(2, "also FOO")],
        vec![make_thread("T1", false, &[1]), make_thread("T2", false, &[2])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    assert_eq!(discovery.matches.len(), 2);

    // The comment is edited between discovery and mutation.
    forge.set_current_body(1, "rewritten, marker gone");

    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(
        result.status,
        BatchStatus::AbortedOnMismatch {
            raw_id: "1".to_string()
        }
    );
    assert!(result.outcomes.is_empty());

    let calls = forge.calls();
    assert!(no_mutation_calls(&calls));
    // The item after the mismatch was never even re-fetched.
    assert!(!calls.contains(&Call::GetComment(2)));
}

#[tokio::test]
async fn mismatch_midway_keeps_earlier_work_and_stops() {
    let forge = MockForge::new(
        vec![
            make_comment(1, "FOO one"),
            make_comment(2, "FOO two"),
            make_comment(3, "FOO three"),
        ],
        vec![
            make_thread("T1", false, &[1]),
            make_thread("T2", false, &[2]),
            make_thread("T3", false, &[3]),
        ],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    forge.set_current_body(2, "edited away");

    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(
        result.status,
        BatchStatus::AbortedOnMismatch {
            raw_id: "2".to_string()
        }
    );
    // Item 1 was fully processed before the abort.
    assert_eq!(kinds(&result), vec![OutcomeKind::Replied, OutcomeKind::Resolved]);

    let calls = forge.calls();
    assert!(calls.contains(&Call::Resolve("T1".to_string())));
    assert!(!calls.contains(&Call::CreateReply(2)));
    assert!(!calls.contains(&Call::GetComment(3)));
}

#[tokio::test]
async fn malformed_ids_are_skipped_without_remote_calls() {
    let forge = MockForge::new(
        vec![make_comment(5, "FOO")],
        vec![make_thread("T5", false, &[5])],
    );
    let matches = MatchSet {
        predicate: "FOO".to_string(),
        entries: vec![
            "abc".to_string(),
            "0".to_string(),
            "-1".to_string(),
            "5".to_string(),
        ],
    };

    let result = process_batch(&forge, &scope(), &matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(
        kinds(&result),
        vec![
            OutcomeKind::SkippedInvalidId,
            OutcomeKind::SkippedInvalidId,
            OutcomeKind::SkippedInvalidId,
            OutcomeKind::Replied,
            OutcomeKind::Resolved,
        ]
    );

    // Only the well-formed id ever reached the remote.
    let fetches: Vec<_> = forge
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::GetComment(_)))
        .collect();
    assert_eq!(fetches, vec![Call::GetComment(5)]);
}

#[tokio::test]
async fn vanished_comment_is_skipped_and_the_batch_continues() {
    let forge = MockForge::new(
        vec![make_comment(1, "FOO one"), make_comment(2, "FOO two")],
        vec![make_thread("T1", false, &[1]), make_thread("T2", false, &[2])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    forge.delete_current(1);

    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();
    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(
        kinds(&result),
        vec![
            OutcomeKind::SkippedNotFound,
            OutcomeKind::Replied,
            OutcomeKind::Resolved,
        ]
    );

    let calls = forge.calls();
    assert!(!calls.contains(&Call::CreateReply(1)));
    assert!(calls.contains(&Call::CreateReply(2)));
}

#[tokio::test]
async fn reply_failure_never_blocks_the_resolve_attempt() {
    let forge = MockForge::new(
        vec![make_comment(1, "FOO")],
        vec![make_thread("T1", false, &[1])],
    )
    .failing_replies();

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(
        kinds(&result),
        vec![OutcomeKind::ReplyFailed, OutcomeKind::Resolved]
    );
    assert!(forge.calls().contains(&Call::Resolve("T1".to_string())));
}

#[tokio::test]
async fn already_resolved_thread_is_not_mutated_again() {
    let forge = MockForge::new(
        vec![make_comment(1, "FOO")],
        vec![make_thread("T1", true, &[1])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();

    assert_eq!(
        kinds(&result),
        vec![OutcomeKind::Replied, OutcomeKind::AlreadyResolved]
    );
    assert!(
        forge
            .calls()
            .iter()
            .all(|call| !matches!(call, Call::Resolve(_)))
    );
}

#[tokio::test]
async fn resolve_read_back_mismatch_is_a_soft_failure() {
    let forge = MockForge::new(
        vec![make_comment(1, "FOO")],
        vec![make_thread("T1", false, &[1])],
    )
    .stuck_mutations();

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(
        kinds(&result),
        vec![OutcomeKind::Replied, OutcomeKind::ResolveFailed]
    );
}

#[tokio::test]
async fn comment_outside_any_thread_is_a_resolve_failure() {
    let forge = MockForge::new(vec![make_comment(1, "FOO")], vec![]);

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();
    let result = process_batch(&forge, &scope(), &discovery.matches, &quick_options("done"))
        .await
        .unwrap();

    assert_eq!(
        kinds(&result),
        vec![OutcomeKind::Replied, OutcomeKind::ResolveFailed]
    );
}

#[tokio::test]
async fn pre_cancelled_token_processes_nothing() {
    let forge = MockForge::new(
        vec![make_comment(1, "FOO one"), make_comment(2, "FOO two")],
        vec![make_thread("T1", false, &[1]), make_thread("T2", false, &[2])],
    );

    let discovery = discover(&forge, &scope(), "FOO").await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let opts = quick_options("done").with_cancel(cancel);

    let result = process_batch(&forge, &scope(), &discovery.matches, &opts)
        .await
        .unwrap();
    assert_eq!(result.status, BatchStatus::Cancelled);
    assert!(result.outcomes.is_empty());
    assert!(
        forge
            .calls()
            .iter()
            .all(|call| !matches!(call, Call::GetComment(_)))
    );
}

#[tokio::test]
async fn empty_reply_text_is_rejected_before_any_remote_call() {
    let forge = MockForge::new(vec![make_comment(1, "FOO")], vec![]);
    let matches = MatchSet {
        predicate: "FOO".to_string(),
        entries: vec!["1".to_string()],
    };

    let result = process_batch(&forge, &scope(), &matches, &quick_options("")).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn set_resolution_applies_then_noops() {
    let forge = MockForge::new(
        vec![make_comment(1, "whatever")],
        vec![make_thread("T1", false, &[1])],
    );

    let first = set_resolution(&forge, &scope(), "1", true, false).await.unwrap();
    assert_eq!(first, SetResolutionOutcome::Applied { resolved: true });

    // The second call checks current state instead of blindly mutating.
    let second = set_resolution(&forge, &scope(), "1", true, false).await.unwrap();
    assert_eq!(second, SetResolutionOutcome::NoOp { resolved: true });

    let resolves = forge
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Resolve(_)))
        .count();
    assert_eq!(resolves, 1);
}

#[tokio::test]
async fn set_resolution_noop_proceeds_when_asked() {
    let forge = MockForge::new(
        vec![make_comment(1, "whatever")],
        vec![make_thread("T1", true, &[1])],
    );

    let outcome = set_resolution(&forge, &scope(), "1", true, true).await.unwrap();
    assert_eq!(outcome, SetResolutionOutcome::Applied { resolved: true });
    assert!(forge.calls().contains(&Call::Resolve("T1".to_string())));
}

#[tokio::test]
async fn set_resolution_unresolves() {
    let forge = MockForge::new(
        vec![make_comment(1, "whatever")],
        vec![make_thread("T1", true, &[1])],
    );

    let outcome = set_resolution(&forge, &scope(), "1", false, false).await.unwrap();
    assert_eq!(outcome, SetResolutionOutcome::Applied { resolved: false });
    assert!(forge.calls().contains(&Call::Unresolve("T1".to_string())));
}

#[tokio::test]
async fn set_resolution_missing_comment_is_not_found() {
    let forge = MockForge::new(vec![], vec![]);

    let err = set_resolution(&forge, &scope(), "999999999", true, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(no_mutation_calls(&forge.calls()));
}

#[tokio::test]
async fn set_resolution_rejects_malformed_ids() {
    let forge = MockForge::new(vec![], vec![]);

    let err = set_resolution(&forge, &scope(), "not-an-id", true, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn set_resolution_detects_a_mutation_that_did_not_apply() {
    let forge = MockForge::new(
        vec![make_comment(1, "whatever")],
        vec![make_thread("T1", false, &[1])],
    )
    .stuck_mutations();

    let err = set_resolution(&forge, &scope(), "1", true, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MutationDidNotApply { .. }));
}
