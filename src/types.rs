use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    owner: String,
    name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("repository owner must not be empty")]
    EmptyOwner,
    #[error("repository name must not be empty")]
    EmptyName,
    #[error("expected 'owner/repo', got '{0}'")]
    Malformed(String),
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.is_empty() {
            return Err(RepoError::EmptyName);
        }
        if owner.contains('/') || name.contains('/') {
            return Err(RepoError::Malformed(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    /// Parses the conventional `owner/repo` form.
    pub fn parse(input: &str) -> Result<Self, RepoError> {
        match input.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Self::new(*owner, *name),
            _ => Err(RepoError::Malformed(input.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Identifies the remote collection a batch operates on: one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrScope {
    pub repo: Repo,
    pub number: u64,
}

impl PrScope {
    pub fn new(repo: Repo, number: u64) -> Self {
        Self { repo, number }
    }
}

impl fmt::Display for PrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Validated review comment identifier. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommentIdError {
    #[error("comment id must not be empty")]
    Empty,
    #[error("comment id must be a positive integer, got '{0}'")]
    NotANumber(String),
    #[error("comment id must be positive")]
    Zero,
}

impl CommentId {
    pub fn new(raw: u64) -> Result<Self, CommentIdError> {
        if raw == 0 {
            return Err(CommentIdError::Zero);
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for CommentId {
    type Err = CommentIdError;

    // Stricter than u64::from_str: sign prefixes are rejected, since remote
    // identifiers are plain digit strings.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(CommentIdError::Empty);
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommentIdError::NotANumber(input.to_string()));
        }
        let raw: u64 = input
            .parse()
            .map_err(|_| CommentIdError::NotANumber(input.to_string()))?;
        Self::new(raw)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque review thread identifier (a GraphQL node id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single review remark on a pull request, located at a file/line or
/// general.
#[derive(Debug, Clone)]
pub struct ReviewComment {
    pub id: CommentId,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub in_reply_to: Option<CommentId>,
    pub created_at: DateTime<Utc>,
}

impl ReviewComment {
    /// Location string for display: `path:line`, bare path, or "general".
    pub fn location(&self) -> String {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => format!("{path}:{line}"),
            (Some(path), None) => path.clone(),
            _ => "general".to_string(),
        }
    }
}

/// The conversation grouping of a root comment and its replies, carrying a
/// resolved/unresolved state.
#[derive(Debug, Clone)]
pub struct ReviewThread {
    pub id: ThreadId,
    pub is_resolved: bool,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub comment_ids: Vec<CommentId>,
}

impl ReviewThread {
    pub fn contains(&self, id: CommentId) -> bool {
        self.comment_ids.contains(&id)
    }
}

/// Comment identifiers matching a search predicate at discovery time.
///
/// A hint, never ground truth: the remote state can change between discovery
/// and mutation, so every entry is re-validated before it is acted on.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    pub predicate: String,
    pub entries: Vec<String>,
}

impl MatchSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What happened to one batch item, or one half of it: the reply and resolve
/// steps are recorded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Replied,
    Resolved,
    AlreadyResolved,
    ReplyFailed,
    ResolveFailed,
    SkippedInvalidId,
    SkippedNotFound,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Replied => "replied",
            OutcomeKind::Resolved => "resolved",
            OutcomeKind::AlreadyResolved => "already resolved",
            OutcomeKind::ReplyFailed => "reply failed",
            OutcomeKind::ResolveFailed => "resolve failed",
            OutcomeKind::SkippedInvalidId => "skipped (malformed id)",
            OutcomeKind::SkippedNotFound => "skipped (comment gone)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub raw_id: String,
    pub kind: OutcomeKind,
}

impl Outcome {
    pub fn new(raw_id: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            raw_id: raw_id.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every item was visited, whether or not each one succeeded.
    Completed,
    /// A re-fetched comment no longer matched the predicate. Processed items
    /// stand; remaining items were not touched.
    AbortedOnMismatch { raw_id: String },
    /// A cancellation signal arrived between items.
    Cancelled,
}

/// Ordered per-item outcomes plus the overall batch status, accumulated by
/// folding over the loop rather than in process-wide counters.
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<Outcome>,
    pub status: BatchStatus,
}

impl BatchResult {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    /// True if any mutation reached the remote system.
    pub fn mutated_anything(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.kind, OutcomeKind::Replied | OutcomeKind::Resolved))
    }
}

/// Failures of the remote system itself, as distinct from failures of the
/// operation built on top of it.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("invalid response from remote: {0}")]
    InvalidResponse(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Operation-level failures surfaced to callers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error(
        "mutation did not apply: thread {thread_id} reports resolved={actual}, expected resolved={expected}"
    )]
    MutationDidNotApply {
        thread_id: ThreadId,
        expected: bool,
        actual: bool,
    },
    #[error(transparent)]
    Forge(#[from] ForgeError),
}
