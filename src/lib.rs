//! prconv: safe bulk operations on GitHub PR review conversations.
//!
//! Finds review comments matching a search string, replies to each, and
//! resolves their threads. Every comment is re-validated by a fresh fetch
//! immediately before it is mutated, and the whole batch aborts if the
//! remote state diverged from what discovery saw. A standalone operation
//! resolves or unresolves the thread containing one specific comment, with
//! the same existence-check-before-mutation discipline.

pub mod batch;
pub mod cli;
pub mod display;
pub mod forge;
pub mod github;
pub mod graphql;
pub mod resolve;
pub mod types;

pub use batch::{BatchOptions, Discovery, discover, process_batch};
pub use forge::Forge;
pub use github::GitHubForge;
pub use resolve::{SetResolutionOutcome, set_resolution};
pub use types::{
    BatchResult, BatchStatus, CommentId, CommentIdError, Error, ForgeError, MatchSet, Outcome,
    OutcomeKind, PrScope, Repo, RepoError, ReviewComment, ReviewThread, ThreadId,
};
