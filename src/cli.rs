use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    github::parse_pr_url,
    types::{PrScope, Repo},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Debug)]
#[command(name = "prconv")]
#[command(
    about = "Safely reply to and resolve GitHub PR review conversations in bulk: every comment is re-validated against the search text immediately before it is touched"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find review comments containing SEARCH-TEXT, reply to each, and
    /// resolve their threads
    #[command(name = "find-reply-resolve")]
    FindReplyResolve(FindReplyResolveArgs),

    /// Resolve (or unresolve) the thread containing one specific comment
    #[command(name = "resolve-conversation")]
    ResolveConversation(ResolveConversationArgs),

    /// List review comments on a pull request
    #[command(name = "list")]
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct FindReplyResolveArgs {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Pull request number
    pub pr_number: u64,

    /// Case-sensitive substring to search comment bodies for
    #[arg(value_name = "SEARCH-TEXT")]
    pub search_text: String,

    /// Reply posted on each matching comment
    #[arg(value_name = "REPLY-MESSAGE")]
    pub reply_message: String,

    /// Fixed pause between processed comments, in milliseconds
    #[arg(long = "delay-ms", value_name = "MS", default_value_t = 500)]
    pub delay_ms: u64,

    /// Show what would be replied to and resolved, without mutating anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ResolveConversationArgs {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Pull request number
    pub pr_number: u64,

    /// Identifier of a comment in the thread to act on
    #[arg(value_name = "COMMENT-ID")]
    pub comment_id: String,

    /// Unresolve the thread instead of resolving it
    #[arg(long)]
    pub unresolve: bool,

    /// Re-apply the mutation even when the thread is already in the
    /// requested state (skips the interactive confirmation)
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// PR-URL, or OWNER REPO PR-NUMBER
    #[arg(value_name = "PR", required = true)]
    pub pr: Vec<String>,

    /// Only show comments whose body contains TEXT (case-sensitive)
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only show comments whose thread is unresolved
    #[arg(long = "unresolved-only")]
    pub unresolved_only: bool,
}

impl FindReplyResolveArgs {
    pub fn scope(&self) -> Result<PrScope> {
        scope_from_parts(&self.owner, &self.repo, self.pr_number)
    }
}

impl ResolveConversationArgs {
    pub fn scope(&self) -> Result<PrScope> {
        scope_from_parts(&self.owner, &self.repo, self.pr_number)
    }
}

impl ListArgs {
    pub fn scope(&self) -> Result<PrScope> {
        match self.pr.as_slice() {
            [url] if url.starts_with("https://") => parse_pr_url(url),
            [owner, repo, number] => {
                let number: u64 = number
                    .parse()
                    .with_context(|| format!("invalid PR number: '{number}'"))?;
                scope_from_parts(owner, repo, number)
            }
            _ => anyhow::bail!("expected a PR URL or OWNER REPO PR-NUMBER"),
        }
    }
}

fn scope_from_parts(owner: &str, repo: &str, number: u64) -> Result<PrScope> {
    let repo = Repo::new(owner, repo)
        .with_context(|| format!("invalid repository '{owner}/{repo}'"))?;
    Ok(PrScope::new(repo, number))
}

/// Asks a yes/no question on the terminal. Answers "no" when stdin is not a
/// terminal, so scripted callers must pass the explicit flag instead.
pub fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
