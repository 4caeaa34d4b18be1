use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use prconv::{
    BatchOptions, BatchStatus, Forge, GitHubForge, SetResolutionOutcome,
    cli::{Cli, Command, FindReplyResolveArgs, ListArgs, ResolveConversationArgs, confirm},
    discover,
    display::{render_batch_summary, render_comment_line},
    process_batch, set_resolution,
};

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_directive = if debug { "prconv=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn handle_find_reply_resolve(forge: &GitHubForge, args: FindReplyResolveArgs) -> Result<()> {
    let scope = args.scope()?;

    let discovery = discover(forge, &scope, &args.search_text).await?;
    if discovery.matches.is_empty() {
        println!(
            "no review comments on {scope} contain {:?}",
            args.search_text
        );
        return Ok(());
    }

    println!(
        "found {} matching review comment(s) on {scope}:",
        discovery.matches.len()
    );
    for comment in &discovery.comments {
        println!("{}", render_comment_line(comment, None));
    }

    if args.dry_run {
        println!(
            "dry run: would reply to and resolve the {} comment(s) above",
            discovery.matches.len()
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping after the current comment");
                cancel.cancel();
            }
        });
    }

    let opts = BatchOptions::new(&args.reply_message)
        .with_delay(Duration::from_millis(args.delay_ms))
        .with_cancel(cancel);
    let result = process_batch(forge, &scope, &discovery.matches, &opts).await?;
    print!("{}", render_batch_summary(&result));

    match result.status {
        BatchStatus::Completed => Ok(()),
        BatchStatus::Cancelled => anyhow::bail!("cancelled before completing the batch"),
        BatchStatus::AbortedOnMismatch { raw_id } => anyhow::bail!(
            "comment {raw_id} changed since discovery; batch aborted without touching the remaining comments"
        ),
    }
}

async fn handle_resolve_conversation(
    forge: &GitHubForge,
    args: ResolveConversationArgs,
) -> Result<()> {
    let scope = args.scope()?;
    let target_resolved = !args.unresolve;
    let state = if target_resolved {
        "resolved"
    } else {
        "unresolved"
    };

    match set_resolution(forge, &scope, &args.comment_id, target_resolved, args.force).await? {
        SetResolutionOutcome::Applied { .. } => {
            println!(
                "thread containing comment {} is now {state}",
                args.comment_id
            );
            Ok(())
        }
        SetResolutionOutcome::NoOp { .. } => {
            println!(
                "thread containing comment {} is already {state}",
                args.comment_id
            );
            if confirm(&format!("re-apply the {state} mutation anyway?"))? {
                set_resolution(forge, &scope, &args.comment_id, target_resolved, true).await?;
                println!("re-applied");
            }
            Ok(())
        }
    }
}

async fn handle_list(forge: &GitHubForge, args: ListArgs) -> Result<()> {
    let scope = args.scope()?;

    let comments = forge.list_review_comments(&scope).await?;
    let threads = forge.list_review_threads(&scope).await?;

    let mut shown = 0;
    for comment in &comments {
        if let Some(search) = &args.search {
            if !comment.body.contains(search.as_str()) {
                continue;
            }
        }

        let resolved = threads
            .iter()
            .find(|thread| thread.contains(comment.id))
            .map(|thread| thread.is_resolved);

        if args.unresolved_only && resolved != Some(false) {
            continue;
        }

        println!("{}", render_comment_line(comment, resolved));
        shown += 1;
    }

    if shown == 0 {
        println!("no matching review comments on {scope}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Authentication is a precondition; fail here before any other work.
    let forge = GitHubForge::from_environment()?;

    match cli.command {
        Command::FindReplyResolve(args) => handle_find_reply_resolve(&forge, args).await,
        Command::ResolveConversation(args) => handle_resolve_conversation(&forge, args).await,
        Command::List(args) => handle_list(&forge, args).await,
    }
}
