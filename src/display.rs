use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;

use crate::types::{BatchResult, BatchStatus, OutcomeKind, ReviewComment};

pub fn format_relative_time(created_at: DateTime<Utc>) -> String {
    HumanTime::from(created_at).to_string()
}

/// First line of a comment body, truncated to `max` characters.
fn first_line(body: &str, max: usize) -> String {
    let line = body.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let truncated: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{truncated}...")
}

/// One listing line per comment: id, author, location, age, thread state.
pub fn render_comment_line(comment: &ReviewComment, resolved: Option<bool>) -> String {
    let state = match resolved {
        Some(true) => " [resolved]",
        Some(false) => " [unresolved]",
        None => "",
    };
    format!(
        "#{} {} {} ({}){}\n    {}",
        comment.id,
        comment.author,
        comment.location(),
        format_relative_time(comment.created_at),
        state,
        first_line(&comment.body, 100),
    )
}

/// Renders the batch outcome so a reader can tell apart "nothing was done",
/// "something was done but incompletely", and "everything intended
/// completed".
pub fn render_batch_summary(result: &BatchResult) -> String {
    const LABELS: [OutcomeKind; 7] = [
        OutcomeKind::Replied,
        OutcomeKind::Resolved,
        OutcomeKind::AlreadyResolved,
        OutcomeKind::ReplyFailed,
        OutcomeKind::ResolveFailed,
        OutcomeKind::SkippedInvalidId,
        OutcomeKind::SkippedNotFound,
    ];

    let mut out = String::new();

    let counts: Vec<String> = LABELS
        .iter()
        .filter(|kind| result.count(**kind) > 0)
        .map(|kind| format!("{} {}", result.count(*kind), kind.as_str()))
        .collect();

    if counts.is_empty() {
        out.push_str("no comments were processed\n");
    } else {
        out.push_str(&counts.join(", "));
        out.push('\n');
    }

    if !result.mutated_anything() {
        out.push_str("nothing was changed on the remote\n");
    }

    match &result.status {
        BatchStatus::Completed => {}
        BatchStatus::Cancelled => {
            out.push_str("cancelled before all comments were processed\n");
        }
        BatchStatus::AbortedOnMismatch { raw_id } => {
            out.push_str(&format!(
                "aborted: comment {raw_id} no longer contains the search text; remaining comments were not touched\n"
            ));
        }
    }

    out
}
