use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    forge::Forge,
    graphql::{
        ResolveResponse, ThreadsResponse, convert_thread_node, join_graphql_errors,
        resolve_thread_mutation, review_threads_query, unresolve_thread_mutation,
    },
    types::{CommentId, ForgeError, PrScope, Repo, ReviewComment, ReviewThread, ThreadId},
};

const PER_PAGE: u8 = 100;

/// Obtains a GitHub token from the environment, falling back to the gh CLI.
pub fn github_token() -> Result<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("not authenticated: set GITHUB_TOKEN or run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("empty token returned by the gh CLI");
    }

    Ok(token)
}

/// Parses a pull request URL into a scope.
pub fn parse_pr_url(url_str: &str) -> Result<PrScope> {
    let url = Url::parse(url_str).with_context(|| format!("failed to parse URL: '{url_str}'"))?;

    if url.host_str() != Some("github.com") {
        anyhow::bail!("expected a github.com pull request URL, got: '{url_str}'");
    }

    let segments: Vec<&str> = url
        .path_segments()
        .context("cannot parse URL path")?
        .collect();

    // Expected path structure: ["owner", "repo", "pull", "123"]
    if segments.len() != 4 || segments[2] != "pull" {
        anyhow::bail!("expected https://github.com/owner/repo/pull/123, got: '{url_str}'");
    }

    let repo = Repo::new(segments[0], segments[1])?;
    let number: u64 = segments[3]
        .parse()
        .with_context(|| format!("invalid PR number in URL: '{url_str}'"))?;

    Ok(PrScope::new(repo, number))
}

/// GitHub-backed implementation of [`Forge`].
///
/// Comment reads, fetches, and replies go through the REST API; thread
/// listing and resolution go through GraphQL, since only GraphQL exposes
/// review threads and their resolved state.
pub struct GitHubForge {
    octocrab: Octocrab,
}

impl GitHubForge {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Creates a forge authenticated from the environment or the gh CLI.
    pub fn from_environment() -> Result<Self> {
        let token = github_token().context("failed to obtain a GitHub token")?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("failed to create GitHub client")?;
        Ok(Self::new(octocrab))
    }
}

fn map_octocrab_error(err: octocrab::Error) -> ForgeError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            if source.status_code.as_u16() == 404 {
                ForgeError::NotFound(source.message.clone())
            } else {
                ForgeError::RemoteUnavailable(source.to_string())
            }
        }
        octocrab::Error::Serde { source, .. } => ForgeError::InvalidResponse(source.to_string()),
        octocrab::Error::Json { source, .. } => ForgeError::InvalidResponse(source.to_string()),
        other => ForgeError::RemoteUnavailable(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RestReviewComment {
    id: u64,
    body: String,
    user: Option<RestUser>,
    path: Option<String>,
    line: Option<u64>,
    in_reply_to_id: Option<u64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RestUser {
    login: String,
}

impl TryFrom<RestReviewComment> for ReviewComment {
    type Error = ForgeError;

    fn try_from(raw: RestReviewComment) -> Result<Self, ForgeError> {
        let id = CommentId::new(raw.id)
            .map_err(|err| ForgeError::InvalidResponse(format!("comment id {}: {err}", raw.id)))?;
        let in_reply_to = raw
            .in_reply_to_id
            .map(|parent| {
                CommentId::new(parent).map_err(|err| {
                    ForgeError::InvalidResponse(format!("reply parent id {parent}: {err}"))
                })
            })
            .transpose()?;

        Ok(ReviewComment {
            id,
            author: raw
                .user
                .map(|user| user.login)
                .unwrap_or_else(|| "ghost".to_string()),
            body: raw.body,
            path: raw.path,
            line: raw.line,
            in_reply_to,
            created_at: raw.created_at,
        })
    }
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Serialize)]
struct ReplyBody<'a> {
    body: &'a str,
}

fn check_graphql_errors(
    errors: Option<Vec<crate::graphql::GraphQLErrorMessage>>,
) -> Result<(), ForgeError> {
    match errors {
        Some(errors) if !errors.is_empty() => Err(ForgeError::RemoteUnavailable(format!(
            "GraphQL errors: {}",
            join_graphql_errors(errors)
        ))),
        _ => Ok(()),
    }
}

fn read_back_resolved(response: ResolveResponse, thread: &ThreadId) -> Result<bool, ForgeError> {
    check_graphql_errors(response.errors)?;
    response
        .data
        .and_then(|data| data.into_payload())
        .and_then(|payload| payload.thread)
        .map(|t| t.is_resolved)
        .ok_or_else(|| {
            ForgeError::InvalidResponse(format!(
                "mutation response for thread {thread} carried no thread state"
            ))
        })
}

#[async_trait]
impl Forge for GitHubForge {
    async fn list_review_comments(
        &self,
        scope: &PrScope,
    ) -> Result<Vec<ReviewComment>, ForgeError> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/comments",
            scope.repo.owner(),
            scope.repo.name(),
            scope.number
        );

        let mut comments = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<RestReviewComment> = self
                .octocrab
                .get(
                    &route,
                    Some(&PageParams {
                        per_page: PER_PAGE,
                        page,
                    }),
                )
                .await
                .map_err(map_octocrab_error)?;

            let fetched = batch.len();
            for raw in batch {
                comments.push(raw.try_into()?);
            }

            if fetched < usize::from(PER_PAGE) {
                break;
            }
            page += 1;
        }

        debug!(%scope, count = comments.len(), "fetched review comments");
        Ok(comments)
    }

    async fn get_review_comment(
        &self,
        repo: &Repo,
        id: CommentId,
    ) -> Result<Option<ReviewComment>, ForgeError> {
        let route = format!(
            "/repos/{}/{}/pulls/comments/{}",
            repo.owner(),
            repo.name(),
            id
        );

        match self
            .octocrab
            .get::<RestReviewComment, _, ()>(&route, None)
            .await
        {
            Ok(raw) => Ok(Some(raw.try_into()?)),
            Err(err) => match map_octocrab_error(err) {
                ForgeError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_reply(
        &self,
        scope: &PrScope,
        parent: CommentId,
        body: &str,
    ) -> Result<ReviewComment, ForgeError> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/comments/{}/replies",
            scope.repo.owner(),
            scope.repo.name(),
            scope.number,
            parent
        );

        let raw: RestReviewComment = self
            .octocrab
            .post(&route, Some(&ReplyBody { body }))
            .await
            .map_err(map_octocrab_error)?;

        debug!(%parent, reply = raw.id, "posted reply");
        raw.try_into()
    }

    async fn list_review_threads(
        &self,
        scope: &PrScope,
    ) -> Result<Vec<ReviewThread>, ForgeError> {
        let mut threads = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let query = review_threads_query(scope, cursor.as_deref());
            let response: ThreadsResponse = self
                .octocrab
                .graphql(&query)
                .await
                .map_err(map_octocrab_error)?;

            check_graphql_errors(response.errors)?;

            let connection = response
                .data
                .and_then(|data| data.repository)
                .ok_or_else(|| ForgeError::NotFound(format!("repository {}", scope.repo)))?
                .pull_request
                .ok_or_else(|| ForgeError::NotFound(format!("pull request {scope}")))?
                .review_threads;

            for node in connection.nodes {
                threads.push(convert_thread_node(node)?);
            }

            if !connection.page_info.has_next_page {
                break;
            }
            cursor = connection.page_info.end_cursor;
            if cursor.is_none() {
                break;
            }
        }

        debug!(%scope, count = threads.len(), "fetched review threads");
        Ok(threads)
    }

    async fn resolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError> {
        let mutation = resolve_thread_mutation(thread);
        let response: ResolveResponse = self
            .octocrab
            .graphql(&mutation)
            .await
            .map_err(map_octocrab_error)?;
        read_back_resolved(response, thread)
    }

    async fn unresolve_thread(&self, thread: &ThreadId) -> Result<bool, ForgeError> {
        let mutation = unresolve_thread_mutation(thread);
        let response: ResolveResponse = self
            .octocrab
            .graphql(&mutation)
            .await
            .map_err(map_octocrab_error)?;
        read_back_resolved(response, thread)
    }
}
