use serde::Deserialize;

use crate::types::{CommentId, ForgeError, PrScope, ReviewThread, ThreadId};

/// Builds the paginated review-thread listing query.
///
/// Comment ids are requested as `fullDatabaseId` so thread membership joins
/// against the numeric ids the REST comment endpoints use.
pub fn review_threads_query(scope: &PrScope, cursor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query($owner: String!, $name: String!, $number: Int!, $after: String) {
                repository(owner: $owner, name: $name) {
                    pullRequest(number: $number) {
                        reviewThreads(first: 100, after: $after) {
                            nodes {
                                id
                                isResolved
                                path
                                line
                                comments(first: 100) {
                                    nodes {
                                        fullDatabaseId
                                    }
                                }
                            }
                            pageInfo {
                                hasNextPage
                                endCursor
                            }
                        }
                    }
                }
            }
        "#,
        "variables": {
            "owner": scope.repo.owner(),
            "name": scope.repo.name(),
            "number": scope.number,
            "after": cursor,
        }
    })
}

pub fn resolve_thread_mutation(thread: &ThreadId) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            mutation($threadId: ID!) {
                resolveReviewThread(input: {threadId: $threadId}) {
                    thread {
                        isResolved
                    }
                }
            }
        "#,
        "variables": { "threadId": thread.as_str() }
    })
}

pub fn unresolve_thread_mutation(thread: &ThreadId) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            mutation($threadId: ID!) {
                unresolveReviewThread(input: {threadId: $threadId}) {
                    thread {
                        isResolved
                    }
                }
            }
        "#,
        "variables": { "threadId": thread.as_str() }
    })
}

#[derive(Debug, Deserialize)]
pub struct GraphQLErrorMessage {
    pub message: String,
}

pub fn join_graphql_errors(errors: Vec<GraphQLErrorMessage>) -> String {
    errors
        .into_iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
pub struct ThreadsResponse {
    pub data: Option<ThreadsData>,
    pub errors: Option<Vec<GraphQLErrorMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadsData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub pull_request: Option<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub review_threads: ThreadConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadConnection {
    pub nodes: Vec<ThreadNode>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadNode {
    pub id: String,
    pub is_resolved: bool,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub comments: ThreadCommentConnection,
}

#[derive(Debug, Deserialize)]
pub struct ThreadCommentConnection {
    pub nodes: Vec<ThreadCommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCommentNode {
    pub full_database_id: Option<String>,
}

/// Converts a GraphQL thread node into the domain model.
pub fn convert_thread_node(node: ThreadNode) -> Result<ReviewThread, ForgeError> {
    let mut comment_ids = Vec::with_capacity(node.comments.nodes.len());
    for comment in node.comments.nodes {
        // Minimised or otherwise id-less comments cannot be joined against
        // REST ids; they are not candidates for mutation either.
        let Some(raw) = comment.full_database_id else {
            continue;
        };
        let id = raw.parse::<CommentId>().map_err(|err| {
            ForgeError::InvalidResponse(format!(
                "comment id '{raw}' in thread {}: {err}",
                node.id
            ))
        })?;
        comment_ids.push(id);
    }

    Ok(ReviewThread {
        id: ThreadId::new(node.id),
        is_resolved: node.is_resolved,
        path: node.path,
        line: node.line,
        comment_ids,
    })
}

#[derive(Debug, Deserialize)]
pub struct ResolveResponse {
    pub data: Option<ResolveData>,
    pub errors: Option<Vec<GraphQLErrorMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveData {
    #[serde(rename = "resolveReviewThread")]
    pub resolve: Option<MutationPayload>,
    #[serde(rename = "unresolveReviewThread")]
    pub unresolve: Option<MutationPayload>,
}

impl ResolveData {
    /// Whichever mutation payload the response carried.
    pub fn into_payload(self) -> Option<MutationPayload> {
        self.resolve.or(self.unresolve)
    }
}

#[derive(Debug, Deserialize)]
pub struct MutationPayload {
    pub thread: Option<MutationThread>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationThread {
    pub is_resolved: bool,
}
