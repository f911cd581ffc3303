//! Wire shapes for posts, comments and paginated listings.
//!
//! These are the JSON bodies the HTTP layer returns and accepts. The
//! internal key never appears in any of them.

use serde::{Deserialize, Serialize};

use crate::ids::ExternalId;

/// A post as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// External identifier.
    pub id: ExternalId,
    /// Body text.
    pub body: String,
    /// Comments on the post. Only populated by the single-post read;
    /// omitted from listings and from the create response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    /// Number of comments. Listings may serve a stale cached value; the
    /// single-post read always reports the authoritative count.
    pub comment_count: i64,
}

/// A comment as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// External identifier.
    pub id: ExternalId,
    /// Body text.
    pub body: String,
    /// External identifier of the owning post.
    pub post_id: ExternalId,
}

/// One page of posts, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPage {
    /// The posts on this page.
    pub posts: Vec<Post>,
    /// The effective (clamped) page size.
    pub limit: u32,
    /// Total number of posts.
    pub total: i64,
    /// Cursor for the next page: the id of the last post on this page.
    /// Absent when the page is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<ExternalId>,
}

/// Request body for creating a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Body text.
    pub body: String,
}

/// Request body for adding a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Body text.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_omits_comments_and_empty_cursor() {
        let page = PostPage {
            posts: vec![Post {
                id: ExternalId::from("1"),
                body: String::from("hello"),
                comments: None,
                comment_count: 0,
            }],
            limit: 10,
            total: 1,
            next_cursor: None,
        };
        let json = serde_json::to_value(&page).unwrap_or_default();
        assert!(json["posts"][0].get("comments").is_none());
        assert!(json.get("next_cursor").is_none());
        assert_eq!(json["posts"][0]["id"], "1");
    }

    #[test]
    fn detail_keeps_an_empty_comment_list() {
        let post = Post {
            id: ExternalId::from("1"),
            body: String::from("hello"),
            comments: Some(Vec::new()),
            comment_count: 0,
        };
        let json = serde_json::to_value(&post).unwrap_or_default();
        assert_eq!(json["comments"], serde_json::json!([]));
    }

    #[test]
    fn new_post_requires_body() {
        let missing: Result<NewPost, _> = serde_json::from_str("{}");
        assert!(missing.is_err());
        let present: Result<NewPost, _> = serde_json::from_str(r#"{"body":"hi"}"#);
        assert!(present.is_ok());
    }
}
