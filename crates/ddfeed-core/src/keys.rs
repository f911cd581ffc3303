//! Cache key layout.
//!
//! | Key | Value |
//! |-----|-------|
//! | `post:{id}` | Post body |
//! | `post_pk:{id}` | Internal key of the post |
//! | `post:{id}:comment_count` | Comment counter |
//! | `post:total_count` | Global post counter |
//!
//! `{id}` is always an external identifier the active identity scheme
//! recognizes, so it can never spell `total_count`.

use ddfeed_types::ExternalId;

/// Key of the global post counter.
pub const TOTAL_POSTS: &str = "post:total_count";

/// Key of a post's body entry.
pub fn post_body(id: &ExternalId) -> String {
    format!("post:{id}")
}

/// Key of a post's identifier-mapping entry.
pub fn post_key(id: &ExternalId) -> String {
    format!("post_pk:{id}")
}

/// Key of a post's comment counter.
pub fn comment_count(id: &ExternalId) -> String {
    format!("post:{id}:comment_count")
}

/// Every per-post key, for cleanup on deletion.
pub fn per_post(id: &ExternalId) -> [String; 3] {
    [post_body(id), post_key(id), comment_count(id)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let id = ExternalId::from("abc");
        assert_eq!(post_body(&id), "post:abc");
        assert_eq!(post_key(&id), "post_pk:abc");
        assert_eq!(comment_count(&id), "post:abc:comment_count");
        assert_eq!(per_post(&id).len(), 3);
    }
}
