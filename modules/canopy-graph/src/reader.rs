use neo4rs::query;
use uuid::Uuid;

use canopy_common::{
    Article, CanopyError, Comment, Company, Cursor, FollowCounts, Notification, NotificationKind,
    Page, Post, Topic, UserProfile,
};

use crate::writer::parse_datetime;
use crate::GraphClient;

const MAX_PAGE_SIZE: i64 = 100;

/// Read side of the social graph: feeds, profiles, follow lookups, and
/// notification lists. All feed reads are descending-time keyset scans;
/// hidden content is filtered after the fetch, so callers must accept
/// partial pages.
#[derive(Clone)]
pub struct SocialGraphReader {
    client: GraphClient,
}

impl SocialGraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    // --- Profiles ---

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, CanopyError> {
        let q = query("MATCH (u:User {uid: $uid}) RETURN u").param("uid", uid);
        let mut stream = self.client.graph.execute(q).await?;
        let profile = match stream.next().await? {
            Some(row) => row_to_profile(&row),
            None => None,
        };
        while stream.next().await?.is_some() {}
        Ok(profile)
    }

    // --- Content ---

    pub async fn get_post(&self, id: Uuid) -> Result<Option<Post>, CanopyError> {
        let q = query("MATCH (p:Post {id: $id}) RETURN p").param("id", id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        let post = match stream.next().await? {
            Some(row) => row_to_post(&row),
            None => None,
        };
        while stream.next().await?.is_some() {}
        Ok(post)
    }

    /// Comments on a post, oldest first.
    pub async fn list_comments(
        &self,
        post_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Comment>, CanopyError> {
        let q = query(
            "MATCH (c:Comment {post_id: $post_id})
             RETURN c
             ORDER BY c.created_at ASC, c.id ASC
             LIMIT $limit",
        )
        .param("post_id", post_id.to_string())
        .param("limit", limit.clamp(1, MAX_PAGE_SIZE));

        let mut stream = self.client.graph.execute(q).await?;
        let mut out = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(c) = row_to_comment(&row) {
                out.push(c);
            }
        }
        Ok(out)
    }

    /// Number of like edges on a post: the ledger-side truth the
    /// denormalized `like_count` must agree with.
    pub async fn count_likes(&self, post_id: Uuid) -> Result<i64, CanopyError> {
        let q = query(
            "MATCH (:User)-[l:LIKES]->(p:Post {id: $id}) RETURN count(l) AS edges",
        )
        .param("id", post_id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        let edges = match stream.next().await? {
            Some(row) => row.get("edges").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}
        Ok(edges)
    }

    pub async fn has_liked(&self, post_id: Uuid, user_id: &str) -> Result<bool, CanopyError> {
        let q = query(
            "MATCH (u:User {uid: $uid})-[l:LIKES]->(p:Post {id: $id}) RETURN count(l) AS edges",
        )
        .param("uid", user_id)
        .param("id", post_id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        let edges: i64 = match stream.next().await? {
            Some(row) => row.get("edges").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}
        Ok(edges > 0)
    }

    // --- Feeds ---

    /// Global feed, newest first. Hidden posts never appear.
    pub async fn fetch_global_feed(
        &self,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Post>, CanopyError> {
        let cypher = "MATCH (p:Post)
             WHERE $cursor_ts = '' OR p.created_at < $cursor_ts
                OR (p.created_at = $cursor_ts AND p.id < $cursor_id)
             RETURN p
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $limit";
        self.post_page(cypher, None, None, limit, cursor).await
    }

    pub async fn list_posts_by_tag(
        &self,
        tag: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Post>, CanopyError> {
        let cypher = "MATCH (p:Post)
             WHERE $tag IN p.tags
               AND ($cursor_ts = '' OR p.created_at < $cursor_ts
                OR (p.created_at = $cursor_ts AND p.id < $cursor_id))
             RETURN p
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $limit";
        self.post_page(cypher, Some(("tag", canopy_common::topic_id(tag))), None, limit, cursor)
            .await
    }

    pub async fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Post>, CanopyError> {
        let cypher = "MATCH (p:Post)
             WHERE p.author_id = $author
               AND ($cursor_ts = '' OR p.created_at < $cursor_ts
                OR (p.created_at = $cursor_ts AND p.id < $cursor_id))
             RETURN p
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $limit";
        self.post_page(cypher, None, Some(("author", author_id.to_string())), limit, cursor)
            .await
    }

    pub async fn list_articles_by_tag(
        &self,
        tag: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Article>, CanopyError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let (cursor_ts, cursor_id) = decode_cursor(cursor)?;

        let q = query(
            "MATCH (a:Article)
             WHERE $tag IN a.tags
               AND ($cursor_ts = '' OR a.created_at < $cursor_ts
                OR (a.created_at = $cursor_ts AND a.id < $cursor_id))
             RETURN a
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT $limit",
        )
        .param("tag", canopy_common::topic_id(tag))
        .param("cursor_ts", cursor_ts)
        .param("cursor_id", cursor_id)
        .param("limit", limit);

        let mut stream = self.client.graph.execute(q).await?;
        let mut fetched = 0;
        let mut last_key = None;
        let mut raw = Vec::new();
        while let Some(row) = stream.next().await? {
            fetched += 1;
            if let Some(key) = row_key(&row, "a") {
                last_key = Some(key);
            }
            if let Some(a) = row_to_article(&row) {
                raw.push(a);
            }
        }

        let next_cursor = page_cursor(fetched, limit, last_key);
        let items = raw.into_iter().filter(|a| !a.hidden).collect();
        Ok(Page { items, next_cursor })
    }

    async fn post_page(
        &self,
        cypher: &str,
        tag: Option<(&str, String)>,
        author: Option<(&str, String)>,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Post>, CanopyError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let (cursor_ts, cursor_id) = decode_cursor(cursor)?;

        let mut q = query(cypher)
            .param("cursor_ts", cursor_ts)
            .param("cursor_id", cursor_id)
            .param("limit", limit);
        if let Some((k, v)) = tag {
            q = q.param(k, v);
        }
        if let Some((k, v)) = author {
            q = q.param(k, v);
        }

        let mut stream = self.client.graph.execute(q).await?;
        let mut fetched = 0;
        let mut last_key = None;
        let mut raw = Vec::new();
        while let Some(row) = stream.next().await? {
            fetched += 1;
            if let Some(key) = row_key(&row, "p") {
                last_key = Some(key);
            }
            if let Some(p) = row_to_post(&row) {
                raw.push(p);
            }
        }

        // The cursor advances over the fetched window (hidden and
        // undecodable rows included) so a bad page still makes progress.
        let next_cursor = page_cursor(fetched, limit, last_key);
        let items = raw.into_iter().filter(|p| !p.hidden).collect();
        Ok(Page { items, next_cursor })
    }

    // --- Follows ---

    pub async fn is_following(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, CanopyError> {
        let q = query(
            "MATCH (a:User {uid: $follower})-[r:FOLLOWS]->(b:User {uid: $following})
             RETURN count(r) AS edges",
        )
        .param("follower", follower_id)
        .param("following", following_id);
        let mut stream = self.client.graph.execute(q).await?;
        let edges: i64 = match stream.next().await? {
            Some(row) => row.get("edges").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}
        Ok(edges > 0)
    }

    /// Follower/following cardinalities for a user, counted from the edge
    /// set rather than any stored counter.
    pub async fn get_follow_counts(&self, uid: &str) -> Result<FollowCounts, CanopyError> {
        let q = query(
            "MATCH (u:User {uid: $uid})
             OPTIONAL MATCH (f:User)-[:FOLLOWS]->(u)
             WITH u, count(f) AS followers
             OPTIONAL MATCH (u)-[:FOLLOWS]->(g:User)
             RETURN followers, count(g) AS following",
        )
        .param("uid", uid);
        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Err(CanopyError::NotFound(format!("user {uid}")));
        };
        let followers: i64 = row.get("followers").unwrap_or(0);
        let following: i64 = row.get("following").unwrap_or(0);
        while stream.next().await?.is_some() {}
        Ok(FollowCounts {
            followers,
            following,
        })
    }

    pub async fn get_company(&self, id: Uuid) -> Result<Option<Company>, CanopyError> {
        let q = query("MATCH (c:Company {id: $id}) RETURN c").param("id", id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        let company = match stream.next().await? {
            Some(row) => row_to_company(&row),
            None => None,
        };
        while stream.next().await?.is_some() {}
        Ok(company)
    }

    // --- Topics ---

    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>, CanopyError> {
        let q = query("MATCH (t:Topic {id: $id}) RETURN t")
            .param("id", canopy_common::topic_id(id));
        let mut stream = self.client.graph.execute(q).await?;
        let topic = match stream.next().await? {
            Some(row) => row_to_topic(&row),
            None => None,
        };
        while stream.next().await?.is_some() {}
        Ok(topic)
    }

    // --- Notifications ---

    /// Newest-first, no cursor. Convenience wrapper for live views.
    pub async fn list_notifications(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, CanopyError> {
        let page = self.list_notifications_paged(user_id, limit, None).await?;
        Ok(page.items)
    }

    pub async fn list_notifications_paged(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Notification>, CanopyError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let (cursor_ts, cursor_id) = decode_cursor(cursor)?;

        let q = query(
            "MATCH (n:Notification {user_id: $uid})
             WHERE $cursor_ts = '' OR n.created_at < $cursor_ts
                OR (n.created_at = $cursor_ts AND n.id < $cursor_id)
             RETURN n
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT $limit",
        )
        .param("uid", user_id)
        .param("cursor_ts", cursor_ts)
        .param("cursor_id", cursor_id)
        .param("limit", limit);

        let mut stream = self.client.graph.execute(q).await?;
        let mut fetched = 0;
        let mut last_key = None;
        let mut items = Vec::new();
        while let Some(row) = stream.next().await? {
            fetched += 1;
            if let Some(key) = row_key(&row, "n") {
                last_key = Some(key);
            }
            if let Some(n) = row_to_notification(&row) {
                items.push(n);
            }
        }

        let next_cursor = page_cursor(fetched, limit, last_key);
        Ok(Page { items, next_cursor })
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<i64, CanopyError> {
        let q = query(
            "MATCH (n:Notification {user_id: $uid, read: false}) RETURN count(n) AS unread",
        )
        .param("uid", user_id);
        let mut stream = self.client.graph.execute(q).await?;
        let unread = match stream.next().await? {
            Some(row) => row.get("unread").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}
        Ok(unread)
    }
}

// --- Cursor / paging helpers ---

fn decode_cursor(cursor: Option<&str>) -> Result<(String, String), CanopyError> {
    match cursor {
        None | Some("") => Ok((String::new(), String::new())),
        Some(token) => {
            let c = Cursor::decode(token)?;
            Ok((
                crate::writer::format_datetime(&c.created_at),
                c.id,
            ))
        }
    }
}

/// Emit a continuation token only when the store returned a full window.
/// The position is taken from the last FETCHED row, not the last decoded
/// one, so a row that fails to decode cannot truncate the scan.
fn page_cursor(
    fetched: i64,
    limit: i64,
    last: Option<(chrono::DateTime<chrono::Utc>, String)>,
) -> Option<String> {
    if fetched == limit {
        last.map(|(created_at, id)| Cursor::new(created_at, id).encode())
    } else {
        None
    }
}

/// The `(created_at, id)` keyset position of a fetched row. Decodes only
/// the two key properties, so it survives rows whose other fields are
/// malformed.
fn row_key(row: &neo4rs::Row, var: &str) -> Option<(chrono::DateTime<chrono::Utc>, String)> {
    let n: neo4rs::Node = row.get(var).ok()?;
    let id: String = n.get("id").ok()?;
    Some((datetime_prop(&n, "created_at")?, id))
}

// --- Row decoding ---

fn row_to_profile(row: &neo4rs::Row) -> Option<UserProfile> {
    let n: neo4rs::Node = row.get("u").ok()?;
    let uid: String = n.get("uid").ok()?;
    let roles: Vec<String> = n.get("roles").unwrap_or_default();
    Some(UserProfile {
        uid,
        display_name: n.get("display_name").unwrap_or_default(),
        email: n.get("email").unwrap_or_default(),
        photo_url: optional_string(&n, "photo_url"),
        bio: optional_string(&n, "bio"),
        roles: roles
            .iter()
            .filter_map(|r| match r.as_str() {
                "member" => Some(canopy_common::Role::Member),
                "expert" => Some(canopy_common::Role::Expert),
                "moderator" => Some(canopy_common::Role::Moderator),
                "admin" => Some(canopy_common::Role::Admin),
                _ => None,
            })
            .collect(),
        expertise_tags: n.get("expertise_tags").unwrap_or_default(),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn row_to_post(row: &neo4rs::Row) -> Option<Post> {
    let n: neo4rs::Node = row.get("p").ok()?;
    let id_str: String = n.get("id").ok()?;
    Some(Post {
        id: Uuid::parse_str(&id_str).ok()?,
        author_id: n.get("author_id").unwrap_or_default(),
        content: n.get("content").unwrap_or_default(),
        media_url: optional_string(&n, "media_url"),
        like_count: n.get("like_count").unwrap_or(0),
        comment_count: n.get("comment_count").unwrap_or(0),
        tags: n.get("tags").unwrap_or_default(),
        hidden: n.get("hidden").unwrap_or(false),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn row_to_article(row: &neo4rs::Row) -> Option<Article> {
    let n: neo4rs::Node = row.get("a").ok()?;
    let id_str: String = n.get("id").ok()?;
    Some(Article {
        id: Uuid::parse_str(&id_str).ok()?,
        author_id: n.get("author_id").unwrap_or_default(),
        title: n.get("title").unwrap_or_default(),
        content: n.get("content").unwrap_or_default(),
        like_count: n.get("like_count").unwrap_or(0),
        comment_count: n.get("comment_count").unwrap_or(0),
        tags: n.get("tags").unwrap_or_default(),
        hidden: n.get("hidden").unwrap_or(false),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn row_to_comment(row: &neo4rs::Row) -> Option<Comment> {
    let n: neo4rs::Node = row.get("c").ok()?;
    let id_str: String = n.get("id").ok()?;
    let post_id_str: String = n.get("post_id").ok()?;
    Some(Comment {
        id: Uuid::parse_str(&id_str).ok()?,
        post_id: Uuid::parse_str(&post_id_str).ok()?,
        author_id: n.get("author_id").unwrap_or_default(),
        content: n.get("content").unwrap_or_default(),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn row_to_company(row: &neo4rs::Row) -> Option<Company> {
    let n: neo4rs::Node = row.get("c").ok()?;
    let id_str: String = n.get("id").ok()?;
    Some(Company {
        id: Uuid::parse_str(&id_str).ok()?,
        name: n.get("name").unwrap_or_default(),
        follower_count: n.get("follower_count").unwrap_or(0),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn row_to_topic(row: &neo4rs::Row) -> Option<Topic> {
    let n: neo4rs::Node = row.get("t").ok()?;
    let id: String = n.get("id").ok()?;
    Some(Topic {
        id,
        name: n.get("name").unwrap_or_default(),
        post_count: n.get("post_count").unwrap_or(0),
        article_count: n.get("article_count").unwrap_or(0),
    })
}

fn row_to_notification(row: &neo4rs::Row) -> Option<Notification> {
    let n: neo4rs::Node = row.get("n").ok()?;
    let id_str: String = n.get("id").ok()?;
    let kind_str: String = n.get("kind").unwrap_or_default();
    Some(Notification {
        id: Uuid::parse_str(&id_str).ok()?,
        user_id: n.get("user_id").unwrap_or_default(),
        kind: NotificationKind::parse(&kind_str)?,
        ref_id: n.get("ref_id").unwrap_or_default(),
        actor_id: n.get("actor_id").unwrap_or_default(),
        read: n.get("read").unwrap_or(false),
        created_at: datetime_prop(&n, "created_at")?,
    })
}

fn optional_string(n: &neo4rs::Node, prop: &str) -> Option<String> {
    let s: String = n.get(prop).unwrap_or_default();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn datetime_prop(n: &neo4rs::Node, prop: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s: String = n.get(prop).ok()?;
    parse_datetime(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cursor_decodes_to_empty_bounds() {
        assert_eq!(decode_cursor(None).unwrap(), (String::new(), String::new()));
        assert_eq!(
            decode_cursor(Some("")).unwrap(),
            (String::new(), String::new())
        );
    }

    #[test]
    fn bad_cursor_is_a_validation_error() {
        assert!(matches!(
            decode_cursor(Some("zzzz")),
            Err(CanopyError::Validation(_))
        ));
    }

    #[test]
    fn full_window_emits_cursor_short_window_does_not() {
        let key = Some((chrono::Utc::now(), "id1".to_string()));
        assert!(page_cursor(10, 10, key.clone()).is_some());
        assert!(page_cursor(3, 10, key.clone()).is_none());
        assert!(page_cursor(0, 10, None).is_none());
    }

    #[test]
    fn full_window_without_a_key_yields_no_cursor() {
        // Every row in the window failed key extraction; ending the scan
        // beats looping on the same window forever.
        assert!(page_cursor(10, 10, None).is_none());
    }
}
