use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::warn;
use uuid::Uuid;

use canopy_common::{
    extract_hashtags, Article, CanopyError, Comment, Company, LikeOutcome, NewArticle, NewComment,
    NewPost, NewProfile, Notification, NotificationKind, Post, Role, UserProfile,
};

use crate::GraphClient;

const MAX_TXN_ATTEMPTS: u32 = 3;

/// Write side of the social graph: profiles, content, the engagement
/// ledger, and notification fan-out.
///
/// Counter discipline: every denormalized counter (`like_count`,
/// `comment_count`, topic counts, company `follower_count`) is mutated in
/// the same statement or transaction as the edge/content write it mirrors.
/// No method writes a counter on its own.
#[derive(Clone)]
pub struct SocialGraphWriter {
    client: GraphClient,
}

impl SocialGraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    // --- Profiles ---

    /// Create-or-update a profile keyed by the auth provider uid.
    /// First sign-in creates the node; later sign-ins only touch the
    /// mutable fields. Never duplicates a uid.
    pub async fn upsert_profile(&self, p: &NewProfile) -> Result<UserProfile, CanopyError> {
        require_id(&p.uid, "uid")?;
        require_id(&p.email, "email")?;

        let now = Utc::now();
        let q = query(
            "MERGE (u:User {uid: $uid})
             ON CREATE SET u.email = $email,
                           u.created_at = $created_at,
                           u.roles = ['member']
             SET u.display_name = $display_name,
                 u.photo_url = $photo_url,
                 u.bio = $bio,
                 u.expertise_tags = $expertise_tags
             RETURN u.email AS email, u.created_at AS created_at, u.roles AS roles",
        )
        .param("uid", p.uid.as_str())
        .param("email", p.email.as_str())
        .param("created_at", format_datetime(&now))
        .param("display_name", p.display_name.as_str())
        .param("photo_url", p.photo_url.as_deref().unwrap_or(""))
        .param("bio", p.bio.as_deref().unwrap_or(""))
        .param("expertise_tags", p.expertise_tags.clone());

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| CanopyError::Database("profile upsert returned no row".to_string()))?;

        let email: String = row.get("email").unwrap_or_default();
        let created_at_str: String = row.get("created_at").unwrap_or_default();
        let roles: Vec<String> = row.get("roles").unwrap_or_default();
        while stream.next().await?.is_some() {}

        Ok(UserProfile {
            uid: p.uid.clone(),
            display_name: p.display_name.clone(),
            email,
            photo_url: p.photo_url.clone(),
            bio: p.bio.clone(),
            roles: roles.iter().filter_map(|r| parse_role(r)).collect(),
            expertise_tags: p.expertise_tags.clone(),
            created_at: parse_datetime(&created_at_str).unwrap_or(now),
        })
    }

    // --- Content ---

    /// Create a post. Tag extraction and per-topic `post_count` bumps run
    /// in the same statement as the post creation.
    pub async fn create_post(&self, p: &NewPost) -> Result<Post, CanopyError> {
        require_id(&p.author_id, "author_id")?;
        if p.content.trim().is_empty() {
            return Err(CanopyError::Validation("post content is empty".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tags = extract_hashtags(&p.content);

        let q = query(
            "MATCH (a:User {uid: $author_id})
             CREATE (p:Post {
                 id: $id,
                 author_id: $author_id,
                 content: $content,
                 media_url: $media_url,
                 like_count: 0,
                 comment_count: 0,
                 tags: $tags,
                 hidden: false,
                 created_at: $created_at
             })
             WITH p
             UNWIND CASE WHEN size($tags) = 0 THEN [null] ELSE $tags END AS tag
             FOREACH (t IN CASE WHEN tag IS NULL THEN [] ELSE [tag] END |
                 MERGE (tp:Topic {id: t})
                 ON CREATE SET tp.name = '#' + t, tp.post_count = 0, tp.article_count = 0
                 SET tp.post_count = tp.post_count + 1)
             RETURN count(*) AS rows",
        )
        .param("author_id", p.author_id.as_str())
        .param("id", id.to_string())
        .param("content", p.content.as_str())
        .param("media_url", p.media_url.as_deref().unwrap_or(""))
        .param("tags", tags.clone())
        .param("created_at", format_datetime(&now));

        let mut stream = self.client.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(CanopyError::NotFound(format!("user {}", p.author_id)));
        }
        while stream.next().await?.is_some() {}

        Ok(Post {
            id,
            author_id: p.author_id.clone(),
            content: p.content.clone(),
            media_url: p.media_url.clone(),
            like_count: 0,
            comment_count: 0,
            tags,
            hidden: false,
            created_at: now,
        })
    }

    /// Create an article. Same shape as posts, but topics count it under
    /// `article_count`.
    pub async fn create_article(&self, a: &NewArticle) -> Result<Article, CanopyError> {
        require_id(&a.author_id, "author_id")?;
        if a.title.trim().is_empty() || a.content.trim().is_empty() {
            return Err(CanopyError::Validation(
                "article title and content are required".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tags = extract_hashtags(&a.title);
        for t in extract_hashtags(&a.content) {
            if !tags.contains(&t) {
                tags.push(t);
            }
        }

        let q = query(
            "MATCH (u:User {uid: $author_id})
             CREATE (ar:Article {
                 id: $id,
                 author_id: $author_id,
                 title: $title,
                 content: $content,
                 like_count: 0,
                 comment_count: 0,
                 tags: $tags,
                 hidden: false,
                 created_at: $created_at
             })
             WITH ar
             UNWIND CASE WHEN size($tags) = 0 THEN [null] ELSE $tags END AS tag
             FOREACH (t IN CASE WHEN tag IS NULL THEN [] ELSE [tag] END |
                 MERGE (tp:Topic {id: t})
                 ON CREATE SET tp.name = '#' + t, tp.post_count = 0, tp.article_count = 0
                 SET tp.article_count = tp.article_count + 1)
             RETURN count(*) AS rows",
        )
        .param("author_id", a.author_id.as_str())
        .param("id", id.to_string())
        .param("title", a.title.as_str())
        .param("content", a.content.as_str())
        .param("tags", tags.clone())
        .param("created_at", format_datetime(&now));

        let mut stream = self.client.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(CanopyError::NotFound(format!("user {}", a.author_id)));
        }
        while stream.next().await?.is_some() {}

        Ok(Article {
            id,
            author_id: a.author_id.clone(),
            title: a.title.clone(),
            content: a.content.clone(),
            like_count: 0,
            comment_count: 0,
            tags,
            hidden: false,
            created_at: now,
        })
    }

    /// Create a comment. The comment node and the parent post's
    /// `comment_count` increment are one atomic statement, so a crash can
    /// never leave the counter behind the ledger.
    pub async fn create_comment(&self, c: &NewComment) -> Result<Comment, CanopyError> {
        require_id(&c.author_id, "author_id")?;
        if c.content.trim().is_empty() {
            return Err(CanopyError::Validation(
                "comment content is empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        let q = query(
            "MATCH (p:Post {id: $post_id})
             MATCH (a:User {uid: $author_id})
             CREATE (c:Comment {
                 id: $id,
                 post_id: $post_id,
                 author_id: $author_id,
                 content: $content,
                 created_at: $created_at
             })
             SET p.comment_count = p.comment_count + 1
             RETURN p.author_id AS post_author",
        )
        .param("post_id", c.post_id.to_string())
        .param("author_id", c.author_id.as_str())
        .param("id", id.to_string())
        .param("content", c.content.as_str())
        .param("created_at", format_datetime(&now));

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Err(CanopyError::NotFound(format!(
                "post {} or user {}",
                c.post_id, c.author_id
            )));
        };
        let post_author: String = row.get("post_author").unwrap_or_default();
        while stream.next().await?.is_some() {}

        if post_author != c.author_id {
            self.fan_out(
                &post_author,
                NotificationKind::Comment,
                &c.post_id.to_string(),
                &c.author_id,
            )
            .await;
        }

        Ok(Comment {
            id,
            post_id: c.post_id,
            author_id: c.author_id.clone(),
            content: c.content.clone(),
            created_at: now,
        })
    }

    /// Moderation flag. Hidden posts stay in the store but are filtered
    /// from every feed read.
    pub async fn set_post_hidden(&self, post_id: Uuid, hidden: bool) -> Result<(), CanopyError> {
        let q = query(
            "MATCH (p:Post {id: $id}) SET p.hidden = $hidden RETURN p.id AS id",
        )
        .param("id", post_id.to_string())
        .param("hidden", hidden);

        let mut stream = self.client.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(CanopyError::NotFound(format!("post {post_id}")));
        }
        while stream.next().await?.is_some() {}
        Ok(())
    }

    // --- Engagement ledger: likes ---

    /// Idempotent like flip. Edge check, edge mutation, and counter
    /// mutation run in one explicit transaction; conflicts are retried up
    /// to a bounded number of attempts before surfacing `Transient`.
    pub async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: &str,
    ) -> Result<LikeOutcome, CanopyError> {
        require_id(user_id, "user_id")?;

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self.try_toggle_like(post_id, user_id).await {
                Ok(outcome) => break outcome,
                Err(CanopyError::Database(msg)) if is_transient(&msg) => {
                    if attempt >= MAX_TXN_ATTEMPTS {
                        return Err(CanopyError::Transient(format!(
                            "like toggle on {post_id} contended after {attempt} attempts: {msg}"
                        )));
                    }
                    warn!(post_id = %post_id, attempt, "retrying contended like toggle");
                    tokio::time::sleep(std::time::Duration::from_millis(25 * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        };

        if outcome.liked && outcome.post_author != user_id {
            self.fan_out(
                &outcome.post_author,
                NotificationKind::Like,
                &post_id.to_string(),
                user_id,
            )
            .await;
        }

        Ok(LikeOutcome {
            liked: outcome.liked,
            like_count: outcome.like_count,
        })
    }

    async fn try_toggle_like(
        &self,
        post_id: Uuid,
        user_id: &str,
    ) -> Result<ToggleResult, CanopyError> {
        let graph = self.client.inner();
        let mut txn = graph.start_txn().await?;

        // The no-op SET takes the write lock on the post, serializing
        // concurrent togglers for the rest of the transaction.
        let q = query(
            "MATCH (p:Post {id: $id})
             SET p.like_count = p.like_count
             RETURN p.author_id AS author_id",
        )
        .param("id", post_id.to_string());
        let mut stream = txn.execute(q).await?;
        let Some(row) = stream.next(txn.handle()).await? else {
            txn.rollback().await?;
            return Err(CanopyError::NotFound(format!("post {post_id}")));
        };
        let post_author: String = row.get("author_id").unwrap_or_default();
        while stream.next(txn.handle()).await?.is_some() {}

        let q = query(
            "MATCH (u:User {uid: $uid})-[l:LIKES]->(p:Post {id: $id})
             RETURN count(l) AS edges",
        )
        .param("uid", user_id)
        .param("id", post_id.to_string());
        let mut stream = txn.execute(q).await?;
        let edges: i64 = match stream.next(txn.handle()).await? {
            Some(row) => row.get("edges").unwrap_or(0),
            None => 0,
        };
        while stream.next(txn.handle()).await?.is_some() {}

        let (cypher, liked) = if edges > 0 {
            (
                "MATCH (u:User {uid: $uid})-[l:LIKES]->(p:Post {id: $id})
                 SET p.like_count = p.like_count - 1
                 DELETE l
                 RETURN p.like_count AS like_count",
                false,
            )
        } else {
            (
                "MATCH (u:User {uid: $uid}), (p:Post {id: $id})
                 CREATE (u)-[:LIKES {created_at: $now}]->(p)
                 SET p.like_count = p.like_count + 1
                 RETURN p.like_count AS like_count",
                true,
            )
        };
        let q = query(cypher)
            .param("uid", user_id)
            .param("id", post_id.to_string())
            .param("now", format_datetime(&Utc::now()));
        let mut stream = txn.execute(q).await?;
        let Some(row) = stream.next(txn.handle()).await? else {
            txn.rollback().await?;
            return Err(CanopyError::NotFound(format!("user {user_id}")));
        };
        let like_count: i64 = row.get("like_count").unwrap_or(0);
        while stream.next(txn.handle()).await?.is_some() {}

        txn.commit().await?;
        Ok(ToggleResult {
            liked,
            like_count,
            post_author,
        })
    }

    // --- Engagement ledger: follows ---

    /// Follow a user. MERGE on the relationship pattern makes the edge
    /// insert-if-absent under the store's node locks, so duplicate edges
    /// cannot be created even by racing calls. Returns true if the edge
    /// was created (false when already following).
    pub async fn follow_user(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, CanopyError> {
        require_id(follower_id, "follower_id")?;
        require_id(following_id, "following_id")?;
        if follower_id == following_id {
            return Err(CanopyError::InvalidOperation(
                "cannot follow yourself".to_string(),
            ));
        }

        let now = format_datetime(&Utc::now());
        let q = query(
            "MATCH (a:User {uid: $follower})
             MATCH (b:User {uid: $following})
             MERGE (a)-[r:FOLLOWS]->(b)
             ON CREATE SET r.created_at = $now
             RETURN r.created_at = $now AS created",
        )
        .param("follower", follower_id)
        .param("following", following_id)
        .param("now", now);

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Err(CanopyError::NotFound(format!(
                "user {follower_id} or {following_id}"
            )));
        };
        let created: bool = row.get("created").unwrap_or(false);
        while stream.next().await?.is_some() {}

        if created {
            self.fan_out(following_id, NotificationKind::Follow, follower_id, follower_id)
                .await;
        }
        Ok(created)
    }

    /// Remove the follow edge. Expected 0 or 1 matches; more than one is
    /// treated as data corruption and all matches are deleted. Returns the
    /// number of edges removed.
    pub async fn unfollow_user(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<i64, CanopyError> {
        require_id(follower_id, "follower_id")?;
        require_id(following_id, "following_id")?;

        let q = query(
            "MATCH (a:User {uid: $follower})-[r:FOLLOWS]->(b:User {uid: $following})
             WITH collect(r) AS rels
             FOREACH (x IN rels | DELETE x)
             RETURN size(rels) AS removed",
        )
        .param("follower", follower_id)
        .param("following", following_id);

        let mut stream = self.client.graph.execute(q).await?;
        let removed: i64 = match stream.next().await? {
            Some(row) => row.get("removed").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}

        if removed > 1 {
            warn!(follower_id, following_id, removed, "deleted duplicate follow edges");
        }
        Ok(removed)
    }

    // --- Companies ---

    pub async fn create_company(&self, name: &str) -> Result<Company, CanopyError> {
        if name.trim().is_empty() {
            return Err(CanopyError::Validation("company name is empty".to_string()));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let q = query(
            "CREATE (c:Company {id: $id, name: $name, follower_count: 0, created_at: $created_at})",
        )
        .param("id", id.to_string())
        .param("name", name)
        .param("created_at", format_datetime(&now));
        self.client.graph.run(q).await?;
        Ok(Company {
            id,
            name: name.to_string(),
            follower_count: 0,
            created_at: now,
        })
    }

    /// Follow a company. The edge MERGE and the denormalized
    /// `follower_count` increment are one atomic statement.
    pub async fn follow_company(
        &self,
        user_id: &str,
        company_id: Uuid,
    ) -> Result<bool, CanopyError> {
        require_id(user_id, "user_id")?;

        let now = format_datetime(&Utc::now());
        let q = query(
            "MATCH (u:User {uid: $uid})
             MATCH (c:Company {id: $company_id})
             MERGE (u)-[r:FOLLOWS_COMPANY]->(c)
             ON CREATE SET r.created_at = $now, c.follower_count = c.follower_count + 1
             RETURN r.created_at = $now AS created",
        )
        .param("uid", user_id)
        .param("company_id", company_id.to_string())
        .param("now", now);

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Err(CanopyError::NotFound(format!(
                "user {user_id} or company {company_id}"
            )));
        };
        let created: bool = row.get("created").unwrap_or(false);
        while stream.next().await?.is_some() {}
        Ok(created)
    }

    pub async fn unfollow_company(
        &self,
        user_id: &str,
        company_id: Uuid,
    ) -> Result<i64, CanopyError> {
        require_id(user_id, "user_id")?;

        let q = query(
            "MATCH (u:User {uid: $uid})-[r:FOLLOWS_COMPANY]->(c:Company {id: $company_id})
             WITH c, collect(r) AS rels
             FOREACH (x IN rels | DELETE x)
             SET c.follower_count =
                 CASE WHEN c.follower_count < size(rels) THEN 0
                      ELSE c.follower_count - size(rels) END
             RETURN size(rels) AS removed",
        )
        .param("uid", user_id)
        .param("company_id", company_id.to_string());

        let mut stream = self.client.graph.execute(q).await?;
        let removed: i64 = match stream.next().await? {
            Some(row) => row.get("removed").unwrap_or(0),
            None => 0,
        };
        while stream.next().await?.is_some() {}
        Ok(removed)
    }

    // --- Notifications ---

    /// Insert a notification. Failures are the caller's to decide on;
    /// engagement paths go through `fan_out` which degrades to a warning.
    pub async fn push_notification(
        &self,
        recipient: &str,
        kind: NotificationKind,
        ref_id: &str,
        actor_id: &str,
    ) -> Result<Notification, CanopyError> {
        require_id(recipient, "recipient")?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let q = query(
            "CREATE (n:Notification {
                 id: $id,
                 user_id: $user_id,
                 kind: $kind,
                 ref_id: $ref_id,
                 actor_id: $actor_id,
                 read: false,
                 created_at: $created_at
             })",
        )
        .param("id", id.to_string())
        .param("user_id", recipient)
        .param("kind", kind.to_string())
        .param("ref_id", ref_id)
        .param("actor_id", actor_id)
        .param("created_at", format_datetime(&now));
        self.client.graph.run(q).await?;

        Ok(Notification {
            id,
            user_id: recipient.to_string(),
            kind,
            ref_id: ref_id.to_string(),
            actor_id: actor_id.to_string(),
            read: false,
            created_at: now,
        })
    }

    /// Idempotent: marking an already-read or missing notification is a
    /// no-op.
    pub async fn mark_notification_read(&self, id: Uuid) -> Result<(), CanopyError> {
        let q = query("MATCH (n:Notification {id: $id}) SET n.read = true")
            .param("id", id.to_string());
        self.client.graph.run(q).await?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), CanopyError> {
        require_id(user_id, "user_id")?;
        let q = query("MATCH (n:Notification {user_id: $uid, read: false}) SET n.read = true")
            .param("uid", user_id);
        self.client.graph.run(q).await?;
        Ok(())
    }

    pub async fn delete_notification(&self, id: Uuid) -> Result<(), CanopyError> {
        let q = query("MATCH (n:Notification {id: $id}) DETACH DELETE n")
            .param("id", id.to_string());
        self.client.graph.run(q).await?;
        Ok(())
    }

    /// Fan out a notification as a side effect of an engagement write.
    /// A failed insert never rolls back the primary action; it is logged
    /// and dropped.
    async fn fan_out(&self, recipient: &str, kind: NotificationKind, ref_id: &str, actor: &str) {
        if let Err(e) = self.push_notification(recipient, kind, ref_id, actor).await {
            warn!(recipient, %kind, error = %e, "notification fan-out failed");
        }
    }
}

struct ToggleResult {
    liked: bool,
    like_count: i64,
    post_author: String,
}

fn require_id(value: &str, field: &str) -> Result<(), CanopyError> {
    if value.trim().is_empty() {
        return Err(CanopyError::Validation(format!("{field} must be non-empty")));
    }
    Ok(())
}

fn parse_role(s: &str) -> Option<Role> {
    match s {
        "member" => Some(Role::Member),
        "expert" => Some(Role::Expert),
        "moderator" => Some(Role::Moderator),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}

fn is_transient(msg: &str) -> bool {
    msg.contains("TransientError") || msg.contains("DeadlockDetected") || msg.contains("LockClient")
}

/// Format a DateTime<Utc> as a sortable datetime string without timezone
/// offset. Lexicographic order matches chronological order, which the
/// pagination cursors rely on.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Parse a stored datetime string back into a DateTime<Utc>.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
