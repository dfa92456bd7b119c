use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use warbler_types::forms::ProfileUpdate;
use warbler_types::models::UserStats;

use crate::Database;
use crate::Result;
use crate::error::classify_unique;
use crate::models::{MessageRow, UserRow};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location";

const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

impl Database {
    // -- Users --

    /// Insert an account. The caller hashes the password.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        image_url: &str,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, email, image_url) VALUES (?1, ?2, ?3, ?4)",
                params![username, password_hash, email, image_url],
            )
            .map_err(classify_unique)?;
            let id = conn.last_insert_rowid();
            debug!(user_id = id, username, "user created");
            Ok(query_user_by_id(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
            Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// All users, or those whose username contains `query`. Matching folds
    /// case with Unicode rules, which SQLite's `LIKE` and `lower()` only do
    /// for ASCII.
    pub fn search_users(&self, query: Option<&str>) -> Result<Vec<UserRow>> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let users = self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.id");
            collect_users(conn, &sql, params![])
        })?;
        Ok(match needle {
            None => users,
            Some(needle) => users
                .into_iter()
                .filter(|u| u.username.to_lowercase().contains(&needle))
                .collect(),
        })
    }

    pub fn update_user(&self, id: i64, update: &ProfileUpdate) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5,
                     bio = ?6, location = ?7
                 WHERE id = ?1",
                params![
                    id,
                    update.username,
                    update.email,
                    update.image_url,
                    update.header_image_url,
                    update.bio,
                    update.location,
                ],
            )
            .map_err(classify_unique)?;
            Ok(())
        })
    }

    /// Remove an account. Messages, follow edges in both directions and likes
    /// go with it through `ON DELETE CASCADE`. Returns whether a row existed.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    pub fn user_stats(&self, id: i64) -> Result<UserStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [id],
                |row| {
                    Ok(UserStats {
                        messages: row.get::<_, i64>(0)? as u64,
                        following: row.get::<_, i64>(1)? as u64,
                        followers: row.get::<_, i64>(2)? as u64,
                        likes: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, user_id: i64, text: &str) -> Result<MessageRow> {
        self.insert_message_at(user_id, text, Utc::now())
    }

    pub fn insert_message_at(
        &self,
        user_id: i64,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
                params![text, format_timestamp(timestamp), user_id],
            )?;
            let id = conn.last_insert_rowid();
            Ok(query_message(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Returns whether a row existed. Likes on the message cascade.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    pub fn messages_by_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            collect_messages(conn, &sql, params![user_id, limit])
        })
    }

    /// The home feed: newest `limit` messages written by `user_id` or by
    /// anyone `user_id` follows.
    pub fn feed_for(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            collect_messages(conn, &sql, params![user_id, limit])
        })
    }

    /// Newest `limit` messages from everyone.
    pub fn discover(&self, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m JOIN users u ON u.id = m.user_id
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?1"
            );
            collect_messages(conn, &sql, params![limit])
        })
    }

    // -- Follows --

    /// Add the edge `follower -> followed`. Returns false if it already existed.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
                [follower_id, followed_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Drop the edge `follower -> followed`. Returns false if it was absent.
    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                [follower_id, followed_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.with_conn(|conn| edge_exists(conn, user_id, other_id))
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.with_conn(|conn| edge_exists(conn, other_id, user_id))
    }

    /// Users `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}
                 FROM follows f JOIN users u ON u.id = f.followed_id
                 WHERE f.follower_id = ?1
                 ORDER BY u.id"
            );
            collect_users(conn, &sql, params![user_id])
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}
                 FROM follows f JOIN users u ON u.id = f.follower_id
                 WHERE f.followed_id = ?1
                 ORDER BY u.id"
            );
            collect_users(conn, &sql, params![user_id])
        })
    }

    // -- Likes --

    /// Returns false if the like already existed.
    pub fn like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO likes (user_id, message_id) VALUES (?1, ?2)",
                [user_id, message_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false if there was nothing to remove.
    pub fn unlike(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                [user_id, message_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn liked_message_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }

    /// Messages `user_id` has liked, newest first.
    pub fn liked_messages(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM likes l
                 JOIN messages m ON m.id = l.message_id
                 JOIN users u ON u.id = m.user_id
                 WHERE l.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC"
            );
            collect_messages(conn, &sql, params![user_id])
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m JOIN users u ON u.id = m.user_id
         WHERE m.id = ?1"
    );
    Ok(conn.query_row(&sql, [id], message_from_row).optional()?)
}

fn edge_exists(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            [follower_id, followed_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn collect_users(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn collect_messages(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let raw: String = row.get(2)?;
    let timestamp = DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp,
        user_id: row.get(3)?,
        author_username: row.get(4)?,
        author_image_url: row.get(5)?,
    })
}

/// Fixed-width UTC so that text ordering in SQLite matches time ordering.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
