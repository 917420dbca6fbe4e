use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

// Fixed width so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn points_to_sql(points: u64) -> i64 {
    i64::try_from(points).unwrap_or(i64::MAX)
}

fn points_from_sql(points: i64) -> u64 {
    u64::try_from(points).unwrap_or(0)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

const USER_COLUMNS: &str = "id, name, email, top_subjects, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        top_subjects: json_column(row, 3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

const RESOURCE_SELECT: &str = "SELECT r.id, r.user_id, u.name, r.title, r.subject, r.topic,
        r.description, r.file_key, r.file_size, r.file_sha256, r.rating, r.num_reviews,
        r.created_at, r.updated_at
     FROM resources r
     LEFT JOIN users u ON u.id = r.user_id";

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        title: row.get(3)?,
        subject: row.get(4)?,
        topic: row.get(5)?,
        description: row.get(6)?,
        file_key: row.get(7)?,
        file_size: row.get(8)?,
        file_sha256: row.get(9)?,
        rating: row.get(10)?,
        num_reviews: row.get(11)?,
        reviews: Vec::new(),
        created_at: parse_datetime(&row.get::<_, String>(12)?),
        updated_at: parse_datetime(&row.get::<_, String>(13)?),
    })
}

const REVIEW_SELECT: &str = "SELECT v.id, v.resource_id, v.user_id, u.name, v.rating, v.comment,
        v.created_at
     FROM reviews v
     LEFT JOIN users u ON u.id = v.user_id";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const CONTRIBUTION_COLUMNS: &str = "user_id, resources_uploaded, resources_downloaded,
    reviews_written, total_points, level, badges, version, created_at, updated_at";

fn contribution_from_row(row: &Row<'_>) -> rusqlite::Result<Contribution> {
    Ok(Contribution {
        user_id: row.get(0)?,
        resources_uploaded: row.get(1)?,
        resources_downloaded: row.get(2)?,
        reviews_written: row.get(3)?,
        total_points: points_from_sql(row.get(4)?),
        level: row.get(5)?,
        badges: json_column(row, 6)?,
        version: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn fetch_resource(conn: &Connection, id: &str) -> rusqlite::Result<Option<Resource>> {
    conn.query_row(
        &format!("{RESOURCE_SELECT} WHERE r.id = ?1"),
        params![id],
        resource_from_row,
    )
    .optional()
}

/// Rewrites `rating` and `num_reviews` from the review rows.
fn refresh_rating(conn: &Connection, resource_id: &str, updated_at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE resources SET
            rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE resource_id = ?1), 0),
            num_reviews = (SELECT COUNT(*) FROM reviews WHERE resource_id = ?1),
            updated_at = ?2
         WHERE id = ?1",
        params![resource_id, updated_at],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, name, email, top_subjects, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.name,
                user.email,
                serde_json::to_string(&user.top_subjects)?,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_user_top_subjects(&self, id: &str, subjects: &[String]) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET top_subjects = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(subjects)?,
                format_datetime(&Utc::now()),
                id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound("User not found"));
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let file_keys: Vec<String> = {
            let mut stmt = tx.prepare("SELECT file_key FROM resources WHERE user_id = ?1")?;
            stmt.query_map(params![id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let reviewed: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT DISTINCT resource_id FROM reviews WHERE user_id = ?1")?;
            stmt.query_map(params![id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        let now = format_datetime(&Utc::now());
        for resource_id in &reviewed {
            refresh_rating(&tx, resource_id, &now)?;
        }

        tx.commit()?;
        Ok((rows > 0).then_some(file_keys))
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?1"),
                params![id],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Resource operations

    fn create_resource(&self, resource: &Resource) -> Result<()> {
        self.conn().execute(
            "INSERT INTO resources (id, user_id, title, subject, topic, description, file_key,
                file_size, file_sha256, rating, num_reviews, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10, ?11)",
            params![
                resource.id,
                resource.user_id,
                resource.title,
                resource.subject,
                resource.topic,
                resource.description,
                resource.file_key,
                resource.file_size,
                resource.file_sha256,
                format_datetime(&resource.created_at),
                format_datetime(&resource.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        fetch_resource(&self.conn(), id).map_err(Error::from)
    }

    fn list_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{RESOURCE_SELECT}
             WHERE (?1 IS NULL OR r.subject = ?1)
               AND (?2 IS NULL OR r.topic = ?2)
               AND (?3 IS NULL
                    OR instr(lower(r.title), lower(?3)) > 0
                    OR instr(lower(COALESCE(r.description, '')), lower(?3)) > 0)
             ORDER BY r.created_at DESC, r.rowid DESC"
        ))?;

        let rows = stmt.query_map(
            params![filter.subject(), filter.topic(), filter.search()],
            resource_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_resources(&self, user_id: &str, limit: i32) -> Result<Vec<Resource>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{RESOURCE_SELECT} WHERE r.user_id = ?1
             ORDER BY r.created_at DESC, r.rowid DESC LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![user_id, limit], resource_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_recommended_resources(
        &self,
        subjects: &[String],
        exclude_user_id: &str,
        limit: i32,
    ) -> Result<Vec<Resource>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{RESOURCE_SELECT}
             WHERE r.subject IN (SELECT value FROM json_each(?1))
               AND r.user_id != ?2
             ORDER BY r.rating DESC, r.created_at DESC LIMIT ?3"
        ))?;

        let rows = stmt.query_map(
            params![serde_json::to_string(subjects)?, exclude_user_id, limit],
            resource_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_resource(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Review operations

    fn add_review(&self, review: &Review) -> Result<Resource> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM resources WHERE id = ?1)",
            params![review.resource_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound("Resource not found"));
        }

        let inserted = tx.execute(
            "INSERT INTO reviews (id, resource_id, user_id, rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                review.id,
                review.resource_id,
                review.user_id,
                review.rating,
                review.comment,
                format_datetime(&review.created_at),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(Error::AlreadyExists),
            Err(e) => return Err(Error::from(e)),
        }

        refresh_rating(
            &tx,
            &review.resource_id,
            &format_datetime(&review.created_at),
        )?;

        let resource = fetch_resource(&tx, &review.resource_id)?
            .ok_or(Error::NotFound("Resource not found"))?;

        tx.commit()?;
        Ok(resource)
    }

    fn list_reviews(&self, resource_id: &str) -> Result<Vec<Review>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{REVIEW_SELECT} WHERE v.resource_id = ?1 ORDER BY v.rowid"
        ))?;

        let rows = stmt.query_map(params![resource_id], review_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_reviews(&self, user_id: &str, limit: i32) -> Result<Vec<UserReview>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.resource_id, v.user_id, u.name, v.rating, v.comment, v.created_at,
                    r.title
             FROM reviews v
             JOIN resources r ON r.id = v.resource_id
             LEFT JOIN users u ON u.id = v.user_id
             WHERE v.user_id = ?1
             ORDER BY v.created_at DESC, v.rowid DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok(UserReview {
                review: review_from_row(row)?,
                resource_title: row.get(7)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Contribution operations

    fn get_contribution(&self, user_id: &str) -> Result<Option<Contribution>> {
        self.conn()
            .query_row(
                &format!("SELECT {CONTRIBUTION_COLUMNS} FROM contributions WHERE user_id = ?1"),
                params![user_id],
                contribution_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn insert_contribution(&self, c: &Contribution) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO contributions (user_id, resources_uploaded, resources_downloaded,
                reviews_written, total_points, level, badges, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                c.user_id,
                c.resources_uploaded,
                c.resources_downloaded,
                c.reviews_written,
                points_to_sql(c.total_points),
                c.level,
                serde_json::to_string(&c.badges)?,
                c.version,
                format_datetime(&c.created_at),
                format_datetime(&c.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn update_contribution(&self, c: &Contribution, expected_version: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE contributions SET
                resources_uploaded = ?1,
                resources_downloaded = ?2,
                reviews_written = ?3,
                total_points = ?4,
                level = ?5,
                badges = ?6,
                version = version + 1,
                updated_at = ?7
             WHERE user_id = ?8 AND version = ?9",
            params![
                c.resources_uploaded,
                c.resources_downloaded,
                c.reviews_written,
                points_to_sql(c.total_points),
                c.level,
                serde_json::to_string(&c.badges)?,
                format_datetime(&c.updated_at),
                c.user_id,
                expected_version,
            ],
        )?;
        Ok(rows == 1)
    }

    fn leaderboard(&self, limit: i32) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.name, u.id, u.email, c.total_points, c.resources_uploaded,
                    c.resources_downloaded, c.reviews_written, c.badges, c.level
             FROM contributions c
             JOIN users u ON u.id = c.user_id
             ORDER BY c.total_points DESC, u.id ASC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(LeaderboardEntry {
                username: row.get(0)?,
                user_id: row.get(1)?,
                email: row.get(2)?,
                total_points: points_from_sql(row.get(3)?),
                resources_uploaded: row.get(4)?,
                resources_downloaded: row.get(5)?,
                reviews_written: row.get(6)?,
                badges: json_column(row, 7)?,
                level: row.get(8)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
