use super::PollStorage;
use crate::error::StorageError;
use crate::models::{Poll, PollOption, PollRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        // Create database if it doesn't exist
        if !db_url.contains(":memory:") && !Sqlite::database_exists(db_url).await? {
            info!("Creating SQLite database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // WAL lets a read transaction keep one snapshot while a vote commits.
        let options = SqliteConnectOptions::from_str(db_url)?.journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                total_votes INTEGER NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                poll_id TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                position INTEGER NOT NULL,
                votes INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (poll_id, id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_voters (
                poll_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                PRIMARY KEY (poll_id, voter_id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PollStorage for SqliteStorage {
    async fn get(&self, poll_id: &str) -> Result<Option<PollRecord>, StorageError> {
        // One transaction, so the poll row, its options and its voters come from the same snapshot.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, title, description, total_votes, is_active, created_at, created_by
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let options = load_options(&mut tx, poll_id).await?;
        let voters = load_voters(&mut tx, poll_id).await?;
        tx.commit().await?;

        let poll = poll_from_row(&row, options)?;
        Ok(Some(PollRecord { poll, voters }))
    }

    async fn put(&self, record: &PollRecord) -> Result<(), StorageError> {
        let poll = &record.poll;
        let mut tx = self.pool.begin().await?;

        // Upsert rather than REPLACE so the rowid, and with it list order, survives.
        sqlx::query(
            r#"
            INSERT INTO polls (id, title, description, total_votes, is_active, created_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                total_votes = excluded.total_votes,
                is_active = excluded.is_active
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.total_votes as i64)
        .bind(poll.active)
        .bind(poll.created_at.to_rfc3339())
        .bind(&poll.created_by)
        .execute(&mut *tx)
        .await?;

        for (position, option) in poll.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO poll_options (poll_id, id, text, position, votes)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(poll_id, id) DO UPDATE SET votes = excluded.votes
                "#,
            )
            .bind(&poll.id)
            .bind(&option.id)
            .bind(&option.text)
            .bind(position as i64)
            .bind(option.votes as i64)
            .execute(&mut *tx)
            .await?;
        }

        // The voter set only ever grows, so inserting the missing ones is a full replace.
        for voter_id in &record.voters {
            sqlx::query("INSERT OR IGNORE INTO poll_voters (poll_id, voter_id) VALUES (?, ?)")
                .bind(&poll.id)
                .bind(voter_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, poll_id: &str) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM poll_voters WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM poll_options WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<PollRecord>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let poll_rows = sqlx::query(
            r#"
            SELECT id, title, description, total_votes, is_active, created_at, created_by
            FROM polls
            ORDER BY rowid
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut options: HashMap<String, Vec<PollOption>> = HashMap::new();
        for row in sqlx::query("SELECT poll_id, id, text, votes FROM poll_options ORDER BY poll_id, position")
            .fetch_all(&mut *tx)
            .await?
        {
            let poll_id: String = row.try_get("poll_id")?;
            options.entry(poll_id).or_default().push(option_from_row(&row)?);
        }

        let mut voters: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in sqlx::query("SELECT poll_id, voter_id FROM poll_voters")
            .fetch_all(&mut *tx)
            .await?
        {
            let poll_id: String = row.try_get("poll_id")?;
            voters.entry(poll_id).or_default().insert(row.try_get("voter_id")?);
        }

        tx.commit().await?;

        poll_rows
            .iter()
            .map(|row| -> Result<PollRecord, StorageError> {
                let id: String = row.try_get("id")?;
                let poll = poll_from_row(row, options.remove(&id).unwrap_or_default())?;
                Ok(PollRecord {
                    poll,
                    voters: voters.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

async fn load_options(conn: &mut SqliteConnection, poll_id: &str) -> Result<Vec<PollOption>, StorageError> {
    let rows = sqlx::query(
        r#"
        SELECT id, text, votes
        FROM poll_options
        WHERE poll_id = ?
        ORDER BY position
        "#,
    )
    .bind(poll_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(option_from_row).collect()
}

async fn load_voters(conn: &mut SqliteConnection, poll_id: &str) -> Result<BTreeSet<String>, StorageError> {
    let rows = sqlx::query("SELECT voter_id FROM poll_voters WHERE poll_id = ?")
        .bind(poll_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("voter_id").map_err(StorageError::from))
        .collect()
}

fn poll_from_row(row: &SqliteRow, options: Vec<PollOption>) -> Result<Poll, StorageError> {
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| StorageError::Backend(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(Poll {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        options,
        total_votes: row.try_get::<i64, _>("total_votes")? as u64,
        active: row.try_get("is_active")?,
        created_at,
        created_by: row.try_get("created_by")?,
    })
}

fn option_from_row(row: &SqliteRow) -> Result<PollOption, StorageError> {
    Ok(PollOption {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        votes: row.try_get::<i64, _>("votes")? as u64,
    })
}
