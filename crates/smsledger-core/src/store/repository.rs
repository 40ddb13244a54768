//! SQLite-backed message repository.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::MessageStore;
use crate::message::{Classification, Message, MessageId};
use crate::{Error, Result};

const SELECT_COLUMNS: &str = "SELECT message_id, address, body, date, classification, is_read FROM messages";

/// Repository for classified messages.
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        debug!(path = database_path, "Message store opened");
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL UNIQUE,
                address TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                date INTEGER NOT NULL,
                classification TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Ordered scans
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_date
            ON messages(date DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        // Conversation view
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_address
            ON messages(address, date DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn upsert(&self, message: &Message) -> Result<()> {
        if !message.is_classified() {
            return Err(Error::Unclassified(message.id.clone()));
        }

        // `date` and `created_at` keep their first values.
        sqlx::query(
            r"
            INSERT INTO messages (message_id, address, body, date, classification, is_read)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(message_id) DO UPDATE SET
                address = excluded.address,
                body = excluded.body,
                classification = excluded.classification,
                is_read = excluded.is_read
            ",
        )
        .bind(message.id.as_str())
        .bind(&message.address)
        .bind(&message.body)
        .bind(message.date)
        .bind(message.classification.as_str())
        .bind(message.read)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: &MessageId) -> Result<Option<Message>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE message_id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_message(&r)))
    }

    async fn list_all(&self) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY date DESC, message_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn update_classification(
        &self,
        id: &MessageId,
        classification: Classification,
    ) -> Result<()> {
        if !classification.is_resolved() {
            return Err(Error::Unclassified(id.clone()));
        }

        let updated = sqlx::query(
            r"
            UPDATE messages
            SET classification = ?
            WHERE message_id = ?
            ",
        )
        .bind(classification.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn set_read(&self, id: &MessageId, read: bool) -> Result<()> {
        let updated = sqlx::query(
            r"
            UPDATE messages
            SET is_read = ?
            WHERE message_id = ?
            ",
        )
        .bind(read)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_by_address(&self, address: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE address = ? ORDER BY date DESC, message_id ASC"
        ))
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn list_by_classification(
        &self,
        classification: Classification,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE classification = ? ORDER BY date DESC, message_id ASC"
        ))
        .bind(classification.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }
}

/// Convert a database row to a `Message`.
fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: MessageId(row.get("message_id")),
        address: row.get("address"),
        body: row.get("body"),
        date: row.get("date"),
        classification: Classification::parse(row.get("classification")),
        read: row.get::<bool, _>("is_read"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(id: &str, address: &str, date: i64, classification: Classification) -> Message {
        Message {
            id: MessageId::from(id),
            address: address.to_string(),
            body: format!("body of {id}"),
            date,
            classification,
            read: false,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        let m = message("a", "+1555", 100, Classification::Ham);

        repo.upsert(&m).await.unwrap();

        let stored = repo.get_by_id(&m.id).await.unwrap().unwrap();
        assert_eq!(stored, m);
        assert!(
            repo.get_by_id(&MessageId::from("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        let m = message("a", "+1555", 100, Classification::Spam);

        repo.upsert(&m).await.unwrap();
        let once = repo.list_all().await.unwrap();
        repo.upsert(&m).await.unwrap();
        let twice = repo.list_all().await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_mutable_fields() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        repo.upsert(&message("a", "+1555", 100, Classification::Ham))
            .await
            .unwrap();

        let mut second = message("a", "+1555", 999, Classification::Spam);
        second.read = true;
        repo.upsert(&second).await.unwrap();

        let stored = repo.get_by_id(&second.id).await.unwrap().unwrap();
        assert_eq!(stored.classification, Classification::Spam);
        assert!(stored.read);
        // date is immutable once assigned
        assert_eq!(stored.date, 100);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unclassified() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        let m = message("a", "+1555", 100, Classification::Unset);

        let err = repo.upsert(&m).await.unwrap_err();
        assert!(matches!(err, Error::Unclassified(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        repo.upsert(&message("old", "X", 100, Classification::Ham))
            .await
            .unwrap();
        repo.upsert(&message("new", "Y", 300, Classification::Ham))
            .await
            .unwrap();
        repo.upsert(&message("mid", "X", 200, Classification::Spam))
            .await
            .unwrap();

        let ids: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_update_classification_touches_one_field() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        let target = message("a", "+1555", 100, Classification::Ham);
        let other = message("b", "+1666", 200, Classification::Ham);
        repo.upsert(&target).await.unwrap();
        repo.upsert(&other).await.unwrap();

        repo.update_classification(&target.id, Classification::Spam)
            .await
            .unwrap();

        let stored = repo.get_by_id(&target.id).await.unwrap().unwrap();
        assert_eq!(stored, target.clone().with_classification(Classification::Spam));
        assert_eq!(repo.get_by_id(&other.id).await.unwrap().unwrap(), other);
    }

    #[tokio::test]
    async fn test_update_classification_missing_row() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();

        let err = repo
            .update_classification(&MessageId::from("ghost"), Classification::Spam)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id.as_str() == "ghost"));
    }

    #[tokio::test]
    async fn test_set_read() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        let m = message("a", "+1555", 100, Classification::Ham);
        repo.upsert(&m).await.unwrap();

        repo.set_read(&m.id, true).await.unwrap();
        assert!(repo.get_by_id(&m.id).await.unwrap().unwrap().read);

        let err = repo
            .set_read(&MessageId::from("ghost"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_filtered_listings() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        repo.upsert(&message("1", "BANK", 100, Classification::Ham))
            .await
            .unwrap();
        repo.upsert(&message("2", "PROMO", 200, Classification::Spam))
            .await
            .unwrap();
        repo.upsert(&message("3", "BANK", 300, Classification::Spam))
            .await
            .unwrap();

        let bank = repo.list_by_address("BANK").await.unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank[0].date, 300);

        let spam = repo
            .list_by_classification(Classification::Spam)
            .await
            .unwrap();
        let ids: Vec<_> = spam.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["3", "2"]);
    }

    #[tokio::test]
    async fn test_unknown_stored_verdict_reads_as_unset() {
        let repo = SqliteMessageStore::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO messages (message_id, address, body, date, classification) VALUES ('legacy', 'X', '', 1, '')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let stored = repo
            .get_by_id(&MessageId::from("legacy"))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_classified());
    }
}
