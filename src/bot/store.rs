//! Persistent SQLite store for users, usage records, and receipts.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use crate::bot::texts::Language;

/// A registered resident.
#[derive(Debug, Clone)]
pub struct User {
    pub chat_id: i64,
    pub language: Language,
    pub last_interaction: DateTime<Utc>,
    pub next_reminder: Option<DateTime<Utc>>,
    pub active: bool,
}

/// One month's submitted readings. Append-only.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub chat_id: i64,
    pub room_number: String,
    pub language: Language,
    pub electricity: f64,
    pub water: f64,
    pub submitted_at: DateTime<Utc>,
}

/// A receipt image uploaded for a room. One per room, newest upload wins.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub room_number: String,
    pub chat_id: i64,
    pub image: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

/// SQLite-backed persistence for the bot.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                language TEXT NOT NULL DEFAULT 'english',
                last_interaction TEXT NOT NULL,
                next_reminder TEXT,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                room_number TEXT NOT NULL,
                language TEXT NOT NULL,
                electricity REAL NOT NULL,
                water REAL NOT NULL,
                submitted_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS receipts (
                room_number TEXT PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                image BLOB NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_next_reminder ON users(next_reminder);
            CREATE INDEX IF NOT EXISTS idx_usage_chat_id ON usage(chat_id);
            CREATE INDEX IF NOT EXISTS idx_usage_submitted_at ON usage(submitted_at);
        "#,
        )
    }

    // ==================== USER METHODS ====================

    /// Register a user on /start. New users get the default language and
    /// their first reminder; returning users only have their last interaction
    /// refreshed and are reactivated, keeping language and reminder as-is.
    pub fn start_user(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
        first_reminder: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (chat_id, language, last_interaction, next_reminder, active)
             VALUES (?1, 'english', ?2, ?3, 1)
             ON CONFLICT(chat_id) DO UPDATE SET
                last_interaction = ?2,
                active = 1",
            params![chat_id, now, first_reminder],
        )?;
        Ok(())
    }

    pub fn get_user(&self, chat_id: i64) -> rusqlite::Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT chat_id, language, last_interaction, next_reminder, active
             FROM users WHERE chat_id = ?1",
            params![chat_id],
            user_from_row,
        )
        .optional()
    }

    /// Persist a language choice.
    pub fn set_language(&self, chat_id: i64, language: Language) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET language = ?2, active = 1 WHERE chat_id = ?1",
            params![chat_id, language.as_str()],
        )?;
        Ok(())
    }

    /// Record a successful submission: refresh the interaction time and move
    /// the reminder one cycle out.
    pub fn complete_submission(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
        next_reminder: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET last_interaction = ?2, next_reminder = ?3, active = 1
             WHERE chat_id = ?1",
            params![chat_id, now, next_reminder],
        )?;
        Ok(())
    }

    /// Wipe a user's preferences and stop their reminders. The usage history
    /// stays; it belongs to the landlord, not the session.
    pub fn clear_user(&self, chat_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET language = 'english', next_reminder = NULL, active = 0
             WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    /// Active users whose reminder is due at or before `now`.
    pub fn due_reminders(&self, now: DateTime<Utc>) -> rusqlite::Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT chat_id, language, last_interaction, next_reminder, active
             FROM users
             WHERE active = 1 AND next_reminder IS NOT NULL AND next_reminder <= ?1
             ORDER BY next_reminder",
        )?;
        let users = stmt
            .query_map(params![now], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn set_next_reminder(
        &self,
        chat_id: i64,
        next_reminder: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET next_reminder = ?2 WHERE chat_id = ?1",
            params![chat_id, next_reminder],
        )?;
        Ok(())
    }

    /// Stop targeting a user whose chat is gone (blocked, deleted account).
    pub fn deactivate_user(&self, chat_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET active = 0 WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    // ==================== USAGE METHODS ====================

    /// Append a usage record.
    pub fn add_usage(&self, record: &UsageRecord) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO usage (chat_id, room_number, language, electricity, water, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.chat_id,
                record.room_number,
                record.language.as_str(),
                record.electricity,
                record.water,
                record.submitted_at,
            ],
        )?;
        Ok(())
    }

    /// Usage records submitted in `[from, to)`, oldest first.
    pub fn usage_for_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> rusqlite::Result<Vec<UsageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT chat_id, room_number, language, electricity, water, submitted_at
             FROM usage
             WHERE submitted_at >= ?1 AND submitted_at < ?2
             ORDER BY submitted_at",
        )?;
        let records = stmt
            .query_map(params![from, to], usage_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ==================== RECEIPT METHODS ====================

    /// Look up the receipt uploaded for a room, if any.
    pub fn get_receipt(&self, room_number: &str) -> rusqlite::Result<Option<Receipt>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT room_number, chat_id, image, uploaded_at
             FROM receipts WHERE room_number = ?1",
            params![room_number],
            |row| {
                Ok(Receipt {
                    room_number: row.get(0)?,
                    chat_id: row.get(1)?,
                    image: row.get(2)?,
                    uploaded_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    /// Insert or replace the receipt for a room.
    pub fn put_receipt(&self, receipt: &Receipt) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO receipts (room_number, chat_id, image, uploaded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(room_number) DO UPDATE SET
                chat_id = ?2,
                image = ?3,
                uploaded_at = ?4",
            params![
                receipt.room_number,
                receipt.chat_id,
                receipt.image,
                receipt.uploaded_at,
            ],
        )?;
        Ok(())
    }

    // ==================== TEST HELPERS ====================

    #[cfg(test)]
    pub fn user_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    #[cfg(test)]
    pub fn usage_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM usage", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    /// Break the usage table so the next insert fails.
    #[cfg(test)]
    pub fn drop_usage_table(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE usage").unwrap();
    }

    /// Break the users table so the next user update fails.
    #[cfg(test)]
    pub fn drop_users_table(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE users").unwrap();
    }

    /// Break the receipts table so the next lookup fails.
    #[cfg(test)]
    pub fn drop_receipts_table(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE receipts").unwrap();
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        chat_id: row.get(0)?,
        language: Language::from_str(&row.get::<_, String>(1)?),
        last_interaction: row.get(2)?,
        next_reminder: row.get(3)?,
        active: row.get(4)?,
    })
}

fn usage_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        chat_id: row.get(0)?,
        room_number: row.get(1)?,
        language: Language::from_str(&row.get::<_, String>(2)?),
        electricity: row.get(3)?,
        water: row.get(4)?,
        submitted_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn usage(chat_id: i64, room: &str, at: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            chat_id,
            room_number: room.to_string(),
            language: Language::English,
            electricity: 150.0,
            water: 25.0,
            submitted_at: at,
        }
    }

    #[test]
    fn test_start_user_creates_with_defaults() {
        let store = Store::open_in_memory().unwrap();
        store.start_user(1, ts(2026, 1, 15, 10), ts(2026, 2, 15, 9)).unwrap();

        let user = store.get_user(1).unwrap().unwrap();
        assert_eq!(user.language, Language::English);
        assert_eq!(user.last_interaction, ts(2026, 1, 15, 10));
        assert_eq!(user.next_reminder, Some(ts(2026, 2, 15, 9)));
        assert!(user.active);
    }

    #[test]
    fn test_start_user_returning_keeps_language_and_reminder() {
        let store = Store::open_in_memory().unwrap();
        store.start_user(1, ts(2026, 1, 15, 10), ts(2026, 2, 15, 9)).unwrap();
        store.set_language(1, Language::Khmer).unwrap();

        store.start_user(1, ts(2026, 1, 20, 12), ts(2026, 2, 20, 9)).unwrap();

        let user = store.get_user(1).unwrap().unwrap();
        assert_eq!(user.language, Language::Khmer);
        assert_eq!(user.last_interaction, ts(2026, 1, 20, 12));
        // The reminder seeded at first /start stays put.
        assert_eq!(user.next_reminder, Some(ts(2026, 2, 15, 9)));
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_get_missing_user() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_user(42).unwrap().is_none());
    }

    #[test]
    fn test_complete_submission_advances_reminder() {
        let store = Store::open_in_memory().unwrap();
        store.start_user(1, ts(2026, 1, 15, 10), ts(2026, 2, 15, 9)).unwrap();

        store.complete_submission(1, ts(2026, 2, 16, 11), ts(2026, 3, 16, 9)).unwrap();

        let user = store.get_user(1).unwrap().unwrap();
        assert_eq!(user.last_interaction, ts(2026, 2, 16, 11));
        assert_eq!(user.next_reminder, Some(ts(2026, 3, 16, 9)));
        assert!(user.active);
    }

    #[test]
    fn test_clear_user_then_start_leaves_reminder_unset() {
        let store = Store::open_in_memory().unwrap();
        store.start_user(1, ts(2026, 1, 15, 10), ts(2026, 2, 15, 9)).unwrap();
        store.set_language(1, Language::Khmer).unwrap();

        store.clear_user(1).unwrap();
        let user = store.get_user(1).unwrap().unwrap();
        assert_eq!(user.language, Language::English);
        assert_eq!(user.next_reminder, None);
        assert!(!user.active);

        // Coming back reactivates but does not re-seed the reminder: the
        // next successful submission will.
        store.start_user(1, ts(2026, 3, 1, 8), ts(2026, 4, 1, 9)).unwrap();
        let user = store.get_user(1).unwrap().unwrap();
        assert!(user.active);
        assert_eq!(user.next_reminder, None);
    }

    #[test]
    fn test_due_reminders_filters() {
        let store = Store::open_in_memory().unwrap();
        let now = ts(2026, 3, 1, 10);

        // Due.
        store.start_user(1, ts(2026, 1, 1, 10), ts(2026, 3, 1, 9)).unwrap();
        // Not due yet.
        store.start_user(2, ts(2026, 2, 20, 10), ts(2026, 3, 20, 9)).unwrap();
        // Due but inactive.
        store.start_user(3, ts(2026, 1, 1, 10), ts(2026, 2, 1, 9)).unwrap();
        store.deactivate_user(3).unwrap();
        // No reminder scheduled.
        store.start_user(4, ts(2026, 1, 1, 10), ts(2026, 2, 1, 9)).unwrap();
        store.clear_user(4).unwrap();
        store.start_user(4, ts(2026, 2, 25, 10), ts(2026, 3, 25, 9)).unwrap();

        let due = store.due_reminders(now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].chat_id, 1);
    }

    #[test]
    fn test_due_reminders_exact_boundary() {
        let store = Store::open_in_memory().unwrap();
        store.start_user(1, ts(2026, 1, 1, 10), ts(2026, 3, 1, 9)).unwrap();

        // A reminder scheduled exactly at the tick instant is due.
        let due = store.due_reminders(ts(2026, 3, 1, 9)).unwrap();
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_add_usage_appends() {
        let store = Store::open_in_memory().unwrap();
        store.add_usage(&usage(1, "A101", ts(2026, 1, 15, 10))).unwrap();
        store.add_usage(&usage(1, "A101", ts(2026, 2, 15, 10))).unwrap();

        assert_eq!(store.usage_count(), 2);
    }

    #[test]
    fn test_usage_for_range() {
        let store = Store::open_in_memory().unwrap();
        store.add_usage(&usage(1, "A101", ts(2026, 1, 31, 23))).unwrap();
        store.add_usage(&usage(2, "B12", ts(2026, 2, 1, 0))).unwrap();
        store.add_usage(&usage(3, "C7", ts(2026, 2, 28, 12))).unwrap();
        store.add_usage(&usage(4, "D3", ts(2026, 3, 1, 0))).unwrap();

        let feb = store
            .usage_for_range(ts(2026, 2, 1, 0), ts(2026, 3, 1, 0))
            .unwrap();
        let rooms: Vec<&str> = feb.iter().map(|r| r.room_number.as_str()).collect();
        assert_eq!(rooms, vec!["B12", "C7"]);
    }

    #[test]
    fn test_receipt_missing() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_receipt("A101").unwrap().is_none());
    }

    #[test]
    fn test_receipt_upsert_by_room() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_receipt(&Receipt {
                room_number: "A101".to_string(),
                chat_id: 1,
                image: vec![1, 2, 3],
                uploaded_at: ts(2026, 1, 20, 14),
            })
            .unwrap();

        let receipt = store.get_receipt("A101").unwrap().unwrap();
        assert_eq!(receipt.image, vec![1, 2, 3]);
        assert_eq!(receipt.chat_id, 1);

        // A re-upload for the same room replaces the image.
        store
            .put_receipt(&Receipt {
                room_number: "A101".to_string(),
                chat_id: 1,
                image: vec![9, 9],
                uploaded_at: ts(2026, 1, 21, 9),
            })
            .unwrap();

        let receipt = store.get_receipt("A101").unwrap().unwrap();
        assert_eq!(receipt.image, vec![9, 9]);
        assert_eq!(receipt.uploaded_at, ts(2026, 1, 21, 9));
    }

    #[test]
    fn test_persistence_error_surfaces() {
        let store = Store::open_in_memory().unwrap();
        store.drop_usage_table();
        assert!(store.add_usage(&usage(1, "A101", ts(2026, 1, 15, 10))).is_err());
    }
}
