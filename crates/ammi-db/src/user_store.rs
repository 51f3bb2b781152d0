use std::path::Path;

use ammi_common::{ConversationMessage, ConversationRole, Error, Result, normalize_phone};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

/// A user row. The normalized phone number is the identity key; an empty
/// `name` marks a user who has not completed onboarding yet.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub phone: String,
    pub name: String,
    pub reminder_time: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

/// Persistent storage for users and their append-only conversation logs.
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening user store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    phone TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL DEFAULT '',
                    reminder_time TEXT NOT NULL DEFAULT '09:00',
                    timezone TEXT NOT NULL DEFAULT 'UTC',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS conversation_messages (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id),
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_messages_user
                    ON conversation_messages(user_id, timestamp);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Look up a user by phone number, creating one (with an empty name)
    /// on first contact. The conversation log is keyed by the returned id.
    pub fn get_or_create_user(&self, phone: &str, default_timezone: &str) -> Result<UserRecord> {
        let phone = normalize_phone(phone);

        if let Some(user) = self.find_by_phone(&phone)? {
            return Ok(user);
        }

        info!("creating new user for {phone}");
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO users (id, phone, name, reminder_time, timezone, created_at)
                 VALUES (?1, ?2, '', '09:00', ?3, ?4)",
                params![id, phone, default_timezone, now.to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to create user: {e}")))?;

        Ok(UserRecord {
            id,
            phone,
            name: String::new(),
            reminder_time: "09:00".to_string(),
            timezone: default_timezone.to_string(),
            created_at: now,
        })
    }

    fn find_by_phone(&self, phone: &str) -> Result<Option<UserRecord>> {
        self.conn
            .query_row(
                "SELECT id, phone, name, reminder_time, timezone, created_at
                 FROM users WHERE phone = ?1",
                params![phone],
                |row| {
                    let created_raw: String = row.get(5)?;
                    Ok(UserRecord {
                        id: row.get(0)?,
                        phone: row.get(1)?,
                        name: row.get(2)?,
                        reminder_time: row.get(3)?,
                        timezone: row.get(4)?,
                        created_at: parse_timestamp(&created_raw),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to look up user: {e}")))
    }

    /// Persist the display name captured during onboarding.
    pub fn set_user_name(&self, user_id: &str, name: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![name, user_id],
            )
            .map_err(|e| Error::Database(format!("failed to update user name: {e}")))?;
        if changed == 0 {
            return Err(Error::Database(format!("no such user: {user_id}")));
        }
        Ok(())
    }

    /// Append one message to a user's conversation log. A single INSERT;
    /// ordering across concurrent callers is whatever the database sees.
    pub fn append_message(
        &self,
        user_id: &str,
        role: ConversationRole,
        content: &str,
    ) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO conversation_messages (id, user_id, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    user_id,
                    role.as_str(),
                    content,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to append message: {e}")))?;
        Ok(())
    }

    /// Load the most recent `limit` messages in chronological order.
    pub fn recent_messages(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationMessage>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT role, content, timestamp
                 FROM conversation_messages
                 WHERE user_id = ?1
                 ORDER BY rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare message query: {e}")))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                let role_raw: String = row.get(0)?;
                let timestamp_raw: String = row.get(2)?;
                Ok(ConversationMessage {
                    role: ConversationRole::parse(&role_raw)
                        .unwrap_or(ConversationRole::Assistant),
                    content: row.get(1)?,
                    timestamp: parse_timestamp(&timestamp_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to load messages: {e}")))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(
                row.map_err(|e| Error::Database(format!("failed to read message row: {e}")))?,
            );
        }

        // Query is DESC for an efficient tail fetch; return chronological.
        messages.reverse();
        Ok(messages)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("failed to parse timestamp '{value}': {e}, falling back to now");
            Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent_per_phone() {
        let store = UserStore::in_memory().expect("in-memory store should open");

        let first = store
            .get_or_create_user("whatsapp:+91 98765-43210", "Asia/Kolkata")
            .unwrap();
        assert_eq!(first.phone, "+919876543210");
        assert!(first.name.is_empty());
        assert_eq!(first.timezone, "Asia/Kolkata");

        let second = store
            .get_or_create_user("+919876543210", "UTC")
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.timezone, "Asia/Kolkata");
    }

    #[test]
    fn set_user_name_persists() {
        let store = UserStore::in_memory().unwrap();
        let user = store.get_or_create_user("+14155238886", "UTC").unwrap();

        store.set_user_name(&user.id, "Asha").unwrap();

        let reloaded = store.get_or_create_user("+14155238886", "UTC").unwrap();
        assert_eq!(reloaded.name, "Asha");
    }

    #[test]
    fn set_user_name_rejects_unknown_user() {
        let store = UserStore::in_memory().unwrap();
        assert!(store.set_user_name("nope", "X").is_err());
    }

    #[test]
    fn messages_append_and_read_in_order() {
        let store = UserStore::in_memory().unwrap();
        let user = store.get_or_create_user("+14155238886", "UTC").unwrap();

        store
            .append_message(&user.id, ConversationRole::User, "hello")
            .unwrap();
        store
            .append_message(&user.id, ConversationRole::Assistant, "hi there")
            .unwrap();

        let messages = store.recent_messages(&user.id, 10).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ConversationRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, ConversationRole::Assistant);
        assert_eq!(messages[1].content, "hi there");
    }

    #[test]
    fn recent_messages_limits_to_suffix() {
        let store = UserStore::in_memory().unwrap();
        let user = store.get_or_create_user("+14155238886", "UTC").unwrap();

        for i in 0..8 {
            store
                .append_message(&user.id, ConversationRole::User, &format!("msg-{i}"))
                .unwrap();
        }

        let messages = store.recent_messages(&user.id, 3).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "msg-5");
        assert_eq!(messages[2].content, "msg-7");
    }
}
