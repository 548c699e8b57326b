use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tokio::task;
use uuid::Uuid;

use super::traits::ConversationBackend;
use super::types::{BackendError, GeneratedTitle};
use crate::models::{timestamp, Conversation, HistoryMessage, Role, DEFAULT_TITLE};
use crate::services::title::truncate_title;

/// Embedded conversation store with the same semantics as the remote API.
#[derive(Debug, Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let store = LocalStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = LocalStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// A backend view of this store bound to one principal.
    pub fn backend_for(&self, user_id: impl Into<String>) -> LocalBackend {
        LocalBackend {
            store: self.clone(),
            user_id: user_id.into(),
        }
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock().map_err(|_| anyhow!("database lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE conversations (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE INDEX idx_conversations_user ON conversations(user_id);
                CREATE INDEX idx_conversations_updated ON conversations(updated_at DESC);
                CREATE INDEX idx_messages_conversation ON messages(conversation_id);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            f(&conn)
        })
        .await?
    }

    // --- Conversation CRUD ---

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, created_at, updated_at
                 FROM conversations WHERE user_id = ?1
                 ORDER BY updated_at DESC, rowid DESC",
            )?;
            let conversations = stmt
                .query_map(params![user_id], |row| Ok(Self::row_to_conversation(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
        .await
    }

    async fn insert_conversation(&self, user_id: &str, title: Option<&str>) -> Result<Conversation> {
        let now = Utc::now();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let conv = Conversation::new(
            Uuid::new_v4().to_string(),
            user_id,
            title,
            Some(now),
            Some(now),
        );

        let row = conv.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    row.owner(),
                    row.title,
                    Self::format_ts(now),
                    Self::format_ts(now),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(conv)
    }

    async fn get_conversation(&self, user_id: &str, id: &str) -> Result<Option<Conversation>> {
        let user_id = user_id.to_string();
        let id = id.to_string();
        self.with_conn(move |conn| {
            let conv = conn
                .query_row(
                    "SELECT id, user_id, title, created_at, updated_at
                     FROM conversations WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                    |row| Ok(Self::row_to_conversation(row)),
                )
                .optional()?
                .transpose()?;
            Ok(conv)
        })
        .await
    }

    /// Returns false when the conversation does not exist for this owner.
    async fn update_title(&self, user_id: &str, id: &str, title: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        let id = id.to_string();
        let title = title.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2
                 WHERE id = ?3 AND user_id = ?4",
                params![title, Self::format_ts(Utc::now()), id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn touch(&self, user_id: &str, id: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2 AND user_id = ?3",
                params![Self::format_ts(Utc::now()), id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Deletes the owned subset of `ids`, returning how many rows went away.
    async fn delete_conversations(&self, user_id: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let user_id = user_id.to_string();
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let placeholders = (0..ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(",");
            let sql = format!(
                "DELETE FROM conversations WHERE user_id = ?1 AND id IN ({})",
                placeholders
            );
            let bound = std::iter::once(user_id).chain(ids);
            let deleted = conn.execute(&sql, params_from_iter(bound))?;
            Ok(deleted as u64)
        })
        .await
    }

    // --- Message history ---

    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<HistoryMessage> {
        let message = HistoryMessage {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: content.to_string(),
            created_at: Some(Utc::now()),
        };
        let row = message.clone();
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    conversation_id,
                    row.role.as_str(),
                    row.content,
                    row.created_at.map(Self::format_ts),
                ],
            )
            .context("Failed to insert message")?;
            Ok(())
        })
        .await?;
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<HistoryMessage>> {
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, content, created_at FROM messages
                 WHERE conversation_id = ?1 AND content != ''
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut messages = Vec::new();
            for row in rows {
                let (id, role, content, created_at) = row?;
                // Tool and system entries are not part of the visible history.
                let Some(role) = Role::from_str(&role) else {
                    continue;
                };
                messages.push(HistoryMessage {
                    id: Some(id),
                    role,
                    content,
                    created_at: timestamp::parse(&created_at),
                });
            }
            Ok(messages)
        })
        .await
    }

    fn format_ts(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation> {
        let created_at: String = row.get(3)?;
        let updated_at: String = row.get(4)?;
        Ok(Conversation::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            timestamp::parse(&created_at),
            timestamp::parse(&updated_at),
        ))
    }
}

/// [`LocalStore`] scoped to a principal.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    store: LocalStore,
    user_id: String,
}

impl LocalBackend {
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    async fn require_owned(&self, id: &str) -> Result<Conversation, BackendError> {
        self.store
            .get_conversation(&self.user_id, id)
            .await?
            .ok_or_else(|| BackendError::NotFound("Conversation not found".to_string()))
    }
}

#[async_trait]
impl ConversationBackend for LocalBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
        Ok(self.store.list_conversations(&self.user_id).await?)
    }

    async fn create_conversation(
        &self,
        title: Option<&str>,
    ) -> Result<Conversation, BackendError> {
        Ok(self.store.insert_conversation(&self.user_id, title).await?)
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), BackendError> {
        if !self.store.update_title(&self.user_id, id, title).await? {
            return Err(BackendError::NotFound("Conversation not found".to_string()));
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), BackendError> {
        let deleted = self
            .store
            .delete_conversations(&self.user_id, &[id.to_string()])
            .await?;
        if deleted == 0 {
            return Err(BackendError::NotFound("Conversation not found".to_string()));
        }
        Ok(())
    }

    async fn delete_conversations(&self, ids: &[String]) -> Result<u64, BackendError> {
        if ids.is_empty() {
            return Err(BackendError::Rejected {
                status: 400,
                detail: "No conversation IDs provided".to_string(),
            });
        }
        let deleted = self.store.delete_conversations(&self.user_id, ids).await?;
        if deleted == 0 {
            return Err(BackendError::NotFound(
                "No valid conversations found".to_string(),
            ));
        }
        Ok(deleted)
    }

    async fn touch_conversation(&self, id: &str) -> Result<(), BackendError> {
        if !self.store.touch(&self.user_id, id).await? {
            return Err(BackendError::NotFound("Conversation not found".to_string()));
        }
        Ok(())
    }

    async fn generate_title(
        &self,
        id: &str,
        message: &str,
    ) -> Result<GeneratedTitle, BackendError> {
        let conv = self.require_owned(id).await?;
        if !conv.has_default_title() {
            return Ok(GeneratedTitle {
                generated: false,
                title: conv.title,
                fallback: false,
            });
        }

        let title = truncate_title(message);
        if title.is_empty() {
            return Ok(GeneratedTitle {
                generated: false,
                title: conv.title,
                fallback: false,
            });
        }

        self.store.update_title(&self.user_id, id, &title).await?;
        Ok(GeneratedTitle {
            generated: true,
            title,
            fallback: true,
        })
    }

    async fn history(&self, id: &str) -> Result<Vec<HistoryMessage>, BackendError> {
        self.require_owned(id).await?;
        Ok(self.store.list_messages(id).await?)
    }
}
