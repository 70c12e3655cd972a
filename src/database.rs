use crate::models::{AppError, Document, Question, Quiz};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CURRENT_DB_VERSION: u32 = 1;

/// 文档与测验存储
///
/// 问题列表以 JSON 文本列存储；(document_id, user_id) 上的测验唯一，
/// upsert 替换题目集但保留 id 与 created_at。
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// 创建新的数据库连接并初始化/迁移数据库
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建数据库目录失败: {:?}", parent))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("打开数据库连接失败: {:?}", db_path))?;

        let db = Database {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY NOT NULL
            );
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                content TEXT NOT NULL,
                summary TEXT,
                processed INTEGER NOT NULL DEFAULT 0,
                upload_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS quizzes (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                questions TEXT NOT NULL, -- JSON数组
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(document_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_user_date ON documents(user_id, upload_date);
            CREATE INDEX IF NOT EXISTS idx_quizzes_document_user ON quizzes(document_id, user_id);
            COMMIT;",
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        if current_version < CURRENT_DB_VERSION {
            // 迁移逻辑（v1 为初始版本，后续版本在此接入）
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![CURRENT_DB_VERSION],
            )?;
        }

        Ok(())
    }

    // ===== 文档 =====

    pub fn insert_document(&self, document: &Document) -> std::result::Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO documents (id, user_id, title, file_name, file_type, file_size, content, summary, processed, upload_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                document.id,
                document.user_id,
                document.title,
                document.file_name,
                document.file_type,
                document.file_size,
                document.content,
                document.summary,
                document.processed as i64,
                document.upload_date,
            ],
        )?;
        Ok(())
    }

    /// 按 id 读取，限定所属用户
    pub fn get_document(
        &self,
        id: &str,
        user_id: &str,
    ) -> std::result::Result<Option<Document>, AppError> {
        let conn = self.conn.lock().unwrap();
        let document = conn
            .query_row(
                "SELECT id, user_id, title, file_name, file_type, file_size, content, summary, processed, upload_date
                 FROM documents WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    /// 按上传时间倒序列出用户的全部文档
    pub fn list_documents(&self, user_id: &str) -> std::result::Result<Vec<Document>, AppError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, file_name, file_type, file_size, content, summary, processed, upload_date
             FROM documents WHERE user_id = ?1 ORDER BY upload_date DESC",
        )?;
        let documents = stmt
            .query_map(params![user_id], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    /// AI 管线对文档的唯一一次修改：processed 置位，摘要存在时写入。
    /// 生成失败路径传 None，只标记 processed。
    pub fn apply_generation_result(
        &self,
        id: &str,
        user_id: &str,
        summary: Option<&str>,
    ) -> std::result::Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let affected = match summary {
            Some(blob) => conn.execute(
                "UPDATE documents SET summary = ?1, processed = 1 WHERE id = ?2 AND user_id = ?3",
                params![blob, id, user_id],
            )?,
            None => conn.execute(
                "UPDATE documents SET processed = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?,
        };
        if affected == 0 {
            return Err(AppError::not_found(format!("文档不存在: {}", id)));
        }
        Ok(())
    }

    // ===== 测验 =====

    /// (document_id, user_id) 键上的 upsert：替换题目集，保留 id/created_at
    pub fn upsert_quiz(&self, quiz: &Quiz) -> std::result::Result<(), AppError> {
        let questions_json = serde_json::to_string(&quiz.questions)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO quizzes (id, document_id, user_id, questions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(document_id, user_id) DO UPDATE SET
                 questions = excluded.questions,
                 updated_at = excluded.updated_at",
            params![
                quiz.id,
                quiz.document_id,
                quiz.user_id,
                questions_json,
                quiz.created_at,
                quiz.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_quiz(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> std::result::Result<Option<Quiz>, AppError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, document_id, user_id, questions, created_at, updated_at
                 FROM quizzes WHERE document_id = ?1 AND user_id = ?2",
                params![document_id, user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, DateTime<Utc>>(4)?,
                        row.get::<_, DateTime<Utc>>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, document_id, user_id, questions_json, created_at, updated_at)) => {
                let questions: Vec<Question> = serde_json::from_str(&questions_json)?;
                Ok(Some(Quiz {
                    id,
                    document_id,
                    user_id,
                    questions,
                    created_at,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        file_name: row.get(3)?,
        file_type: row.get(4)?,
        file_size: row.get(5)?,
        content: row.get(6)?,
        summary: row.get(7)?,
        processed: row.get::<_, i64>(8)? != 0,
        upload_date: row.get(9)?,
    })
}
