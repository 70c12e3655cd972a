//! 文档编排服务
//!
//! 上传（顺序批处理）与 AI 生成管线（内容门 → 生成 → 编码 → 落库）。
//! 同一文档同一时刻至多一个在途生成请求；生成失败仍将文档标记为
//! 已处理，避免 UI 卡死在"处理中"状态。

use crate::content_extractor::{validate_content, ContentExtractor};
use crate::database::Database;
use crate::generation_service::GenerationService;
use crate::models::{AppError, Document, Quiz, SummarySections, UploadFile, UploadOutcome};
use crate::summary_codec;
use crate::upload_policy;
use chrono::Utc;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct DocumentService {
    database: Arc<Database>,
    extractor: ContentExtractor,
    generator: Arc<GenerationService>,
    /// 在途生成请求（键为 document_id）
    inflight: DashMap<String, ()>,
}

impl DocumentService {
    pub fn new(database: Arc<Database>, generator: Arc<GenerationService>) -> Self {
        Self {
            database,
            extractor: ContentExtractor::new(),
            generator,
            inflight: DashMap::new(),
        }
    }

    /// 批量上传：逐个文件顺序处理，无并行。
    ///
    /// 提取失败只影响当前文件；持久化失败中止剩余批次，已保存的文件
    /// 保持已保存（无整批回滚）。结果逐项上报。
    pub fn upload_documents(
        &self,
        user_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<Vec<UploadOutcome>, AppError> {
        upload_policy::validate_batch(&files)?;

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let content = match self
                .extractor
                .extract(&file.file_name, &file.mime_type, &file.data)
            {
                Ok(content) => content,
                Err(e) => {
                    warn!("文件提取失败: {}", e);
                    outcomes.push(UploadOutcome {
                        file_name: file.file_name,
                        document: None,
                        error: Some(AppError::extraction(e.to_string())),
                    });
                    continue;
                }
            };

            let document = Document {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                title: title_from_file_name(&file.file_name),
                file_name: file.file_name.clone(),
                file_type: file.mime_type.clone(),
                file_size: file.data.len() as i64,
                content,
                summary: None,
                processed: false,
                upload_date: Utc::now(),
            };

            if let Err(e) = self.database.insert_document(&document) {
                error!("保存文档失败，批次中止: {}", e);
                outcomes.push(UploadOutcome {
                    file_name: file.file_name,
                    document: None,
                    error: Some(e),
                });
                return Ok(outcomes);
            }

            info!("文档已保存: {} ({})", document.title, document.id);
            outcomes.push(UploadOutcome {
                file_name: file.file_name,
                document: Some(document),
                error: None,
            });
        }
        Ok(outcomes)
    }

    /// 生成管线：内容门 → 外部生成 → 摘要编码 → 文档更新 + 测验 upsert。
    ///
    /// 任何失败路径都会把文档标记为已处理（处理视为"已尝试"而非
    /// "已成功"），摘要保持缺失并由展示层解码为占位文本。
    pub async fn process_document(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Document, AppError> {
        let document = self
            .database
            .get_document(document_id, user_id)?
            .ok_or_else(|| AppError::not_found(format!("文档不存在: {}", document_id)))?;

        let _guard = InflightGuard::acquire(&self.inflight, document_id)?;

        if !validate_content(&document.content) {
            self.database
                .apply_generation_result(document_id, user_id, None)?;
            return Err(AppError::validation(
                "提取内容过短或缺乏有效词汇，无法生成学习材料",
            ));
        }

        match self
            .generator
            .generate(&document.content, &document.title, document.file_size)
            .await
        {
            Ok(aids) => {
                let blob = summary_codec::encode(&aids.summary);
                self.database
                    .apply_generation_result(document_id, user_id, Some(&blob))?;

                if !aids.questions.is_empty() {
                    let now = Utc::now();
                    let quiz = Quiz {
                        id: Uuid::new_v4().to_string(),
                        document_id: document_id.to_string(),
                        user_id: user_id.to_string(),
                        questions: aids.questions,
                        created_at: now,
                        updated_at: now,
                    };
                    self.database.upsert_quiz(&quiz)?;
                }

                self.database
                    .get_document(document_id, user_id)?
                    .ok_or_else(|| AppError::not_found(format!("文档不存在: {}", document_id)))
            }
            Err(e) => {
                warn!("生成失败，文档仍标记为已处理: {}", e);
                if let Err(persist_err) =
                    self.database
                        .apply_generation_result(document_id, user_id, None)
                {
                    error!("标记文档处理状态失败: {}", persist_err);
                }
                Err(e)
            }
        }
    }

    pub fn get_document(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Option<Document>, AppError> {
        self.database.get_document(document_id, user_id)
    }

    pub fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, AppError> {
        self.database.list_documents(user_id)
    }

    pub fn get_quiz(&self, document_id: &str, user_id: &str) -> Result<Option<Quiz>, AppError> {
        self.database.get_quiz(document_id, user_id)
    }

    /// 文档摘要的展示视图（解码是全函数，缺失时得到占位文本）
    pub fn summary_sections(document: &Document) -> SummarySections {
        summary_codec::decode(document.summary.as_deref())
    }
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// 同一文档的在途生成护栏；作用域结束自动释放，失败路径不会泄漏
struct InflightGuard<'a> {
    inflight: &'a DashMap<String, ()>,
    key: String,
}

impl<'a> InflightGuard<'a> {
    fn acquire(inflight: &'a DashMap<String, ()>, document_id: &str) -> Result<Self, AppError> {
        use dashmap::mapref::entry::Entry;
        match inflight.entry(document_id.to_string()) {
            Entry::Occupied(_) => Err(AppError::validation("该文档已有生成任务在进行中")),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self {
                    inflight,
                    key: document_id.to_string(),
                })
            }
        }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}
