//! 上传边界校验：扩展名白名单与大小/数量上限

use crate::models::{AppError, UploadFile};
use std::path::Path;

/// 单文件大小上限 (50MB)
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// 单批次文件数上限
const MAX_FILES_PER_BATCH: usize = 10;

/// 单批次总大小上限 (200MB)
const MAX_BATCH_TOTAL_SIZE: usize = 200 * 1024 * 1024;

/// 允许上传的扩展名白名单
const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "txt", "html", "css", "js", "json", "xml", "csv", "xls",
    "xlsx", "rtf", "odt", "epub",
];

/// 校验单个文件；违规只报错，无副作用
pub fn validate_file(file: &UploadFile) -> Result<(), AppError> {
    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::validation(format!(
            "不支持的文件类型: {}",
            file.file_name
        )));
    }

    if file.data.len() > MAX_FILE_SIZE {
        return Err(AppError::validation(format!(
            "文件 '{}' 大小 {}MB 超过限制 {}MB",
            file.file_name,
            file.data.len() / (1024 * 1024),
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }

    Ok(())
}

/// 校验整个批次（数量、总大小、逐文件）
pub fn validate_batch(files: &[UploadFile]) -> Result<(), AppError> {
    if files.is_empty() {
        return Err(AppError::validation("没有要上传的文件"));
    }
    if files.len() > MAX_FILES_PER_BATCH {
        return Err(AppError::validation(format!(
            "单次最多上传 {} 个文件",
            MAX_FILES_PER_BATCH
        )));
    }

    let total: usize = files.iter().map(|f| f.data.len()).sum();
    if total > MAX_BATCH_TOTAL_SIZE {
        return Err(AppError::validation(format!(
            "批次总大小超过限制 {}MB",
            MAX_BATCH_TOTAL_SIZE / (1024 * 1024)
        )));
    }

    for file in files {
        validate_file(file)?;
    }
    Ok(())
}
