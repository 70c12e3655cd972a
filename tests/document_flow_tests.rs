//! 上传 → 生成管线的端到端测试（HTTP Mock + 临时数据库）

use doc_mentor::config::LlmConfig;
use doc_mentor::database::Database;
use doc_mentor::document_service::DocumentService;
use doc_mentor::generation_service::GenerationService;
use doc_mentor::llm_client::LlmClient;
use doc_mentor::models::{AppErrorType, UploadFile};
use mockito::Server;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const LONG_CONTENT: &str = "Cellular respiration releases energy from glucose through \
                            glycolysis, the citric acid cycle, and oxidative phosphorylation \
                            inside the mitochondria of eukaryotic cells.";

fn build_service(server: &Server, temp_dir: &TempDir) -> DocumentService {
    let database = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
    let config = LlmConfig {
        base_url: server.url(),
        api_key: "test-key".to_string(),
        ..LlmConfig::default()
    };
    let generator = Arc::new(GenerationService::new(Arc::new(LlmClient::new(
        config,
        Duration::from_secs(5),
    ))));
    DocumentService::new(database, generator)
}

fn upload_file(name: &str, mime: &str, data: &[u8]) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        mime_type: mime.to_string(),
        data: data.to_vec(),
    }
}

fn study_aids_body() -> String {
    let payload = json!({
        "summary": {
            "long_summary": "细胞呼吸在线粒体中分三个阶段释放葡萄糖的能量。",
            "short_summary": "细胞呼吸概述。",
            "key_points": ["糖酵解在细胞质进行", "三羧酸循环产生电子载体"],
            "main_topics": ["细胞生物学", "能量代谢"],
            "document_type": "Academic",
            "difficulty": "Intermediate"
        },
        "quiz": [
            {"id": 1, "type": "mcq", "question": "细胞呼吸主要发生在哪里？",
             "options": ["线粒体", "叶绿体", "核糖体"],
             "correct_answer": "线粒体", "explanation": ""},
            {"id": 2, "type": "fill", "question": "糖酵解的底物是 ___",
             "correct_answer": "葡萄糖", "explanation": ""},
            {"id": 3, "type": "short", "question": "写出细胞呼吸的三个阶段",
             "correct_answer": "糖酵解、三羧酸循环、氧化磷酸化", "explanation": ""}
        ]
    });
    json!({
        "choices": [{"message": {"role": "assistant", "content": payload.to_string()}}]
    })
    .to_string()
}

#[tokio::test]
async fn test_upload_batch_reports_per_file_outcomes() {
    let server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);

    let files = vec![
        upload_file("notes.txt", "text/plain", LONG_CONTENT.as_bytes()),
        // 非法 UTF-8：提取失败，但不阻塞批次里的其他文件
        upload_file("corrupt.txt", "text/plain", &[0xff, 0xfe, 0xfd]),
        upload_file("paper.pdf", "application/pdf", &[0x25, 0x50, 0x44, 0x46]),
    ];

    let outcomes = service.upload_documents("alice", files).unwrap();
    assert_eq!(outcomes.len(), 3);

    let saved = outcomes[0].document.as_ref().expect("文本文件应保存成功");
    assert_eq!(saved.content, LONG_CONTENT);
    assert!(!saved.processed);

    assert!(outcomes[1].document.is_none());
    let err = outcomes[1].error.as_ref().unwrap();
    assert_eq!(err.error_type, AppErrorType::Extraction);
    assert!(err.message.contains("corrupt.txt"));

    // PDF 走合成描述降级路径，不报错
    let pdf_doc = outcomes[2].document.as_ref().unwrap();
    assert!(pdf_doc.content.contains("paper.pdf"));
    assert!(pdf_doc.content.contains("application/pdf"));

    assert_eq!(service.list_documents("alice").unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension_without_side_effects() {
    let server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);

    let files = vec![
        upload_file("ok.txt", "text/plain", LONG_CONTENT.as_bytes()),
        upload_file("malware.exe", "application/octet-stream", &[0u8; 8]),
    ];
    let err = service.upload_documents("alice", files).unwrap_err();
    assert_eq!(err.error_type, AppErrorType::Validation);
    // 边界校验失败：整批拒绝，无副作用
    assert!(service.list_documents("alice").unwrap().is_empty());
}

#[tokio::test]
async fn test_process_document_success_pipeline() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(study_aids_body())
        .create_async()
        .await;

    let outcomes = service
        .upload_documents(
            "alice",
            vec![upload_file("bio.txt", "text/plain", LONG_CONTENT.as_bytes())],
        )
        .unwrap();
    let document_id = outcomes[0].document.as_ref().unwrap().id.clone();

    let processed = service.process_document(&document_id, "alice").await.unwrap();
    assert!(processed.processed);
    assert!(processed.summary.is_some());

    // 摘要 blob 解码回展示视图
    let sections = DocumentService::summary_sections(&processed);
    assert_eq!(sections.detailed, "细胞呼吸在线粒体中分三个阶段释放葡萄糖的能量。");
    assert_eq!(sections.main_topics, "细胞生物学, 能量代谢");
    assert_eq!(sections.document_type, "Academic");

    // 测验落库，题目顺序保持
    let quiz = service.get_quiz(&document_id, "alice").unwrap().unwrap();
    let ids: Vec<i64> = quiz.questions.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(quiz.questions[0].kind.tag(), "mcq");
    assert_eq!(quiz.questions[2].kind.tag(), "short");
}

#[tokio::test]
async fn test_generation_failure_still_marks_processed() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let outcomes = service
        .upload_documents(
            "alice",
            vec![upload_file("bio.txt", "text/plain", LONG_CONTENT.as_bytes())],
        )
        .unwrap();
    let document_id = outcomes[0].document.as_ref().unwrap().id.clone();

    let err = service.process_document(&document_id, "alice").await.unwrap_err();
    assert_eq!(err.error_type, AppErrorType::Generation);

    // 文档仍被标记为已处理，摘要缺失，展示层得到占位文本
    let document = service.get_document(&document_id, "alice").unwrap().unwrap();
    assert!(document.processed);
    assert!(document.summary.is_none());
    let sections = DocumentService::summary_sections(&document);
    assert_eq!(sections.detailed, "Detailed summary not available");
    assert_eq!(sections.document_type, "Unknown");
}

#[tokio::test]
async fn test_content_gate_blocks_external_call() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let outcomes = service
        .upload_documents(
            "alice",
            vec![upload_file("tiny.txt", "text/plain", b"tiny text")],
        )
        .unwrap();
    let document_id = outcomes[0].document.as_ref().unwrap().id.clone();

    let err = service.process_document(&document_id, "alice").await.unwrap_err();
    assert_eq!(err.error_type, AppErrorType::Validation);

    // 门槛失败同样视为"已尝试处理"
    let document = service.get_document(&document_id, "alice").unwrap().unwrap();
    assert!(document.processed);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_regeneration_upserts_quiz_identity() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(study_aids_body())
        .create_async()
        .await;

    let outcomes = service
        .upload_documents(
            "alice",
            vec![upload_file("bio.txt", "text/plain", LONG_CONTENT.as_bytes())],
        )
        .unwrap();
    let document_id = outcomes[0].document.as_ref().unwrap().id.clone();

    service.process_document(&document_id, "alice").await.unwrap();
    let first = service.get_quiz(&document_id, "alice").unwrap().unwrap();

    service.process_document(&document_id, "alice").await.unwrap();
    let second = service.get_quiz(&document_id, "alice").unwrap().unwrap();

    // (document, user) 上 upsert：行身份不变
    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at.timestamp(), second.created_at.timestamp());
}

#[tokio::test]
async fn test_process_missing_document_not_found() {
    let server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let service = build_service(&server, &temp_dir);

    let err = service.process_document("ghost", "alice").await.unwrap_err();
    assert_eq!(err.error_type, AppErrorType::NotFound);
}
