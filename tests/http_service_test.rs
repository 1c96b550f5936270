//! HTTP診断サービスのテスト（wiremockでバックエンドを模擬）
//!
//! - アップロード/ポーリングのリクエスト形式
//! - 一時的な失敗のリトライ
//! - 失敗・タイムアウトの分類

use pathfinder_common::{ResultView, DEFAULT_REVIEW_THRESHOLD};
use pathfinder_diagnose::error::DiagnoseError;
use pathfinder_diagnose::service::{
    DiagnosisService, HttpDiagnosisService, HttpServiceOptions, RetryConfig, ServiceError,
    SessionRequest,
};
use pathfinder_diagnose::workflow::{Phase, WorkflowDriver};
use pathfinder_diagnose::ImageAsset;
use pathfinder_common::{ConfidenceLevel, JobHandle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const UPLOAD_PATH: &str = "/api/mobile/upload-micronet/";

#[derive(Clone)]
struct SequenceResponder {
    templates: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<ResponseTemplate>>>,
}

impl SequenceResponder {
    fn new(templates: Vec<ResponseTemplate>) -> Self {
        Self {
            templates: std::sync::Arc::new(std::sync::Mutex::new(templates.into_iter().collect())),
        }
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _req: &Request) -> ResponseTemplate {
        let mut templates = self.templates.lock().expect("mutex should not be poisoned");
        templates.pop_front().unwrap_or_else(|| {
            ResponseTemplate::new(500).set_body_json(json!({ "error": "No more mock responses configured" }))
        })
    }
}

fn options_for_server(server: &MockServer) -> HttpServiceOptions {
    HttpServiceOptions {
        api_url: format!("{}/api", server.uri()),
        session_id: "session-1".into(),
        task_type: "classification".into(),
        max_upload_bytes: 10 * 1024 * 1024,
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 5,
        },
    }
}

fn service_for_server(server: &MockServer) -> HttpDiagnosisService {
    HttpDiagnosisService::new(options_for_server(server)).expect("service creation should succeed")
}

fn png() -> ImageAsset {
    ImageAsset::new("slide.png", "image/png", vec![0x89, b'P', b'N', b'G'])
}

fn completed(confidence: f64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "completed",
        "result": {
            "prediction": "Positive for Tuberculosis",
            "confidence": confidence,
            "findings": ["Cell morphology indicates potential presence of mycobacterium tuberculosis."]
        }
    }))
}

fn processing() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": "processing", "message": "Analysis in progress" }))
}

async fn mount_upload(server: &MockServer, image_id: &str) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "image_id": image_id,
            "task_type": "classification"
        })))
        .mount(server)
        .await;
}

/// アップロードのフォームにセッションID・タスク種別・画像が含まれる
#[tokio::test]
async fn test_submit_sends_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("name=\"session_id\""))
        .and(body_string_contains("session-1"))
        .and(body_string_contains("name=\"task_type\""))
        .and(body_string_contains("name=\"image\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true, "image_id": "img-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let job = service_for_server(&server).submit(png()).await.unwrap();
    assert_eq!(job.as_str(), "img-42");
}

/// processing → completed で結果を返す
#[tokio::test]
async fn test_resolve_polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(SequenceResponder::new(vec![processing(), processing(), completed(0.88)]))
        .expect(3)
        .mount(&server)
        .await;

    let payload = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap();
    assert_eq!(payload.diagnosis_label(), "Positive for Tuberculosis");
    assert_eq!(payload.confidence(), 0.88);
    assert_eq!(payload.findings().len(), 1);
}

/// 503はリトライしてから成功
#[tokio::test]
async fn test_resolve_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(SequenceResponder::new(vec![
            ResponseTemplate::new(503),
            completed(0.91),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let payload = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap();
    assert_eq!(payload.confidence(), 0.91);
}

/// リトライ回数を使い切ったら AnalysisFailed
#[tokio::test]
async fn test_resolve_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AnalysisFailed(_)));
}

/// 404はリトライしない
#[tokio::test]
async fn test_resolve_does_not_retry_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Image not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = service_for_server(&server)
        .resolve(JobHandle::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AnalysisFailed(_)));
}

/// status: failed は AnalysisFailed（メッセージを引き継ぐ）
#[tokio::test]
async fn test_resolve_failed_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "message": "Analysis failed"
        })))
        .mount(&server)
        .await;

    let err = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::AnalysisFailed("Analysis failed".into()));
}

/// 範囲外の信頼度は結果として受け付けない
#[tokio::test]
async fn test_resolve_rejects_out_of_range_confidence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(completed(95.7))
        .mount(&server)
        .await;

    let err = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AnalysisFailed(_)));
}

/// 解析が終わらなければ Timeout
#[tokio::test]
async fn test_resolve_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(processing())
        .mount(&server)
        .await;

    let service = HttpDiagnosisService::new(HttpServiceOptions {
        timeout: Duration::from_millis(200),
        ..options_for_server(&server)
    })
    .unwrap();

    let err = service.resolve(JobHandle::new("img-1")).await.unwrap_err();
    match err {
        ServiceError::Timeout { waited } => assert!(waited >= Duration::from_millis(200)),
        other => panic!("expected timeout, got {:?}", other),
    }
}

/// アップロードの4xxは SubmissionFailed
#[tokio::test]
async fn test_submit_rejected_by_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "No image file provided" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = service_for_server(&server).submit(png()).await.unwrap_err();
    match err {
        ServiceError::SubmissionFailed(message) => assert!(message.contains("400")),
        other => panic!("expected submission failure, got {:?}", other),
    }
}

/// image_id のない応答は SubmissionFailed
#[tokio::test]
async fn test_submit_without_image_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let err = service_for_server(&server).submit(png()).await.unwrap_err();
    assert!(matches!(err, ServiceError::SubmissionFailed(_)));
}

/// サイズ超過・非画像は送信前に拒否（リクエストは飛ばない）
#[tokio::test]
async fn test_submit_prechecks_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "image_id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let service = HttpDiagnosisService::new(HttpServiceOptions {
        max_upload_bytes: 4,
        ..options_for_server(&server)
    })
    .unwrap();

    let oversized = ImageAsset::new("big.png", "image/png", vec![0u8; 5]);
    assert!(matches!(
        service.submit(oversized).await,
        Err(ServiceError::SubmissionFailed(_))
    ));

    let pdf = ImageAsset::new("report.pdf", "application/pdf", vec![1]);
    assert!(matches!(
        service.submit(pdf).await,
        Err(ServiceError::SubmissionFailed(_))
    ));
}

/// session_id 未設定は設定エラー
#[tokio::test]
async fn test_empty_session_is_config_error() {
    let server = MockServer::start().await;
    let result = HttpDiagnosisService::new(HttpServiceOptions {
        session_id: "  ".into(),
        ..options_for_server(&server)
    });
    assert!(matches!(result, Err(DiagnoseError::Config(_))));
}

/// HTTPバックエンドでワークフローを通しで実行
#[tokio::test]
async fn test_workflow_over_http() {
    let server = MockServer::start().await;
    mount_upload(&server, "img-7").await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-7/"))
        .respond_with(SequenceResponder::new(vec![processing(), completed(0.62)]))
        .mount(&server)
        .await;

    let mut driver = WorkflowDriver::new(Arc::new(service_for_server(&server)));
    driver.select_file(png()).unwrap();
    let handoff = driver.run_attempt().await.unwrap();
    assert_eq!(driver.phase(), Phase::Succeeded);

    let ResultView::Report(report) = ResultView::derive(Some(&handoff), DEFAULT_REVIEW_THRESHOLD)
    else {
        panic!("expected report");
    };
    assert_eq!(report.confidence_percentage, "62.00");
    assert!(report.requires_review);
}

fn session_request(patient_id: &str) -> SessionRequest {
    SessionRequest {
        patient_id: patient_id.into(),
        disease_type: "tuberculosis".into(),
    }
}

/// セッション作成でIDを取得し、そのまま送信に使える
#[tokio::test]
async fn test_create_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mobile/create-session/"))
        .and(body_json(json!({ "patient_id": "P-001", "disease_type": "tuberculosis" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "session_id": "17",
            "patient_id": "P-001",
            "disease_type": "tuberculosis",
            "status": "active"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api_url = format!("{}/api", server.uri());
    let session_id = HttpDiagnosisService::create_session(&api_url, &session_request("P-001"))
        .await
        .unwrap();
    assert_eq!(session_id, "17");

    let service = HttpDiagnosisService::new(HttpServiceOptions {
        session_id,
        ..options_for_server(&server)
    });
    assert!(service.is_ok());
}

/// バックエンドが拒否したらセッションエラー
#[tokio::test]
async fn test_create_session_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mobile/create-session/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "patient_id is required" })))
        .expect(1)
        .mount(&server)
        .await;

    let api_url = format!("{}/api", server.uri());
    let err = HttpDiagnosisService::create_session(&api_url, &session_request("P-001"))
        .await
        .unwrap_err();
    match err {
        DiagnoseError::Session(message) => assert!(message.contains("400")),
        other => panic!("expected session error, got {:?}", other),
    }
}

/// 患者IDが空ならリクエストを送らない
#[tokio::test]
async fn test_create_session_requires_patient_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mobile/create-session/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "session_id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let api_url = format!("{}/api", server.uri());
    let result = HttpDiagnosisService::create_session(&api_url, &session_request("  ")).await;
    assert!(matches!(result, Err(DiagnoseError::Session(_))));
}

/// バックエンドが返した信頼度区分を使う
#[tokio::test]
async fn test_resolve_uses_reported_confidence_level() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/mobile/result-micronet/img-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "result": {
                "prediction": "Positive for Tuberculosis",
                "confidence": 0.88,
                "confidence_level": "high"
            }
        })))
        .mount(&server)
        .await;

    let payload = service_for_server(&server)
        .resolve(JobHandle::new("img-1"))
        .await
        .unwrap();
    assert_eq!(payload.confidence_level(), ConfidenceLevel::High);
}
