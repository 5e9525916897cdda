//! Exercises the reqwest client against an in-process axum server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use codepad_core::job::JobRequest;
use codepad_core::language::Flavor;
use codepad_events::ObserverSet;
use codepad_judge::api::{
    Endpoints, ExecutionApi, JudgeApi, JudgeApiError, SubmissionBody, REGION_HEADER,
};
use codepad_judge::poller::{PollConfig, PollError, WaitPolicy};
use codepad_judge::runner::{RunError, Runner};
use codepad_judge::session::SessionContext;
use codepad_judge::submit::SubmitError;
use serde_json::{json, Value};

/// What the fake service saw.
#[derive(Default)]
struct Seen {
    submit_queries: Mutex<Vec<HashMap<String, String>>>,
    submit_bodies: Mutex<Vec<Value>>,
    poll_queries: Mutex<Vec<HashMap<String, String>>>,
    poll_regions: Mutex<Vec<Option<String>>>,
    polls: AtomicU32,
}

type Shared = Arc<Seen>;

async fn create_submission(
    State(seen): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    seen.submit_queries.lock().unwrap().push(query);
    seen.submit_bodies.lock().unwrap().push(body);
    (
        StatusCode::CREATED,
        [(REGION_HEADER, "eu")],
        Json(json!({ "token": "abc" })),
    )
}

async fn get_submission(
    State(seen): State<Shared>,
    Path(token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    assert_eq!(token, "abc");
    seen.poll_queries.lock().unwrap().push(query);
    seen.poll_regions.lock().unwrap().push(
        headers
            .get(REGION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    let n = seen.polls.fetch_add(1, Ordering::SeqCst);
    if n == 0 {
        Json(json!({
            "status": { "id": 1, "description": "In Queue" },
            "stdout": null,
            "compile_output": null,
            "time": null,
            "memory": null,
        }))
    } else {
        Json(json!({
            "status": { "id": 3, "description": "Accepted" },
            "stdout": "MQo=\n",
            "compile_output": null,
            "time": "0.012",
            "memory": 3264,
        }))
    }
}

async fn list_languages() -> Json<Value> {
    Json(json!([
        { "id": 71, "name": "Python (3.8.1)" },
        { "id": 89, "name": "Multi-file program" },
    ]))
}

async fn list_extra_languages() -> Json<Value> {
    Json(json!([
        { "id": 10, "name": "Python (3.8.1)" },
        { "id": 25, "name": "Python for ML (3.7.7)" },
    ]))
}

async fn get_language(Path(id): Path<u32>) -> impl IntoResponse {
    if id == 71 {
        Ok(Json(json!({
            "id": 71,
            "name": "Python (3.8.1)",
            "source_file": "script.py",
        })))
    } else {
        Err((StatusCode::NOT_FOUND, "language not found"))
    }
}

async fn bundled_files() -> &'static str {
    "UEsDBBQAAAAIAA==\n"
}

fn judge_router(seen: Shared) -> Router {
    Router::new()
        .route("/submissions", post(create_submission))
        .route("/submissions/{token}", get(get_submission))
        .route("/languages", get(list_languages))
        .route("/languages/{id}", get(get_language))
        .route("/extra/languages", get(list_extra_languages))
        .route("/data/additional_files_zip_base64.txt", get(bundled_files))
        .with_state(seen)
}

fn failing_router() -> Router {
    Router::new()
        .route(
            "/submissions",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    r#"{"language_id":["language with id 9999 doesn't exist"]}"#,
                )
            }),
        )
        .route(
            "/submissions/{token}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable") }),
        )
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> JudgeApi {
    let base = format!("http://{addr}");
    JudgeApi::new(
        Endpoints {
            ce_url: base.clone(),
            extra_ce_url: format!("{base}/extra"),
            bundled_files_url: format!("{base}/data/additional_files_zip_base64.txt"),
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

fn body(source_code: &str) -> SubmissionBody {
    SubmissionBody {
        source_code: source_code.into(),
        language_id: 71,
        stdin: String::new(),
        compiler_options: String::new(),
        command_line_arguments: String::new(),
        redirect_stderr_to_stdout: true,
        additional_files: None,
    }
}

#[tokio::test]
async fn submission_returns_token_and_region() {
    let seen = Shared::default();
    let api = client(serve(judge_router(seen.clone())).await);

    let receipt = api
        .create_submission(Flavor::Ce, &body("cHJpbnQoMSk="))
        .await
        .unwrap();

    assert_eq!(receipt.token, "abc");
    assert_eq!(receipt.region.as_deref(), Some("eu"));

    let query = &seen.submit_queries.lock().unwrap()[0];
    assert_eq!(query.get("base64_encoded").map(String::as_str), Some("true"));
    assert_eq!(query.get("wait").map(String::as_str), Some("false"));

    let sent = &seen.submit_bodies.lock().unwrap()[0];
    assert_eq!(sent["source_code"], "cHJpbnQoMSk=");
    assert_eq!(sent["language_id"], 71);
    assert!(sent.get("additional_files").is_none());
}

#[tokio::test]
async fn status_request_echoes_the_region() {
    let seen = Shared::default();
    let api = client(serve(judge_router(seen.clone())).await);

    api.get_submission(Flavor::Ce, "abc", Some("eu"))
        .await
        .unwrap();
    let details = api.get_submission(Flavor::Ce, "abc", None).await.unwrap();

    assert_eq!(details.status.id, 3);
    assert_eq!(details.time.as_deref(), Some("0.012"));
    assert_eq!(details.into_result().stdout, "1\n");

    assert_eq!(
        *seen.poll_regions.lock().unwrap(),
        vec![Some("eu".to_string()), None]
    );
    assert!(seen
        .poll_queries
        .lock()
        .unwrap()
        .iter()
        .all(|q| q.get("base64_encoded").map(String::as_str) == Some("true")));
}

#[tokio::test]
async fn languages_are_listed_per_flavor() {
    let api = client(serve(judge_router(Shared::default())).await);

    let ce = api.list_languages(Flavor::Ce).await.unwrap();
    let extra = api.list_languages(Flavor::ExtraCe).await.unwrap();
    assert_eq!(ce.len(), 2);
    assert_eq!(extra[1].name, "Python for ML (3.7.7)");

    let python = api.get_language(Flavor::Ce, 71).await.unwrap();
    assert_eq!(python.source_file.as_deref(), Some("script.py"));

    let missing = api.get_language(Flavor::Ce, 5).await.unwrap_err();
    assert_matches!(missing, JudgeApiError::ApiError { status: 404, .. });
}

#[tokio::test]
async fn bundled_files_are_trimmed() {
    let api = client(serve(judge_router(Shared::default())).await);
    assert_eq!(api.fetch_bundled_files().await.unwrap(), "UEsDBBQAAAAIAA==");
}

#[tokio::test]
async fn error_bodies_are_kept_verbatim() {
    let api = client(serve(failing_router()).await);

    let err = api
        .create_submission(Flavor::Ce, &body("eA=="))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        JudgeApiError::ApiError { status: 422, ref body } if body.contains("9999")
    );

    let err = api.get_submission(Flavor::Ce, "abc", None).await.unwrap_err();
    assert_matches!(
        err,
        JudgeApiError::ApiError { status: 500, ref body } if body == "database unavailable"
    );
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Bind and drop to get a port nothing listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let api = client(addr);

    let err = api.list_languages(Flavor::Ce).await.unwrap_err();
    assert_matches!(err, JudgeApiError::Request(_));
}

fn runner(addr: SocketAddr) -> Runner {
    Runner::new(
        Arc::new(client(addr)),
        Arc::new(SessionContext::new()),
        Arc::new(ObserverSet::new()),
        PollConfig {
            initial_delay: Duration::ZERO,
            wait: WaitPolicy::Fixed(Duration::from_millis(1)),
            max_attempts: 5,
        },
    )
}

#[tokio::test]
async fn runs_end_to_end_over_http() {
    let seen = Shared::default();
    let runner = runner(serve(judge_router(seen.clone())).await);

    let report = runner
        .run(&JobRequest::new(Flavor::Ce, 71, "print(1)"))
        .await
        .unwrap();

    assert_eq!(report.output, "1");
    assert!(report.status_line.starts_with("Accepted, 0.012s, 3264KB"));
    assert_eq!(seen.polls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *seen.poll_regions.lock().unwrap(),
        vec![Some("eu".to_string()), Some("eu".to_string())]
    );
    assert_eq!(seen.submit_bodies.lock().unwrap()[0]["source_code"], "cHJpbnQoMSk=");
}

#[tokio::test]
async fn end_to_end_failures_map_to_run_errors() {
    let runner = runner(serve(failing_router()).await);

    let failure = runner
        .run(&JobRequest::new(Flavor::Ce, 9999, "x"))
        .await
        .unwrap_err();

    assert_matches!(
        failure.error,
        RunError::Submit(SubmitError::Api { status: 422, .. })
    );
    let report = failure.report.unwrap();
    assert!(report.title.ends_with("(422)"));
    assert!(report.details.contains("doesn't exist"));
}

#[tokio::test]
async fn poll_failure_over_http_is_not_retried() {
    let seen = Shared::default();
    let router = Router::new()
        .route("/submissions", post(create_submission))
        .route(
            "/submissions/{token}",
            get(|State(seen): State<Shared>| async move {
                seen.polls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::SERVICE_UNAVAILABLE, "try later")
            }),
        )
        .with_state(seen.clone());
    let runner = runner(serve(router).await);

    let failure = runner
        .run(&JobRequest::new(Flavor::Ce, 71, "print(1)"))
        .await
        .unwrap_err();

    assert_matches!(
        failure.error,
        RunError::Poll(PollError::Api { status: 503, .. })
    );
    assert_eq!(seen.polls.load(Ordering::SeqCst), 1);
}
