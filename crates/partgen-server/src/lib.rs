use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use partgen_core::validate::validate;
use partgen_core::{DimensionRecord, InvalidDimensionError, Violation};
use partgen_infer::{DimensionInferrer, ImageError, ViewSet, VisionModel};
use partgen_pipeline::{Artifacts, Pipeline};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub type SharedInferrer = DimensionInferrer<Box<dyn VisionModel + Send>>;

/// Shared by every request. Runs hold the inferrer lock for their whole
/// duration since they write to the same output directory.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: Pipeline,
    inferrer: Mutex<SharedInferrer>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, model: Box<dyn VisionModel + Send>) -> Self {
        let inferrer = DimensionInferrer::new(model, pipeline.config().inference());
        Self {
            inner: Arc::new(Inner {
                pipeline,
                inferrer: Mutex::new(inferrer),
            }),
        }
    }
}

impl Inner {
    fn lock(&self) -> anyhow::Result<MutexGuard<'_, SharedInferrer>> {
        self.inferrer
            .lock()
            .map_err(|_| anyhow!("an earlier run panicked"))
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/validate", post(validate_record))
        .route("/build", post(build))
        .route("/generate-3d-model", post(generate))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    side1_path: PathBuf,
    side2_path: PathBuf,
    side3_path: PathBuf,
    side4_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ValidateResponse {
    valid: bool,
    violations: Vec<Violation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactsResponse {
    record: DimensionRecord,
    scad_path: PathBuf,
    dimensions_path: PathBuf,
    mesh_path: Option<PathBuf>,
    attempts: Option<usize>,
}

impl From<Artifacts> for ArtifactsResponse {
    fn from(artifacts: Artifacts) -> Self {
        Self {
            record: artifacts.record,
            scad_path: artifacts.scad_path,
            dimensions_path: artifacts.dimensions_path,
            mesh_path: artifacts.mesh_path,
            attempts: artifacts.attempts,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Caller mistakes map to 4xx, everything else to 500.
    fn from_run(err: anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if err.downcast_ref::<InvalidDimensionError>().is_some() {
            return Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message,
            };
        }
        if err.downcast_ref::<ImageError>().is_some() {
            return Self::bad_request(message);
        }
        warn!(error = %message, "run failed");
        Self::internal(message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn validate_record(body: Bytes) -> Result<Json<ValidateResponse>, ApiError> {
    let record: DimensionRecord = parse_json(&body)?;
    let violations = validate(&record);
    Ok(Json(ValidateResponse {
        valid: violations.is_empty(),
        violations,
    }))
}

async fn build(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ArtifactsResponse>, ApiError> {
    let record: DimensionRecord = parse_json(&body)?;
    let artifacts = run_blocking(state, move |inner| {
        let _guard = inner.lock()?;
        inner.pipeline.run_record(&record)
    })
    .await?;
    Ok(Json(artifacts.into()))
}

async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ArtifactsResponse>, ApiError> {
    let request: GenerateRequest = parse_json(&body)?;
    let mut views = ViewSet::new(request.side1_path, request.side2_path, request.side3_path);
    if let Some(side4) = request.side4_path {
        views = views.with_fourth(side4);
    }

    let artifacts = run_blocking(state, move |inner| {
        let mut inferrer = inner.lock()?;
        inner.pipeline.run_views(&mut *inferrer, &views)
    })
    .await?;
    info!(scad = ?artifacts.scad_path, attempts = ?artifacts.attempts, "model generated");
    Ok(Json(artifacts.into()))
}

/// Model calls and the compiler block, so runs go to the blocking pool.
async fn run_blocking<F>(state: AppState, job: F) -> Result<Artifacts, ApiError>
where
    F: FnOnce(&Inner) -> anyhow::Result<Artifacts> + Send + 'static,
{
    tokio::task::spawn_blocking(move || job(&state.inner))
        .await
        .map_err(|err| ApiError::internal(format!("run aborted: {err}")))?
        .map_err(ApiError::from_run)
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use axum::body::Body;
    use axum::response::Response;
    use axum::Router;
    use http::header::CONTENT_TYPE;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use partgen_core::geom::{Axis, Vec3};
    use partgen_core::{DimensionRecord, Fillet, Hole};
    use partgen_infer::ReplayModel;
    use partgen_pipeline::{Pipeline, PipelineConfig};
    use serde_json::json;
    use tower::ServiceExt;

    use super::{app, AppState, ArtifactsResponse, HealthResponse, ValidateResponse};

    fn scratch(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("partgen-server-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn bracket() -> DimensionRecord {
        DimensionRecord {
            width: 60.0,
            depth: 50.0,
            height: 75.0,
            fillet: Fillet {
                radius: 35.0,
                height: 45.0,
                ..Fillet::default()
            },
            hole: Some(Hole {
                diameter: 25.0,
                axis: Axis::Y,
                center: Vec3::new(30.0, 25.0, 37.5),
                through_all: true,
                length: None,
            }),
        }
    }

    fn router(out: &Path, replies: Vec<String>) -> Router {
        let pipeline = Pipeline::new(PipelineConfig {
            output_dir: out.to_path_buf(),
            compile: false,
            requests_per_minute: None,
            ..PipelineConfig::default()
        });
        app(AppState::new(pipeline, Box::new(ReplayModel::new(replies))))
    }

    fn write_views(dir: &Path) -> Vec<PathBuf> {
        std::fs::create_dir_all(dir).expect("create view dir");
        let view = image::DynamicImage::new_rgb8(32, 24);
        (1..=3)
            .map(|i| {
                let path = dir.join(format!("side{i}.png"));
                view.save(&path).expect("write view");
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .expect("request should build");
        let response = router(&scratch("health"), Vec::new())
            .oneshot(request)
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: HealthResponse = parse_json_response(response).await;
        assert_eq!(payload.status, "ok");
    }

    #[tokio::test]
    async fn validate_lists_every_violation() {
        let mut record = bracket();
        record.width = -1.0;
        record.fillet.radius = 0.0;
        let body = serde_json::to_value(&record).expect("record json");

        let response = send_json(
            router(&scratch("validate"), Vec::new()),
            "/validate",
            body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload: ValidateResponse = parse_json_response(response).await;
        assert!(!payload.valid);
        let fields: Vec<_> = payload.violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"width"), "{fields:?}");

        let response = send_json(
            router(&scratch("validate-ok"), Vec::new()),
            "/validate",
            serde_json::to_value(bracket()).expect("record json"),
        )
        .await;
        let payload: ValidateResponse = parse_json_response(response).await;
        assert!(payload.valid);
        assert!(payload.violations.is_empty());
    }

    #[tokio::test]
    async fn build_writes_script_and_dimensions() {
        let out = scratch("build");
        let response = send_json(
            router(&out, Vec::new()),
            "/build",
            serde_json::to_value(bracket()).expect("record json"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload: ArtifactsResponse = parse_json_response(response).await;
        assert_eq!(out.join("model.scad"), payload.scad_path);
        assert_eq!(None, payload.mesh_path);
        assert_eq!(None, payload.attempts);
        assert!(payload.scad_path.is_file());
        assert!(payload.dimensions_path.is_file());
    }

    #[tokio::test]
    async fn build_rejects_invalid_record() {
        let out = scratch("build-invalid");
        let mut record = bracket();
        record.depth = 0.0;
        let response = send_json(
            router(&out, Vec::new()),
            "/build",
            serde_json::to_value(&record).expect("record json"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = parse_json_value(response).await;
        let error = payload["error"].as_str().expect("error message");
        assert!(error.contains("depth"), "{error}");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn generate_infers_then_builds() {
        let out = scratch("generate");
        let sides = write_views(&out.join("views"));
        let replies = vec![
            "not json".to_string(),
            serde_json::to_string(&bracket()).expect("json"),
        ];

        let response = send_json(
            router(&out.join("result"), replies),
            "/generate-3d-model",
            json!({
                "side1_path": sides[0],
                "side2_path": sides[1],
                "side3_path": sides[2],
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload: ArtifactsResponse = parse_json_response(response).await;
        assert_eq!(Some(2), payload.attempts);
        assert_eq!(bracket(), payload.record);
        assert_eq!(out.join("result").join("model.scad"), payload.scad_path);
        assert!(payload.scad_path.is_file());
    }

    #[tokio::test]
    async fn generate_rejects_missing_view() {
        let out = scratch("generate-missing");
        let sides = write_views(&out);
        let response = send_json(
            router(&out, Vec::new()),
            "/generate-3d-model",
            json!({
                "side1_path": sides[0],
                "side2_path": sides[1],
                "side3_path": out.join("absent.png"),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = parse_json_value(response).await;
        let error = payload["error"].as_str().expect("error message");
        assert!(error.contains("absent.png"), "{error}");
    }

    #[tokio::test]
    async fn exhausted_model_is_a_server_error() {
        let out = scratch("generate-exhausted");
        let sides = write_views(&out.join("views"));
        let response = send_json(
            router(&out.join("result"), vec!["no idea".to_string(); 3]),
            "/generate-3d-model",
            json!({
                "side1_path": sides[0],
                "side2_path": sides[1],
                "side3_path": sides[2],
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload = parse_json_value(response).await;
        let error = payload["error"].as_str().expect("error message");
        assert!(error.contains("no usable dimensions"), "{error}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/build")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"width\": "))
            .expect("request should build");
        let response = router(&scratch("malformed"), Vec::new())
            .oneshot(request)
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = parse_json_value(response).await;
        let error = payload["error"].as_str().expect("error message");
        assert!(error.starts_with("invalid JSON body"), "{error}");

        let response = send_json(
            router(&scratch("empty"), Vec::new()),
            "/validate",
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn send_json(router: Router, uri: &str, value: serde_json::Value) -> Response {
        let body = serde_json::to_vec(&value).expect("json encoding should succeed");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request should build");

        router
            .oneshot(request)
            .await
            .expect("request should complete")
    }

    async fn parse_json_response<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = read_body_bytes(response).await;
        serde_json::from_slice(&bytes).expect("response should decode as JSON")
    }

    async fn parse_json_value(response: Response) -> serde_json::Value {
        let bytes = read_body_bytes(response).await;
        serde_json::from_slice(&bytes).expect("response should decode as JSON")
    }

    async fn read_body_bytes(response: Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes()
    }
}
