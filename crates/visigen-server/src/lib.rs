pub mod config;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use visigen_ai::{GenerationClient, SimulationPipeline, SimulationRun};

const MIN_PROBLEM_CHARS: usize = 5;
const MAX_PROBLEM_CHARS: usize = 1000;

pub fn app<C>(pipeline: Arc<SimulationPipeline<C>>, origins: Vec<HeaderValue>) -> Router
where
    C: GenerationClient + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/simulate", post(simulate::<C>))
        .layer(cors_layer(origins))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION])
        .allow_credentials(true)
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    problem: String,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    status: &'static str,
    message: &'static str,
    #[serde(flatten)]
    run: SimulationRun,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    status: String,
    message: String,
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

    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(StatusResponse {
                status: "error".to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: "Visigen backend running.".to_string(),
    })
}

async fn simulate<C>(
    State(pipeline): State<Arc<SimulationPipeline<C>>>,
    body: Bytes,
) -> Result<Json<SimulateResponse>, ApiError>
where
    C: GenerationClient + 'static,
{
    let request: SimulateRequest = parse_json(&body)?;
    let problem = check_problem(request.problem)?;
    info!(chars = problem.chars().count(), "simulation requested");

    let task = tokio::spawn(async move { pipeline.run(&problem).await });
    let run = task.await.map_err(|err| {
        error!(error = %err, "simulation task failed");
        ApiError::internal(format!("simulation failed: {err}"))
    })?;

    Ok(Json(SimulateResponse {
        status: "success",
        message: "Simulation generated successfully",
        run,
    }))
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}

fn check_problem(problem: String) -> Result<String, ApiError> {
    let chars = problem.chars().count();
    if !(MIN_PROBLEM_CHARS..=MAX_PROBLEM_CHARS).contains(&chars) {
        return Err(ApiError::unprocessable(format!(
            "problem must be between {MIN_PROBLEM_CHARS} and {MAX_PROBLEM_CHARS} characters, got {chars}"
        )));
    }
    Ok(problem)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::response::Response;
    use futures::future::join_all;
    use http::header::{CONTENT_TYPE, ORIGIN};
    use http::{HeaderValue, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use visigen_ai::{
        GenerationClient, GenerationError, GenerationRequest, NoDelay, PipelineConfig,
        SimulationPipeline, Stage,
    };

    use super::{StatusResponse, app};

    const ALLOWED: &str = "http://localhost:5173";
    const PROBLEM: &str = "A 5 kg box slides down a 30 degree incline with friction coefficient 0.2.";

    #[derive(Default)]
    struct CannedClient {
        latency: Duration,
        crash: bool,
    }

    #[async_trait]
    impl GenerationClient for CannedClient {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
            if self.crash {
                panic!("generation client crashed");
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            match request.stage {
                Stage::Parser => Ok(json!({
                    "environment_type": "incline",
                    "angle_deg": 30,
                    "friction": 0.2,
                    "objects": [{"type": "box", "mass_kg": 5}],
                    "source_text": PROBLEM
                })
                .to_string()),
                Stage::Scene => Ok("```json\n{\"environment\": {\"type\": \"incline\"}}\n```".to_string()),
                Stage::Validator => Err(GenerationError::Model("validator offline".to_string())),
            }
        }
    }

    fn router(client: CannedClient) -> Router {
        let pipeline = SimulationPipeline::new(client, PipelineConfig::default()).with_delay(NoDelay);
        app(Arc::new(pipeline), vec![HeaderValue::from_static(ALLOWED)])
    }

    #[tokio::test]
    async fn root_reports_status() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .expect("request should build");

        let response = router(CannedClient::default())
            .oneshot(request)
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: StatusResponse = parse_json_response(response).await;
        assert_eq!(payload.status, "ok");
        assert_eq!(payload.message, "Visigen backend running.");
    }

    #[tokio::test]
    async fn simulate_returns_the_full_run() {
        let response = send_json(
            router(CannedClient::default()),
            "/simulate",
            json!({"problem": PROBLEM}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = parse_json_value(response).await;
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["message"], "Simulation generated successfully");
        assert_eq!(payload["problem"], PROBLEM);
        assert_eq!(payload["parsed"]["environment_type"], "incline");
        assert_eq!(payload["scene"]["environment"]["type"], "incline");
        assert_eq!(payload["validated"]["environment"]["angle"], 30.0);
        assert_eq!(payload["validated"]["objects"][0]["mass"], 5.0);
        assert_eq!(payload["attempts"], 1);
        assert_eq!(payload["converged"], true);
        assert_eq!(payload["history"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn short_problem_is_rejected() {
        let response =
            send_json(router(CannedClient::default()), "/simulate", json!({"problem": "hi"})).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload: StatusResponse = parse_json_response(response).await;
        assert_eq!(payload.status, "error");
        assert!(payload.message.contains("between 5 and 1000"));
    }

    #[tokio::test]
    async fn long_problem_is_rejected() {
        let problem = "x".repeat(1001);
        let response =
            send_json(router(CannedClient::default()), "/simulate", json!({"problem": problem})).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let empty = Request::builder()
            .method(Method::POST)
            .uri("/simulate")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .expect("request should build");
        let response = router(CannedClient::default())
            .oneshot(empty)
            .await
            .expect("request should complete");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            send_json(router(CannedClient::default()), "/simulate", json!({"text": PROBLEM})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload: StatusResponse = parse_json_response(response).await;
        assert!(payload.message.starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn pipeline_panic_becomes_server_error() {
        let client = CannedClient {
            crash: true,
            ..CannedClient::default()
        };
        let response = send_json(router(client), "/simulate", json!({"problem": PROBLEM})).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: StatusResponse = parse_json_response(response).await;
        assert_eq!(payload.status, "error");
        assert!(payload.message.starts_with("simulation failed"));
    }

    #[tokio::test]
    async fn cors_allows_only_listed_origins() {
        for (origin, expected) in [(ALLOWED, Some(ALLOWED)), ("https://evil.example.com", None)] {
            let request = Request::builder()
                .method(Method::GET)
                .uri("/")
                .header(ORIGIN, origin)
                .body(Body::empty())
                .expect("request should build");

            let response = router(CannedClient::default())
                .oneshot(request)
                .await
                .expect("request should complete");

            assert_eq!(response.status(), StatusCode::OK);
            let allow_origin = response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok());
            assert_eq!(allow_origin, expected);
        }
    }

    #[tokio::test]
    async fn preflight_allows_credentials() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/simulate")
            .header(ORIGIN, ALLOWED)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .expect("request should build");

        let response = router(CannedClient::default())
            .oneshot(request)
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-credentials")
                .and_then(|value| value.to_str().ok()),
            Some("true")
        );
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_serialize() {
        let latency = Duration::from_millis(100);
        let app = router(CannedClient {
            latency,
            crash: false,
        });
        let body = serde_json::to_vec(&json!({"problem": PROBLEM})).expect("json encoding should succeed");

        let start = Instant::now();
        let futures = (0..8).map(|_| {
            let app = app.clone();
            let body = body.clone();
            async move {
                let request = Request::builder()
                    .method(Method::POST)
                    .uri("/simulate")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .expect("request should build");
                app.oneshot(request).await.expect("request should complete")
            }
        });

        let responses = join_all(futures).await;
        let elapsed = start.elapsed();

        for response in responses {
            assert_eq!(response.status(), StatusCode::OK);
        }
        // Each request makes two sequential generation calls.
        let serial = latency * 2 * 8;
        assert!(
            elapsed < serial / 2,
            "requests ran serially: elapsed={elapsed:?}, serial={serial:?}"
        );
    }

    async fn send_json(router: Router, uri: &str, value: Value) -> Response {
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

    async fn parse_json_value(response: Response) -> Value {
        let bytes = read_body_bytes(response).await;
        serde_json::from_slice(&bytes).expect("response should decode as JSON")
    }

    async fn read_body_bytes(response: Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("response body should collect")
            .to_bytes()
    }
}
