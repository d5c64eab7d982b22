use crate::config::ServerConfig;
use crate::error::RunError;
use crate::marshal::Projection;
use crate::request::{self, RequestHandler, RunRequest};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

type SharedConfig = Arc<ServerConfig>;

pub fn router(config: SharedConfig) -> Router {
    let body_limit = config.max_body_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route("/api/run-scallop", post(run_scallop))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(config)
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        provenance = %config.provenance,
        eval_timeout_ms = config.eval_timeout_ms(),
        loader = ?config.loader,
        "scl server listening on {}",
        addr
    );

    let app = router(Arc::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scl",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn run_scallop(
    State(config): State<SharedConfig>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<Projection>, RunError> {
    let mut handler = RequestHandler::new();
    let result = match payload {
        Ok(Json(request)) => evaluate(&mut handler, request, config).await,
        Err(rejection) => Err(RunError::BadRequest(rejection.body_text())),
    };
    handler.respond(&result);
    result.map(Json)
}

/// Validate on the async side, evaluate on the blocking pool under the time budget
async fn evaluate(
    handler: &mut RequestHandler,
    request: RunRequest,
    config: SharedConfig,
) -> Result<Projection, RunError> {
    let validated = handler.validate(request, &config)?;
    handler.begin(&validated);

    let timeout_ms = config.eval_timeout_ms();
    let task = tokio::task::spawn_blocking(move || request::execute(validated, &config));
    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            error!(request_id = handler.id(), "evaluation task failed: {}", join_error);
            Err(RunError::Internal(format!(
                "evaluation task failed: {}",
                join_error
            )))
        }
        Err(_) => Err(RunError::EvaluationTimeout { timeout_ms }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use crate::marshal::ProgramLoader;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(ServerConfig::default()))
    }

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/run-scallop")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn call(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app.oneshot(post_json(body.to_string())).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn error_kind(body: Value) -> String {
        let body: ErrorBody = serde_json::from_value(body).unwrap();
        body.error
    }

    fn family(program: &str, outputs: Value) -> Value {
        json!({
            "inputs": [{
                "name": "parent",
                "args": [{"name": "a", "type": "String"}, {"name": "b", "type": "String"}],
                "facts": [[null, ["Emily", "Bob"]], [null, ["Bob", "Alice"]]]
            }],
            "program": program,
            "outputs": outputs
        })
    }

    /// Tuples of one output as a sorted list of value arrays
    fn values_of(body: &Value, output: &str) -> Vec<Value> {
        let mut values: Vec<Value> = body[output]
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| pair[1].clone())
            .collect();
        values.sort_by_key(|v| v.to_string());
        values
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "scl");
    }

    #[tokio::test]
    async fn test_grandparent() {
        let body = family(
            "rel grandparent(a, c) = parent(a, b), parent(b, c)",
            json!([{"name": "grandparent"}]),
        );
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"grandparent": [[1.0, ["Emily", "Alice"]]]}));
    }

    #[tokio::test]
    async fn test_float_sums_keep_float_type() {
        let body = json!({
            "inputs": [{
                "name": "pair",
                "args": [{"name": "x", "type": "Float"}, {"name": "y", "type": "Float"}],
                "facts": [[null, [1.0, 1.0]], [null, [1.0, 6.9]], [null, [6.9, 6.9]]]
            }],
            "program": "rel sum(x + y) = pair(x, y)",
            "outputs": [{"name": "sum"}]
        });
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        let mut sums: Vec<f64> = body["sum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| pair[1][0].as_f64().unwrap())
            .collect();
        sums.sort_by(f64::total_cmp);
        let expected = [2.0, 7.9, 13.8];
        assert_eq!(sums.len(), expected.len());
        for (sum, expected) in sums.iter().zip(expected) {
            assert!((sum - expected).abs() < 1e-9, "{} != {}", sum, expected);
        }
        assert!(body["sum"][0][1][0].is_f64());
    }

    #[tokio::test]
    async fn test_boolean_xor() {
        let body = json!({
            "inputs": [{
                "name": "bits",
                "args": [{"name": "a", "type": "Boolean"}, {"name": "b", "type": "Boolean"}],
                "facts": [[null, [true, false]], [null, [true, true]], [null, [false, false]]]
            }],
            "program": "rel xor(a, b, a ^ b) = bits(a, b)",
            "outputs": [{"name": "xor"}]
        });
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            values_of(&body, "xor"),
            vec![
                json!([false, false, false]),
                json!([true, false, true]),
                json!([true, true, false]),
            ]
        );
    }

    #[tokio::test]
    async fn test_integer_facts_in_float_column_sum_with_self_pairs() {
        let body = json!({
            "inputs": [{
                "name": "num",
                "args": [{"name": "a", "type": "Float"}],
                "facts": [[null, [1]], [null, [6.9]]]
            }],
            "program": "rel sum(a + b) = num(a), num(b)",
            "outputs": [{"name": "sum"}]
        });
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        let tuples = body["sum"].as_array().unwrap();
        assert!(tuples.iter().all(|pair| pair[0] == json!(1.0)));
        let mut sums: Vec<f64> = tuples
            .iter()
            .map(|pair| pair[1][0].as_f64().unwrap())
            .collect();
        sums.sort_by(f64::total_cmp);
        let expected = [2.0, 7.9, 13.8];
        assert_eq!(sums.len(), expected.len());
        for (sum, expected) in sums.iter().zip(expected) {
            assert!((sum - expected).abs() < 1e-9, "{} != {}", sum, expected);
        }
    }

    #[tokio::test]
    async fn test_xor_across_two_boolean_relations() {
        let body = json!({
            "inputs": [
                {
                    "name": "bool1",
                    "args": [{"name": "a", "type": "Boolean"}],
                    "facts": [[null, [true]]]
                },
                {
                    "name": "bool2",
                    "args": [{"name": "a", "type": "Boolean"}],
                    "facts": [[null, [false]]]
                }
            ],
            "program": "rel lor(a ^ b) = bool1(a), bool2(b)",
            "outputs": [{"name": "lor"}]
        });
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"lor": [[1.0, [true]]]}));
    }

    #[tokio::test]
    async fn test_deeply_nested_program_is_rejected_without_crashing() {
        let program = format!(
            "rel deep({}a{}) = parent(a, _)",
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        let (status, body) = call(app(), family(&program, json!([{"name": "deep"}]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_kind(body), "ProgramSyntaxError");

        let healthy = family("rel child(b) = parent(_, b)", json!([{"name": "child"}]));
        let (status, _) = call(app(), healthy).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_arity_mismatch_is_rejected() {
        let mut body = family("rel x(a) = parent(a, _)", json!([{"name": "x"}]));
        body["inputs"][0]["facts"] = json!([[null, ["Emily", "Bob", "Alice"]]]);
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(body), "SchemaMismatch");
    }

    #[tokio::test]
    async fn test_type_coercion_error() {
        let mut body = family("rel x(a) = parent(a, _)", json!([{"name": "x"}]));
        body["inputs"][0]["facts"] = json!([[null, ["Emily", 3]]]);
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(body), "TypeCoercionError");
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let mut body = family("not a program at all (", json!([{"name": "x"}]));
        body["inputs"][0]["args"][0]["type"] = json!("Date");
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(body), "UnknownType");
    }

    #[tokio::test]
    async fn test_unknown_output_relation() {
        let body = family(
            "rel grandparent(a, c) = parent(a, b), parent(b, c)",
            json!([{"name": "cousin"}]),
        );
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(body), "UnknownRelation");
    }

    #[tokio::test]
    async fn test_program_syntax_error() {
        let body = family("rel grandparent(a, c) = parent(a, b", json!([]));
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_kind(body), "ProgramSyntaxError");
    }

    #[tokio::test]
    async fn test_unknown_relation_in_body_is_a_program_error() {
        let body = family("rel x(a) = ancestor(a, _)", json!([{"name": "x"}]));
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_kind(body), "ProgramSyntaxError");
    }

    #[tokio::test]
    async fn test_duplicate_relation() {
        let mut body = family("", json!([]));
        let input = body["inputs"][0].clone();
        body["inputs"] = json!([input.clone(), input]);
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(body), "DuplicateRelation");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = app()
            .oneshot(post_json("{\"inputs\": [".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "BadRequest");
    }

    #[tokio::test]
    async fn test_missing_program_is_bad_request() {
        let (status, body) = call(app(), json!({"inputs": [], "outputs": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(body), "BadRequest");
    }

    #[tokio::test]
    async fn test_evaluation_timeout() {
        let config = ServerConfig {
            limits: scl::ResourceLimits::default().with_evaluation_time_ms(1),
            ..ServerConfig::default()
        };
        let body = json!({
            "inputs": [],
            "program": "rel nat(0)\nrel nat(n + 1) = nat(n)",
            "outputs": [{"name": "nat"}]
        });
        let (status, body) = call(router(Arc::new(config)), body).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error_kind(body), "EvaluationTimeout");
    }

    #[tokio::test]
    async fn test_probabilistic_weights() {
        let body = json!({
            "inputs": [{
                "name": "friend",
                "args": [{"type": "String"}, {"type": "String"}],
                "facts": [[0.8, ["alice", "bob"]], [0.5, ["bob", "carol"]]]
            }],
            "program": "rel fof(a, c) = friend(a, b), friend(b, c)",
            "outputs": [{"name": "fof"}],
            "runtime": {"provenance": "addmultprob"}
        });
        let (status, body) = call(app(), body).await;
        assert_eq!(status, StatusCode::OK);
        let weight = body["fof"][0][0].as_f64().unwrap();
        assert!((weight - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let app = app();
        let request_for = |people: [&str; 3]| {
            json!({
                "inputs": [{
                    "name": "parent",
                    "args": [{"type": "String"}, {"type": "String"}],
                    "facts": [[null, [people[0], people[1]]], [null, [people[1], people[2]]]]
                }],
                "program": "rel grandparent(a, c) = parent(a, b), parent(b, c)",
                "outputs": [{"name": "grandparent"}, {"name": "parent"}]
            })
        };
        let first = call(app.clone(), request_for(["Emily", "Bob", "Alice"]));
        let second = call(app.clone(), request_for(["Zoe", "Yan", "Xia"]));
        let ((first_status, first), (second_status, second)) = tokio::join!(first, second);

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(values_of(&first, "grandparent"), vec![json!(["Emily", "Alice"])]);
        assert_eq!(values_of(&second, "grandparent"), vec![json!(["Zoe", "Xia"])]);
        assert_eq!(values_of(&first, "parent").len(), 2);
        assert_eq!(values_of(&second, "parent").len(), 2);
    }

    #[tokio::test]
    async fn test_tempfile_loader_serves_requests() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig {
            loader: ProgramLoader::TempFile {
                dir: dir.path().to_path_buf(),
            },
            ..ServerConfig::default()
        };
        let app = router(Arc::new(config));
        let body = family(
            "rel grandparent(a, c) = parent(a, b), parent(b, c)",
            json!([{"name": "grandparent"}]),
        );
        let (status, body) = call(app, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(values_of(&body, "grandparent"), vec![json!(["Emily", "Alice"])]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
