//! End-to-end tests running a real server on an ephemeral port

use svckit::prelude::*;

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<svckit::error::Result<()>>,
}

impl TestApp {
    /// Bind the app on ephemeral ports and serve it from a background task
    async fn spawn(app: App) -> Self {
        let mut config = Config::default();
        config.service.port = 0;
        config.service.debug_port = 0;

        let mut app = app.with_config(config);
        app.initialize().await.expect("initialize");
        let addr = app.bind().await.expect("bind");

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { app.start(shutdown).await }
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            shutdown,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.expect("join").expect("clean shutdown");
    }
}

async fn panic_with_str() -> ApiResponse {
    panic!("boom")
}

async fn panic_with_api_error() -> ApiResponse {
    std::panic::panic_any(ApiError::new(400, "bad input"))
}

async fn push_decode_error(errors: ErrorStack) -> ApiResponse {
    errors.push(ApiError::field("code", "invalid type `string`, requires `int`"));
    ApiResponse::new(StatusCode::OK)
}

async fn push_two_errors(errors: ErrorStack) -> ApiResponse {
    errors.push(ApiError::new(404, "first"));
    errors.push(ApiError::new(409, "second"));
    ApiResponse::new(StatusCode::OK)
}

#[derive(Debug, serde::Deserialize, serde::Serialize, Validate)]
struct OrderBody {
    code: u32,
    #[validate(length(min = 1))]
    name: String,
}

async fn create_order(Payload(body): Payload<OrderBody>) -> ApiResponse {
    ApiResponse::with_data(StatusCode::CREATED, body)
}

async fn list_items(Query(mut pager): Query<Pager>) -> ApiResponse {
    pager.total_rows = 45;
    ApiResponse::paginated(StatusCode::OK, vec![1, 2, 3], &pager)
}

async fn whoami(identity: Identity) -> ApiResponse {
    ApiResponse::with_data(
        StatusCode::OK,
        serde_json::json!({"user_id": identity.user_id_u64()}),
    )
}

#[tokio::test]
async fn health_endpoint_reports_name_and_version() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0")).await;

    let resp = app.client.get(app.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "test-svc");
    assert_eq!(body["version"], "0.1.0");
    assert!(body["hostname"].is_string());

    app.stop().await;
}

#[tokio::test]
async fn health_endpoint_can_be_disabled() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0").disable_health_endpoint()).await;

    let resp = app.client.get(app.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    app.stop().await;
}

#[tokio::test]
async fn string_panic_becomes_500_envelope() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/panic", get(panic_with_str))).await;

    let resp = app.client.get(app.url("/panic")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"unexpected error: boom"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn api_error_panic_keeps_its_status() {
    let app = TestApp::spawn(
        App::new("test-svc", "0.1.0").route("/panic", get(panic_with_api_error)),
    )
    .await;

    let resp = app.client.get(app.url("/panic")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"bad input"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn pushed_error_replaces_handler_response() {
    let app = TestApp::spawn(
        App::new("test-svc", "0.1.0").route("/orders", get(push_decode_error)),
    )
    .await;

    let resp = app.client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"code":"invalid type `string`, requires `int`"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn last_pushed_error_wins() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/conflict", get(push_two_errors)))
            .await;

    let resp = app.client.get(app.url("/conflict")).send().await.unwrap();
    assert_eq!(resp.status(), 409);
    assert_eq!(resp.text().await.unwrap(), r#"{"error":{"detail":"second"}}"#);

    app.stop().await;
}

#[tokio::test]
async fn type_mismatch_in_body_names_the_field() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/orders", post(create_order))).await;

    let resp = app
        .client
        .post(app.url("/orders"))
        .json(&serde_json::json!({"code": "1", "name": "widget"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"code":"invalid type `string`, requires `int`"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn top_level_type_mismatch_does_not_leak_type_names() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/orders", post(create_order))).await;

    let resp = app
        .client
        .post(app.url("/orders"))
        .header("content-type", "application/json")
        .body(r#""oops""#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"invalid payload"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn malformed_body_is_invalid_payload() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/orders", post(create_order))).await;

    let resp = app
        .client
        .post(app.url("/orders"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"invalid payload"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn failed_validation_rule_rejects_with_field_map() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/orders", post(create_order))).await;

    let resp = app
        .client
        .post(app.url("/orders"))
        .json(&serde_json::json!({"code": 1, "name": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"]["name"]
        .as_str()
        .unwrap()
        .contains("length"));

    app.stop().await;
}

#[tokio::test]
async fn valid_body_passes_through() {
    let app =
        TestApp::spawn(App::new("test-svc", "0.1.0").route("/orders", post(create_order))).await;

    let resp = app
        .client
        .post(app.url("/orders"))
        .json(&serde_json::json!({"code": 7, "name": "widget"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["code"], 7);
    assert_eq!(body["data"]["name"], "widget");

    app.stop().await;
}

#[tokio::test]
async fn paginated_list_carries_meta() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0").route("/items", get(list_items))).await;

    let resp = app
        .client
        .get(app.url("/items?page=2&page_size=20"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"], serde_json::json!([1, 2, 3]));
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["page_size"], 20);
    assert_eq!(body["meta"]["total"], 45);
    assert_eq!(body["meta"]["total_pages"], 3);

    app.stop().await;
}

#[tokio::test]
async fn auth_required_rejects_anonymous_requests() {
    let guarded = Router::new()
        .route("/me", get(whoami))
        .layer(axum::middleware::from_fn(auth_required));
    let app = TestApp::spawn(App::new("test-svc", "0.1.0").merge(guarded)).await;

    let resp = app.client.get(app.url("/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"unauthorized"}}"#
    );

    let resp = app
        .client
        .get(app.url("/me"))
        .header("x-user-id", "42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["user_id"], 42);

    app.stop().await;
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0")).await;

    let resp = app.client.get(app.url("/status")).send().await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));

    app.stop().await;
}

#[tokio::test]
async fn error_and_panic_responses_carry_a_request_id() {
    let app = TestApp::spawn(
        App::new("test-svc", "0.1.0")
            .route("/panic", get(panic_with_str))
            .route("/conflict", get(push_two_errors)),
    )
    .await;

    // panic recovery replaces the response wholesale; the id must survive
    let resp = app.client.get(app.url("/panic")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = app.client.get(app.url("/conflict")).send().await.unwrap();
    assert_eq!(resp.status(), 409);
    assert!(resp.headers().contains_key("x-request-id"));

    app.stop().await;
}

#[tokio::test]
async fn unknown_route_gets_an_envelope_404() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0")).await;

    let resp = app.client.get(app.url("/no/such/route")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"route":"not found"}}"#
    );

    app.stop().await;
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let mut config = Config::default();
    config.service.port = 0;
    config.service.debug_port = 0;

    let mut app = App::new("test-svc", "0.1.0")
        .with_config(config)
        .route("/panic", get(panic_with_str));
    app.initialize().await.unwrap();
    app.initialize().await.unwrap();
    let addr = app.bind().await.unwrap();
    assert_eq!(app.bind().await.unwrap(), addr);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { app.start(shutdown).await }
    });

    // middleware installed exactly once: a panic still yields one envelope
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/panic"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":{"detail":"unexpected error: boom"}}"#
    );

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancellation_token_stops_the_server() {
    let app = TestApp::spawn(App::new("test-svc", "0.1.0")).await;
    let TestApp {
        shutdown, handle, ..
    } = app;

    shutdown.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("shutdown within grace period")
        .expect("join");
    assert!(result.is_ok());
}
