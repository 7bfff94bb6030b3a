//! End-to-end tests through the full front router.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use modgate_gateway::Module;
use modgate_server::{build_app, modules};
use modgate_service_shared::test_utils::MemorySink;
use modgate_service_shared::{MetricsConfig, Outcome, Pipeline, RateLimiter, ServerConfig};

fn server_with(pipeline: &Pipeline, limit: u64) -> TestServer {
    let config = ServerConfig {
        rate_limit_requests: limit,
        ..ServerConfig::default()
    };
    let limiter = RateLimiter::new(limit, Duration::from_secs(60));
    let app = build_app(&config, &MetricsConfig::default(), limiter, modules(pipeline)).unwrap();
    TestServer::new(app).unwrap()
}

fn server() -> TestServer {
    server_with(&Pipeline::default(), 10_000)
}

#[tokio::test]
async fn test_todo_crud_lifecycle() {
    let server = server();

    let created = server
        .post("/todo/api/todos")
        .json(&json!({
            "title": "Water the tomatoes",
            "description": "before noon",
            "priority": "high",
        }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let created: Value = created.json();
    assert_eq!(created["title"], "Water the tomatoes");
    assert_eq!(created["priority"], "high");
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_str().unwrap().to_string();

    let fetched = server.get(&format!("/todo/api/todos/{id}")).await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    assert_eq!(fetched.json::<Value>()["id"], id.as_str());

    let updated = server
        .patch(&format!("/todo/api/todos/{id}"))
        .json(&json!({"status": "completed"}))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    let updated: Value = updated.json();
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["title"], "Water the tomatoes");

    let listed = server.get("/todo/api/todos").await;
    assert_eq!(listed.status_code(), StatusCode::OK);
    let listed: Value = listed.json();
    assert_eq!(listed["page"], 1);
    assert_eq!(listed["limit"], 20);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["total_pages"], 1);
    assert_eq!(listed["data"][0]["id"], id.as_str());

    let deleted = server.delete(&format!("/todo/api/todos/{id}")).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    assert!(deleted.text().is_empty());

    let gone = server.get(&format!("/todo/api/todos/{id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(gone.json::<Value>()["type"], "/problems/not-found");
}

#[tokio::test]
async fn test_list_query_filters_and_pages() {
    let server = server();
    for (title, priority) in [("alpha", "low"), ("beta", "high"), ("gamma", "high")] {
        server
            .post("/task/api/tasks")
            .json(&json!({"title": title, "priority": priority}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let page: Value = server
        .get("/task/api/tasks")
        .add_query_param("priority", "high")
        .add_query_param("sort", "title")
        .add_query_param("order", "asc")
        .add_query_param("limit", "1")
        .await
        .json();
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert!(page.get("totalPages").is_none());
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["data"][0]["title"], "beta");

    let search: Value = server
        .get("/task/api/tasks")
        .add_query_param("search", "GAM")
        .await
        .json();
    assert_eq!(search["total"], 1);
    assert_eq!(search["data"][0]["title"], "gamma");
}

#[tokio::test]
async fn test_validation_failure_lists_violations() {
    let server = server();

    let response = server
        .post("/todo/api/todos")
        .json(&json!({"title": "", "priority": "urgent"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let problem: Value = response.json();
    assert_eq!(problem["type"], "/problems/validation-failed");
    let fields: Vec<&str> = problem["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"priority"));

    let response = server
        .get("/todo/api/todos")
        .add_query_param("limit", "500")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let server = server();

    let response = server
        .post("/todo/api/todos")
        .text("{\"title\": ")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["type"], "/problems/invalid-request");

    let response = server.get("/todo/api/todos/not-a-uuid").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .get("/todo/api/todos")
        .add_query_param("page", "two")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_patch_is_rejected() {
    let server = server();
    let created: Value = server
        .post("/todo/api/todos")
        .json(&json!({"title": "idle"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/todo/api/todos/{id}"))
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .patch(&format!("/todo/api/todos/{}", Uuid::new_v4()))
        .json(&json!({"title": "ghost"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_modules_keep_separate_stores() {
    let server = server();
    let created: Value = server
        .post("/todo/api/todos")
        .json(&json!({"title": "only in todo"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let tasks: Value = server.get("/task/api/tasks").await.json();
    assert_eq!(tasks["total"], 0);

    let response = server.get(&format!("/task/api/tasks/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // Collections are only reachable under their own module.
    let response = server.get("/task/api/todos").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agrifolio_sites_and_users() {
    let server = server();

    let site = server
        .post("/agrifolio/api/sites")
        .json(&json!({"title": "North field", "priority": "low"}))
        .await;
    assert_eq!(site.status_code(), StatusCode::CREATED);
    assert_eq!(site.json::<Value>()["priority"], "low");

    let user = server
        .post("/agrifolio/api/users")
        .json(&json!({"title": "Ada", "description": "agronomist"}))
        .await;
    assert_eq!(user.status_code(), StatusCode::CREATED);
    let user: Value = user.json();
    let id = user["id"].as_str().unwrap();

    let renamed: Value = server
        .patch(&format!("/agrifolio/api/users/{id}"))
        .json(&json!({"title": "Ada L."}))
        .await
        .json();
    assert_eq!(renamed["title"], "Ada L.");

    let users: Value = server.get("/agrifolio/api/users").await.json();
    assert_eq!(users["total"], 1);
    let sites: Value = server.get("/agrifolio/api/sites").await.json();
    assert_eq!(sites["total"], 1);
}

#[tokio::test]
async fn test_module_status() {
    let server = server();

    let status: Value = server.get("/agrifolio/status").await.json();
    assert_eq!(status["module"], "agrifolio");
    assert_eq!(status["status"], "ok");
    assert_eq!(status["collections"], json!(["sites", "users"]));

    let status = server.get("/todo/status").await;
    assert_eq!(status.status_code(), StatusCode::OK);
    assert_eq!(status.json::<Value>()["module"], "todo");
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = server();

    server.get("/health/live").await.assert_status_ok();

    let ready = server.get("/health/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(
        ready.json::<Value>()["modules"],
        json!(["todo", "task", "agrifolio"])
    );

    let response = server.get("/unknown").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_paths_get_problem_responses() {
    let server = server();

    for path in ["/unknown", "/todo/api/nothing-here"] {
        let response = server
            .get(path)
            .add_header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("req-missing"),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.header("content-type"), "application/problem+json");

        let problem: Value = response.json();
        assert_eq!(problem["type"], "/problems/not-found");
        assert_eq!(problem["instance"], "req-missing");
        assert_eq!(problem["detail"], format!("no route matches {path}"));
    }
}

#[tokio::test]
async fn test_metrics_route_follows_config() {
    let disabled = MetricsConfig {
        enabled: false,
        ..MetricsConfig::default()
    };
    let app = build_app(
        &ServerConfig::default(),
        &disabled,
        RateLimiter::new(100, Duration::from_secs(60)),
        modules(&Pipeline::default()),
    )
    .unwrap();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["type"], "/problems/not-found");

    let custom = MetricsConfig {
        enabled: true,
        path: "/internal/metrics".to_string(),
    };
    let app = build_app(
        &ServerConfig::default(),
        &custom,
        RateLimiter::new(100, Duration::from_secs(60)),
        modules(&Pipeline::default()),
    )
    .unwrap();
    let server = TestServer::new(app).unwrap();
    server.get("/internal/metrics").await.assert_status_ok();
    server
        .get("/metrics")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ready_is_unavailable_without_modules() {
    let app = build_app(
        &ServerConfig::default(),
        &MetricsConfig::default(),
        RateLimiter::new(100, Duration::from_secs(60)),
        Vec::new(),
    )
    .unwrap();
    let server = TestServer::new(app).unwrap();

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_is_echoed_and_used_as_instance() {
    let server = server();

    let response = server
        .get(&format!("/todo/api/todos/{}", Uuid::new_v4()))
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-abc-123"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.header("x-request-id"), "req-abc-123");
    assert_eq!(response.json::<Value>()["instance"], "req-abc-123");

    let response = server.get("/health/live").await;
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_rate_limit_refuses_excess_requests() {
    let server = server_with(&Pipeline::default(), 2);

    server.get("/health/live").await.assert_status_ok();
    server.get("/health/live").await.assert_status_ok();

    let response = server.get("/health/live").await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["type"], "/problems/rate-limited");
    assert!(!response.header("x-request-id").is_empty());

    // Clients are keyed by their first forwarded hop.
    server
        .get("/health/live")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("10.0.0.7, 10.0.0.1"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_pipeline_emits_one_event_per_call() {
    let sink = MemorySink::new();
    let server = server_with(&Pipeline::new(Arc::new(sink.clone())), 10_000);

    server
        .post("/task/api/tasks")
        .json(&json!({"title": "ship it"}))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/task/api/tasks")
        .json(&json!({"title": ""}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    server
        .delete(&format!("/task/api/tasks/{}", Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Health checks do not go through the pipeline.
    server.get("/health/live").await.assert_status_ok();

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].outcome, Outcome::Completed);
    assert_eq!(events[0].tags.route, "/api/tasks");
    assert_eq!(events[1].outcome, Outcome::ValidationFailed);
    assert!(events[1].handler.is_none());
    assert_eq!(events[2].outcome, Outcome::HandlerFailed);
    assert_eq!(events[2].tags.operation, "handler_no_content");
    assert_eq!(events[2].tags.route, "/api/tasks/{id}");
}

#[tokio::test]
async fn test_strict_mode_rejects_duplicate_prefix() {
    let pipeline = Pipeline::default();
    let config = ServerConfig {
        strict_gateway: true,
        ..ServerConfig::default()
    };
    let mut mods = modules(&pipeline);
    mods.push(Module::new("shadow", axum::Router::new()).with_prefix("/todo"));

    let err = build_app(
        &config,
        &MetricsConfig::default(),
        RateLimiter::new(100, Duration::from_secs(60)),
        mods,
    )
    .unwrap_err();
    assert!(err.to_string().contains("/todo"));
}

#[tokio::test]
async fn test_lenient_mode_last_registration_wins() {
    let pipeline = Pipeline::default();
    let mut mods = modules(&pipeline);
    mods.push(
        Module::new(
            "shadow",
            axum::Router::new().route("/status", axum::routing::get(|| async { "shadow" })),
        )
        .with_prefix("/todo"),
    );

    let app = build_app(
        &ServerConfig::default(),
        &MetricsConfig::default(),
        RateLimiter::new(100, Duration::from_secs(60)),
        mods,
    )
    .unwrap();
    let server = TestServer::new(app).unwrap();

    assert_eq!(server.get("/todo/status").await.text(), "shadow");
    let ready: Value = server.get("/health/ready").await.json();
    assert_eq!(ready["modules"], json!(["shadow", "task", "agrifolio"]));
}
