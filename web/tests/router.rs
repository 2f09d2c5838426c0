//! Integration tests for the assembled HTTP surface
//!
//! Builds the full router around a harness-backed application and drives it
//! with `tower::ServiceExt::oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use trellis_core::{AssetMount, Module, Route};
use trellis_testing::{Harness, RecordingModule, ThemeTree};
use trellis_web::{AssetSlots, PageContext, build_router, handlers::not_found};

// ============================================================================
// Test Fixtures
// ============================================================================

struct Site {
    harness: Harness,
    router: Router,
}

async fn site(modules: Vec<Arc<dyn Module>>, initialise: bool) -> Site {
    let slots = AssetSlots::new();
    let mut builder = Harness::builder(ThemeTree::new().theme("core", "classic"))
        .asset_mount(Arc::clone(&slots.static_files) as Arc<dyn AssetMount>)
        .asset_mount(Arc::clone(&slots.styles) as Arc<dyn AssetMount>);
    for module in modules {
        builder = builder.module(module);
    }
    let harness = builder.build().unwrap();
    harness.config.set("server.form_limit", 64.into());
    if initialise {
        harness.app.initialise(false).await.unwrap();
    }

    let downstream = Router::new()
        .route("/about", get(|| async { "downstream about" }))
        .route("/echo", post(|body: String| async move { body }))
        .route(
            "/themed",
            get(|page: PageContext| async move {
                page.render_with(|ctx| {
                    ctx.title = Some("Themed".into());
                    ctx.add_block("body", "from downstream");
                })
            }),
        )
        .fallback(not_found);

    Site {
        router: build_router(Arc::clone(&harness.app), &slots, downstream),
        harness,
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_request(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn requests_before_initialization_get_503() {
    let site = site(Vec::new(), false).await;

    let response = site.router.clone().oneshot(get_request("/about")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let ready = site.router.oneshot(get_request("/health/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn liveness_does_not_need_initialization() {
    let site = site(Vec::new(), false).await;
    let response = site.router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_reports_the_serving_state() {
    let broken = Arc::new(RecordingModule::new("broken").failing_init("nope"));
    let site = site(vec![broken], true).await;

    let response = site.router.oneshot(get_request("/health/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["generation"], 1);
    assert_eq!(body["theme"], "classic");
    assert_eq!(body["storage"]["backend"], "memory");
    assert_eq!(body["modules"][0]["name"], "broken");
    assert_eq!(body["modules"][0]["state"], "failed");
}

// ============================================================================
// Module responses
// ============================================================================

#[tokio::test]
async fn claimed_requests_render_through_the_theme() {
    let blog = Arc::new(
        RecordingModule::new("blog")
            .route(Route::get("show", "/blog/:slug"))
            .title("Hello")
            .block("body", "<article>post</article>"),
    );
    let site = site(vec![blog], true).await;

    let response = site.router.oneshot(get_request("/blog/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert_eq!(text(response).await, "classic|Hello|<article>post</article>");
}

#[tokio::test]
async fn raw_bodies_bypass_the_theme() {
    let feed = Arc::new(
        RecordingModule::new("feed")
            .route(Route::get("rss", "/feed.xml"))
            .respond("application/rss+xml", "<rss/>"),
    );
    let site = site(vec![feed], true).await;

    let response = site.router.oneshot(get_request("/feed.xml")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/rss+xml");
    assert_eq!(text(response).await, "<rss/>");
}

#[tokio::test]
async fn redirects_use_see_other() {
    let login = Arc::new(
        RecordingModule::new("user")
            .route(Route::get("login", "/login"))
            .redirect("/user/profile"),
    );
    let site = site(vec![login], true).await;

    let response = site.router.oneshot(get_request("/login")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/user/profile");
}

#[tokio::test]
async fn all_failing_handlers_answer_500() {
    let broken = Arc::new(
        RecordingModule::new("broken")
            .route(Route::get("any", "/*"))
            .failing_route("boom"),
    );
    let site = site(vec![broken], true).await;

    let response = site.router.oneshot(get_request("/anything")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Forms
// ============================================================================

#[tokio::test]
async fn forms_are_parsed_before_routing() {
    let comments = Arc::new(
        RecordingModule::new("comments")
            .route(Route::post("create", "/comments"))
            .redirect("/comments"),
    );
    let site = site(vec![Arc::clone(&comments) as Arc<dyn Module>], true).await;

    let response = site
        .router
        .oneshot(post_request(
            "/comments",
            "application/x-www-form-urlencoded",
            "author=ann&text=hi+there",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let form = comments.last_form().unwrap();
    assert_eq!(form.get("author"), Some("ann"));
    assert_eq!(form.get("text"), Some("hi there"));
}

#[tokio::test]
async fn json_forms_are_parsed_too() {
    let api = Arc::new(
        RecordingModule::new("api")
            .route(Route::post("save", "/api/save"))
            .respond("application/json", "{}"),
    );
    let site = site(vec![Arc::clone(&api) as Arc<dyn Module>], true).await;

    site.router
        .oneshot(post_request("/api/save", "application/json", r#"{"id": 7}"#))
        .await
        .unwrap();

    assert_eq!(api.last_form().unwrap().get("id"), Some("7"));
}

#[tokio::test]
async fn oversized_forms_get_413() {
    let site = site(Vec::new(), true).await;
    let body = "x=".repeat(100);

    let response = site
        .router
        .oneshot(post_request("/echo", "application/x-www-form-urlencoded", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_json_gets_400() {
    let site = site(Vec::new(), true).await;

    let response = site
        .router
        .oneshot(post_request("/echo", "application/json", "{oops"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forwarded_forms_keep_their_body() {
    let site = site(Vec::new(), true).await;

    let response = site
        .router
        .oneshot(post_request(
            "/echo",
            "application/x-www-form-urlencoded",
            "a=1&b=2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "a=1&b=2");
}

// ============================================================================
// Fall-through
// ============================================================================

#[tokio::test]
async fn unclaimed_requests_reach_downstream() {
    let silent = Arc::new(RecordingModule::new("stats").route(Route::new("all", "/*")));
    let site = site(vec![Arc::clone(&silent) as Arc<dyn Module>], true).await;

    let response = site.router.oneshot(get_request("/about")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "downstream about");
    assert_eq!(silent.routed(), ["all"]);
}

#[tokio::test]
async fn downstream_handlers_can_render_the_page_context() {
    let site = site(Vec::new(), true).await;

    let response = site.router.oneshot(get_request("/themed")).await.unwrap();

    assert_eq!(text(response).await, "classic|Themed|from downstream");
}

#[tokio::test]
async fn unknown_paths_get_a_themed_404() {
    let site = site(Vec::new(), true).await;

    let response = site.router.oneshot(get_request("/nowhere")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        text(response).await,
        "classic|Page not found|<p>Nothing lives at <code>/nowhere</code>.</p>"
    );
}

// ============================================================================
// Assets
// ============================================================================

#[tokio::test]
async fn theme_assets_are_served_from_the_active_theme() {
    let site = site(Vec::new(), true).await;

    let file = site.router.clone().oneshot(get_request("/static/theme.txt")).await.unwrap();
    assert_eq!(file.status(), StatusCode::OK);
    assert_eq!(file.headers()[header::CACHE_CONTROL], "public, max-age=120");
    assert_eq!(text(file).await, "classic");

    let css = site.router.oneshot(get_request("/styles/site.css")).await.unwrap();
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(text(css).await, "/* classic */");
    assert!(site.harness.app.snapshot().is_some());
}

#[tokio::test]
async fn assets_are_missing_before_initialization() {
    let site = site(Vec::new(), false).await;

    let response = site.router.oneshot(get_request("/static/theme.txt")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
