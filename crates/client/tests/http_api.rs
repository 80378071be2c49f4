//! `HttpPagesApi` against a mock admin backend: headers, envelopes and
//! error mapping as they appear on the wire.

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lexcms_client::{ClientError, HttpPagesApi, PagesApi, SaveOptions};
use lexcms_core::content::ContentBlock;
use lexcms_core::draft::PageDraft;
use lexcms_core::page::{DraftPayload, PageContent, PageStatus};
use lexcms_core::workflow::WorkflowState;

fn api(server: &MockServer) -> HttpPagesApi {
    HttpPagesApi::with_client(reqwest::Client::new(), server.uri(), Some("tok".into()))
}

fn home_page(version: i64) -> PageContent {
    let mut page = PageContent::new("home");
    page.content_blocks = vec![ContentBlock::text("hero_title", "Welcome", "أهلاً")];
    page.version = Some(version);
    page
}

fn payload() -> DraftPayload {
    PageDraft::load(&home_page(1)).payload(None)
}

// ---------------------------------------------------------------------------
// Test: a save sends the bearer token and a quoted If-Match version
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_save_sends_auth_and_quoted_if_match() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/pages/home/draft"))
        .and(header("Authorization", "Bearer tok"))
        .and(header("If-Match", "\"1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": home_page(2) })))
        .expect(1)
        .mount(&server)
        .await;

    let saved = api(&server)
        .save_draft(
            "home",
            &payload(),
            SaveOptions {
                expected_version: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(saved.version, Some(2));
    assert_eq!(saved.content_blocks.len(), 1);
}

#[tokio::test]
async fn test_save_status_is_sent_in_body() {
    let server = MockServer::start().await;
    let mut expected = payload();
    expected.status = Some(PageStatus::Preview);
    Mock::given(method("PUT"))
        .and(path("/pages/home/draft"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(home_page(2)))
        .expect(1)
        .mount(&server)
        .await;

    // A bare body without the envelope is accepted too.
    let saved = api(&server)
        .save_draft(
            "home",
            &payload(),
            SaveOptions {
                status: Some(PageStatus::Preview),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.slug, "home");
}

// ---------------------------------------------------------------------------
// Test: a stale version comes back as a conflict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_precondition_failed_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/pages/home/draft"))
        .respond_with(
            ResponseTemplate::new(412)
                .set_body_json(json!({ "error": "Version 1 is stale", "code": "STALE" })),
        )
        .mount(&server)
        .await;

    let err = api(&server)
        .save_draft(
            "home",
            &payload(),
            SaveOptions {
                expected_version: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::Conflict(ref m) if m == "Version 1 is stale");
}

#[tokio::test]
async fn test_conflict_without_body_has_reload_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pages/home/workflow/approve"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = api(&server).approve_and_publish("home", None).await.unwrap_err();

    assert_matches!(err, ClientError::Conflict(ref m) if m.contains("Reload"));
}

// ---------------------------------------------------------------------------
// Test: server error messages reach the operator verbatim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_validation_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/pages/home/draft"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "error": "Block 'hero_title' is too long" })),
        )
        .mount(&server)
        .await;

    let err = api(&server)
        .save_draft("home", &payload(), SaveOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert_eq!(err.user_message("Failed to save draft"), "Block 'hero_title' is too long");
}

#[tokio::test]
async fn test_html_error_page_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/home"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&server)
        .await;

    let err = api(&server).get_page("home").await.unwrap_err();

    assert_matches!(err, ClientError::Api { status: 502, message: None });
    assert_eq!(err.user_message("Failed to load page"), "Failed to load page");
}

// ---------------------------------------------------------------------------
// Test: workflow transitions post to their route and unwrap the record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_request_approval_posts_draft_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pages/home/workflow/request-approval"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_json(json!({ "draft_id": "d-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "state": "pendingReview", "draft_id": "d-7", "events": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = api(&server).request_approval("home", Some("d-7")).await.unwrap();

    assert_eq!(record.state, WorkflowState::PendingReview);
    assert_eq!(record.draft_id.as_deref(), Some("d-7"));
}

#[tokio::test]
async fn test_invalid_slug_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = api(&server).get_page("../admin").await.unwrap_err();

    assert_matches!(err, ClientError::Core(_));
}
