mod common;

use axum::http::{header, Method, StatusCode};
use common::*;
use serde_json::json;

const EMAIL: &str = "analyst@research.org";

async fn signed_in(harness: &DocsHarness, organization: &str) -> String {
    let signup = send(
        &harness.app,
        json_request(
            Method::POST,
            "/auth/signup",
            None,
            json!({ "email": EMAIL, "password": PASSWORD, "organization": organization }),
        ),
    )
    .await;
    assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.text());
    login(&harness.app, EMAIL).await
}

async fn upload(harness: &DocsHarness, cookie: &str, parts: &[Part<'_>]) -> TestResponse {
    send(&harness.app, multipart_request("/documents", cookie, parts)).await
}

#[tokio::test]
async fn test_profile_keeps_organization() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    let profile = send(&harness.app, get("/profile", Some(&cookie))).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json()["organization"], "Research Org");
    assert_eq!(profile.json()["email"], EMAIL);
}

#[tokio::test]
async fn test_summary_and_query_need_documents() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    let summary = send(&harness.app, post_empty("/summary", &cookie)).await;
    assert_eq!(summary.status, StatusCode::BAD_REQUEST);

    let blank = send(
        &harness.app,
        json_request(Method::POST, "/query", Some(&cookie), json!({ "question": "   " })),
    )
    .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_summarize_query_and_history() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    let response = upload(
        &harness,
        &cookie,
        &[
            ("files", Some("a.txt"), "text/plain", b"Revenue grew in the third quarter.".as_slice()),
            ("files", Some("b.txt"), "text/plain", b"Costs were flat.".as_slice()),
        ],
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let body = response.json();
    assert_eq!(body["documents"].as_array().unwrap().len(), 2);
    assert!(body["failed"].is_null());
    assert!(body["documents"][0]["thumbnail"].is_string());

    let listed = send(&harness.app, get("/documents", Some(&cookie))).await;
    assert_eq!(listed.json().as_array().unwrap().len(), 2);
    assert_eq!(listed.json()[0]["filename"], "a.txt");

    let summary = send(&harness.app, post_empty("/summary", &cookie)).await;
    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.json()["summary"], FINAL_SUMMARY);

    let answer = send(
        &harness.app,
        json_request(
            Method::POST,
            "/query",
            Some(&cookie),
            json!({ "question": "How did revenue change?" }),
        ),
    )
    .await;
    assert_eq!(answer.status, StatusCode::OK);
    assert_eq!(answer.json()["answer"], COMBINED_ANSWER);

    let history = send(&harness.app, get("/history", Some(&cookie))).await;
    assert_eq!(
        history.json()["entries"],
        json!([
            format!("Summary: {}", FINAL_SUMMARY),
            format!("Q: How did revenue change?\nA: {}", COMBINED_ANSWER),
        ])
    );

    let download = send(&harness.app, get("/history/download", Some(&cookie))).await;
    assert_eq!(download.status, StatusCode::OK);
    assert!(download
        .header(header::CONTENT_DISPOSITION)
        .contains("conversation_history.txt"));
    assert_eq!(
        download.text(),
        format!(
            "Summary: {}\n\nQ: How did revenue change?\nA: {}",
            FINAL_SUMMARY, COMBINED_ANSWER
        )
    );

    let pdf = send(&harness.app, get("/history/pdf", Some(&cookie))).await;
    assert_eq!(pdf.status, StatusCode::OK);
    assert_eq!(pdf.header(header::CONTENT_TYPE), "application/pdf");
    assert!(pdf.header(header::CONTENT_DISPOSITION).contains("document_analysis_"));
    assert!(pdf.body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_batch_stops_at_first_failure_and_keeps_earlier_files() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    let response = upload(
        &harness,
        &cookie,
        &[
            ("files", Some("good.txt"), "text/plain", b"Readable text.".as_slice()),
            ("files", Some("bad.bin"), "application/x-broken", b"\x00\x01".as_slice()),
            ("files", Some("never.txt"), "text/plain", b"Not attempted.".as_slice()),
        ],
    )
    .await;
    assert_eq!(response.status, StatusCode::MULTI_STATUS);
    let body = response.json();
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"]["filename"], "bad.bin");

    let listed = send(&harness.app, get("/documents", Some(&cookie))).await;
    assert_eq!(listed.json().as_array().unwrap().len(), 1);

    // The file that did go through is usable.
    let summary = send(&harness.app, post_empty("/summary", &cookie)).await;
    assert_eq!(summary.status, StatusCode::OK);
}

#[tokio::test]
async fn test_first_file_failing_is_an_error() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    let response = upload(
        &harness,
        &cookie,
        &[("files", Some("bad.bin"), "application/x-broken", b"\x00".as_slice())],
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let empty = upload(&harness, &cookie, &[]).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pasted_text_is_stored_apart_from_uploads() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;

    upload(
        &harness,
        &cookie,
        &[("files", Some("a.txt"), "text/plain", b"Uploaded text.".as_slice())],
    )
    .await;

    let pasted = send(
        &harness.app,
        json_request(
            Method::POST,
            "/documents/text",
            Some(&cookie),
            json!({ "text": "Pasted notes about the quarter." }),
        ),
    )
    .await;
    assert_eq!(pasted.status, StatusCode::CREATED);
    assert_eq!(pasted.json()["filename"], "Pasted Text");
    assert!(pasted.json()["file_url"].is_null());

    // Pasted rows are stored but are not listed as uploaded documents.
    let listed = send(&harness.app, get("/documents", Some(&cookie))).await;
    assert_eq!(listed.json().as_array().unwrap().len(), 1);

    let empty = send(
        &harness.app,
        json_request(Method::POST, "/documents/text", Some(&cookie), json!({ "text": "" })),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_is_per_session_and_dropped_at_logout() {
    let harness = docs_app();
    let first = signed_in(&harness, "").await;
    let second = login(&harness.app, EMAIL).await;

    upload(
        &harness,
        &first,
        &[("files", Some("a.txt"), "text/plain", b"Some text.".as_slice())],
    )
    .await;
    send(&harness.app, post_empty("/summary", &first)).await;

    let other = send(&harness.app, get("/history", Some(&second))).await;
    assert_eq!(other.json()["entries"], json!([]));
    let nothing = send(&harness.app, get("/history/download", Some(&second))).await;
    assert_eq!(nothing.status, StatusCode::NOT_FOUND);

    // Both sessions now hold a workspace.
    assert_eq!(harness.workspaces.len().await, 2);
    let logout = send(&harness.app, post_empty("/auth/logout", &first)).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(harness.workspaces.len().await, 1);

    let after = send(&harness.app, get("/history", Some(&first))).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_summaries_and_queries_are_persisted() {
    let harness = docs_app();
    let cookie = signed_in(&harness, "Research Org").await;
    upload(
        &harness,
        &cookie,
        &[("files", Some("a.txt"), "text/plain", b"Some text.".as_slice())],
    )
    .await;

    send(&harness.app, post_empty("/summary", &cookie)).await;
    send(
        &harness.app,
        json_request(Method::POST, "/query", Some(&cookie), json!({ "question": "Why?" })),
    )
    .await;

    assert_eq!(harness.store.total_rows("summaries"), 1);
    assert_eq!(harness.store.total_rows("queries"), 1);
}
