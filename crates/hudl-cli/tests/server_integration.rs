// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP surface tests for the development server.

use std::fs;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use hudl::Registry;
use hudl_cli::config::Config;
use hudl_cli::server::http::{build_app, AppState, COMPONENT_HEADER, RENDER_TIME_HEADER};
use hudl_cli::server::loader::load_tree;
use tempfile::TempDir;
use tokio::sync::broadcast;

fn varint(mut n: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn string_field(tag: u32, value: &str, out: &mut Vec<u8>) {
    varint(u64::from(tag) << 3 | 2, out);
    varint(value.len() as u64, out);
    out.extend_from_slice(value.as_bytes());
}

fn write_templates(dir: &TempDir) {
    fs::write(
        dir.path().join("card.hudl"),
        "/** message CardData { string title = 1; } */\n// name: Card\n// data: CardData\nel { .card { h1 \"`title`\" } }",
    )
    .unwrap();
    fs::write(
        dir.path().join("page.hudl"),
        "// name: Page\nel { html { body { p \"hello\" } } }",
    )
    .unwrap();
}

fn test_server(dir: &TempDir) -> TestServer {
    write_templates(dir);
    let (set, failures) = load_tree(dir.path()).unwrap();
    assert!(failures.is_empty());
    let (reload_tx, _) = broadcast::channel(16);
    let state = Arc::new(AppState {
        registry: Arc::new(Registry::new(set)),
        reload_tx: Arc::new(reload_tx),
        config: Config::default(),
    });
    TestServer::new(build_app(state)).unwrap()
}

fn component_header() -> HeaderName {
    HeaderName::from_static(COMPONENT_HEADER)
}

#[tokio::test]
async fn health_reports_loaded_templates() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["templates_loaded"], 2);
    assert!(body["last_reload"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn render_returns_html_with_timing_header() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let mut body = Vec::new();
    string_field(1, "Hi <there>", &mut body);

    let response = server
        .post("/render")
        .add_header(component_header(), HeaderValue::from_static("Card"))
        .bytes(body.into())
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-type"),
        HeaderValue::from_static("text/html; charset=utf-8")
    );
    assert!(response.headers().contains_key(RENDER_TIME_HEADER));
    assert_eq!(
        response.text(),
        "<div class=\"card\"><h1>Hi &lt;there&gt;</h1></div>"
    );
}

#[tokio::test]
async fn render_without_header_is_400() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server.post("/render").await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("X-Hudl-Component"));
}

#[tokio::test]
async fn render_unknown_component_is_404() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server
        .post("/render")
        .add_header(component_header(), HeaderValue::from_static("Nope"))
        .await;
    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Nope"));
}

#[tokio::test]
async fn render_decode_failure_is_400() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    // Field 1 is declared `string` but arrives as a varint.
    let mut body = Vec::new();
    varint(1 << 3, &mut body);
    varint(5, &mut body);

    let response = server
        .post("/render")
        .add_header(component_header(), HeaderValue::from_static("Card"))
        .bytes(body.into())
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn page_renders_inject_livereload() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server
        .post("/render")
        .add_header(component_header(), HeaderValue::from_static("Page"))
        .await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("EventSource('/events')"));
    assert!(html.contains("<p>hello</p>"));

    // Fragments stay clean.
    let response = server
        .post("/render")
        .add_header(component_header(), HeaderValue::from_static("Card"))
        .await;
    assert!(!response.text().contains("EventSource"));
}

#[tokio::test]
async fn components_api_lists_records() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server.get("/api/components").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);

    let card = list.iter().find(|c| c["name"] == "Card").unwrap();
    assert_eq!(card["data_type"], "CardData");
    assert!(card["file"].as_str().unwrap().ends_with("card.hudl"));
    let page = list.iter().find(|c| c["name"] == "Page").unwrap();
    assert_eq!(page["data_type"], serde_json::Value::Null);
}

#[tokio::test]
async fn preview_data_creates_default_on_first_access() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server.get("/api/preview-data/Card").await;
    response.assert_status_ok();
    assert!(response.text().contains("title: \"\""));
    assert!(dir.path().join("Card.preview.txtpb").exists());
}

#[tokio::test]
async fn preview_data_put_round_trips() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server
        .put("/api/preview-data/Card")
        .text("title: \"Preview\"\n")
        .await;
    response.assert_status_ok();

    let response = server.get("/api/preview-data/Card").await;
    assert_eq!(response.text(), "title: \"Preview\"\n");
}

#[tokio::test]
async fn preview_data_put_validates_against_schema() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server
        .put("/api/preview-data/Card")
        .text("bogus_field: 3\n")
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn preview_files_lists_labelled_variants() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);

    let response = server
        .post("/api/preview-files/Card")
        .json(&serde_json::json!({ "label": "wide" }))
        .await;
    response.assert_status_ok();
    assert!(dir.path().join("Card_wide.preview.txtpb").exists());

    let response = server.get("/api/preview-files/Card").await;
    let body: serde_json::Value = response.json();
    let labels: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"wide"));
}

#[tokio::test]
async fn preview_unknown_component_is_404() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir);
    let response = server.get("/api/preview-data/Nope").await;
    response.assert_status_not_found();
}
