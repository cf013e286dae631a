#![cfg(feature = "web")]

mod common;

use common::{readings_workbook, spawn_fake_service};
use condo_meter::app::{AppState, router};
use condo_meter::client::ReportClient;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves the dashboard API against the fake report service and returns its base URL.
async fn spawn_dashboard(api_url: Option<String>) -> String {
    let state = Arc::new(AppState::new(ReportClient::new(api_url)));
    let app = router(state, Path::new("static"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post_json(http: &reqwest::Client, url: String, body: Value) -> Value {
    http.post(url).json(&body).send().await.unwrap().json().await.unwrap()
}

async fn import(http: &reqwest::Client, base: &str, file_name: &str) -> Value {
    let part = Part::bytes(readings_workbook()).file_name(file_name.to_string());
    let form = Form::new().part("spreadsheet", part);
    http.post(format!("{}/api/import", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn full_dashboard_session() {
    let service = spawn_fake_service().await;
    let base = spawn_dashboard(Some(service.url.clone())).await;
    let http = reqwest::Client::new();

    let listing: Value = http
        .get(format!("{}/api/condominiums", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["condominiums"].as_array().unwrap().len(), 2);

    let selected = post_json(&http, format!("{}/api/condominiums/select", base), json!({"id": "sheet-aurora"})).await;
    assert_eq!(selected["state"]["condominium"]["name"], "Residencial Aurora");
    assert_eq!(selected["state"]["canSubmit"], false);

    let imported = import(&http, &base, "leituras.xlsx").await;
    assert_eq!(imported["state"]["rows"].as_array().unwrap().len(), 3);
    assert_eq!(imported["events"][0]["kind"], "notify");
    assert_eq!(imported["events"][0]["level"], "success");

    let edited = post_json(
        &http,
        format!("{}/api/cell", base),
        json!({"index": 0, "field": "currentReading", "value": "abc"}),
    )
    .await;
    assert_eq!(edited["state"]["rows"][0]["consumption"], "-12.500");
    assert_eq!(edited["state"]["rows"][0]["negative"], true);

    let fields = post_json(
        &http,
        format!("{}/api/fields", base),
        json!({"energyTariff": "0,85", "managementFee": "10,5", "commonAreaApportionment": true}),
    )
    .await;
    assert_eq!(fields["state"]["canSubmit"], true);
    assert_eq!(fields["state"]["fields"]["commonAreaApportionment"], true);

    let previewed = post_json(&http, format!("{}/api/preview", base), json!({})).await;
    assert_eq!(previewed["state"]["previewTabs"].as_array().unwrap().len(), 4);

    let page = http
        .get(format!("{}/api/preview/individual-0", base))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.text().await.unwrap(), "<p>Unit 101</p>");

    let missing = http
        .get(format!("{}/api/preview/individual-9", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let processed = post_json(&http, format!("{}/api/process", base), json!({})).await;
    assert_eq!(
        processed["state"]["downloadLinks"]["globalPdfUrl"],
        "https://files.example/global.pdf"
    );

    let sent = service.payloads();
    assert_eq!(sent[0]["taxaGestao"], "10.5");
    assert_eq!(sent[0]["rateioAreaComum"], true);
    assert_eq!(sent[0]["medicoes"][0]["leitura_atual"], 0.0);

    let back = post_json(&http, format!("{}/api/back", base), json!({})).await;
    assert_eq!(back["state"]["condominium"], Value::Null);
    assert_eq!(back["state"]["rows"].as_array().unwrap().len(), 0);
    assert_eq!(back["state"]["downloadLinks"], Value::Null);
}

#[tokio::test]
async fn rejected_upload_changes_nothing() {
    let base = spawn_dashboard(None).await;
    let http = reqwest::Client::new();

    let response = import(&http, &base, "leituras.csv").await;
    assert_eq!(response["state"]["rows"].as_array().unwrap().len(), 0);
    assert_eq!(response["events"][0]["level"], "error");

    let unknown = http
        .post(format!("{}/api/condominiums/select", base))
        .json(&json!({"id": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn truncated_upload_imports_nothing() {
    let base = spawn_dashboard(None).await;
    let http = reqwest::Client::new();

    // The closing boundary never arrives
    let body = "--cut\r\n\
        Content-Disposition: form-data; name=\"spreadsheet\"; filename=\"leituras.xlsx\"\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        PK\x03\x04partial";
    let response = http
        .post(format!("{}/api/import", base))
        .header("content-type", "multipart/form-data; boundary=cut")
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(!response.status().is_server_error());

    let state: Value = http
        .get(format!("{}/api/state", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["state"]["rows"].as_array().unwrap().len(), 0);
}
