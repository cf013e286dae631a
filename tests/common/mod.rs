#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use rust_xlsxwriter::Workbook;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Spreadsheet id that makes the fake service answer `success: false`.
pub const REFUSED_SHEET: &str = "sheet-refused";
/// Spreadsheet id that makes the fake service answer with a non-JSON body.
pub const GARBLED_SHEET: &str = "sheet-garbled";
/// Spreadsheet id that makes the fake service answer `success: true` with no payload.
pub const HOLLOW_SHEET: &str = "sheet-hollow";
pub const REFUSAL_MESSAGE: &str = "Planilha do condomínio não encontrada";
pub const LISTING_REFUSAL: &str = "Acesso negado";

/// Stand-in for the report service, recording every POSTed payload.
pub struct FakeService {
    pub url: String,
    pub base: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl FakeService {
    /// Endpoint whose GET answers 500.
    pub fn failing_url(&self) -> String {
        format!("{}/failing", self.base)
    }

    /// Endpoint whose GET answers `success: false`.
    pub fn refusing_url(&self) -> String {
        format!("{}/refusing", self.base)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn_fake_service() -> FakeService {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/exec", get(list).post(report))
        .route("/failing", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/refusing",
            get(|| async { Json(json!({"success": false, "message": LISTING_REFUSAL})) }),
        )
        .with_state(received.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeService {
        url: format!("http://{}/exec", addr),
        base: format!("http://{}", addr),
        received,
    }
}

/// An address nothing listens on.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/exec", addr)
}

async fn list() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": [
            {"id": "sheet-aurora", "name": "Residencial Aurora"},
            {"id": REFUSED_SHEET, "name": "Edifício Fechado"}
        ]
    }))
}

async fn report(
    State(received): State<Arc<Mutex<Vec<Value>>>>,
    Json(payload): Json<Value>,
) -> Response {
    received.lock().unwrap().push(payload.clone());

    match payload["spreadsheetId"].as_str() {
        Some(REFUSED_SHEET) => {
            return Json(json!({"success": false, "message": REFUSAL_MESSAGE})).into_response();
        }
        Some(GARBLED_SHEET) => return "<html>Service unavailable</html>".into_response(),
        Some(HOLLOW_SHEET) => return Json(json!({"success": true})).into_response(),
        _ => {}
    }

    let units: Vec<String> = payload["medicoes"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| row["unidade"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    match payload["action"].as_str() {
        Some("getPreviewHtml") => Json(json!({
            "success": true,
            "previews": {
                "global": format!("<h1>Global {}</h1>", units.len()),
                "individuals": units
                    .iter()
                    .map(|unit| json!({"unidade": unit, "html": format!("<p>Unit {}</p>", unit)}))
                    .collect::<Vec<_>>()
            }
        }))
        .into_response(),
        Some("processReport") => Json(json!({
            "success": true,
            "message": "Relatórios gerados com sucesso!",
            "downloadLinks": {
                "globalPdfUrl": "https://files.example/global.pdf",
                "individualZipUrl": "https://files.example/individuals.zip"
            }
        }))
        .into_response(),
        _ => Json(json!({"success": false, "message": "unknown action"})).into_response(),
    }
}

/// Builds an XLSX workbook whose first sheet holds `rows` (the first row is the header).
pub fn workbook_bytes(rows: &[Vec<Value>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match cell {
                Value::String(s) => {
                    worksheet.write_string(r, c, s).unwrap();
                }
                Value::Number(n) => {
                    worksheet.write_number(r, c, n.as_f64().unwrap()).unwrap();
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b).unwrap();
                }
                _ => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

pub fn readings_workbook() -> Vec<u8> {
    workbook_bytes(&[
        vec![
            json!("Unidade"),
            json!(" Leitura  Anterior "),
            json!("LEITURA ATUAL"),
            json!("Area Comum"),
            json!("Observação"),
        ],
        vec![json!("101"), json!(12.5), json!(20), json!("não"), json!("ok")],
        vec![json!(102), json!("30"), json!("abc"), Value::Null, Value::Null],
        vec![Value::Null, Value::Null, Value::Null, Value::Null, Value::Null],
        vec![json!("Portaria"), json!(5), json!(9.25), json!(" SIM "), Value::Null],
    ])
}
