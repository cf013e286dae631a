use axum::{
    Json, Router,
    extract::{Multipart, Path, State, multipart::Field},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::client::{Condominium, ReportAction, ReportClient};
use crate::config::Config;
use crate::dashboard::{
    Action, Dashboard, DashboardView, UiEvent, load_condominiums, lock, submit,
};
use crate::form::FormField;
use crate::preview::PreviewSelector;
use crate::reading::ReadingField;

const PREVIEW_FALLBACK: &str = "<p>Could not load the preview.</p>";

pub struct AppState {
    dashboard: Mutex<Dashboard>,
    client: ReportClient,
}

impl AppState {
    pub fn new(client: ReportClient) -> Self {
        Self {
            dashboard: Mutex::new(Dashboard::new()),
            client,
        }
    }
}

/// Dashboard state after a request, with the UI events it produced.
#[derive(Serialize)]
struct DashboardResponse {
    state: DashboardView,
    events: Vec<UiEvent>,
}

#[derive(Serialize)]
struct CondominiumsResponse {
    condominiums: Vec<Condominium>,
    events: Vec<UiEvent>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

#[derive(Deserialize)]
struct SelectRequest {
    id: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct CellUpdate {
    index: usize,
    field: ReadingField,
    value: String,
}

#[derive(Deserialize)]
struct CommonAreaUpdate {
    index: usize,
    checked: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FieldsUpdate {
    period_from: Option<String>,
    period_to: Option<String>,
    next_reading: Option<String>,
    energy_tariff: Option<String>,
    management_fee: Option<String>,
    common_area_apportionment: Option<bool>,
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.api_url.is_none() {
        warn!("CONDO_API_URL is not set; report requests will fail");
    }
    let state = Arc::new(AppState::new(ReportClient::new(config.api_url.clone())));
    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/condominiums", get(list_condominiums))
        .route("/api/condominiums/select", post(select_condominium))
        .route("/api/back", post(back_to_selector))
        .route("/api/import", post(import_spreadsheet))
        .route("/api/logo", post(upload_logo).delete(clear_logo))
        .route("/api/cell", post(edit_cell))
        .route("/api/common-area", post(toggle_common_area))
        .route("/api/fields", post(update_fields))
        .route("/api/preview", post(request_preview))
        .route("/api/preview/:selector", get(preview_content))
        .route("/api/process", post(request_process))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn respond(state: &AppState) -> Json<DashboardResponse> {
    let mut dashboard = lock(&state.dashboard);
    Json(DashboardResponse {
        state: dashboard.snapshot(),
        events: dashboard.drain_events(),
    })
}

fn dispatch(state: &AppState, action: Action) -> Json<DashboardResponse> {
    lock(&state.dashboard).dispatch(action);
    respond(state)
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            status: "error".to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(&state)
}

async fn list_condominiums(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    load_condominiums(&state.dashboard, &state.client).await;
    let mut dashboard = lock(&state.dashboard);
    Json(CondominiumsResponse {
        condominiums: dashboard.condominiums().to_vec(),
        events: dashboard.drain_events(),
    })
}

async fn select_condominium(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SelectRequest>,
) -> Response {
    let known = lock(&state.dashboard).find_condominium(&payload.id).cloned();
    let condo = match (known, payload.name) {
        (Some(condo), _) => condo,
        (None, Some(name)) => Condominium {
            id: payload.id,
            name,
        },
        (None, None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    status: "error".to_string(),
                    message: format!("unknown condominium: {}", payload.id),
                }),
            )
                .into_response();
        }
    };
    dispatch(&state, Action::CondominiumSelected(condo)).into_response()
}

async fn back_to_selector(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    dispatch(&state, Action::ReturnedToSelector)
}

async fn import_spreadsheet(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = None;

    while let Some(field) = next_field(&mut multipart).await {
        if field.name() == Some("spreadsheet") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            // A truncated body still reaches the importer, which reports it unreadable
            let bytes = match field.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => {
                    warn!("upload of {} was cut short: {}", file_name, e);
                    Vec::new()
                }
            };
            upload = Some((file_name, bytes));
        }
    }

    match upload {
        Some((file_name, bytes)) => {
            dispatch(&state, Action::FileImported { file_name, bytes }).into_response()
        }
        None => bad_request("No spreadsheet received"),
    }
}

async fn upload_logo(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut logo = None;

    while let Some(field) = next_field(&mut multipart).await {
        if field.name() == Some("logo") {
            logo = Some(field.bytes().await.map(|b| b.to_vec()));
        }
    }

    match logo {
        Some(Ok(bytes)) => dispatch(&state, Action::LogoSelected(Some(bytes))).into_response(),
        Some(Err(e)) => dispatch(&state, Action::LogoUnreadable(e.to_string())).into_response(),
        None => bad_request("No logo received"),
    }
}

async fn next_field(multipart: &mut Multipart) -> Option<Field<'_>> {
    match multipart.next_field().await {
        Ok(field) => field,
        Err(e) => {
            warn!("malformed multipart upload: {}", e);
            None
        }
    }
}

async fn clear_logo(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    dispatch(&state, Action::LogoSelected(None))
}

async fn edit_cell(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CellUpdate>,
) -> impl IntoResponse {
    dispatch(
        &state,
        Action::CellEdited {
            index: payload.index,
            field: payload.field,
            text: payload.value,
        },
    )
}

async fn toggle_common_area(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CommonAreaUpdate>,
) -> impl IntoResponse {
    dispatch(
        &state,
        Action::CommonAreaToggled {
            index: payload.index,
            checked: payload.checked,
        },
    )
}

async fn update_fields(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FieldsUpdate>,
) -> impl IntoResponse {
    let changes = [
        (FormField::PeriodFrom, payload.period_from),
        (FormField::PeriodTo, payload.period_to),
        (FormField::NextReading, payload.next_reading),
        (FormField::EnergyTariff, payload.energy_tariff),
        (FormField::ManagementFee, payload.management_fee),
        (
            FormField::CommonAreaApportionment,
            payload.common_area_apportionment.map(|b| b.to_string()),
        ),
    ];
    {
        let mut dashboard = lock(&state.dashboard);
        for (field, value) in changes {
            if let Some(value) = value {
                dashboard.dispatch(Action::FieldChanged { field, value });
            }
        }
    }
    respond(&state)
}

async fn request_preview(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    submit(&state.dashboard, &state.client, ReportAction::Preview).await;
    respond(&state)
}

async fn request_process(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    submit(&state.dashboard, &state.client, ReportAction::Process).await;
    respond(&state)
}

async fn preview_content(
    Path(selector): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let dashboard = lock(&state.dashboard);
    let content = selector
        .parse::<PreviewSelector>()
        .and_then(|selector| dashboard.preview_content(selector).map(str::to_string));

    match content {
        Ok(html) => Html(html).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Html(PREVIEW_FALLBACK)).into_response(),
    }
}
