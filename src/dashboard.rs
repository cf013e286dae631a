use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::{
    Condominium, DownloadLinks, PreviewResult, ProcessOutcome, ReportAction, ReportClient,
    ReportPayload,
};
use crate::error::{ClientError, ImportError, PreviewError};
use crate::form::{FormField, FormFields, can_submit};
use crate::loader::{encode_logo, import_spreadsheet};
use crate::preview::{PreviewPresenter, PreviewSelector, PreviewTab};
use crate::reading::ReadingField;
use crate::store::{ReadingStore, TableRow};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
}

/// Side effects for whatever renders the dashboard: toasts and the progress bar.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UiEvent {
    Notify(Notification),
    Progress(Progress),
    ProgressHidden,
}

/// User actions the dashboard reacts to.
#[derive(Clone, Debug)]
pub enum Action {
    CondominiumSelected(Condominium),
    ReturnedToSelector,
    FileImported { file_name: String, bytes: Vec<u8> },
    /// `None` clears the logo.
    LogoSelected(Option<Vec<u8>>),
    LogoUnreadable(String),
    CellEdited {
        index: usize,
        field: ReadingField,
        text: String,
    },
    CommonAreaToggled { index: usize, checked: bool },
    FieldChanged { field: FormField, value: String },
}

/// Everything a renderer needs to draw the dashboard.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub condominium: Option<Condominium>,
    pub rows: Vec<TableRow>,
    pub fields: FormFields,
    pub logo_loaded: bool,
    pub can_submit: bool,
    pub busy: bool,
    pub preview_tabs: Vec<PreviewTab>,
    pub download_links: Option<DownloadLinks>,
    pub progress: Option<Progress>,
}

/// A report request that has been sent and not yet answered.
#[derive(Clone, Copy, Debug)]
struct PendingRequest {
    action: ReportAction,
    session: u64,
}

/// Application state of one dashboard session. The orchestrator owns it and
/// passes it to every handler; nothing here is global.
#[derive(Debug, Default)]
pub struct Dashboard {
    condominiums: Vec<Condominium>,
    condominium: Option<Condominium>,
    store: ReadingStore,
    fields: FormFields,
    logo: Option<String>,
    presenter: PreviewPresenter,
    downloads: Option<DownloadLinks>,
    busy: Option<PendingRequest>,
    // Bumped on every reset so late answers can be told apart
    session: u64,
    progress: Option<Progress>,
    events: Vec<UiEvent>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!("dispatching {}", action_name(&action));
        match action {
            Action::CondominiumSelected(condo) => self.on_condominium_selected(condo),
            Action::ReturnedToSelector => self.on_returned_to_selector(),
            Action::FileImported { file_name, bytes } => self.on_file_imported(&file_name, &bytes),
            Action::LogoSelected(bytes) => self.on_logo_selected(bytes),
            Action::LogoUnreadable(reason) => {
                warn!("logo could not be read: {}", reason);
                self.logo = None;
                self.notify(Level::Error, "Could not load the logo.".to_string());
            }
            Action::CellEdited { index, field, text } => self.on_cell_edited(index, field, &text),
            Action::CommonAreaToggled { index, checked } => {
                if let Err(e) = self.store.set_common_area(index, checked) {
                    self.notify(Level::Error, e.to_string());
                }
            }
            Action::FieldChanged { field, value } => self.fields.set(field, &value),
        }
    }

    fn on_condominium_selected(&mut self, condo: Condominium) {
        info!("selected condominium {} ({})", condo.name, condo.id);
        self.condominium = Some(condo);
        self.reset(Local::now().date_naive());
    }

    fn on_returned_to_selector(&mut self) {
        self.condominium = None;
        self.reset(Local::now().date_naive());
    }

    fn on_file_imported(&mut self, file_name: &str, bytes: &[u8]) {
        match import_spreadsheet(file_name, bytes) {
            Ok(records) if records.is_empty() => {
                self.store.replace_all(&records);
                self.notify(Level::Warning, "The spreadsheet is empty.".to_string());
            }
            Ok(records) => {
                self.store.replace_all(&records);
                info!("imported {} readings from {}", self.store.len(), file_name);
                self.notify(
                    Level::Success,
                    format!("File \"{}\" loaded ({} readings).", file_name, self.store.len()),
                );
            }
            Err(ImportError::Format(_)) => {
                self.notify(Level::Error, "Invalid file format. Use .xlsx".to_string());
            }
            Err(e) => {
                error!("failed to import {}: {}", file_name, e);
                self.notify(Level::Error, "Could not read the .xlsx file.".to_string());
            }
        }
    }

    fn on_logo_selected(&mut self, bytes: Option<Vec<u8>>) {
        match bytes {
            Some(bytes) => {
                self.logo = Some(encode_logo(&bytes));
                self.notify(Level::Success, "Logo loaded.".to_string());
            }
            None => self.logo = None,
        }
    }

    fn on_cell_edited(&mut self, index: usize, field: ReadingField, text: &str) {
        match self.store.set_field(index, field, text) {
            Ok(reading) => debug!(
                "row {} now consumes {:.3}",
                index,
                reading.consumption()
            ),
            Err(e) => self.notify(Level::Error, e.to_string()),
        }
    }

    /// Empties the readings, logo, preview and download links and sets the
    /// billing period to the month of `today`.
    pub fn reset(&mut self, today: NaiveDate) {
        self.session += 1;
        self.store.clear();
        self.logo = None;
        self.presenter.clear();
        self.downloads = None;
        self.fields.reset_period(today);
        self.hide_progress();
    }

    pub fn can_submit(&self) -> bool {
        can_submit(&self.store, &self.fields)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Takes the busy lock and builds the request payload. Returns `None` (with
    /// a warning notification) when the form is incomplete, no condominium is
    /// selected or another request is still running.
    pub fn begin_submit(&mut self, action: ReportAction) -> Option<ReportPayload> {
        if self.busy.is_some() {
            self.notify(Level::Warning, "A request is already in progress.".to_string());
            return None;
        }
        if !self.can_submit() {
            let goal = match action {
                ReportAction::Preview => "preview the reports",
                ReportAction::Process => "generate the reports",
            };
            self.notify(
                Level::Warning,
                format!("Fill in every field and load a file to {}.", goal),
            );
            return None;
        }
        let Some(condo) = &self.condominium else {
            self.notify(Level::Warning, "Select a condominium first.".to_string());
            return None;
        };

        let payload = ReportPayload::build(
            action,
            &condo.id,
            self.store.all(),
            self.logo.as_deref(),
            &self.fields,
        );
        self.busy = Some(PendingRequest {
            action,
            session: self.session,
        });
        match action {
            ReportAction::Preview => self.set_progress(20, "Generating preview..."),
            ReportAction::Process => self.set_progress(10, "Preparing data..."),
        }
        Some(payload)
    }

    pub fn finish_preview(&mut self, result: Result<PreviewResult, ClientError>) {
        if !self.release() {
            return;
        }
        match result {
            Ok(preview) => {
                info!("preview ready with {} unit documents", preview.individuals.len());
                self.presenter.replace(preview);
            }
            Err(e) => self.notify_failure("Error generating preview", &e),
        }
        self.hide_progress();
    }

    pub fn finish_process(&mut self, result: Result<ProcessOutcome, ClientError>) {
        if !self.release() {
            return;
        }
        match result {
            Ok(outcome) => {
                self.set_progress(100, "Reports ready!");
                let message = outcome
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Reports generated.".to_string());
                self.notify(Level::Success, message);
                info!("reports available at {}", outcome.links.global_pdf_url);
                self.downloads = Some(outcome.links);
            }
            Err(e) => self.notify_failure("Error", &e),
        }
        self.hide_progress();
    }

    pub fn finish_condominium_listing(&mut self, result: Result<Vec<Condominium>, ClientError>) {
        match result {
            Ok(condos) => {
                if condos.is_empty() {
                    self.notify(Level::Warning, "No condominiums found.".to_string());
                }
                self.condominiums = condos;
            }
            Err(ClientError::NotConfigured) => {
                self.condominiums.clear();
                self.notify(Level::Error, "The report service URL is not configured.".to_string());
            }
            Err(e) => {
                self.condominiums.clear();
                self.notify(
                    Level::Error,
                    format!("Could not fetch the condominiums. Details: {}", e),
                );
            }
        }
    }

    /// Shows an intermediate stage of the running request, unless the
    /// dashboard was reset since it was sent.
    pub fn report_progress(&mut self, percent: u8, label: &str) {
        if !self.is_stale() {
            self.set_progress(percent, label);
        }
    }

    pub fn condominiums(&self) -> &[Condominium] {
        &self.condominiums
    }

    pub fn find_condominium(&self, id: &str) -> Option<&Condominium> {
        self.condominiums.iter().find(|c| c.id == id)
    }

    pub fn condominium(&self) -> Option<&Condominium> {
        self.condominium.as_ref()
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref()
    }

    pub fn presenter(&self) -> &PreviewPresenter {
        &self.presenter
    }

    pub fn download_links(&self) -> Option<&DownloadLinks> {
        self.downloads.as_ref()
    }

    pub fn preview_content(&self, selector: PreviewSelector) -> Result<&str, PreviewError> {
        self.presenter.content_for(selector)
    }

    pub fn snapshot(&self) -> DashboardView {
        DashboardView {
            condominium: self.condominium.clone(),
            rows: self.store.rows(),
            fields: self.fields.clone(),
            logo_loaded: self.logo.is_some(),
            can_submit: self.can_submit(),
            busy: self.is_busy(),
            preview_tabs: self.presenter.tabs(),
            download_links: self.downloads.clone(),
            progress: self.progress.clone(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.events)
    }

    fn is_stale(&self) -> bool {
        self.busy
            .is_some_and(|pending| pending.session != self.session)
    }

    /// Drops the busy lock. Returns false when the answer belongs to a session
    /// that was reset meanwhile and must be discarded.
    fn release(&mut self) -> bool {
        match self.busy.take() {
            Some(pending) if pending.session != self.session => {
                info!(
                    "discarding {:?} answer for a condominium no longer open",
                    pending.action
                );
                false
            }
            _ => true,
        }
    }

    fn notify_failure(&mut self, context: &str, err: &ClientError) {
        let message = match err {
            ClientError::Remote(message) => {
                warn!("report service refused the request: {}", message);
                format!("{}: {}", context, message)
            }
            ClientError::Transport(detail) => {
                error!("report service unreachable: {}", detail);
                format!(
                    "{}: could not reach the report service, check your connection ({})",
                    context, detail
                )
            }
            ClientError::NotConfigured => format!("{}: {}", context, err),
        };
        self.notify(Level::Error, message);
    }

    fn notify(&mut self, level: Level, message: String) {
        match level {
            Level::Error => error!("{}", message),
            Level::Warning => warn!("{}", message),
            Level::Info | Level::Success => info!("{}", message),
        }
        self.events
            .push(UiEvent::Notify(Notification { level, message }));
    }

    fn set_progress(&mut self, percent: u8, label: &str) {
        let progress = Progress {
            percent,
            label: label.to_string(),
        };
        self.progress = Some(progress.clone());
        self.events.push(UiEvent::Progress(progress));
    }

    fn hide_progress(&mut self) {
        if self.progress.take().is_some() {
            self.events.push(UiEvent::ProgressHidden);
        }
    }
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::CondominiumSelected(_) => "condominium-selected",
        Action::ReturnedToSelector => "returned-to-selector",
        Action::FileImported { .. } => "file-imported",
        Action::LogoSelected(_) => "logo-selected",
        Action::LogoUnreadable(_) => "logo-unreadable",
        Action::CellEdited { .. } => "cell-edited",
        Action::CommonAreaToggled { .. } => "common-area-toggled",
        Action::FieldChanged { .. } => "field-changed",
    }
}

/// Locks a shared dashboard, recovering the state if a previous holder panicked.
pub fn lock(dashboard: &Mutex<Dashboard>) -> MutexGuard<'_, Dashboard> {
    dashboard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a preview or process request end to end. The lock is only held
/// between awaits, and the busy flag keeps a second request out meanwhile.
pub async fn submit(dashboard: &Mutex<Dashboard>, client: &ReportClient, action: ReportAction) {
    let payload = {
        let mut state = lock(dashboard);
        state.begin_submit(action)
    };
    let Some(payload) = payload else {
        return;
    };

    match action {
        ReportAction::Preview => {
            let result = client.preview(&payload).await;
            lock(dashboard).finish_preview(result);
        }
        ReportAction::Process => {
            lock(dashboard).report_progress(30, "Sending to server...");
            let result = client.process(&payload).await;
            lock(dashboard).finish_process(result);
        }
    }
}

pub async fn load_condominiums(dashboard: &Mutex<Dashboard>, client: &ReportClient) {
    let result = client.list_condominiums().await;
    lock(dashboard).finish_condominium_listing(result);
}
