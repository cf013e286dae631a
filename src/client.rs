use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::form::FormFields;
use crate::reading::Reading;

/// A condominium the service can bill, as listed on the selector screen.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condominium {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportAction {
    #[serde(rename = "getPreviewHtml")]
    Preview,
    #[serde(rename = "processReport")]
    Process,
}

/// Body of the POST sent to the report service.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub action: ReportAction,
    pub spreadsheet_id: String,
    pub medicoes: Vec<Reading>,
    pub logo_content: Option<String>,
    pub periodo_de: String,
    pub periodo_ate: String,
    pub proxima_leitura: String,
    pub tarifa_energia: String,
    pub taxa_gestao: String,
    pub rateio_area_comum: bool,
}

impl ReportPayload {
    pub fn build(
        action: ReportAction,
        spreadsheet_id: &str,
        readings: &[Reading],
        logo: Option<&str>,
        fields: &FormFields,
    ) -> Self {
        ReportPayload {
            action,
            spreadsheet_id: spreadsheet_id.to_string(),
            medicoes: readings.to_vec(),
            logo_content: logo.map(str::to_string),
            periodo_de: fields.period_from.clone(),
            periodo_ate: fields.period_to.clone(),
            proxima_leitura: fields.next_reading.clone(),
            tarifa_energia: normalize_decimal(&fields.energy_tariff),
            taxa_gestao: normalize_decimal(&fields.management_fee),
            rateio_area_comum: fields.common_area_apportionment,
        }
    }
}

/// Replaces the first decimal comma with a dot ("0,85" -> "0.85").
pub fn normalize_decimal(value: &str) -> String {
    value.replacen(',', ".", 1)
}

/// Rendered preview documents: the global report and one per unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct PreviewResult {
    pub global: String,
    pub individuals: Vec<UnitDocument>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UnitDocument {
    #[serde(rename = "unidade")]
    pub unit: String,
    #[serde(rename = "html")]
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinks {
    pub global_pdf_url: String,
    pub individual_zip_url: String,
}

/// Result of a successful process request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub message: Option<String>,
    pub links: DownloadLinks,
}

/// Envelope shared by every answer of the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Condominium>>,
    #[serde(default)]
    previews: Option<PreviewResult>,
    #[serde(default)]
    download_links: Option<DownloadLinks>,
}

impl ServiceResponse {
    fn into_success(self) -> Result<Self, ClientError> {
        if self.success {
            Ok(self)
        } else {
            Err(ClientError::Remote(self.message.unwrap_or_default()))
        }
    }
}

/// Client for the remote report service. Every call is a fresh request;
/// nothing is cached or deduplicated.
#[derive(Clone, Debug)]
pub struct ReportClient {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl ReportClient {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Lists the condominiums available for billing.
    pub async fn list_condominiums(&self) -> Result<Vec<Condominium>, ClientError> {
        let endpoint = self.endpoint()?;
        let response = self.http.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("condominium listing failed with status {}", status);
            return Err(ClientError::Transport(format!("network error: {}", status)));
        }
        let body: ServiceResponse = decode(response).await?;
        Ok(body.into_success()?.data.unwrap_or_default())
    }

    /// Requests HTML previews of the reports.
    pub async fn preview(&self, payload: &ReportPayload) -> Result<PreviewResult, ClientError> {
        let body = self.post(payload, ReportAction::Preview).await?;
        body.previews
            .ok_or_else(|| ClientError::Transport("response carried no previews".to_string()))
    }

    /// Requests the final reports and returns their download links.
    pub async fn process(&self, payload: &ReportPayload) -> Result<ProcessOutcome, ClientError> {
        let body = self.post(payload, ReportAction::Process).await?;
        let links = body.download_links.ok_or_else(|| {
            ClientError::Transport("response carried no download links".to_string())
        })?;
        Ok(ProcessOutcome {
            message: body.message,
            links,
        })
    }

    async fn post(
        &self,
        payload: &ReportPayload,
        action: ReportAction,
    ) -> Result<ServiceResponse, ClientError> {
        let endpoint = self.endpoint()?;
        let mut payload = payload.clone();
        payload.action = action;
        info!(
            "sending {:?} request for {} with {} readings",
            action,
            payload.spreadsheet_id,
            payload.medicoes.len()
        );
        let response = self.http.post(endpoint).json(&payload).send().await?;
        let body: ServiceResponse = decode(response).await?;
        body.into_success()
    }

    fn endpoint(&self) -> Result<&str, ClientError> {
        self.endpoint.as_deref().ok_or(ClientError::NotConfigured)
    }
}

// Bodies that are not the expected JSON count as transport failures
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ClientError::Transport(format!("malformed response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> FormFields {
        FormFields {
            period_from: "2024-05-01".to_string(),
            period_to: "2024-05-31".to_string(),
            next_reading: "2024-06-30".to_string(),
            energy_tariff: "0,85".to_string(),
            management_fee: "12,5".to_string(),
            common_area_apportionment: true,
        }
    }

    #[test]
    fn payload_uses_service_field_names() {
        let readings = vec![Reading {
            unit: "101".to_string(),
            previous_reading: 10.0,
            current_reading: 12.5,
            is_common_area: false,
        }];
        let payload =
            ReportPayload::build(ReportAction::Preview, "sheet-1", &readings, None, &fields());

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "action": "getPreviewHtml",
                "spreadsheetId": "sheet-1",
                "medicoes": [{"unidade": "101", "leitura_anterior": 10.0, "leitura_atual": 12.5, "isCommonArea": false}],
                "logoContent": null,
                "periodoDe": "2024-05-01",
                "periodoAte": "2024-05-31",
                "proximaLeitura": "2024-06-30",
                "tarifaEnergia": "0.85",
                "taxaGestao": "12.5",
                "rateioAreaComum": true
            })
        );
    }

    #[test]
    fn process_action_name() {
        let payload =
            ReportPayload::build(ReportAction::Process, "s", &[], Some("aGk="), &fields());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["action"], "processReport");
        assert_eq!(value["logoContent"], "aGk=");
    }

    #[test]
    fn only_first_comma_is_replaced() {
        assert_eq!(normalize_decimal("0,85"), "0.85");
        assert_eq!(normalize_decimal("1,234,5"), "1.234,5");
        assert_eq!(normalize_decimal("3.2"), "3.2");
        assert_eq!(normalize_decimal(""), "");
    }

    #[test]
    fn failure_envelope_keeps_message_verbatim() {
        let body: ServiceResponse =
            serde_json::from_value(json!({"success": false, "message": "Planilha bloqueada"}))
                .unwrap();
        match body.into_success() {
            Err(ClientError::Remote(message)) => assert_eq!(message, "Planilha bloqueada"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn decodes_preview_envelope() {
        let body: ServiceResponse = serde_json::from_value(json!({
            "success": true,
            "previews": {
                "global": "<h1>Global</h1>",
                "individuals": [{"unidade": "101", "html": "<p>101</p>"}]
            }
        }))
        .unwrap();
        let previews = body.into_success().unwrap().previews.unwrap();
        assert_eq!(previews.individuals[0].unit, "101");
        assert_eq!(previews.individuals[0].content, "<p>101</p>");
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_calls() {
        let client = ReportClient::new(Some("   ".to_string()));
        assert!(!client.is_configured());
        assert!(matches!(
            client.list_condominiums().await,
            Err(ClientError::NotConfigured)
        ));
    }
}
