//! # AI Advisor
//!
//! Generative-AI helpers for incident triage, the assistant chat and the
//! operational forecast. Every answer is advisory: a failed or disabled
//! advisor yields `None` or a fixed fallback text and never blocks a write.
//!
//! ```text
//! classify_incident(problem, photo?) ──► Option<IncidentAssessment>
//! ask(question, context)             ──► String (fallback on failure)
//! forecast(bookings, inventory)      ──► Option<Forecast>
//! welcome_message(tenant)            ──► String (fallback on failure)
//! ```

use async_trait::async_trait;
use dreamos_core::{Booking, InventoryItem, K3Priority};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AiSettings;
use crate::error::{SyncError, SyncResult};

/// Returned by [`AiAdvisor::ask`] when the service fails.
pub const ASSISTANT_FALLBACK: &str = "Maaf, koneksi neural terputus. Silakan coba sesaat lagi.";

/// Returned by [`AiAdvisor::ask`] when the service answers with nothing.
pub const ASSISTANT_EMPTY: &str = "Maaf, saya sedang melakukan sinkronisasi neural. Bisa ulangi?";

/// Greeting used when the model is unavailable.
pub const WELCOME_FALLBACK: &str = "Selamat Datang di Dream OS";

/// Greeting used when the model answers with nothing.
pub const WELCOME_EMPTY: &str = "Selamat Datang di Dream OS Neural";

/// Triage suggested for a new safety report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentAssessment {
    pub priority: K3Priority,
    pub suggestion: String,
    pub category: String,
}

/// Thirty-day operational outlook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub predicted_busy_days: String,
    pub stock_alerts: String,
    pub proactive_tip: String,
}

#[async_trait]
pub trait AiAdvisor: Send + Sync {
    /// Suggests priority, category and a follow-up for an incident.
    async fn classify_incident(&self, problem: &str, photo: Option<&str>) -> Option<IncidentAssessment>;

    /// Answers a free-text question about the current data.
    async fn ask(&self, question: &str, context: &Value) -> String;

    async fn forecast(&self, bookings: &[Booking], inventory: &[InventoryItem]) -> Option<Forecast>;

    /// Short greeting for the home screen.
    async fn welcome_message(&self, _tenant_name: &str) -> String {
        WELCOME_FALLBACK.to_string()
    }

    /// Whether calls can reach a model at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Advisor used when AI is disabled.
#[derive(Debug, Default)]
pub struct NoopAdvisor;

#[async_trait]
impl AiAdvisor for NoopAdvisor {
    async fn classify_incident(&self, _problem: &str, _photo: Option<&str>) -> Option<IncidentAssessment> {
        None
    }

    async fn ask(&self, _question: &str, _context: &Value) -> String {
        ASSISTANT_FALLBACK.to_string()
    }

    async fn forecast(&self, _bookings: &[Booking], _inventory: &[InventoryItem]) -> Option<Forecast> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// =============================================================================
// Gemini
// =============================================================================

/// Advisor backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiAdvisor {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiAdvisor {
    pub fn new(settings: &AiSettings) -> SyncResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SyncError::AiUnavailable("no API key configured".into()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(GeminiAdvisor {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    async fn generate(&self, parts: Vec<Value>, schema: Option<Value>) -> SyncResult<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let mut body = json!({ "contents": [{ "parts": parts }] });
        if let Some(schema) = schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::AiFailed(format!("model returned {}", status.as_u16())));
        }
        let body: Value = response.json().await?;
        debug!(model = %self.model, "Model responded");
        Ok(response_text(&body).unwrap_or_default())
    }

    async fn generate_json<T: for<'de> Deserialize<'de>>(&self, parts: Vec<Value>, schema: Value) -> SyncResult<T> {
        let text = self.generate(parts, Some(schema)).await?;
        serde_json::from_str(&text).map_err(|e| SyncError::AiFailed(format!("unusable JSON: {}", e)))
    }
}

#[async_trait]
impl AiAdvisor for GeminiAdvisor {
    async fn classify_incident(&self, problem: &str, photo: Option<&str>) -> Option<IncidentAssessment> {
        let mut parts = vec![json!({ "text": incident_prompt(problem) })];
        if let Some(photo) = photo {
            parts.push(json!({
                "inlineData": { "mimeType": "image/jpeg", "data": strip_data_url(photo) }
            }));
        }

        match self.generate_json::<RawAssessment>(parts, incident_schema()).await {
            Ok(raw) => Some(raw.into()),
            Err(e) => {
                warn!(error = %e, "Incident classification unavailable");
                None
            }
        }
    }

    async fn ask(&self, question: &str, context: &Value) -> String {
        let parts = vec![json!({ "text": assistant_prompt(question, context) })];
        match self.generate(parts, None).await {
            Ok(text) if text.trim().is_empty() => ASSISTANT_EMPTY.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Assistant request failed");
                ASSISTANT_FALLBACK.to_string()
            }
        }
    }

    async fn forecast(&self, bookings: &[Booking], inventory: &[InventoryItem]) -> Option<Forecast> {
        let parts = vec![json!({ "text": forecast_prompt(bookings, inventory) })];
        match self.generate_json::<Forecast>(parts, forecast_schema()).await {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                warn!(error = %e, "Forecast unavailable");
                None
            }
        }
    }

    async fn welcome_message(&self, tenant_name: &str) -> String {
        let parts = vec![json!({ "text": welcome_prompt(tenant_name) })];
        match self.generate(parts, None).await {
            Ok(text) if text.trim().is_empty() => WELCOME_EMPTY.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!(error = %e, "Welcome message unavailable");
                WELCOME_FALLBACK.to_string()
            }
        }
    }
}

// =============================================================================
// Prompts and Schemas
// =============================================================================

#[derive(Deserialize)]
struct RawAssessment {
    priority: String,
    suggestion: String,
    category: String,
}

impl From<RawAssessment> for IncidentAssessment {
    /// Unknown priority labels fall back to medium.
    fn from(raw: RawAssessment) -> Self {
        IncidentAssessment {
            priority: raw.priority.parse().unwrap_or_default(),
            suggestion: raw.suggestion,
            category: raw.category,
        }
    }
}

/// `candidates[0].content.parts[*].text`, concatenated.
fn response_text(body: &Value) -> Option<String> {
    let parts = body
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Base64 payload of a data URL, or the input unchanged.
fn strip_data_url(photo: &str) -> &str {
    photo.split_once(',').map(|(_, data)| data).unwrap_or(photo)
}

fn string_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({ "type": "OBJECT", "properties": properties, "required": fields })
}

fn incident_schema() -> Value {
    string_schema(&["priority", "suggestion", "category"])
}

fn forecast_schema() -> Value {
    string_schema(&["predictedBusyDays", "stockAlerts", "proactiveTip"])
}

fn incident_prompt(problem: &str) -> String {
    format!(
        "Analyze this safety/facility report for a school: \"{}\".\n\
         Task:\n\
         1. Assign a Priority Level: 'Biasa', 'Sedang', or 'Penting'.\n\
         2. Categorize the issue: Maintenance, Security, or CS.\n\
         3. Provide a technical suggestion.\n\
         Response must be in JSON.",
        problem
    )
}

fn assistant_prompt(question: &str, context: &Value) -> String {
    format!(
        "You are the Dream OS Neural Assistant.\n\
         Current App State/Data: {}\n\
         User Question: \"{}\"\n\
         Answer concisely and professionally in Indonesian, using the data above. \
         If the user wants to do something, point them to the right menu. \
         Response should be text only, no JSON.",
        context, question
    )
}

fn welcome_prompt(tenant_name: &str) -> String {
    let name = if tenant_name.trim().is_empty() {
        "Dream OS"
    } else {
        tenant_name.trim()
    };
    format!(
        "Generate a short inspiring greeting for {} school system. Max 8 words. Indonesian.",
        name
    )
}

fn forecast_prompt(bookings: &[Booking], inventory: &[InventoryItem]) -> String {
    let booking_context = bookings
        .iter()
        .map(|b| format!("{} on {}", b.facility, b.date))
        .collect::<Vec<_>>()
        .join(", ");
    let inventory_context = inventory
        .iter()
        .map(|i| format!("{}: {}/{}", i.name, i.current_stock, i.initial_stock))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Analyze current school operational data:\n\
         Bookings: {}\n\
         Inventory: {}\n\
         Task: Provide a \"Neural Forecast\" for the next 30 days.\n\
         1. Predicted busiest days for facilities.\n\
         2. Predicted stock depletion dates for critical items.\n\
         3. One proactive operational tip.\n\
         Respond in professional Indonesian, very concise.",
        booking_context, inventory_context
    )
}
