use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use common::config::{PublicConfig, ServerConfig};
use common::{ToolRecord, TwilioStatus, UpdateVoiceUrlRequest};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tools::{PollSnapshot, ToolPoller};
use tracing::{error, warn};
use twilio::{IncomingPhoneNumber, TwilioClient, TwilioError};

#[derive(Clone)]
pub struct AppState {
    server: Arc<ServerConfig>,
    public: Arc<PublicConfig>,
    twilio: Option<Arc<TwilioClient>>,
    poller: Arc<ToolPoller>,
}

impl AppState {
    pub fn new(
        server: ServerConfig,
        public: PublicConfig,
        twilio: Option<TwilioClient>,
        poller: Arc<ToolPoller>,
    ) -> Self {
        Self {
            server: Arc::new(server),
            public: Arc::new(public),
            twilio: twilio.map(Arc::new),
            poller,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/twilio", get(twilio_status))
        .route("/api/twilio/numbers", get(list_numbers).post(update_number))
        .route("/api/config", get(public_config))
        .route("/api/tools", get(list_tools))
        .route("/debug/tools", get(debug_tools))
        .with_state(state)
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("Twilio is not configured")]
    TwilioDisabled,
    #[error("voiceUrl is required when no webhook URL is configured")]
    MissingVoiceUrl,
    #[error(transparent)]
    Twilio(#[from] TwilioError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::TwilioDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MissingVoiceUrl => StatusCode::BAD_REQUEST,
            ApiError::Twilio(e) => {
                error!("Twilio request failed: {}", e);
                StatusCode::BAD_GATEWAY
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl AppState {
    fn twilio(&self) -> Result<&TwilioClient, ApiError> {
        self.twilio.as_deref().ok_or(ApiError::TwilioDisabled)
    }
}

async fn twilio_status(State(state): State<AppState>) -> Json<TwilioStatus> {
    Json(twilio::status(&state.server))
}

async fn list_numbers(
    State(state): State<AppState>,
) -> Result<Json<Vec<IncomingPhoneNumber>>, ApiError> {
    let numbers = state.twilio()?.list_incoming_numbers().await?;
    Ok(Json(numbers))
}

async fn update_number(
    State(state): State<AppState>,
    Json(req): Json<UpdateVoiceUrlRequest>,
) -> Result<Json<IncomingPhoneNumber>, ApiError> {
    let client = state.twilio()?;
    let voice_url = match req.voice_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => url,
        None => state.server.webhook_url().ok_or_else(|| {
            warn!(number_sid = %req.phone_number_sid, "No voiceUrl given and no webhook configured");
            ApiError::MissingVoiceUrl
        })?,
    };
    let number = client
        .update_voice_url(&req.phone_number_sid, voice_url)
        .await?;
    Ok(Json(number))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    #[serde(flatten)]
    public: PublicConfig,
    websocket_url: String,
}

async fn public_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        websocket_url: state.public.websocket_url(),
        public: (*state.public).clone(),
    })
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolRecord>> {
    Json(state.poller.tools())
}

async fn debug_tools(State(state): State<AppState>) -> Json<PollSnapshot> {
    Json(state.poller.snapshot())
}
