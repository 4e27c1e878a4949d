use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque tool descriptor served by the realtime backend. Its shape is owned
/// by the backend; the gateway only ever stores and forwards it.
pub type ToolRecord = Value;

/// Body of `GET /api/twilio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwilioStatus {
    #[serde(rename = "credentialsSet")]
    pub credentials_set: bool,

    #[serde(rename = "twilioEnabled")]
    pub twilio_enabled: bool,
}

/// Body of `POST /api/twilio/numbers`. Without `voiceUrl` the configured
/// webhook URL is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateVoiceUrlRequest {
    #[serde(rename = "phoneNumberSid")]
    pub phone_number_sid: String,

    #[serde(rename = "voiceUrl", default, skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
}
