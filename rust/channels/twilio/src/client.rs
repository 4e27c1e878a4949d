//! Minimal Twilio REST client: phone number listing and voice webhook updates.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const API_VERSION: &str = "2010-04-01";

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("Twilio request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// An incoming phone number on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct IncomingPhoneNumber {
    pub sid: String,
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingPhoneNumberPage {
    #[serde(default)]
    incoming_phone_numbers: Vec<IncomingPhoneNumber>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Credentials {
    account_sid: String,
    auth_token: String,
}

pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl TwilioClient {
    pub fn new(account_sid: &str, auth_token: &str) -> Self {
        Self::with_base_url(account_sid, auth_token, TWILIO_API_BASE)
    }

    pub fn with_base_url(account_sid: &str, auth_token: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials {
                account_sid: account_sid.to_string(),
                auth_token: auth_token.to_string(),
            },
        }
    }

    pub fn account_sid(&self) -> &str {
        &self.credentials.account_sid
    }

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}",
            self.base_url, API_VERSION, self.credentials.account_sid, path
        )
    }

    pub async fn list_incoming_numbers(&self) -> Result<Vec<IncomingPhoneNumber>, TwilioError> {
        let resp = self
            .http
            .get(self.account_url("IncomingPhoneNumbers.json"))
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .send()
            .await?;
        let page: IncomingPhoneNumberPage = check(resp).await?.json().await?;
        debug!(count = page.incoming_phone_numbers.len(), "Listed Twilio numbers");
        Ok(page.incoming_phone_numbers)
    }

    /// Point the number's incoming-call webhook at `voice_url`.
    pub async fn update_voice_url(
        &self,
        number_sid: &str,
        voice_url: &str,
    ) -> Result<IncomingPhoneNumber, TwilioError> {
        let resp = self
            .http
            .post(self.account_url(&format!("IncomingPhoneNumbers/{}.json", number_sid)))
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[("VoiceUrl", voice_url)])
            .send()
            .await?;
        let number: IncomingPhoneNumber = check(resp).await?.json().await?;
        info!(number_sid = %number.sid, voice_url = %voice_url, "Updated Twilio voice webhook");
        Ok(number)
    }
}

impl fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioClient")
            .field("base_url", &self.base_url)
            .field("account_sid", &self.credentials.account_sid)
            .finish_non_exhaustive()
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, TwilioError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.chars().take(500).collect());
    Err(TwilioError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const AUTH: &str = "Basic QUMxMjM6c2VjcmV0";

    #[tokio::test]
    async fn test_list_incoming_numbers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/2010-04-01/Accounts/AC123/IncomingPhoneNumbers.json")
            .match_header("authorization", AUTH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "incoming_phone_numbers": [{
                        "sid": "PN1",
                        "phone_number": "+15550001111",
                        "friendly_name": "Support line",
                        "voice_url": "https://old.example.com/twiml"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = TwilioClient::with_base_url("AC123", "secret", &server.url());
        let numbers = client.list_incoming_numbers().await.unwrap();

        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].sid, "PN1");
        assert_eq!(numbers[0].phone_number, "+15550001111");
        assert_eq!(numbers[0].voice_url.as_deref(), Some("https://old.example.com/twiml"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_voice_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/IncomingPhoneNumbers/PN1.json")
            .match_header("authorization", AUTH)
            .match_body(Matcher::UrlEncoded(
                "VoiceUrl".into(),
                "https://hooks.example.com/twiml".into(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "sid": "PN1",
                    "phone_number": "+15550001111",
                    "voice_url": "https://hooks.example.com/twiml"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = TwilioClient::with_base_url("AC123", "secret", &server.url());
        let number = client
            .update_voice_url("PN1", "https://hooks.example.com/twiml")
            .await
            .unwrap();

        assert_eq!(number.voice_url.as_deref(), Some("https://hooks.example.com/twiml"));
        assert!(number.friendly_name.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/2010-04-01/Accounts/AC123/IncomingPhoneNumbers.json")
            .with_status(401)
            .with_body(json!({ "code": 20003, "message": "Authenticate", "status": 401 }).to_string())
            .create_async()
            .await;

        let client = TwilioClient::with_base_url("AC123", "secret", &server.url());
        match client.list_incoming_numbers().await {
            Err(TwilioError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Authenticate");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_number_serializes_camel_case() {
        let number = IncomingPhoneNumber {
            sid: "PN1".into(),
            phone_number: "+15550001111".into(),
            friendly_name: None,
            voice_url: Some("https://hooks.example.com/twiml".into()),
        };
        let value = serde_json::to_value(&number).unwrap();
        assert_eq!(value["phoneNumber"], "+15550001111");
        assert_eq!(value["voiceUrl"], "https://hooks.example.com/twiml");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TwilioClient::new("AC123", "secret");
        let rendered = format!("{:?}", client);
        assert!(rendered.contains("AC123"));
        assert!(!rendered.contains("secret"));
    }
}
