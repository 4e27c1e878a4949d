pub mod client;

use common::config::ServerConfig;
use common::TwilioStatus;
use tracing::{info, warn};

pub use client::{IncomingPhoneNumber, TwilioClient, TwilioError};

/// Credential and feature-flag status, as served by `GET /api/twilio`.
pub fn status(config: &ServerConfig) -> TwilioStatus {
    TwilioStatus {
        credentials_set: config.has_twilio_credentials(),
        twilio_enabled: config.enable_twilio,
    }
}

/// Build the Twilio client if credentials are present and the integration is
/// enabled. `None` is a normal outcome; callers branch on it.
pub fn init(config: &ServerConfig) -> Option<TwilioClient> {
    if !config.has_twilio_credentials() {
        warn!("Twilio credentials not set. Twilio client will be disabled.");
        return None;
    }
    if !config.enable_twilio {
        warn!("Twilio is disabled via configuration. Twilio client will be disabled.");
        return None;
    }

    info!(account_sid = %config.twilio_account_sid, "Twilio client ready");
    Some(TwilioClient::new(
        &config.twilio_account_sid,
        &config.twilio_auth_token,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::{ConfigLayers, EnvSource};

    fn config(pairs: &[(&str, &str)]) -> ServerConfig {
        let layers = ConfigLayers {
            env: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<EnvSource>(),
            ..Default::default()
        };
        ServerConfig::resolve(&layers.server_resolver())
    }

    #[test]
    fn test_status_requires_both_credentials_and_flag() {
        let cases: &[(&[(&str, &str)], bool, bool)] = &[
            (&[], false, true),
            (&[("TWILIO_ACCOUNT_SID", "AC1")], false, true),
            (&[("TWILIO_AUTH_TOKEN", "tok")], false, true),
            (&[("TWILIO_ACCOUNT_SID", "AC1"), ("TWILIO_AUTH_TOKEN", "tok")], true, true),
            (
                &[
                    ("TWILIO_ACCOUNT_SID", "AC1"),
                    ("TWILIO_AUTH_TOKEN", "tok"),
                    ("ENABLE_TWILIO", "false"),
                ],
                true,
                false,
            ),
            (
                &[
                    ("TWILIO_ACCOUNT_SID", "AC1"),
                    ("TWILIO_AUTH_TOKEN", "tok"),
                    ("ENABLE_TWILIO", "yes"),
                ],
                true,
                false,
            ),
        ];

        for (vars, credentials_set, twilio_enabled) in cases {
            let status = status(&config(vars));
            assert_eq!(status.credentials_set, *credentials_set, "{:?}", vars);
            assert_eq!(status.twilio_enabled, *twilio_enabled, "{:?}", vars);
        }
    }

    #[test]
    fn test_init_without_credentials_is_none() {
        assert!(init(&config(&[("TWILIO_ACCOUNT_SID", "AC1")])).is_none());
    }

    #[test]
    fn test_init_disabled_is_none() {
        let cfg = config(&[
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("ENABLE_TWILIO", "false"),
        ]);
        assert!(init(&cfg).is_none());
    }

    #[test]
    fn test_init_with_credentials_and_flag() {
        let cfg = config(&[("TWILIO_ACCOUNT_SID", "AC1"), ("TWILIO_AUTH_TOKEN", "tok")]);
        let client = init(&cfg).unwrap();
        assert_eq!(client.account_sid(), "AC1");
    }
}
