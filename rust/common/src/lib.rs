pub mod config;
pub mod error;
pub mod protocol;

pub use config::{
    websocket_url, ConfigFile, ConfigLayers, EnvSource, PublicConfig, PublicKey, PublicResolver,
    ServerConfig, ServerKey, ServerResolver,
};
pub use error::ConfigError;
pub use protocol::{ToolRecord, TwilioStatus, UpdateVoiceUrlRequest};
