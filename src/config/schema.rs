use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SEND_API_URL: &str = "https://graph.facebook.com/v2.6/me/messages";
pub const DEFAULT_BACKEND_URL: &str = "https://kakko.pandorabots.com/pandora/talk-xml";
pub const DEFAULT_BACKEND_BOT_ID: &str = "9fa364f2fe345a10";

pub const DEFAULT_BACKEND_BIOGRAPHY: &str = "Mousebreaker is a team of 2 flash programmers. \
They write games and put them on websites such as this. They both support Leeds United and \
like beer and curry. On Wednesdays they go to the zoo and feed wild animals. They are scared \
of Daleks. Mousebreaker was born in a stable in Yorkshire, England and now lives in Leeds, \
England.";

pub const DEFAULT_PUBLIC_BIOGRAPHY: &str = "Insurgentes is a team of 2 programmers from the \
future waiting for you to join us build it together.";

/// Top-level configuration. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub messenger: MessengerConfig,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
    pub backend: BackendConfig,
    pub identity: IdentityConfig,
    pub persona: PersonaConfig,
    pub authorize: AuthorizeConfig,
    /// File the config was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Messenger Platform credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// App secret used to sign webhook deliveries.
    pub app_secret: String,
    /// Token echoed back by the platform during the subscription handshake.
    pub validation_token: String,
    pub page_access_token: String,
    pub send_api_url: String,
    /// Whole-request timeout for Send API calls.
    pub timeout_secs: u64,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            app_secret: String::new(),
            validation_token: String::new(),
            page_access_token: String::new(),
            send_api_url: DEFAULT_SEND_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public URL (with scheme) the platform reaches this server on.
    pub server_url: String,
    pub host: String,
    pub port: u16,
    /// Directory served for any GET path without a route.
    pub public_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            public_dir: PathBuf::from("public"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Accept deliveries that carry no signature header. Local testing only.
    pub allow_unsigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub bot_id: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            bot_id: DEFAULT_BACKEND_BOT_ID.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub database_path: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("keiko.db"),
        }
    }
}

/// Names the relay shows users and the names the backend knows itself by.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub public_name: String,
    pub backend_name: String,
    pub public_company: String,
    pub backend_company: String,
    /// Canned backend biography that gets replaced wholesale.
    pub backend_biography: String,
    pub public_biography: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            public_name: "Keiko".to_string(),
            backend_name: "Mitsuku".to_string(),
            public_company: "Insurgentes".to_string(),
            backend_company: "Mousebreaker".to_string(),
            backend_biography: DEFAULT_BACKEND_BIOGRAPHY.to_string(),
            public_biography: DEFAULT_PUBLIC_BIOGRAPHY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizeConfig {
    /// Code appended to the account-linking redirect URI.
    pub authorization_code: String,
}

impl Default for AuthorizeConfig {
    fn default() -> Self {
        Self {
            authorization_code: "1234567890".to_string(),
        }
    }
}
