use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;
use serde_aux::field_attributes::deserialize_number_from_string;

/// Global configuration, loaded from `configuration/*.yaml` and `APP_*` env
/// vars. See `get_configuration`.
///
/// Provider credentials are all optional here; whether the selected provider
/// has what it needs is decided by `Gateway::build`, so that a half-configured
/// server still starts and answers every submission with a 500 naming the
/// missing variables.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub waitlist: WaitlistSettings,
    pub kit: KitSettings,
    pub brevo: BrevoSettings,
    pub supabase: SupabaseSettings,
    pub local_store: LocalStoreSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct WaitlistSettings {
    /// Which provider backs `/api/waitlist`
    pub provider: ProviderKind,
}

/// The system of record for waitlist entries. Also used as the `source` tag
/// of locally stored subscribers.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Kit,
    Brevo,
    Supabase,
    LocalStore,
}

impl Display for ProviderKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ProviderKind::Kit => "Kit",
                ProviderKind::Brevo => "Brevo",
                ProviderKind::Supabase => "Supabase",
                ProviderKind::LocalStore => "Local store",
            }
        )
    }
}

/// Env vars are never trimmed by `config`, and an exported-but-empty var still
/// deserializes to `Some("")`
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn present_secret(value: &Option<Secret<String>>) -> Option<&Secret<String>> {
    value
        .as_ref()
        .filter(|v| !v.expose_secret().trim().is_empty())
}

/// Transactional mailer (Kit v4 API)
#[derive(Deserialize, Clone)]
pub struct KitSettings {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    pub form_id: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl KitSettings {
    pub fn api_key(&self) -> Option<&Secret<String>> { present_secret(&self.api_key) }

    pub fn form_id(&self) -> Option<&str> { present(&self.form_id) }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    /// Names of the env vars that must be set before Kit can be called
    pub fn missing_variables(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.api_key().is_none() {
            missing.push("APP_KIT__API_KEY");
        }
        if self.form_id().is_none() {
            missing.push("APP_KIT__FORM_ID");
        }
        missing
    }
}

/// Managed list (Brevo v3 API). A list can be given either by id or by name;
/// the id wins when it is a positive integer.
#[derive(Deserialize, Clone)]
pub struct BrevoSettings {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    /// Kept as a string: env vars may hold anything, and a non-numeric id
    /// falls back to `list_name` instead of failing startup
    pub list_id: Option<String>,
    pub list_name: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl BrevoSettings {
    pub fn api_key(&self) -> Option<&Secret<String>> { present_secret(&self.api_key) }

    /// `None` unless the configured id parses as a positive integer
    pub fn list_id(&self) -> Option<u64> {
        present(&self.list_id)
            .and_then(|id| id.parse::<u64>().ok())
            .filter(|id| *id > 0)
    }

    pub fn list_name(&self) -> Option<&str> { present(&self.list_name) }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn missing_variables(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.api_key().is_none() {
            missing.push("APP_BREVO__API_KEY");
        }
        if present(&self.list_id).is_none() && self.list_name().is_none() {
            missing.push("APP_BREVO__LIST_ID or APP_BREVO__LIST_NAME");
        }
        missing
    }
}

/// Generic table behind a PostgREST interface (Supabase)
#[derive(Deserialize, Clone)]
pub struct SupabaseSettings {
    /// Project url, without the `/rest/v1` suffix
    pub url: Option<String>,
    pub service_role_key: Option<Secret<String>>,
    pub publishable_key: Option<Secret<String>>,
    pub anon_key: Option<Secret<String>>,
    pub table: String,
    pub email_column: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl SupabaseSettings {
    /// Trailing slashes are dropped so that endpoint paths can be appended
    /// as-is
    pub fn url(&self) -> Option<&str> {
        present(&self.url)
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// The service role key is preferred, as it bypasses row level security
    pub fn api_key(&self) -> Option<&Secret<String>> {
        present_secret(&self.service_role_key)
            .or_else(|| present_secret(&self.publishable_key))
            .or_else(|| present_secret(&self.anon_key))
    }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn missing_variables(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.url().is_none() {
            missing.push("APP_SUPABASE__URL");
        }
        if self.api_key().is_none() {
            missing.push("APP_SUPABASE__SERVICE_ROLE_KEY or APP_SUPABASE__PUBLISHABLE_KEY");
        }
        missing
    }
}

/// Flat JSON file kept next to the Kit subscription
#[derive(Deserialize, Clone)]
pub struct LocalStoreSettings {
    pub path: String,
}

pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`, then
/// overlay `APP_*` env vars:
///
/// `APP_KIT__API_KEY=...` -> `Settings.kit.api_key`
///
/// Structural fields (host, port, provider, timeouts) must be present, otherwise
/// the server will not start. Provider secrets are checked per request.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Message(format!("could not get current dir: {e}")))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or("local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    tracing::info!("loading config for {env} env");

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            // env vars are -always- parsed as String, hence `serde-aux` for numbers
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
