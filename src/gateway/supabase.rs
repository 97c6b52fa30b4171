use reqwest::Method;
use serde_json::Map;
use serde_json::Value;

use crate::configuration::ProviderKind;
use crate::configuration::SupabaseSettings;
use crate::domain::SubscriberEmail;
use crate::domain::WaitlistEntry;
use crate::provider_client::ProviderAuth;
use crate::provider_client::ProviderClient;
use crate::provider_client::ProviderError;

/// Duplicates are silently skipped, and only rows actually inserted are echoed
/// back
const PREFER_IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=representation";

/// Generic table behind PostgREST, with a unique constraint on the email
/// column. Duplicate detection is left to the database.
#[derive(Clone)]
pub struct Supabase {
    client: ProviderClient,
    table: String,
    email_column: String,
}

impl Supabase {
    /// `client` must point at the PostgREST root, i.e. `{project}/rest/v1`
    pub fn new(
        client: ProviderClient,
        table: &str,
        email_column: &str,
    ) -> Self {
        Self {
            client,
            table: table.to_string(),
            email_column: email_column.to_string(),
        }
    }

    pub fn from_settings(settings: &SupabaseSettings) -> Result<Self, Vec<&'static str>> {
        match (settings.url(), settings.api_key()) {
            (Some(url), Some(key)) => {
                let client = ProviderClient::new(
                    &format!("{url}/rest/v1"),
                    ProviderKind::Supabase,
                    ProviderAuth::BearerWithApiKey(key.clone()),
                    settings.timeout(),
                );
                Ok(Self::new(client, &settings.table, &settings.email_column))
            }
            _ => Err(settings.missing_variables()),
        }
    }

    fn table_path(&self) -> String { urlencoding::encode(&self.table).into_owned() }

    /// Conflict-tolerant insert keyed on the email column. Returns the inserted
    /// row, or `None` when the email was already in the table.
    #[tracing::instrument(name = "Inserting email into Supabase table", skip(self, email), fields(table = %self.table))]
    pub async fn insert(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Value>, ProviderError> {
        let row = Map::from_iter([(
            self.email_column.clone(),
            Value::String(email.as_ref().to_string()),
        )]);
        let payload = Value::Array(vec![Value::Object(row)]);
        let path = format!(
            "{}?on_conflict={}",
            self.table_path(),
            urlencoding::encode(&self.email_column)
        );
        let rows = self
            .client
            .call_with_headers(
                Method::POST,
                &path,
                Some(&payload),
                &[("Prefer", PREFER_IGNORE_DUPLICATES)],
            )
            .await?;

        // anything but a non-empty array means nothing was inserted
        Ok(rows.as_array().and_then(|rows| rows.first()).cloned())
    }

    #[tracing::instrument(name = "Listing Supabase table", skip(self), fields(table = %self.table))]
    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, ProviderError> {
        let rows = self
            .client
            .call(
                Method::GET,
                &format!("{}?select=*", self.table_path()),
                None,
            )
            .await?;
        let Some(rows) = rows.as_array() else {
            return Ok(vec![]);
        };
        Ok(rows
            .iter()
            .filter_map(|row| {
                let email = row.get(&self.email_column).and_then(Value::as_str)?;
                Some(WaitlistEntry {
                    email: email.to_string(),
                    created_at: row
                        .get("created_at")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect())
    }
}
