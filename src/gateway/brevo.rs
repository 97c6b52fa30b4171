use reqwest::Method;
use serde_json::json;
use serde_json::Value;

use super::WaitlistError;
use crate::configuration::BrevoSettings;
use crate::configuration::ProviderKind;
use crate::domain::SubscriberEmail;
use crate::domain::WaitlistEntry;
use crate::provider_client::ProviderAuth;
use crate::provider_client::ProviderClient;
use crate::provider_client::ProviderError;

const PAGE_SIZE: usize = 50;

/// Paging stops here even if every page comes back full
const MAX_PAGES: usize = 200;

/// Managed list. The list is configured either by numeric id or by its
/// human-readable name, in which case it is looked up on every request.
#[derive(Clone)]
pub struct Brevo {
    client: ProviderClient,
    list_id: Option<u64>,
    list_name: Option<String>,
}

/// A positive integer, whether Brevo sends it as a number or a string
fn as_list_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn array<'a>(
    data: &'a Value,
    key: &str,
) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl Brevo {
    pub fn new(
        client: ProviderClient,
        list_id: Option<u64>,
        list_name: Option<&str>,
    ) -> Self {
        Self {
            client,
            list_id,
            list_name: list_name.map(str::to_string),
        }
    }

    pub fn from_settings(settings: &BrevoSettings) -> Result<Self, Vec<&'static str>> {
        let missing = settings.missing_variables();
        match settings.api_key() {
            Some(key) if missing.is_empty() => {
                let auth = ProviderAuth::ApiKeyHeader {
                    header: "api-key",
                    key: key.clone(),
                };
                let client = ProviderClient::new(
                    &settings.base_url,
                    ProviderKind::Brevo,
                    auth,
                    settings.timeout(),
                );
                Ok(Self::new(
                    client,
                    settings.list_id(),
                    settings.list_name(),
                ))
            }
            _ => Err(missing),
        }
    }

    /// A configured id is used as-is, without any network call. Otherwise the
    /// lists are paged through until one is named exactly `list_name`.
    #[tracing::instrument(name = "Resolving Brevo list id", skip(self), fields(list_name = ?self.list_name))]
    pub async fn resolve_list_id(&self) -> Result<u64, WaitlistError> {
        if let Some(id) = self.list_id {
            return Ok(id);
        }
        let Some(name) = &self.list_name else {
            return Err(WaitlistError::Configuration(
                "Missing Brevo list configuration.".to_string(),
            ));
        };

        for page in 0..MAX_PAGES {
            let offset = page * PAGE_SIZE;
            let data = self
                .client
                .call(
                    Method::GET,
                    &format!("contacts/lists?limit={PAGE_SIZE}&offset={offset}"),
                    None,
                )
                .await?;
            let lists = array(&data, "lists");
            let found = lists
                .iter()
                .filter(|list| list.get("name").and_then(Value::as_str) == Some(name.as_str()))
                .find_map(|list| list.get("id").and_then(as_list_id));
            if let Some(id) = found {
                tracing::info!(list_id = id, "resolved Brevo list");
                return Ok(id);
            }
            if lists.len() < PAGE_SIZE {
                break;
            }
        }

        Err(WaitlistError::Configuration(format!(
            "Brevo list \"{name}\" was not found."
        )))
    }

    /// `updateEnabled` makes this an upsert, so Brevo never reports a
    /// duplicate and the caller cannot tell a fresh contact from an old one.
    #[tracing::instrument(name = "Adding contact to Brevo list", skip(self, email))]
    pub async fn subscribe(
        &self,
        email: &SubscriberEmail,
    ) -> Result<(), WaitlistError> {
        let list_id = self.resolve_list_id().await?;
        let payload = json!({
            "email": email.as_ref(),
            "listIds": [list_id],
            "updateEnabled": true,
        });
        self.client
            .call(Method::POST, "contacts", Some(&payload))
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Listing Brevo list contacts", skip(self))]
    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        let list_id = self.resolve_list_id().await?;
        Ok(self.list_contacts(list_id).await?)
    }

    async fn list_contacts(
        &self,
        list_id: u64,
    ) -> Result<Vec<WaitlistEntry>, ProviderError> {
        let mut entries = vec![];
        for page in 0..MAX_PAGES {
            let offset = page * PAGE_SIZE;
            let data = self
                .client
                .call(
                    Method::GET,
                    &format!("contacts/lists/{list_id}/contacts?limit={PAGE_SIZE}&offset={offset}"),
                    None,
                )
                .await?;
            let contacts = array(&data, "contacts");
            entries.extend(contacts.iter().map(|c| WaitlistEntry {
                email: c
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                created_at: c
                    .get("createdAt")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }));
            if contacts.len() < PAGE_SIZE {
                break;
            }
            if page + 1 == MAX_PAGES {
                tracing::warn!(entries = entries.len(), "stopped listing after {MAX_PAGES} pages");
            }
        }
        Ok(entries)
    }
}
