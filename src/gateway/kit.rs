use reqwest::Method;
use serde_json::json;
use serde_json::Value;

use crate::configuration::KitSettings;
use crate::configuration::ProviderKind;
use crate::domain::SubscriberEmail;
use crate::domain::WaitlistEntry;
use crate::provider_client::ProviderAuth;
use crate::provider_client::ProviderClient;
use crate::provider_client::ProviderError;

/// Kit caps `per_page` at 1000
const PAGE_SIZE: usize = 1000;

/// Listing stops here even if Kit still claims there is a next page
const MAX_PAGES: usize = 100;

/// Transactional mailer: a subscriber must first exist account-wide, then be
/// attached to the waitlist form.
#[derive(Clone)]
pub struct Kit {
    client: ProviderClient,
    form_id: String,
}

impl Kit {
    pub fn new(
        client: ProviderClient,
        form_id: &str,
    ) -> Self {
        Self {
            client,
            form_id: form_id.to_string(),
        }
    }

    /// Fails with the names of the missing env vars
    pub fn from_settings(settings: &KitSettings) -> Result<Self, Vec<&'static str>> {
        match (settings.api_key(), settings.form_id()) {
            (Some(key), Some(form_id)) => {
                let auth = ProviderAuth::ApiKeyHeader {
                    header: "X-Kit-Api-Key",
                    key: key.clone(),
                };
                let client = ProviderClient::new(
                    &settings.base_url,
                    ProviderKind::Kit,
                    auth,
                    settings.timeout(),
                );
                Ok(Self::new(client, form_id))
            }
            _ => Err(settings.missing_variables()),
        }
    }

    fn form_path(&self) -> String {
        format!(
            "/v4/forms/{}/subscribers",
            urlencoding::encode(&self.form_id)
        )
    }

    /// Upsert the subscriber, then add them to the form. Returns Kit's
    /// representation of the subscriber, if any.
    ///
    /// If the second call fails, the subscriber created by the first one is
    /// left in place; Kit has no transaction to roll back, and a retry is
    /// harmless since both calls are upserts.
    #[tracing::instrument(name = "Subscribing to Kit form", skip(self, email), fields(form_id = %self.form_id))]
    pub async fn subscribe(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Value>, ProviderError> {
        let payload = json!({ "email_address": email.as_ref() });
        self.client
            .call(Method::POST, "/v4/subscribers", Some(&payload))
            .await?;
        let added = self
            .client
            .call(Method::POST, &self.form_path(), Some(&payload))
            .await?;
        Ok(added.get("subscriber").cloned())
    }

    /// All subscribers of the form, following Kit's cursor pagination
    #[tracing::instrument(name = "Listing Kit form subscribers", skip(self), fields(form_id = %self.form_id))]
    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, ProviderError> {
        let mut entries = vec![];
        let mut cursor: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let mut path = format!("{}?per_page={PAGE_SIZE}", self.form_path());
            if let Some(after) = &cursor {
                path.push_str(&format!("&after={}", urlencoding::encode(after)));
            }
            let data = self.client.call(Method::GET, &path, None).await?;

            let subscribers = data
                .get("subscribers")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            entries.extend(subscribers.iter().map(|s| WaitlistEntry {
                email: s
                    .get("email_address")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                created_at: s
                    .get("created_at")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }));

            let pagination = data.get("pagination");
            let has_next = pagination
                .and_then(|p| p.get("has_next_page"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let next = pagination
                .and_then(|p| p.get("end_cursor"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_next || next.is_none() {
                break;
            }
            if next == cursor {
                tracing::warn!(cursor = ?next, "Kit returned the same cursor twice");
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(entries = entries.len(), "stopped listing after {MAX_PAGES} pages");
            }
            cursor = next;
        }
        Ok(entries)
    }
}
