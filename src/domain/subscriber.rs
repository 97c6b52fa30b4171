use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::SubscriberEmail;
use crate::configuration::ProviderKind;

/// A waitlist entry as recorded by the local store. Created once on the first
/// successful submission, never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub source: ProviderKind,
}

impl Subscriber {
    pub fn new(
        email: &SubscriberEmail,
        source: ProviderKind,
    ) -> Self {
        Self {
            email: email.as_ref().to_string(),
            created_at: Utc::now(),
            source,
        }
    }
}

/// One row of `GET /api/waitlist`. `created_at` is passed through as the
/// provider formats it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&Subscriber> for WaitlistEntry {
    fn from(value: &Subscriber) -> Self {
        Self {
            email: value.email.clone(),
            created_at: Some(value.created_at.to_rfc3339()),
        }
    }
}

/// Outcome of a successful submission, identical for every provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub ok: bool,
    pub already_exists: bool,
    pub email: String,
    /// Provider's own representation of the subscriber, when it returns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<serde_json::Value>,
}

impl Submission {
    pub fn new(
        email: &SubscriberEmail,
        already_exists: bool,
    ) -> Self {
        Self {
            ok: true,
            already_exists,
            email: email.as_ref().to_string(),
            subscriber: None,
        }
    }

    pub fn with_subscriber(
        mut self,
        subscriber: Option<serde_json::Value>,
    ) -> Self {
        self.subscriber = subscriber.filter(|s| !s.is_null());
        self
    }
}
