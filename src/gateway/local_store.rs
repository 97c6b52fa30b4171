use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use super::Kit;
use super::WaitlistError;
use crate::configuration::ProviderKind;
use crate::domain::Submission;
use crate::domain::Subscriber;
use crate::domain::SubscriberEmail;
use crate::domain::WaitlistEntry;

/// Flat JSON file holding every subscriber ever accepted, as an array.
///
/// The file is rewritten whole on every append: into a sibling temp file,
/// then renamed over the original, so readers never see a partial write.
/// Appends from all clones of a store are serialized.
#[derive(Clone)]
pub struct SubscriberStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A store that was never written to is empty
    pub async fn load(&self) -> Result<Vec<Subscriber>, anyhow::Error> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(e).with_context(|| format!("could not read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a list of subscribers", self.path.display()))
    }

    pub async fn find(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, anyhow::Error> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|s| s.email.eq_ignore_ascii_case(email.as_ref())))
    }

    pub async fn append(
        &self,
        subscriber: Subscriber,
    ) -> Result<(), anyhow::Error> {
        let _guard = self.write_lock.lock().await;
        let mut subscribers = self.load().await?;
        subscribers.push(subscriber);

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("could not create {}", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(&subscribers)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .with_context(|| format!("could not write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("could not replace {}", self.path.display()))
    }
}

/// Kit subscription, deduplicated against a local file first. Known emails
/// never reach Kit; new ones are recorded only once both Kit calls succeeded.
///
/// Submissions are handled one at a time, so the same new email sent twice
/// concurrently reaches Kit once.
#[derive(Clone)]
pub struct LocalStore {
    kit: Kit,
    store: SubscriberStore,
    submissions: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(
        kit: Kit,
        store: SubscriberStore,
    ) -> Self {
        Self {
            kit,
            store,
            submissions: Arc::new(Mutex::new(())),
        }
    }

    #[tracing::instrument(name = "Submitting through local store", skip(self, email))]
    pub async fn submit(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Submission, WaitlistError> {
        let _guard = self.submissions.lock().await;
        if let Some(existing) = self.store.find(email).await? {
            tracing::info!("email already in local store, skipping Kit");
            let stored = serde_json::to_value(&existing).ok();
            return Ok(Submission::new(email, true).with_subscriber(stored));
        }

        let kit_subscriber = self.kit.subscribe(email).await?;
        self.store
            .append(Subscriber::new(email, ProviderKind::Kit))
            .await?;
        Ok(Submission::new(email, false).with_subscriber(kit_subscriber))
    }

    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        Ok(self
            .store
            .load()
            .await?
            .iter()
            .map(WaitlistEntry::from)
            .collect())
    }
}
