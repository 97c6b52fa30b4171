mod brevo;
mod error;
mod kit;
mod local_store;
mod supabase;

pub use brevo::Brevo;
pub use error::WaitlistError;
pub use kit::Kit;
pub use local_store::LocalStore;
pub use local_store::SubscriberStore;
pub use supabase::Supabase;

use crate::configuration::ProviderKind;
use crate::configuration::Settings;
use crate::domain::Submission;
use crate::domain::SubscriberEmail;
use crate::domain::WaitlistEntry;

/// Shown to the user; the parse error itself is only logged
const INVALID_EMAIL: &str = "Please enter a valid email address.";

#[derive(Clone)]
enum Backend {
    Kit(Kit),
    Brevo(Brevo),
    Supabase(Supabase),
    LocalStore(LocalStore),
}

/// One submission/listing contract over whichever provider was selected at
/// startup. Built once and shared read-only by every worker.
///
/// A provider lacking required configuration still yields a `Gateway`: every
/// request then fails with `WaitlistError::Configuration` before any input
/// parsing or network call.
#[derive(Clone)]
pub struct Gateway {
    provider: ProviderKind,
    backend: Result<Backend, Vec<&'static str>>,
}

impl Gateway {
    pub fn build(cfg: &Settings) -> Self {
        let provider = cfg.waitlist.provider;
        let backend = match provider {
            ProviderKind::Kit => Kit::from_settings(&cfg.kit).map(Backend::Kit),
            ProviderKind::Brevo => Brevo::from_settings(&cfg.brevo).map(Backend::Brevo),
            ProviderKind::Supabase => Supabase::from_settings(&cfg.supabase).map(Backend::Supabase),
            ProviderKind::LocalStore => Kit::from_settings(&cfg.kit).map(|kit| {
                Backend::LocalStore(LocalStore::new(
                    kit,
                    SubscriberStore::new(&cfg.local_store.path),
                ))
            }),
        };
        match &backend {
            Ok(_) => tracing::info!(%provider, "waitlist gateway ready"),
            Err(missing) => tracing::error!(
                %provider,
                missing = %missing.join(", "),
                "waitlist provider is not configured; requests will fail"
            ),
        }
        Self { provider, backend }
    }

    fn backend(&self) -> Result<&Backend, WaitlistError> {
        self.backend
            .as_ref()
            .map_err(|missing| WaitlistError::missing_variables(missing))
    }

    /// Validate configuration, then the email, then hand it to the provider.
    /// Fails on the first error; nothing is retried.
    #[tracing::instrument(
        name = "Submitting email to waitlist",
        skip(self, raw_email),
        fields(provider = %self.provider, subscriber_email = tracing::field::Empty)
    )]
    pub async fn submit(
        &self,
        raw_email: &str,
    ) -> Result<Submission, WaitlistError> {
        let backend = self.backend()?;
        let email = SubscriberEmail::parse(raw_email).map_err(|e| {
            tracing::info!("rejected submission: {e}");
            WaitlistError::InvalidInput(INVALID_EMAIL.to_string())
        })?;
        tracing::Span::current().record("subscriber_email", tracing::field::display(&email));

        let submission = match backend {
            Backend::Kit(kit) => {
                let subscriber = kit.subscribe(&email).await?;
                Submission::new(&email, false).with_subscriber(subscriber)
            }
            Backend::Brevo(brevo) => {
                brevo.subscribe(&email).await?;
                Submission::new(&email, false)
            }
            Backend::Supabase(supabase) => {
                let inserted = supabase.insert(&email).await?;
                Submission::new(&email, inserted.is_none()).with_subscriber(inserted)
            }
            Backend::LocalStore(store) => store.submit(&email).await?,
        };
        tracing::info!(
            already_exists = submission.already_exists,
            "waitlist submission accepted"
        );
        Ok(submission)
    }

    #[tracing::instrument(name = "Listing waitlist", skip(self), fields(provider = %self.provider))]
    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        match self.backend()? {
            Backend::Kit(kit) => Ok(kit.list().await?),
            Backend::Brevo(brevo) => brevo.list().await,
            Backend::Supabase(supabase) => Ok(supabase.list().await?),
            Backend::LocalStore(store) => store.list().await,
        }
    }
}
