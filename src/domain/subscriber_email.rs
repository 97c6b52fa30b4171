use once_cell::sync::Lazy;
use regex::Regex;

/// `local-part@domain.tld`: no whitespace anywhere, exactly one `@`, and at
/// least one `.` after it
static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Syntactic plausibility only; deliverability is the provider's problem.
///
/// No normalization is done here, callers must trim and lowercase first (see
/// `SubscriberEmail::parse`).
pub fn is_valid_email(s: &str) -> bool { EMAIL_SHAPE.is_match(s) }

/// A trimmed, lowercased, plausible email address. This is the identity key of
/// a waitlist entry, so two submissions differing only in case or surrounding
/// whitespace are the same subscriber.
///
/// Must be instantiated with `SubscriberEmail::parse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: &str) -> Result<Self, String> {
        let normalized = email.trim().to_lowercase();
        is_valid_email(&normalized)
            .then_some(Self(normalized))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
