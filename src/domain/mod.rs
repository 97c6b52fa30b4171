mod subscriber;
mod subscriber_email;
// allow external `use` statements to skip `subscriber_email` etc
pub use subscriber::Submission;
pub use subscriber::Subscriber;
pub use subscriber::WaitlistEntry;
pub use subscriber_email::is_valid_email;
pub use subscriber_email::SubscriberEmail;
