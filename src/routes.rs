mod health_check;
mod waitlist;

pub use health_check::health_check;
pub use waitlist::join_waitlist;
pub use waitlist::list_waitlist;
pub use waitlist::method_not_allowed;
