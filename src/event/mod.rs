// Change-feed plumbing
//
// Store feeds are drained by background subscription tasks that hand every
// delivery to a `ChangeHandler`.

// Public API - what other modules can use
pub use events::ChangeEvent;
pub use handler::{ChangeError, ChangeHandler};
pub use subscription::FeedSubscription;

// Internal modules
mod events;
mod handler;
mod subscription;
