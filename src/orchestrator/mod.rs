pub mod local;
pub mod poller;
pub mod reconciler;
pub mod submission;
