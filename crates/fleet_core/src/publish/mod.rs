pub mod publish_scheduler;
pub mod publisher;
