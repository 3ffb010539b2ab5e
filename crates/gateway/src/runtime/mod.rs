pub mod monitor;
pub mod notify;
pub mod queue;
pub mod webhooks;
