pub mod captioner;
pub mod queue;
pub mod retry;
pub mod scanner;
pub mod shopify;
pub mod vision;
