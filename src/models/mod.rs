pub mod failed_job;
pub mod product;
pub mod scan;
pub mod settings;
