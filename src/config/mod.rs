//! Configuration management for the rating and claim-coordination service

pub mod app;
pub mod cache;
pub mod claim;
pub mod rating;

pub use app::{AmqpSettings, AppConfig, ServiceSettings, WorkflowSettings};
pub use cache::CacheTtlConfig;
pub use claim::ClaimConfig;
pub use rating::RatingConfig;
