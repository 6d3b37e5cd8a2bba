pub mod api;
pub mod config;
pub mod credentials;
pub mod detector;
pub mod fusion;
pub mod metadata;
pub mod orchestrator;
pub mod verdict;
