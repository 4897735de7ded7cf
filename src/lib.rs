pub mod classify;
pub mod config;
pub mod error;
pub mod github;
pub mod provision;
pub mod scanner;
pub mod scoring;
pub mod secrets;
pub mod service;
pub mod store;
