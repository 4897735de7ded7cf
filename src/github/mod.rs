pub mod broker;
pub mod client;

pub use broker::TokenBroker;
pub use client::{GithubClient, GithubError};
