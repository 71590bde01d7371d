pub mod access;
pub mod api;
pub mod broker;
pub mod completion;
pub mod config;
pub mod controllers;
pub mod error;
pub mod metrics;
pub mod types;

pub use error::{BrokerError, GatewayError, Result};
pub use config::Config;
