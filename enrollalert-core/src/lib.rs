//! enrollalert-core: configuration and domain vocabulary shared by the
//! API server and the CLI.

pub mod config;
pub mod domain;

pub use config::AppConfig;
pub use domain::{AlertType, ParseDomainError, Term};
