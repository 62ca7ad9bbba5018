//! PhishGuard API Module
//!
//! HTTP endpoints over the training pipeline and the published model:
//! health, training trigger, batch prediction of uploaded CSV files and
//! download of the last prediction file.

pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::*;
pub use models::*;
pub use server::*;
