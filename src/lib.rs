//! PhishGuard: training pipeline and batch scoring for a phishing URL
//! classifier.
//!
//! The binary wraps the workspace crates: `phishguard-core` for the pipeline,
//! `phishguard-databases` for the document collection and `phishguard-api`
//! for HTTP serving.

pub mod cli;
