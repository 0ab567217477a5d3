//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine operations and repository writes into use cases.
//! - Keep the CLI decoupled from storage details.

pub mod intent;
pub mod timeline_service;
