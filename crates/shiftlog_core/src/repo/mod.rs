//! Persistence gateway for timeline state and settings.
//!
//! # Responsibility
//! - Define storage contracts used by the service layer.
//! - Hide SQLite details behind repository traits.
//!
//! # See also
//! - `crate::db` for connection bootstrap and migrations.

pub mod settings_repo;
pub mod timeline_repo;
