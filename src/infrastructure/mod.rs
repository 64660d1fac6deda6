//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection and migrations (db)
//! - Configuration loading (config)
//! - Password hashing for seeded accounts (auth)
//! - Repository implementations (repositories)
//! - Demo data (seed)
//! - Application state (state)

pub mod auth;
pub mod config;
pub mod db;
pub mod repositories;
pub mod seed;
pub mod state;

pub use repositories::*;
pub use state::AppState;
