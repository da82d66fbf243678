//! CupShup client core: authentication and session state for the
//! operator, vendor and client consoles.
//!
//! ARCHITECTURE
//! ============
//! - `auth`: auth state manager, collaborator contracts, route guard.
//! - `platform`: HTTP adapters for the hosted auth and data endpoints.
//! - `config`: environment-driven settings for both.

pub mod auth;
pub mod config;
pub mod platform;
