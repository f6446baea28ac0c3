//! Prahari Server - abuse-protection gate for the parking marketplace API
//!
//! This service handles:
//! - Guarded registration and login flows
//! - IP blocking with policy-driven escalation
//! - Per-operation rate limiting
//! - hCaptcha verification for sensitive mutations
//! - An admin surface for manual blocks and inspection

pub mod config;
pub mod routes;
pub mod sweep;
