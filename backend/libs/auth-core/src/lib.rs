//! Session & token security core for the Quillbox backend
//!
//! Issues and validates JWT access/refresh pairs, enforces the per-user
//! concurrent-session cap, tracks revoked token identifiers, and exchanges
//! external identity tokens for first-party sessions. HTTP routing, user CRUD,
//! and note business logic live elsewhere and consume this crate through
//! [`services::AuthOrchestrator`] and the `rate-limit` crate.
//!
//! ## Modules
//!
//! - `config`: environment-driven settings with construction-time invariants
//! - `db`: Postgres implementations of the storage traits
//! - `error`: error taxonomy with stable client-facing reason codes
//! - `maintenance`: periodic cleanup of expired durable and in-memory state
//! - `models`: sessions, revocations, identities, users
//! - `security`: JWT issuance and validation (storage-free)
//! - `services`: blacklist, session lifecycle, identity cache, orchestrator
//! - `storage`: collaborator traits the services are written against

pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod security;
pub mod services;
pub mod storage;

pub use error::{AuthError, Result};

// Re-export commonly used types
pub use models::{ExternalIdentity, RevocationReason, RevokedToken, Session, User};
pub use security::{Claims, IssuedPair, TokenService};
pub use services::{
    AuthContext, AuthOrchestrator, ExternalTokenCache, HttpIdentityProvider, IdentityProvider,
    SessionLifecycleManager, SessionTokens, TokenBlacklist, VerifiedIdentity,
};
