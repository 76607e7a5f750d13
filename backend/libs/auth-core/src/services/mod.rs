pub mod blacklist;
pub mod identity;
pub mod orchestrator;
pub mod sessions;

pub use blacklist::TokenBlacklist;
pub use identity::{ExternalTokenCache, HttpIdentityProvider, IdentityProvider, VerifiedIdentity};
pub use orchestrator::{AuthContext, AuthOrchestrator, SessionTokens};
pub use sessions::SessionLifecycleManager;
