pub mod identity;
pub mod revocation;
pub mod session;
pub mod user;

pub use identity::ExternalIdentity;
pub use revocation::{RevocationReason, RevokedToken};
pub use session::Session;
pub use user::User;
