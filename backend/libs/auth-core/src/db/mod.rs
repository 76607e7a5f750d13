pub mod revocation;
pub mod sessions;

pub use revocation::PgRevocationStore;
pub use sessions::PgSessionStore;
