use serde::{Deserialize, Serialize};

/// Identity record verified against the external provider.
///
/// `subject` and `email` are strictly required; everything else is
/// legitimately absent for some providers and scopes, so absence of an
/// optional field is intentional tolerance, not a parsing bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// The provider's opaque subject identifier.
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub locale: Option<String>,
}
