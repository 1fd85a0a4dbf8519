//! Issuer credentials for the relay endpoint.

/// Issuer name and secret pair.
///
/// Handed to the transport unchanged; the gateway never interprets it.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuerCredentials {
    issuer_name: String,
    issuer_secret: String,
}

impl IssuerCredentials {
    pub fn new(issuer_name: impl Into<String>, issuer_secret: impl Into<String>) -> Self {
        Self {
            issuer_name: issuer_name.into(),
            issuer_secret: issuer_secret.into(),
        }
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn issuer_secret(&self) -> &str {
        &self.issuer_secret
    }
}

impl std::fmt::Debug for IssuerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerCredentials")
            .field("issuer_name", &self.issuer_name)
            .field("issuer_secret", &"<redacted>")
            .finish()
    }
}
