use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("email address is required")]
    MissingEmail,
    #[error("{0} is not authorized to access the admin console")]
    NotAuthorized(String),
}

/// An operator that passed the allowlist check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub email: String,
}

/// Fixed set of operator email addresses. Matching ignores case and
/// surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    emails: BTreeSet<String>,
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AdminAllowlist {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn require_admin(&self, email: &str) -> Result<Operator, AuthError> {
        let email = normalize(email);
        if email.is_empty() {
            return Err(AuthError::MissingEmail);
        }
        if !self.emails.contains(&email) {
            tracing::warn!(%email, "non-admin attempted console login");
            return Err(AuthError::NotAuthorized(email));
        }
        Ok(Operator { email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_case_and_whitespace() {
        let allowlist = AdminAllowlist::new(["Owner@Acme.test ", ""]);
        assert!(allowlist.require_admin("owner@acme.test").is_ok());
        assert!(allowlist.require_admin("  OWNER@ACME.TEST").is_ok());
        assert!(allowlist.require_admin("guest@acme.test").is_err());
    }

    #[test]
    fn require_admin_reports_reason() {
        let allowlist = AdminAllowlist::new(["owner@acme.test"]);
        assert_eq!(allowlist.require_admin("   "), Err(AuthError::MissingEmail));
        assert_eq!(
            allowlist.require_admin("Guest@acme.test"),
            Err(AuthError::NotAuthorized("guest@acme.test".into()))
        );
        assert_eq!(
            allowlist.require_admin("OWNER@acme.test").unwrap().email,
            "owner@acme.test"
        );
    }

    #[test]
    fn blank_entries_are_ignored() {
        assert!(AdminAllowlist::new(["", "  "]).is_empty());
    }
}
