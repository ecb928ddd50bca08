//! Admin allow-list.

use std::collections::HashSet;

/// Emails granted admin rights, supplied by deployment configuration.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    /// Build from configured addresses.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| canonical(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Whether `email` is an admin address.
    pub fn is_admin(&self, email: &str) -> bool {
        self.emails.contains(&canonical(email))
    }

    /// Number of configured admins.
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// True when nobody is an admin.
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn canonical(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_ignores_case_and_whitespace() {
        let admins = AdminAllowList::new(["Root@Example.com ", ""]);
        assert_eq!(admins.len(), 1);
        assert!(admins.is_admin("root@example.com"));
        assert!(admins.is_admin("  ROOT@example.COM"));
        assert!(!admins.is_admin("learner@example.com"));
    }

    #[test]
    fn test_default_has_no_admins() {
        let admins = AdminAllowList::default();
        assert!(admins.is_empty());
        assert!(!admins.is_admin("root@example.com"));
    }
}
