//! Authentication principal type.

use std::collections::BTreeSet;

use crate::db::User;

/// Separator used for authorities in the `auth` claim.
const AUTHORITY_SEPARATOR: char = ',';

/// The authenticated identity for a single request: a subject and its granted
/// authorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    authorities: BTreeSet<String>,
}

impl Principal {
    /// Build a principal.
    ///
    /// Names are split on the claim separator and trimmed, and empty names are
    /// dropped, so every principal survives `authority_claim` unchanged.
    pub fn new<I, A>(subject: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let authorities = authorities
            .into_iter()
            .flat_map(|a| {
                a.as_ref()
                    .split(AUTHORITY_SEPARATOR)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            subject: subject.into(),
            authorities,
        }
    }

    /// Rebuild a principal from a comma-joined `auth` claim.
    pub fn from_authority_claim(subject: impl Into<String>, claim: &str) -> Self {
        Self::new(subject, [claim])
    }

    /// Authorities joined for the `auth` claim.
    pub fn authority_claim(&self) -> String {
        let names: Vec<&str> = self.authorities.iter().map(String::as_str).collect();
        names.join(",")
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.username.clone(), [user.role.as_str()])
    }
}
