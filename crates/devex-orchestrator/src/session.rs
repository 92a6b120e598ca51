// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session identity and the names derived from it.
//!
//! A [`Session`] can only be built from validated parts, so every resource
//! name and storage key derived from it is safe to hand to the cluster, to S3,
//! and to the `sh -c` command lines in the generated pods.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Kubernetes limits Service names (DNS-1035 labels) to 63 characters.
const MAX_SESSION_ID_LEN: usize = 63;
const MAX_OWNER_ID_LEN: usize = 128;

/// One user's repl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    owner_id: String,
    session_id: String,
    template: String,
}

impl Session {
    /// Validate and build a session.
    ///
    /// The template is only checked for shape here; whether it names a known
    /// profile is decided by the template table at build time.
    pub fn new(
        owner_id: impl Into<String>,
        session_id: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<Self> {
        let owner_id = owner_id.into();
        let session_id = session_id.into();
        let template = template.into();

        validate_owner_id(&owner_id)?;
        validate_session_id(&session_id)?;
        let well_formed = !template.is_empty()
            && template
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'));
        if !well_formed {
            return Err(Error::Validation(format!(
                "Unsupported template: {:?}",
                template
            )));
        }

        Ok(Self {
            owner_id,
            session_id,
            template,
        })
    }

    /// Generate a fresh session id of the form `repl-<12 hex>`.
    pub fn generate_id() -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("repl-{}", &id[..12])
    }

    /// Owner identifier.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Session identifier, also the Deployment and Service name.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Template name.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// `app=` label value and selector.
    pub fn label_selector(&self) -> String {
        label_selector(&self.session_id)
    }

    /// Ingress name.
    pub fn ingress_name(&self) -> String {
        format!("{}-ingress", self.session_id)
    }

    /// Traefik middleware name.
    pub fn middleware_name(&self) -> String {
        format!("{}-stripprefix", self.session_id)
    }

    /// Storage folder holding this session's workspace.
    pub fn storage_prefix(&self) -> String {
        storage_prefix(&self.owner_id, &self.session_id)
    }
}

/// `repl/{owner}/{session}/`.
pub fn storage_prefix(owner_id: &str, session_id: &str) -> String {
    format!("repl/{}/{}/", owner_id, session_id)
}

/// `base/{template}/`, the folder new workspaces are seeded from.
pub fn template_prefix(template: &str) -> String {
    format!("base/{}/", template)
}

/// Pod label selector for a session's workload.
pub fn label_selector(session_id: &str) -> String {
    format!("app={}", session_id)
}

/// Check an owner id is usable as a single storage key segment.
pub fn validate_owner_id(owner_id: &str) -> Result<()> {
    let ok = !owner_id.is_empty()
        && owner_id.len() <= MAX_OWNER_ID_LEN
        && owner_id != "."
        && owner_id != ".."
        && owner_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid owner id: {:?}", owner_id)))
    }
}

/// Check a session id is a DNS-1035 label.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let bytes = session_id.as_bytes();
    let ok = !bytes.is_empty()
        && bytes.len() <= MAX_SESSION_ID_LEN
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid session id: {:?} (must be a lowercase DNS label)",
            session_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let session = Session::new("u1", "abc123", "node").unwrap();

        assert_eq!(session.session_id(), "abc123");
        assert_eq!(session.ingress_name(), "abc123-ingress");
        assert_eq!(session.middleware_name(), "abc123-stripprefix");
        assert_eq!(session.label_selector(), "app=abc123");
        assert_eq!(session.storage_prefix(), "repl/u1/abc123/");
    }

    #[test]
    fn test_rejects_bad_session_ids() {
        let too_long = "a".repeat(64);
        for id in ["", "1abc", "ABC", "abc-", "abc_def", "abc/def", too_long.as_str()] {
            assert!(
                matches!(Session::new("u1", id, "node"), Err(Error::Validation(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_bad_owner_ids() {
        for owner in ["", "..", "a/b", "a b", "a;rm -rf", "$(id)"] {
            assert!(
                matches!(Session::new(owner, "abc123", "node"), Err(Error::Validation(_))),
                "{owner:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_template() {
        assert!(Session::new("u1", "abc123", "").is_err());
        assert!(Session::new("u1", "abc123", "node;ls").is_err());
    }

    #[test]
    fn test_generated_id_is_valid() {
        let id = Session::generate_id();
        assert!(id.starts_with("repl-"));
        assert_eq!(id.len(), 17);
        validate_session_id(&id).unwrap();
        assert_ne!(id, Session::generate_id());
    }
}
