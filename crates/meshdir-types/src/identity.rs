//! identity record and merge patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::DomainPublicKey;
use crate::label::Label;

/// the identity document held per user id.
///
/// a record may outlive its domain assignment: cleanup clears
/// `domain_name` and `public_key` while leaving the rest intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// the subdomain owned by this user, when assigned.
    pub domain_name: Option<Label>,

    /// informational parent domain; ignored on reads.
    pub server_domain: Option<String>,

    /// the key that authenticates every mutation for this user.
    pub public_key: Option<DomainPublicKey>,

    /// updated by the heartbeat operation.
    pub last_seen_online: Option<DateTime<Utc>>,

    /// updated by route registration.
    pub last_route_registration: Option<DateTime<Utc>>,
}

impl IdentityRecord {
    /// derived online status: online iff the last heartbeat is within
    /// `threshold_secs` of now. a missing timestamp means offline.
    pub fn is_online(&self, threshold_secs: u64) -> bool {
        match self.last_seen_online {
            Some(seen) => {
                let age = Utc::now().signed_duration_since(seen);
                age <= chrono::Duration::seconds(threshold_secs as i64)
            }
            None => false,
        }
    }
}

/// a merge-write against an identity record.
///
/// `None` fields are left untouched; an all-`None` patch is rejected by
/// the store. clearing fields goes through the dedicated release
/// operation, never through a patch.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    /// claim or re-assert a domain label.
    pub domain_name: Option<Label>,
    /// informational parent domain.
    pub server_domain: Option<String>,
    /// rotate or set the authentication key.
    pub public_key: Option<DomainPublicKey>,
    /// heartbeat timestamp.
    pub last_seen_online: Option<DateTime<Utc>>,
    /// route registration timestamp.
    pub last_route_registration: Option<DateTime<Utc>>,
}

impl IdentityPatch {
    /// whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.domain_name.is_none()
            && self.server_domain.is_none()
            && self.public_key.is_none()
            && self.last_seen_online.is_none()
            && self.last_route_registration.is_none()
    }
}
