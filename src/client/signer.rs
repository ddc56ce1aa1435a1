//! The signing boundary: wraps a claim in the permanode owner's identity and uploads it as
//! a new blob. Every mutation this filesystem makes (creating a child, setting content,
//! deleting an entry, writing an xattr) goes through here rather than touching a permanode
//! directly — permanodes are reconstructed by replaying claims, never edited in place.

use chrono::{DateTime, Utc};

use crate::blobref::BlobRef;
use crate::errors::FuseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    SetAttribute,
    AddAttribute,
    DelAttribute,
}

impl ClaimKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimKind::SetAttribute => "set-attribute",
            ClaimKind::AddAttribute => "add-attribute",
            ClaimKind::DelAttribute => "del-attribute",
        }
    }
}

/// An unsigned claim against a permanode, ready to hand to a `SigningClient`.
#[derive(Debug, Clone)]
pub struct Claim {
    pub permanode: BlobRef,
    pub kind: ClaimKind,
    pub attr: String,
    pub value: String,
    pub claim_date: DateTime<Utc>,
}

impl Claim {
    pub fn set_attribute(permanode: BlobRef, attr: impl Into<String>, value: impl Into<String>) -> Self {
        Claim {
            permanode,
            kind: ClaimKind::SetAttribute,
            attr: attr.into(),
            value: value.into(),
            claim_date: Utc::now(),
        }
    }

    pub fn del_attribute(permanode: BlobRef, attr: impl Into<String>) -> Self {
        Claim {
            permanode,
            kind: ClaimKind::DelAttribute,
            attr: attr.into(),
            value: String::new(),
            claim_date: Utc::now(),
        }
    }
}

pub trait SigningClient: Send + Sync {
    /// Mints a fresh permanode (an empty signed "claim" blob naming a new random key) and
    /// returns its blob ref.
    fn new_permanode(&self) -> FuseResult<BlobRef>;

    /// Signs `claim` with this process's configured identity and uploads it, returning the
    /// new claim blob's ref. The describe layer picks it up on its next replay.
    fn sign_and_upload(&self, claim: Claim) -> FuseResult<BlobRef>;
}
