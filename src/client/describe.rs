//! The describe boundary: turns a permanode's blob ref into its reconstructed attribute
//! view (the result of replaying that permanode's signed `set-attribute`/`add-attribute`/
//! `del-attribute` claims in clock order). The replay itself happens outside this crate;
//! `DescribeClient` is the seam a real implementation plugs into.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::blobref::BlobRef;
use crate::errors::FuseResult;

pub const ATTR_CONTENT: &str = "camliContent";
pub const ATTR_NODE_TYPE: &str = "camliNodeType";
pub const ATTR_SYMLINK_TARGET: &str = "camliSymlinkTarget";
pub const ATTR_ROOT: &str = "camliRoot";
pub const ATTR_IMPORT_ROOT: &str = "camliImportRoot";
pub const ATTR_TITLE: &str = "title";
pub const ATTR_DEFAULT_VISIBILITY: &str = "camliDefVis";
const ATTR_PATH_PREFIX: &str = "camliPath:";
const ATTR_XATTR_PREFIX: &str = "xattr:";

/// The reconstructed state of one permanode: single-valued attributes (last writer wins,
/// per the describe server's claim replay), plus the two namespaced families
/// (`camliPath:<name>` and `xattr:<name>`) broken out into their own maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermanodeDescription {
    attrs: HashMap<String, String>,
    pub paths: HashMap<String, BlobRef>,
    /// xattr values as stored: base64-encoded bytes.
    pub xattrs: HashMap<String, String>,
}

impl PermanodeDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single-valued attribute, routing `camliPath:*` and `xattr:*` into their own
    /// maps the way the rest of this module expects to read them back.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(path_name) = name.strip_prefix(ATTR_PATH_PREFIX) {
            if let Ok(blob_ref) = value.parse() {
                self.paths.insert(path_name.to_string(), blob_ref);
            }
            return;
        }
        if let Some(xattr_name) = name.strip_prefix(ATTR_XATTR_PREFIX) {
            self.xattrs.insert(xattr_name.to_string(), value);
            return;
        }
        self.attrs.insert(name.to_string(), value);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn camli_content(&self) -> Option<BlobRef> {
        self.attr(ATTR_CONTENT).and_then(|v| v.parse().ok())
    }

    pub fn node_type(&self) -> Option<&str> {
        self.attr(ATTR_NODE_TYPE)
    }

    pub fn symlink_target(&self) -> Option<&str> {
        self.attr(ATTR_SYMLINK_TARGET)
    }

    pub fn title(&self) -> Option<&str> {
        self.attr(ATTR_TITLE)
    }

    pub fn is_root(&self) -> bool {
        self.attr(ATTR_ROOT).is_some()
    }

    pub fn root_name(&self) -> Option<&str> {
        self.attr(ATTR_ROOT)
    }

    pub fn import_root(&self) -> Option<&str> {
        self.attr(ATTR_IMPORT_ROOT)
    }

    pub fn default_visibility(&self) -> Option<&str> {
        self.attr(ATTR_DEFAULT_VISIBILITY)
    }
}

/// One entry in the `recent` directory's source list: a permanode plus whatever its
/// `camliContent` currently resolves to, with the content blob's MIME type when known (used
/// to decide the `.jpg` extension substitution rule).
#[derive(Debug, Clone)]
pub struct RecentPermanode {
    pub permanode: BlobRef,
    pub content: Option<BlobRef>,
    pub mime_type: Option<String>,
}

/// One recorded claim against a permanode's attribute: the instant it took effect and the
/// value it set (empty for a deletion claim).
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub date: DateTime<Utc>,
    pub value: String,
}

pub trait DescribeClient: Send + Sync {
    /// Reconstructs the current attribute state of the permanode named by `blob_ref`.
    fn describe(&self, blob_ref: &BlobRef) -> FuseResult<PermanodeDescription>;

    /// Reconstructs the attribute state of the permanode as it stood at `as_of`, rather
    /// than the current state. `None` is equivalent to `describe`.
    fn describe_as_of(&self, blob_ref: &BlobRef, as_of: Option<DateTime<Utc>>) -> FuseResult<PermanodeDescription> {
        let _ = as_of;
        self.describe(blob_ref)
    }

    /// Reconstructs the current attribute state for every permanode named in `blob_refs`,
    /// batched in one round trip where the underlying implementation supports it. The
    /// default falls back to one `describe` call per ref.
    fn describe_batch(&self, blob_refs: &[BlobRef]) -> FuseResult<HashMap<BlobRef, PermanodeDescription>> {
        let mut out = HashMap::with_capacity(blob_refs.len());
        for blob_ref in blob_refs {
            out.insert(blob_ref.clone(), self.describe(blob_ref)?);
        }
        Ok(out)
    }

    /// The `n` most recently modified permanodes, newest first.
    fn get_recent_permanodes(&self, n: usize) -> FuseResult<Vec<RecentPermanode>>;

    /// Permanodes currently carrying `attr`, up to `n`, optionally as of a historical
    /// instant.
    fn get_permanodes_with_attr(&self, attr: &str, n: usize, as_of: Option<DateTime<Utc>>) -> FuseResult<Vec<BlobRef>>;

    /// The claim history for one permanode attribute, oldest first. `attr_filter` of `None`
    /// returns claims against every attribute.
    fn get_claims(&self, permanode: &BlobRef, attr_filter: Option<&str>) -> FuseResult<Vec<ClaimRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_namespaced_attrs() {
        let mut desc = PermanodeDescription::new();
        desc.set_attr(
            "camliPath:foo.txt",
            "sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709",
        );
        desc.set_attr("xattr:user.comment", "aGVsbG8=");
        desc.set_attr(ATTR_TITLE, "My Node");

        assert_eq!(desc.paths.len(), 1);
        assert_eq!(desc.xattrs.get("user.comment"), Some(&"aGVsbG8=".to_string()));
        assert_eq!(desc.title(), Some("My Node"));
    }

    #[test]
    fn last_write_wins_for_single_valued_attrs() {
        let mut desc = PermanodeDescription::new();
        desc.set_attr(ATTR_TITLE, "first");
        desc.set_attr(ATTR_TITLE, "second");
        assert_eq!(desc.title(), Some("second"));
    }
}
