//! Extended attribute storage: a permanode's `xattr:<name>` attributes, base64-decoded for
//! the kernel and re-encoded on write.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::client::describe::PermanodeDescription;
use crate::errors::{FuseResult, PosixError};

/// Decodes one xattr value. The stored form is always base64; a permanode holding anything
/// else is a sign something upstream of this filesystem wrote it directly, which shouldn't
/// happen but is reported as EIO rather than panicking.
pub fn get(desc: &PermanodeDescription, name: &str) -> FuseResult<Vec<u8>> {
    let raw = desc
        .xattrs
        .get(name)
        .ok_or_else(|| PosixError::no_xattr(format!("no such attribute: {name}")))?;
    BASE64
        .decode(raw)
        .map_err(|e| PosixError::transport(format!("corrupt xattr value for {name}: {e}")))
}

/// Lists attribute names, NUL-separated, in the form `listxattr` expects. Returns `Err`
/// with `ErrorKind::ResultTooLarge` if `max_size` is nonzero and the encoded list would not
/// fit, matching the kernel's ERANGE convention for too-small caller buffers.
pub fn list(desc: &PermanodeDescription, max_size: usize) -> FuseResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut names: Vec<&String> = desc.xattrs.keys().collect();
    names.sort();
    for name in names {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    if max_size != 0 && out.len() > max_size {
        return Err(PosixError::range(format!(
            "xattr list is {} bytes, buffer is {max_size}",
            out.len()
        )));
    }
    Ok(out)
}

/// Base64-encodes `value` ready to be stored as a permanode's `xattr:<name>` attribute.
pub fn encode_value(value: &[u8]) -> String {
    BASE64.encode(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc_with(entries: &[(&str, &str)]) -> PermanodeDescription {
        let mut desc = PermanodeDescription::new();
        for (k, v) in entries {
            desc.set_attr(&format!("xattr:{k}"), v.to_string());
        }
        desc
    }

    #[test]
    fn get_decodes_base64() {
        let desc = desc_with(&[("user.comment", "aGVsbG8=")]);
        assert_eq!(get(&desc, "user.comment").unwrap(), b"hello");
    }

    #[test]
    fn get_missing_returns_no_xattr_error() {
        let desc = desc_with(&[]);
        let err = get(&desc, "user.missing").unwrap_err();
        assert_eq!(err.raw_error(), PosixError::no_xattr("").raw_error());
    }

    #[test]
    fn list_is_nul_separated_and_sorted() {
        let desc = desc_with(&[("user.b", "MQ=="), ("user.a", "Mg==")]);
        let listed = list(&desc, 0).unwrap();
        assert_eq!(listed, b"user.a\0user.b\0");
    }

    #[test]
    fn list_rejects_too_small_buffer() {
        let desc = desc_with(&[("user.comment", "aGVsbG8=")]);
        let err = list(&desc, 1).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ResultTooLarge);
    }

    #[test]
    fn encode_value_roundtrips_through_get() {
        let encoded = encode_value(b"round trip");
        let desc = desc_with(&[("user.x", &encoded)]);
        assert_eq!(get(&desc, "user.x").unwrap(), b"round trip");
    }
}
