//! Decodes a fetched blob's bytes into a typed `SchemaBlob`, and reassembles chunked files
//! into a random-access byte stream.
//!
//! Schema blobs are small JSON documents tagged with a `camliType` field. This module only
//! decodes the fields this filesystem actually reads; unknown fields are ignored by serde's
//! default behavior.

use std::sync::Arc;

use serde::Deserialize;

use crate::blobref::BlobRef;
use crate::client::blobstore::{fetch_to_vec, BlobStoreClient};
use crate::errors::PosixError;

/// One ordered slice of a file's content: either a whole blob, or the object returns a
/// sub-range of a larger referenced blob when `offset` is nonzero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub blob_ref: BlobRef,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaBlob {
    File {
        size: u64,
        parts: Vec<FilePart>,
        mode: Option<u32>,
        mtime: Option<String>,
        uid: Option<u32>,
        gid: Option<u32>,
        file_name: Option<String>,
    },
    Directory {
        entries: BlobRef,
        mode: Option<u32>,
        mtime: Option<String>,
        file_name: Option<String>,
    },
    Symlink {
        target: String,
        mode: Option<u32>,
        file_name: Option<String>,
    },
    StaticSet {
        members: Vec<BlobRef>,
    },
    Permanode,
    /// `camliType: "bytes"`: same part-list shape as a file, used for the content of a
    /// large attribute value rather than a named file.
    Bytes {
        size: u64,
        parts: Vec<FilePart>,
    },
}

impl SchemaBlob {
    pub fn camli_type(&self) -> &'static str {
        match self {
            SchemaBlob::File { .. } => "file",
            SchemaBlob::Directory { .. } => "directory",
            SchemaBlob::Symlink { .. } => "symlink",
            SchemaBlob::StaticSet { .. } => "static-set",
            SchemaBlob::Permanode => "permanode",
            SchemaBlob::Bytes { .. } => "bytes",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPart {
    #[serde(rename = "blobRef")]
    blob_ref: String,
    size: u64,
    #[serde(default)]
    offset: u64,
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(rename = "camliType")]
    camli_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    parts: Vec<RawPart>,
    #[serde(rename = "entries")]
    entries: Option<String>,
    #[serde(rename = "members", default)]
    members: Vec<String>,
    #[serde(rename = "symlinkTarget")]
    symlink_target: Option<String>,
    #[serde(rename = "unixPermission")]
    unix_permission: Option<String>,
    #[serde(rename = "unixMtime")]
    unix_mtime: Option<String>,
    #[serde(rename = "unixOwnerId")]
    unix_owner_id: Option<u32>,
    #[serde(rename = "unixGroupId")]
    unix_group_id: Option<u32>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

fn parse_mode(s: &Option<String>) -> Option<u32> {
    let s = s.as_ref()?;
    let trimmed = s.trim_start_matches("0");
    if trimmed.is_empty() {
        return Some(0);
    }
    u32::from_str_radix(trimmed, 8).ok()
}

fn parse_blob_ref(s: &str) -> Result<BlobRef, PosixError> {
    s.parse()
        .map_err(|_| PosixError::invalid(format!("malformed blobRef in schema: {s:?}")))
}

/// Decodes the bytes of a fetched blob into a `SchemaBlob`. Returns `Err` if the bytes are
/// not valid JSON, or lack a recognized `camliType`.
pub fn decode_schema(bytes: &[u8]) -> Result<SchemaBlob, PosixError> {
    let raw: RawSchema = serde_json::from_slice(bytes)
        .map_err(|e| PosixError::invalid(format!("malformed schema blob: {e}")))?;

    let parts = raw
        .parts
        .iter()
        .map(|p| {
            Ok(FilePart {
                blob_ref: parse_blob_ref(&p.blob_ref)?,
                offset: p.offset,
                size: p.size,
            })
        })
        .collect::<Result<Vec<_>, PosixError>>()?;

    match raw.camli_type.as_str() {
        "file" => Ok(SchemaBlob::File {
            size: raw.size,
            parts,
            mode: parse_mode(&raw.unix_permission),
            mtime: raw.unix_mtime,
            uid: raw.unix_owner_id,
            gid: raw.unix_group_id,
            file_name: raw.file_name,
        }),
        "directory" => {
            let entries = raw
                .entries
                .ok_or_else(|| PosixError::invalid("directory schema missing \"entries\""))?;
            Ok(SchemaBlob::Directory {
                entries: parse_blob_ref(&entries)?,
                mode: parse_mode(&raw.unix_permission),
                mtime: raw.unix_mtime,
                file_name: raw.file_name,
            })
        }
        "symlink" => {
            let target = raw
                .symlink_target
                .ok_or_else(|| PosixError::invalid("symlink schema missing \"symlinkTarget\""))?;
            Ok(SchemaBlob::Symlink {
                target,
                mode: parse_mode(&raw.unix_permission),
                file_name: raw.file_name,
            })
        }
        "static-set" => {
            let members = raw
                .members
                .iter()
                .map(|m| parse_blob_ref(m))
                .collect::<Result<Vec<_>, PosixError>>()?;
            Ok(SchemaBlob::StaticSet { members })
        }
        "permanode" => Ok(SchemaBlob::Permanode),
        "bytes" => Ok(SchemaBlob::Bytes {
            size: raw.size,
            parts,
        }),
        other => Err(PosixError::invalid(format!(
            "unrecognized camliType: {other:?}"
        ))),
    }
}

/// Reassembles a file's ordered parts into a single random-access byte source, fetching
/// whichever part blob covers a given read range on demand. Parts are not cached here; the
/// blob store client is expected to do its own caching if desired.
pub struct FileReader {
    client: Arc<dyn BlobStoreClient>,
    parts: Vec<FilePart>,
    total_size: u64,
    // cumulative_offsets[i] is the file offset at which parts[i] begins.
    cumulative_offsets: Vec<u64>,
}

impl FileReader {
    pub fn new(client: Arc<dyn BlobStoreClient>, size: u64, parts: Vec<FilePart>) -> Self {
        let mut cumulative_offsets = Vec::with_capacity(parts.len());
        let mut pos = 0u64;
        for part in &parts {
            cumulative_offsets.push(pos);
            pos += part.size;
        }
        FileReader {
            client,
            parts,
            total_size: size,
            cumulative_offsets,
        }
    }

    pub fn len(&self) -> u64 {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Reads up to `buf.len()` bytes starting at file offset `offset`, returning the number
    /// of bytes actually read (0 at or past EOF). Reads never span a short part boundary
    /// silently; callers asking for more than one part's worth get however many contiguous
    /// bytes are available from the part(s) touched, matching ordinary short-read semantics.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, PosixError> {
        if offset >= self.total_size || buf.is_empty() {
            return Ok(0);
        }

        let part_idx = match self.cumulative_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let part = &self.parts[part_idx];
        let part_start = self.cumulative_offsets[part_idx];
        let within_part = offset - part_start;

        let want = buf.len().min((part.size - within_part) as usize);
        let data = fetch_to_vec(self.client.as_ref(), &part.blob_ref)?;

        let part_offset = (part.offset + within_part) as usize;
        if part_offset >= data.len() {
            return Ok(0);
        }
        let end = (part_offset + want).min(data.len());
        let n = end - part_offset;
        buf[..n].copy_from_slice(&data[part_offset..end]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::blobstore::BlobStream;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakeStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeStore {
        fn new(entries: &[(&str, &[u8])]) -> Self {
            let mut blobs = HashMap::new();
            for (k, v) in entries {
                blobs.insert(k.to_string(), v.to_vec());
            }
            FakeStore {
                blobs: Mutex::new(blobs),
            }
        }
    }

    impl BlobStoreClient for FakeStore {
        fn fetch(&self, blob_ref: &BlobRef) -> Result<BlobStream, PosixError> {
            let blobs = self.blobs.lock().unwrap();
            let data = blobs
                .get(&blob_ref.as_str())
                .cloned()
                .ok_or_else(|| PosixError::not_found(format!("no such blob: {}", blob_ref.as_str())))?;
            Ok(BlobStream {
                size: data.len() as u64,
                reader: Box::new(Cursor::new(data)),
            })
        }

        fn receive(&self, _reader: &mut dyn std::io::Read) -> Result<crate::blobref::SizedBlobRef, PosixError> {
            unimplemented!("not exercised in these tests")
        }
    }

    #[test]
    fn decodes_file_schema() {
        let json = br#"{
            "camliType": "file",
            "size": 11,
            "parts": [{"blobRef": "sha1-da39a3ee5e6b4b0d3255bfef95601890afd80709", "size": 11}],
            "unixPermission": "0644"
        }"#;
        let schema = decode_schema(json).unwrap();
        match schema {
            SchemaBlob::File { size, parts, mode, .. } => {
                assert_eq!(size, 11);
                assert_eq!(parts.len(), 1);
                assert_eq!(mode, Some(0o644));
            }
            other => panic!("unexpected schema: {other:?}"),
        }
    }

    #[test]
    fn decodes_directory_schema() {
        let json = br#"{
            "camliType": "directory",
            "entries": "sha1-0000000000000000000000000000000000000001"
        }"#;
        let schema = decode_schema(json).unwrap();
        assert_eq!(schema.camli_type(), "directory");
    }

    #[test]
    fn decodes_symlink_schema() {
        let json = br#"{"camliType": "symlink", "symlinkTarget": "../elsewhere"}"#;
        let schema = decode_schema(json).unwrap();
        match schema {
            SchemaBlob::Symlink { target, .. } => assert_eq!(target, "../elsewhere"),
            other => panic!("unexpected schema: {other:?}"),
        }
    }

    #[test]
    fn rejects_directory_missing_entries() {
        let json = br#"{"camliType": "directory"}"#;
        assert!(decode_schema(json).is_err());
    }

    #[test]
    fn rejects_unknown_camli_type() {
        let json = br#"{"camliType": "something-else"}"#;
        assert!(decode_schema(json).is_err());
    }

    #[test]
    fn file_reader_reassembles_parts() {
        let part_a = "sha1-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let part_b = "sha1-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let store = Arc::new(FakeStore::new(&[(part_a, b"hello "), (part_b, b"world")]));
        let parts = vec![
            FilePart { blob_ref: part_a.parse().unwrap(), offset: 0, size: 6 },
            FilePart { blob_ref: part_b.parse().unwrap(), offset: 0, size: 5 },
        ];
        let reader = FileReader::new(store, 11, parts);

        let mut buf = [0u8; 11];
        let n = reader.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello ");

        let mut buf2 = [0u8; 11];
        let n2 = reader.read_at(6, &mut buf2).unwrap();
        assert_eq!(&buf2[..n2], b"world");
    }

    #[test]
    fn file_reader_read_past_eof_returns_zero() {
        let reader = FileReader::new(Arc::new(FakeStore::new(&[])), 0, vec![]);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(0, &mut buf).unwrap(), 0);
    }
}
