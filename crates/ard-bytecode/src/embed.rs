//! Self-embedding: a bytecode payload appended to an executable.
//!
//! ```text
//! [host executable][payload][b"ARDBYTECODEv1"][payload length: u64 LE]
//! ```
//!
//! A missing or malformed footer always means "no embedded program". Plain
//! binaries must keep working, so nothing here reports the file as corrupt.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

pub const MARKER: &[u8; 13] = b"ARDBYTECODEv1";

/// Bytes after the payload: marker plus length.
pub const FOOTER_LEN: usize = MARKER.len() + 8;

/// `host` followed by `payload` and its footer.
pub fn append_payload(host: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(host.len() + payload.len() + FOOTER_LEN);
    out.extend_from_slice(host);
    out.extend_from_slice(payload);
    out.extend_from_slice(MARKER);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out
}

/// Payload start offset described by a footer, if it is well-formed for a
/// file of `file_len` bytes.
fn payload_start(footer: &[u8], file_len: u64) -> Option<u64> {
    let (marker, len) = footer.split_at(MARKER.len());
    if marker != MARKER {
        return None;
    }
    let len = u64::from_le_bytes(len.try_into().ok()?);
    file_len.checked_sub(FOOTER_LEN as u64)?.checked_sub(len)
}

/// The embedded payload of an in-memory file.
pub fn extract_payload(bytes: &[u8]) -> Option<&[u8]> {
    let footer_at = bytes.len().checked_sub(FOOTER_LEN)?;
    let start = payload_start(&bytes[footer_at..], bytes.len() as u64)?;
    bytes.get(start as usize..footer_at)
}

/// Read the payload embedded in the file at `path`. Any I/O problem counts
/// as "absent".
pub fn read_embedded(path: &Path) -> Option<Vec<u8>> {
    match read_footer_payload(path) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "No embedded program");
            None
        }
    }
}

fn read_footer_payload(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    if file_len < FOOTER_LEN as u64 {
        return Ok(None);
    }
    file.seek(SeekFrom::End(-(FOOTER_LEN as i64)))?;
    let mut footer = [0u8; FOOTER_LEN];
    file.read_exact(&mut footer)?;
    let Some(start) = payload_start(&footer, file_len) else {
        return Ok(None);
    };

    let len = file_len - FOOTER_LEN as u64 - start;
    file.seek(SeekFrom::Start(start))?;
    let mut payload = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut payload)?;
    debug!(path = %path.display(), bytes = payload.len(), "Found embedded program");
    Ok(Some(payload))
}

/// Write `host` plus the embedded `payload` to `out` and mark it executable.
pub fn write_executable(out: &Path, host: &[u8], payload: &[u8]) -> io::Result<()> {
    std::fs::write(out, append_payload(host, payload))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(out, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_round_trip() {
        let file = append_payload(b"host-binary", b"payload");
        assert_eq!(file.len(), 11 + 7 + FOOTER_LEN);
        assert_eq!(extract_payload(&file), Some(&b"payload"[..]));
    }

    #[test]
    fn test_plain_files_have_no_payload() {
        assert_eq!(extract_payload(b""), None);
        assert_eq!(extract_payload(b"just an ordinary executable"), None);
    }

    #[test]
    fn test_bad_length_is_absent_not_corrupt() {
        let mut file = append_payload(b"host", b"data");
        let at = file.len() - 8;
        file[at..].copy_from_slice(&1000u64.to_le_bytes());
        assert_eq!(extract_payload(&file), None);
    }

    #[test]
    fn test_empty_payload() {
        let file = append_payload(b"host", b"");
        assert_eq!(extract_payload(&file), Some(&b""[..]));
    }

    #[test]
    fn test_read_embedded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let built = dir.path().join("app");
        write_executable(&built, b"\x7fELF-ish host", b"program bytes").unwrap();
        assert_eq!(read_embedded(&built), Some(b"program bytes".to_vec()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&built).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let plain = dir.path().join("plain");
        std::fs::write(&plain, b"no footer here, just bytes").unwrap();
        assert_eq!(read_embedded(&plain), None);
        assert_eq!(read_embedded(&dir.path().join("missing")), None);
    }
}
