//! Byte-to-text encoding resolution for uploaded files.
//!
//! An upload either names a concrete encoding or asks for `Auto`
//! detection. Detection is statistical and never fails: pure-ASCII
//! content is treated as UTF-8, everything else gets the detector's
//! best guess.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::error::AnnattoError;

/// The sentinel name that requests automatic detection.
pub const AUTO: &str = "Auto";

/// Files at or below this size are read whole for detection; larger
/// files are fed to the detector incrementally.
const WHOLE_FILE_THRESHOLD: u64 = 64 * 1024;

/// Detection chunk size for large files.
const CHUNK_SIZE: usize = 8 * 1024;

/// Resolves the encoding to decode `path` with.
///
/// `requested` is either a concrete encoding label (e.g. `"utf-8"`,
/// `"shift_jis"`) or the sentinel [`AUTO`] (case-insensitive). Unknown
/// labels are an error; failed detection is not — it degrades to UTF-8.
pub fn resolve_encoding(path: &Path, requested: &str) -> Result<&'static Encoding, AnnattoError> {
    if requested.eq_ignore_ascii_case(AUTO) {
        return Ok(detect_encoding(path)?);
    }
    Encoding::for_label(requested.as_bytes())
        .ok_or_else(|| AnnattoError::UnknownEncoding(requested.to_string()))
}

/// Statistically detects the encoding of a file.
///
/// Pure-ASCII content is reported as UTF-8 without consulting the
/// detector. Otherwise small files are read whole and the detector's
/// best guess is taken; large files are fed in chunks until the guess
/// becomes trustworthy or the file is exhausted.
pub fn detect_encoding(path: &Path) -> std::io::Result<&'static Encoding> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut detector = EncodingDetector::new();

    if len <= WHOLE_FILE_THRESHOLD {
        let mut bytes = Vec::with_capacity(len as usize);
        let mut file = file;
        file.read_to_end(&mut bytes)?;
        if bytes.is_ascii() {
            return Ok(UTF_8);
        }
        detector.feed(&bytes, true);
        return Ok(detector.guess(None, true));
    }

    let mut file = file;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut saw_non_ascii = false;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            if !saw_non_ascii {
                return Ok(UTF_8);
            }
            detector.feed(&[], true);
            return Ok(detector.guess(None, true));
        }
        saw_non_ascii |= !buf[..n].is_ascii();
        detector.feed(&buf[..n], false);
        // Once the guess is trustworthy the rest of the file cannot
        // change it enough to matter.
        let (encoding, trustworthy) = detector.guess_assess(None, true);
        if trustworthy {
            return Ok(encoding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(bytes).expect("write temp file");
        file
    }

    #[test]
    fn explicit_label_wins() {
        let file = temp_with(b"hello");
        let enc = resolve_encoding(file.path(), "shift_jis").unwrap();
        assert_eq!(enc.name(), "Shift_JIS");
    }

    #[test]
    fn unknown_label_is_an_error() {
        let file = temp_with(b"hello");
        assert!(resolve_encoding(file.path(), "not-a-charset").is_err());
    }

    #[test]
    fn auto_is_case_insensitive() {
        let file = temp_with("caf\u{e9} au lait".as_bytes());
        assert!(resolve_encoding(file.path(), "auto").is_ok());
        assert!(resolve_encoding(file.path(), "AUTO").is_ok());
    }

    #[test]
    fn plain_ascii_degrades_to_utf8() {
        // Pure ASCII gives the detector nothing to be confident about;
        // the default must kick in rather than an error.
        let file = temp_with(b"just plain ascii text\n");
        let enc = detect_encoding(file.path()).unwrap();
        assert_eq!(enc, UTF_8);
    }

    #[test]
    fn detects_single_byte_western_content() {
        let file = temp_with(b"caf\xe9 au lait, d\xe9j\xe0 vu, fran\xe7ais\n");
        let enc = detect_encoding(file.path()).unwrap();
        let (decoded, _, _) = enc.decode(b"caf\xe9");
        assert_eq!(decoded, "caf\u{e9}");
    }

    #[test]
    fn detects_utf8_multibyte_content() {
        let text = "\u{65e5}\u{672c}\u{8a9e}\u{306e}\u{30c6}\u{30ad}\u{30b9}\u{30c8}".repeat(50);
        let file = temp_with(text.as_bytes());
        let enc = detect_encoding(file.path()).unwrap();
        assert_eq!(enc, UTF_8);
    }
}
