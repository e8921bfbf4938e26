//! Descent HOG archives
//!
//! A HOG file is the signature `DHF` followed by lumps stored back to back.
//! Each lump has a 13-byte NUL-padded name, a little-endian `u32` size and
//! then its data. There is no directory; reading means walking every lump.
//!
//! ```no_run
//! use hog::HogFile;
//!
//! let mut hog = HogFile::open("descent2.hog")?;
//! let song = hog.lump_data("game01.hmp")?.to_vec();
//! hog.replace_lump("game02.hmp", song)?;
//! hog.write()?;
//! # Ok::<(), hog::HogError>(())
//! ```

pub mod error;

pub use error::{HogError, Result};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const SIGNATURE: &[u8] = b"DHF";

/// Longest lump name; the 13th byte of the name field is always NUL
pub const MAX_NAME_LEN: usize = 12;

const NAME_FIELD_LEN: usize = 13;
const LUMP_HEADER_LEN: usize = NAME_FIELD_LEN + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lump {
    pub name: String,
    pub data: Vec<u8>,
}

/// An archive loaded into memory, tied to the path it came from
#[derive(Debug, Clone)]
pub struct HogFile {
    path: PathBuf,
    lumps: Vec<Lump>,
}

impl HogFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let lumps = parse(&bytes)?;
        debug!(path = %path.display(), lumps = lumps.len(), "opened HOG");
        Ok(Self {
            path: path.to_path_buf(),
            lumps,
        })
    }

    /// An empty archive that will be written to `path`
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lumps: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lumps(&self) -> &[Lump] {
        &self.lumps
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn lump_data(&self, name: &str) -> Result<&[u8]> {
        self.position(name)
            .map(|i| self.lumps[i].data.as_slice())
            .ok_or_else(|| HogError::not_found(name))
    }

    /// Replace the data of `name` in place, or append a new lump.
    /// Only the in-memory archive changes until [`HogFile::write`].
    pub fn replace_lump(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if name.len() > MAX_NAME_LEN {
            return Err(HogError::NameTooLong {
                name: name.to_string(),
            });
        }
        match self.position(name) {
            Some(i) => self.lumps[i].data = data,
            None => self.lumps.push(Lump {
                name: name.to_string(),
                data,
            }),
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let size: usize = self
            .lumps
            .iter()
            .map(|l| LUMP_HEADER_LEN + l.data.len())
            .sum();
        let mut out = Vec::with_capacity(SIGNATURE.len() + size);
        out.extend_from_slice(SIGNATURE);
        for lump in &self.lumps {
            let mut name = [0u8; NAME_FIELD_LEN];
            let len = lump.name.len().min(MAX_NAME_LEN);
            name[..len].copy_from_slice(&lump.name.as_bytes()[..len]);
            out.extend_from_slice(&name);
            out.extend_from_slice(&(lump.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&lump.data);
        }
        out
    }

    /// Rewrite the whole archive at its path
    pub fn write(&self) -> Result<()> {
        let bytes = self.to_bytes();
        fs::write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "wrote HOG");
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.lumps
            .iter()
            .position(|l| l.name.eq_ignore_ascii_case(name))
    }
}

fn parse(bytes: &[u8]) -> Result<Vec<Lump>> {
    if !bytes.starts_with(SIGNATURE) {
        return Err(HogError::BadSignature);
    }

    let mut lumps = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos < bytes.len() {
        let header = bytes
            .get(pos..pos + LUMP_HEADER_LEN)
            .ok_or(HogError::Truncated {
                offset: bytes.len(),
            })?;
        let name_field = &header[..NAME_FIELD_LEN];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_LEN);
        let name = String::from_utf8_lossy(&name_field[..name_len]).into_owned();
        let size = u32::from_le_bytes([header[13], header[14], header[15], header[16]]) as usize;

        let start = pos + LUMP_HEADER_LEN;
        let data = start
            .checked_add(size)
            .and_then(|end| bytes.get(start..end))
            .ok_or(HogError::Truncated {
                offset: bytes.len(),
            })?;
        lumps.push(Lump {
            name,
            data: data.to_vec(),
        });
        pos = start + size;
    }
    Ok(lumps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> HogFile {
        let mut hog = HogFile::create(dir.path().join("descent.hog"));
        hog.replace_lump("game01.hmp", b"first".to_vec()).unwrap();
        hog.replace_lump("briefing.txb", b"words".to_vec()).unwrap();
        hog.replace_lump("game02.hmp", b"second".to_vec()).unwrap();
        hog
    }

    #[test]
    fn test_layout() {
        let dir = TempDir::new().unwrap();
        let mut hog = HogFile::create(dir.path().join("one.hog"));
        hog.replace_lump("a.hmp", vec![1, 2]).unwrap();

        let bytes = hog.to_bytes();
        assert_eq!(&bytes[..3], b"DHF");
        assert_eq!(&bytes[3..8], b"a.hmp");
        assert!(bytes[8..16].iter().all(|&b| b == 0));
        assert_eq!(&bytes[16..20], &2u32.to_le_bytes());
        assert_eq!(&bytes[20..], &[1, 2]);
    }

    #[test]
    fn test_write_then_open() {
        let dir = TempDir::new().unwrap();
        let hog = sample(&dir);
        hog.write().unwrap();

        let reopened = HogFile::open(hog.path()).unwrap();
        assert_eq!(reopened.lumps(), hog.lumps());
    }

    #[test]
    fn test_replace_keeps_other_lumps() {
        let dir = TempDir::new().unwrap();
        sample(&dir).write().unwrap();

        let mut hog = HogFile::open(dir.path().join("descent.hog")).unwrap();
        hog.replace_lump("GAME01.HMP", b"replaced".to_vec()).unwrap();
        hog.write().unwrap();

        let hog = HogFile::open(dir.path().join("descent.hog")).unwrap();
        assert_eq!(hog.lumps().len(), 3);
        assert_eq!(hog.lumps()[0].name, "game01.hmp");
        assert_eq!(hog.lump_data("game01.hmp").unwrap(), b"replaced");
        assert_eq!(hog.lump_data("briefing.txb").unwrap(), b"words");
        assert_eq!(hog.lump_data("game02.hmp").unwrap(), b"second");
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let hog = sample(&dir);
        assert!(hog.contains("Game02.Hmp"));
        assert!(!hog.contains("game03.hmp"));
        assert!(matches!(
            hog.lump_data("game03.hmp"),
            Err(HogError::NotFound { .. })
        ));
    }

    #[test]
    fn test_name_too_long() {
        let dir = TempDir::new().unwrap();
        let mut hog = sample(&dir);
        let err = hog.replace_lump("thirteen.char", vec![]).unwrap_err();
        assert!(matches!(err, HogError::NameTooLong { .. }));
        assert_eq!(hog.lumps().len(), 3);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(parse(b"PWAD"), Err(HogError::BadSignature)));

        let dir = TempDir::new().unwrap();
        let mut bytes = sample(&dir).to_bytes();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(parse(&bytes), Err(HogError::Truncated { .. })));

        // a partial lump header
        assert!(matches!(
            parse(b"DHFgame"),
            Err(HogError::Truncated { offset: 7 })
        ));
        assert_eq!(parse(b"DHF").unwrap(), vec![]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            HogFile::open(dir.path().join("nope.hog")),
            Err(HogError::Io(_))
        ));
    }
}
