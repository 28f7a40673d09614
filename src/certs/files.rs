//! On-disk location of the panel certificate pair.

use std::io;
use std::path::{Path, PathBuf};

use crate::atomic_file::{write_atomic, write_atomic_private};

pub const CERT_FILE: &str = "server.crt";
pub const KEY_FILE: &str = "server.key";

/// Previously installed file contents, kept for rollback.
#[derive(Clone)]
pub struct Backup {
    cert: Option<Vec<u8>>,
    key: Option<Vec<u8>>,
}

/// `server.crt` / `server.key` inside the secret directory.
#[derive(Debug, Clone)]
pub struct CertFiles {
    dir: PathBuf,
}

impl CertFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cert_path(&self) -> PathBuf {
        self.dir.join(CERT_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    /// Both files are present.
    pub fn exists(&self) -> bool {
        self.cert_path().is_file() && self.key_path().is_file()
    }

    pub fn read_cert(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self.cert_path())
    }

    pub fn read_pair(&self) -> io::Result<(Vec<u8>, Vec<u8>)> {
        Ok((self.read_cert()?, std::fs::read(self.key_path())?))
    }

    pub fn backup(&self) -> io::Result<Backup> {
        Ok(Backup {
            cert: read_optional(&self.cert_path())?,
            key: read_optional(&self.key_path())?,
        })
    }

    /// Replace both files, key first. Each file is replaced atomically but
    /// the pair is not.
    pub fn install(&self, cert_pem: &[u8], key_pem: &[u8]) -> io::Result<()> {
        write_atomic_private(&self.key_path(), key_pem)?;
        write_atomic(&self.cert_path(), cert_pem)
    }

    /// Put back what `backup` captured, removing files that did not exist.
    pub fn restore(&self, backup: &Backup) -> io::Result<()> {
        restore_one(&self.key_path(), backup.key.as_deref(), true)?;
        restore_one(&self.cert_path(), backup.cert.as_deref(), false)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn restore_one(path: &Path, contents: Option<&[u8]>, private: bool) -> io::Result<()> {
    match contents {
        Some(bytes) if private => write_atomic_private(path, bytes),
        Some(bytes) => write_atomic(path, bytes),
        None => match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}
