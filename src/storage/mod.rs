//! Durable recording storage and codecs

mod json;
mod yaml;

pub use json::JsonCodec;
pub use yaml::YamlCodec;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::transaction::Transaction;

/// Converts the transaction list to and from durable bytes
pub trait Codec {
    /// File suffix for recordings in this format, without the dot
    fn suffix(&self) -> &'static str;

    /// Encode the transaction list
    ///
    /// # Errors
    ///
    /// Returns error if the transactions cannot be serialized
    fn encode(&self, transactions: &[Transaction]) -> Result<Vec<u8>>;

    /// Decode a transaction list
    ///
    /// # Errors
    ///
    /// Returns error if the raw bytes are not a valid recording
    fn decode(&self, raw: &[u8]) -> Result<Vec<Transaction>>;
}

/// A recording file bound to a codec
pub struct RecordingFile {
    path: PathBuf,
    codec: Box<dyn Codec>,
}

impl RecordingFile {
    /// Bind `path` to `codec`, applying the codec's suffix
    ///
    /// The suffix is appended, not substituted, so dotted recording names
    /// (`TestUsers.test_list`) survive intact.
    pub fn new(path: impl Into<PathBuf>, codec: Box<dyn Codec>) -> Self {
        let mut path = path.into();
        let suffix = codec.suffix();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some(suffix) {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            path.set_file_name(format!("{file_name}.{suffix}"));
        }
        Self { path, codec }
    }

    /// Final path including the codec suffix
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a recording exists at the path
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the recorded transactions
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn load(&self) -> Result<Vec<Transaction>> {
        let raw = fs::read(&self.path)?;
        self.codec.decode(&raw)
    }

    /// Persist the transaction list, replacing any existing recording
    ///
    /// Parent directories are created as needed. The write goes through a
    /// sibling temp file renamed into place, so a crash mid-write cannot
    /// leave a truncated recording.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or any file operation fails
    pub fn store(&self, transactions: &[Transaction]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = self.codec.encode(transactions)?;
        let staging = self.path.with_extension(format!("{}.tmp", self.codec.suffix()));
        fs::write(&staging, &encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Body, Headers, Method, QueryString, RequestRecord, ResponseRecord};
    use tempfile::TempDir;

    fn sample_transaction() -> Transaction {
        Transaction {
            request: RequestRecord {
                uri: "https://example.com/ping".to_string(),
                method: Method::Get,
                headers: Headers::new(),
                body: Body::Text(String::new()),
                querystring: QueryString::new(),
            },
            response: ResponseRecord {
                status: 200,
                body: Body::Text("pong".to_string()),
                headers: Headers::new(),
            },
        }
    }

    #[test]
    fn test_suffix_applied() {
        let file = RecordingFile::new("/tmp/rewind/example", Box::new(JsonCodec));
        assert_eq!(file.path(), Path::new("/tmp/rewind/example.json"));

        let file = RecordingFile::new("/tmp/rewind/example", Box::new(YamlCodec));
        assert_eq!(file.path(), Path::new("/tmp/rewind/example.yaml"));
    }

    #[test]
    fn test_suffix_preserves_dotted_names() {
        let file = RecordingFile::new("/tmp/rewind/TestUsers.test_list", Box::new(JsonCodec));
        assert_eq!(file.path(), Path::new("/tmp/rewind/TestUsers.test_list.json"));

        let file = RecordingFile::new("/tmp/rewind/example.json", Box::new(JsonCodec));
        assert_eq!(file.path(), Path::new("/tmp/rewind/example.json"));
    }

    #[test]
    fn test_store_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/recording");
        let file = RecordingFile::new(nested, Box::new(JsonCodec));

        file.store(&[sample_transaction()]).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn test_store_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = RecordingFile::new(dir.path().join("recording"), Box::new(JsonCodec));

        let transactions = vec![sample_transaction(), sample_transaction()];
        file.store(&transactions).unwrap();

        assert_eq!(file.load().unwrap(), transactions);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = RecordingFile::new(dir.path().join("absent"), Box::new(JsonCodec));

        assert!(!file.exists());
        assert!(file.load().is_err());
    }

    #[test]
    fn test_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let file = RecordingFile::new(dir.path().join("recording"), Box::new(JsonCodec));

        file.store(&[sample_transaction(), sample_transaction()])
            .unwrap();
        file.store(&[sample_transaction()]).unwrap();

        assert_eq!(file.load().unwrap().len(), 1);
    }
}
