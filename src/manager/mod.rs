//! Replay manager orchestration

mod session;

pub use session::{ReplaySession, ReplayedResponse, SessionState};

use std::path::Path;

use crate::config::ReplayConfig;
use crate::error::Result;
use crate::storage::{Codec, JsonCodec, RecordingFile};
use crate::transport::{ReqwestTransport, Transport};

/// Entry point owning configuration and collaborators
///
/// Construction is cheap and does nothing observable; [`start`] decides
/// between replay and record and activates interception. A manager is
/// consumed by its session, one session per manager.
///
/// [`start`]: ReplayManager::start
pub struct ReplayManager {
    config: ReplayConfig,
    recording: RecordingFile,
    transport: Box<dyn Transport>,
}

impl ReplayManager {
    /// Manager with the default JSON codec and blocking network transport
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self::with_codec(config, Box::new(JsonCodec))
    }

    /// Manager with a custom codec
    #[must_use]
    pub fn with_codec(config: ReplayConfig, codec: Box<dyn Codec>) -> Self {
        let recording = RecordingFile::new(&config.path, codec);
        Self {
            config,
            recording,
            transport: Box::new(ReqwestTransport::new()),
        }
    }

    /// Replace the transport; tests substitute a scripted fake
    #[must_use]
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Final recording path including the codec suffix
    #[must_use]
    pub fn recording_path(&self) -> &Path {
        self.recording.path()
    }

    /// Whether a recording already exists at the resolved path
    #[must_use]
    pub fn recording_exists(&self) -> bool {
        self.recording.exists()
    }

    /// Begin the scoped session
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or an existing
    /// recording cannot be loaded
    pub fn start(self) -> Result<ReplaySession> {
        ReplaySession::begin(self)
    }

    /// Run `f` inside a session
    ///
    /// Interception is released on every path; the persistence policy is
    /// applied according to whether `f` returned an error.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or any session setup/teardown error
    pub fn scoped<T>(self, f: impl FnOnce(&mut ReplaySession) -> Result<T>) -> Result<T> {
        let mut session = self.start()?;
        match f(&mut session) {
            Ok(value) => {
                session.finish()?;
                Ok(value)
            }
            Err(err) => {
                session.finish_after_error()?;
                Err(err)
            }
        }
    }

    pub(crate) fn into_parts(self) -> (ReplayConfig, RecordingFile, Box<dyn Transport>) {
        (self.config, self.recording, self.transport)
    }
}
