//! Active record/replay session

use tracing::{debug, info};

use crate::config::{RecordMode, ReplayConfig};
use crate::error::{Result, RewindError};
use crate::filter;
use crate::intercept::{InterceptRegistry, DEFAULT_SOCKET_TIMEOUT};
use crate::matcher::{LiveRequest, Matched, RequestMatcher, Responder};
use crate::storage::RecordingFile;
use crate::transaction::{
    Body, Headers, QueryString, RequestRecord, ResponseRecord, Transaction,
};
use crate::transport::{FetchedResponse, Transport};

use super::ReplayManager;

/// How the session entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Serving recorded transactions only; read-only
    Replaying,
    /// Replaying existing matches while recording unmatched calls
    Appending,
    /// Capturing live traffic, or rejecting it when the mode forbids
    Recording,
}

/// Response surfaced to the caller for an intercepted request
#[derive(Debug, Clone)]
pub struct ReplayedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Vec<u8>,
}

/// Scoped activation of the replay manager
///
/// Complete a session with [`finish`] or [`finish_after_error`] to apply the
/// persistence policy. Dropping without finishing (an unwind, an early
/// return) releases interception and persists nothing.
///
/// [`finish`]: ReplaySession::finish
/// [`finish_after_error`]: ReplaySession::finish_after_error
pub struct ReplaySession {
    config: ReplayConfig,
    recording: RecordingFile,
    transport: Box<dyn Transport>,
    intercept: InterceptRegistry,
    transactions: Vec<Transaction>,
    state: SessionState,
    released: bool,
}

impl ReplaySession {
    pub(super) fn begin(manager: ReplayManager) -> Result<Self> {
        let (config, recording, transport) = manager.into_parts();
        config.validate()?;

        let mut session = Self {
            config,
            recording,
            transport,
            intercept: InterceptRegistry::new(),
            transactions: Vec::new(),
            state: SessionState::Recording,
            released: false,
        };
        session.intercept.reset();

        let mode = session.config.record_mode;
        if session.recording.exists() && mode.can_replay() {
            debug!(
                path = %session.recording.path().display(),
                "replaying recorded interactions"
            );
            session.transactions = session.recording.load()?;

            let appending = mode == RecordMode::Append;
            session.intercept.enable(appending);
            session.register_recorded();

            if appending {
                // The one mode where replay and record coexist: recorded
                // matchers take precedence, unmatched calls fall through to
                // the universal interceptor and reach the network.
                session.intercept.register_passthrough_all();
                session.state = SessionState::Appending;
            } else {
                session.state = SessionState::Replaying;
            }

            return Ok(session);
        }

        debug!("recording network interactions");
        session.intercept.enable(mode.can_record());
        session.intercept.register_passthrough_all();
        session.state = SessionState::Recording;
        Ok(session)
    }

    /// Register every loaded transaction as a canned matcher
    fn register_recorded(&mut self) {
        for transaction in &self.transactions {
            let uri = add_querystring(
                &transaction.request.uri,
                &transaction.request.querystring,
            );
            let matcher = RequestMatcher::exact(transaction.request.method, &uri, true);
            self.intercept
                .register(matcher, Responder::Canned(vec![transaction.response.clone()]));
        }
        debug!(count = self.transactions.len(), "registered recorded matchers");
    }

    /// How the session entered
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Transactions captured or loaded so far
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Entry point for intercepted outbound calls
    ///
    /// Replay sessions serve the matching recorded response; recording
    /// sessions forward to the network and capture the transcript.
    ///
    /// # Errors
    ///
    /// Returns [`RewindError::NoMatchingRecording`] for an unmatched request
    /// in a pure-replay session, [`RewindError::RecordingDisabled`] when the
    /// mode forbids recording, or a transport error from the passthrough
    /// call
    pub fn handle(&mut self, request: &LiveRequest) -> Result<ReplayedResponse> {
        let matched = self.intercept.dispatch(
            request,
            &self.config.filter_uri,
            &self.config.filter_querystring,
        );

        match matched {
            Some(Matched::Canned(response)) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    "served from recording"
                );
                Ok(replayed(&response))
            }
            Some(Matched::Passthrough) => self.record_request(request),
            None => Err(RewindError::NoMatchingRecording {
                method: request.method,
                uri: request.url.clone(),
            }),
        }
    }

    /// Network passthrough: forward, filter, append
    fn record_request(&mut self, request: &LiveRequest) -> Result<ReplayedResponse> {
        let mode = self.config.record_mode;
        if !mode.can_record() {
            return Err(RewindError::RecordingDisabled(mode));
        }

        // Interception stays off only for the duration of the outbound call.
        self.intercept.disable();
        let timeout = request.timeout.unwrap_or(DEFAULT_SOCKET_TIMEOUT);
        let fetched = match self.transport.send(request, timeout) {
            Ok(fetched) => fetched,
            Err(err) => {
                self.intercept.enable(true);
                return Err(err);
            }
        };

        let transaction = self.build_transaction(request, &fetched);
        self.transactions.push(transaction);
        self.intercept.enable(true);

        debug!(
            method = %request.method,
            url = %request.url,
            status = fetched.status,
            count = self.transactions.len(),
            "recorded interaction"
        );

        Ok(ReplayedResponse {
            status: fetched.status,
            headers: fetched.headers,
            body: fetched.body,
        })
    }

    fn build_transaction(&self, request: &LiveRequest, fetched: &FetchedResponse) -> Transaction {
        let live_query =
            filter::parse_querystring(filter::querystring_of(&request.url));

        let request_record = RequestRecord {
            uri: filter::filter_uri(&request.url, &self.config.filter_uri),
            method: request.method,
            headers: filter::filter_headers(
                &headers_map(&request.headers),
                &self.config.filter_headers,
            ),
            body: Body::decode(&request.body),
            querystring: filter::filter_querystring(
                &live_query,
                &self.config.filter_querystring,
            ),
        };

        let body = Body::decode(&fetched.body);
        let mut headers = filter::filter_headers(
            &headers_map(&fetched.headers),
            &self.config.filter_headers,
        );

        // Filtering and decoding change the serialized body length, so a
        // stored Content-Length must be recomputed or replay would fail
        // transport-layer length validation. Binary placeholder bodies keep
        // the original header.
        if let Some(key) = content_length_key(&headers) {
            if let Some(len) = body.transfer_len() {
                headers.insert(key, Some(len.to_string()));
            }
        }

        Transaction {
            request: request_record,
            response: ResponseRecord {
                status: fetched.status,
                body,
                headers,
            },
        }
    }

    /// Complete the session, applying the persistence policy
    ///
    /// # Errors
    ///
    /// Returns error if serializing or writing the recording fails
    pub fn finish(mut self) -> Result<()> {
        self.finish_inner(false)
    }

    /// Complete the session after the enclosing scope failed
    ///
    /// Persists only when `record_on_error` is set.
    ///
    /// # Errors
    ///
    /// Returns error if serializing or writing the recording fails
    pub fn finish_after_error(mut self) -> Result<()> {
        self.finish_inner(true)
    }

    fn finish_inner(&mut self, errored: bool) -> Result<()> {
        self.release();

        if errored && !self.config.record_on_error {
            debug!("not persisting after error");
            return Ok(());
        }

        if self.state == SessionState::Replaying {
            debug!("replay session is read-only");
            return Ok(());
        }

        if !self.config.record_mode.can_record() {
            debug!(mode = %self.config.record_mode, "recording disabled, nothing persisted");
            return Ok(());
        }

        info!(
            path = %self.recording.path().display(),
            count = self.transactions.len(),
            "writing recorded interactions"
        );
        self.recording.store(&self.transactions)
    }

    /// Deactivate interception; exactly one release per session, idempotent
    fn release(&mut self) {
        if !self.released {
            self.intercept.disable();
            self.intercept.reset();
            self.released = true;
        }
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        self.release();
    }
}

fn replayed(response: &ResponseRecord) -> ReplayedResponse {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name.clone(), v)))
        .collect();

    ReplayedResponse {
        status: response.status,
        headers,
        body: response.body.to_bytes(),
    }
}

/// Re-attach a stored querystring map onto a literal URI
///
/// Parameters already embedded in the URI are kept unless the stored map
/// overrides them.
fn add_querystring(uri: &str, querystring: &QueryString) -> String {
    let mut combined = filter::parse_querystring(filter::querystring_of(uri));
    for (key, value) in querystring {
        combined.insert(key.clone(), value.clone());
    }

    let base = filter::strip_querystring(uri);
    let encoded = filter::encode_querystring(&combined);
    if encoded.is_empty() {
        return base;
    }

    match base.find('#') {
        Some(pos) => format!("{}?{encoded}{}", &base[..pos], &base[pos..]),
        None => format!("{base}?{encoded}"),
    }
}

fn headers_map(headers: &[(String, String)]) -> Headers {
    headers
        .iter()
        .map(|(name, value)| (name.clone(), Some(value.clone())))
        .collect()
}

fn content_length_key(headers: &Headers) -> Option<String> {
    headers
        .keys()
        .find(|key| key.eq_ignore_ascii_case("content-length"))
        .cloned()
}
