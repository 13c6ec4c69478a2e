// API client module: a small blocking HTTP client that talks to the
// doarama API. Every operation is a single synchronous request/response
// exchange; the caller decides how to handle partial failures.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use reqwest::blocking::{multipart, Client as HttpClient, RequestBuilder, Response};
use reqwest::Method;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Activity, ActivityInfo, ActivityType, Visualisation, VisualisationUrlOptions};

/// Decides how remote calls are executed. The default, [`SingleAttempt`],
/// performs each call exactly once with no retries.
///
/// `attempt` performs one full request/response exchange, including the
/// HTTP status check, so an alternative policy can retry on transport
/// errors or 5xx responses. Track uploads consume their input stream and
/// bypass the policy; they always run exactly once.
pub trait RetryPolicy: Send + Sync {
    fn run(
        &self,
        operation: &'static str,
        attempt: &mut dyn FnMut() -> Result<Response>,
    ) -> Result<Response>;
}

/// The default remote-call policy: one attempt, no retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleAttempt;

impl RetryPolicy for SingleAttempt {
    fn run(
        &self,
        _operation: &'static str,
        attempt: &mut dyn FnMut() -> Result<Response>,
    ) -> Result<Response> {
        attempt()
    }
}

/// A cloneable cancellation signal checked before every remote call.
///
/// Cancelling mid-batch makes the batch flow roll back exactly as a
/// failed upload would.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Client for the doarama API, identifying one application. Immutable
/// after construction; derive per-user [`Session`]s with
/// [`Client::anonymous`], [`Client::delegate`] or [`Client::authenticate`].
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    config: Config,
    policy: Arc<dyn RetryPolicy>,
    cancel: CancelToken,
}

/// A [`Client`] scoped to a resolved user identity. Exactly one of the
/// two identity kinds is active per session.
#[derive(Clone)]
pub struct Session {
    client: Client,
    identity: Identity,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
enum Identity {
    /// Caller-chosen opaque user id, sent as the `user-id` header.
    Anonymous(String),
    /// Caller-held user key, exchanged lazily for a server-issued
    /// delegation key on the first authenticated call. The exchange runs
    /// at most once per session.
    Delegated {
        user_key: String,
        delegation_key: OnceCell<String>,
    },
}

#[derive(Deserialize)]
struct DelegationResponse {
    #[serde(rename = "delegationKey")]
    delegation_key: String,
}

impl Client {
    /// Create a client from a resolved [`Config`]. Fails only if the
    /// underlying HTTP transport cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|source| Error::Transport {
            operation: "initialise http client",
            source,
        })?;
        Ok(Client {
            http,
            config,
            policy: Arc::new(SingleAttempt),
            cancel: CancelToken::new(),
        })
    }

    /// Replace the remote-call policy. Call sites are unaffected.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The cancellation token checked before every remote call. Clone it
    /// and call [`CancelToken::cancel`] from another thread to abort an
    /// in-flight batch.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.config.api_url
    }

    /// Bind a caller-chosen anonymous user id. Local only.
    pub fn anonymous(&self, user_id: &str) -> Session {
        Session {
            client: self.clone(),
            identity: Identity::Anonymous(user_id.to_string()),
        }
    }

    /// Bind a user key for delegated authentication. Local only; the key
    /// exchange happens lazily on the first authenticated call.
    pub fn delegate(&self, user_key: &str) -> Session {
        Session {
            client: self.clone(),
            identity: Identity::Delegated {
                user_key: user_key.to_string(),
                delegation_key: OnceCell::new(),
            },
        }
    }

    /// Resolve a session from optional credentials. Exactly one of
    /// `user_id` and `user_key` must be non-empty; any other combination
    /// is rejected before any remote call is made.
    pub fn authenticate(&self, user_id: Option<&str>, user_key: Option<&str>) -> Result<Session> {
        let user_id = user_id.filter(|s| !s.is_empty());
        let user_key = user_key.filter(|s| !s.is_empty());
        match (user_id, user_key) {
            (Some(id), None) => Ok(self.anonymous(id)),
            (None, Some(key)) => Ok(self.delegate(key)),
            _ => Err(Error::AmbiguousCredentials),
        }
    }

    /// Construct a local handle for a known activity id. No remote call.
    pub fn activity(&self, id: i64) -> Activity {
        Activity { id }
    }

    /// Construct a local handle for a known visualisation key. No remote
    /// call.
    pub fn visualisation(&self, key: String) -> Visualisation {
        Visualisation { key }
    }

    /// Render the display URL for a visualisation. Purely local.
    pub fn visualisation_url(
        &self,
        visualisation: &Visualisation,
        options: &VisualisationUrlOptions,
    ) -> String {
        visualisation.url(self.base_url(), options)
    }

    /// Query all known activity types. The result is sorted by name
    /// ascending regardless of the order the service returns.
    pub fn activity_types(&self) -> Result<Vec<ActivityType>> {
        const OP: &str = "query activity types";
        let response = self.execute(OP, || self.request(Method::GET, "/activityType"))?;
        let mut types: Vec<ActivityType> = decode(OP, response)?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Build a request with the application identification headers set.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);
        self.http
            .request(method, url)
            .header("api-name", &self.config.api_name)
            .header("api-key", &self.config.api_key)
    }

    /// Run a remote call through the configured policy. `build` is
    /// invoked once per attempt.
    fn execute(
        &self,
        operation: &'static str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        self.check_cancelled()?;
        self.execute_unchecked(operation, build)
    }

    /// As [`Client::execute`] but without the cancellation gate. Used by
    /// rollback deletes, which must still run after cancellation.
    fn execute_unchecked(
        &self,
        operation: &'static str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        self.policy.run(operation, &mut || {
            let response = build().send().map_err(|source| Error::Transport {
                operation,
                source,
            })?;
            check_status(operation, response)
        })
    }
}

impl Session {
    /// The underlying application client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Upload a GPS track (GPX or IGC; the service detects the format)
    /// as a new activity. `name` is the display name, conventionally the
    /// source file's base name.
    ///
    /// The track stream is consumed by the upload, so this call runs
    /// exactly once regardless of the configured retry policy.
    pub fn create_activity<R>(&self, name: &str, track: R) -> Result<Activity>
    where
        R: Read + Send + 'static,
    {
        const OP: &str = "create activity";
        self.client.check_cancelled()?;
        let (header, value) = self.identity_header()?;
        let part = multipart::Part::reader(track).file_name(name.to_string());
        let form = multipart::Form::new().part("gps_track", part);
        let response = self
            .client
            .request(Method::POST, "/activity")
            .header(header, value)
            .multipart(form)
            .send()
            .map_err(|source| Error::Transport {
                operation: OP,
                source,
            })?;
        let response = check_status(OP, response)?;
        decode(OP, response)
    }

    /// Upload the track file at `path`, deriving the display name from
    /// the path's base name. The file handle is released as soon as the
    /// upload completes or fails.
    pub fn create_activity_from_path(&self, path: &Path) -> Result<Activity> {
        let track = File::open(path).map_err(|source| Error::TrackFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.create_activity(&track_display_name(path), track)
    }

    /// Update the descriptive metadata of an activity on the remote
    /// service.
    pub fn set_activity_info(&self, activity: &Activity, info: &ActivityInfo) -> Result<()> {
        const OP: &str = "set activity info";
        let path = format!("/activity/{}", activity.id);
        self.execute(OP, |client| client.request(Method::POST, &path).json(info))?;
        Ok(())
    }

    /// Delete an activity. Deleting an id the service does not know is a
    /// remote-call failure, never a silent success.
    pub fn delete_activity(&self, activity: &Activity) -> Result<()> {
        self.client.check_cancelled()?;
        self.delete_activity_unchecked(activity)
    }

    /// Delete without the cancellation gate, so a cancelled batch can
    /// still roll back the activities it created.
    fn delete_activity_unchecked(&self, activity: &Activity) -> Result<()> {
        const OP: &str = "delete activity";
        let path = format!("/activity/{}", activity.id);
        self.execute_unchecked(OP, |client| client.request(Method::DELETE, &path))?;
        Ok(())
    }

    /// Combine already-created activities into a visualisation. One
    /// atomic remote call; the composite preserves the input order
    /// exactly, which is significant to the remote rendering.
    pub fn create_visualisation(&self, activities: &[Activity]) -> Result<Visualisation> {
        const OP: &str = "create visualisation";
        if activities.is_empty() {
            return Err(Error::NothingToVisualise);
        }
        let ids: Vec<i64> = activities.iter().map(|a| a.id).collect();
        let body = serde_json::json!({ "activityIds": ids });
        let response = self.execute(OP, |client| {
            client.request(Method::POST, "/visualisation").json(&body)
        })?;
        decode(OP, response)
    }

    /// Upload a batch of track files and combine them into one
    /// visualisation, all-or-nothing.
    ///
    /// Tracks are uploaded strictly in input order, one at a time. After
    /// each fully-created activity (upload plus optional info update)
    /// `on_activity` is invoked. On the first failure, or on
    /// cancellation, no further tracks are uploaded, every activity
    /// created so far is deleted, and the original error is returned.
    /// An empty `tracks` list fails before any remote call.
    pub fn visualise_tracks<F>(
        &self,
        tracks: &[PathBuf],
        info: Option<&ActivityInfo>,
        mut on_activity: F,
    ) -> Result<Visualisation>
    where
        F: FnMut(&Activity),
    {
        if tracks.is_empty() {
            return Err(Error::NothingToVisualise);
        }
        let mut created: Vec<Activity> = Vec::new();
        let mut failure: Option<Error> = None;
        for path in tracks {
            let result = self.create_activity_from_path(path).and_then(|activity| {
                if let Some(info) = info {
                    self.set_activity_info(&activity, info)?;
                }
                Ok(activity)
            });
            match result {
                Ok(activity) => {
                    on_activity(&activity);
                    created.push(activity);
                }
                Err(err) => {
                    failure = Some(err.for_track(path));
                    break;
                }
            }
        }
        if let Some(err) = failure {
            tracing::error!(error = %err, "batch upload failed, rolling back");
            for activity in &created {
                if let Err(delete_err) = self.delete_activity_unchecked(activity) {
                    tracing::warn!(
                        id = activity.id,
                        error = %delete_err,
                        "rollback delete failed"
                    );
                }
            }
            return Err(err);
        }
        self.create_visualisation(&created)
    }

    /// The identity header to attach to an authenticated request. For a
    /// delegated session this performs the user-key exchange on first
    /// use, memoized so it happens at most once.
    fn identity_header(&self) -> Result<(&'static str, String)> {
        match &self.identity {
            Identity::Anonymous(user_id) => Ok(("user-id", user_id.clone())),
            Identity::Delegated {
                user_key,
                delegation_key,
            } => {
                let key = delegation_key.get_or_try_init(|| self.exchange_delegation(user_key))?;
                Ok(("delegation-key", key.clone()))
            }
        }
    }

    fn exchange_delegation(&self, user_key: &str) -> Result<String> {
        const OP: &str = "delegate user key";
        let response = self.client.execute_unchecked(OP, || {
            self.client
                .request(Method::POST, "/user/delegate")
                .header("user-key", user_key)
        })?;
        let body: DelegationResponse = decode(OP, response)?;
        Ok(body.delegation_key)
    }

    /// Run an authenticated remote call through the client's policy.
    fn execute(
        &self,
        operation: &'static str,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Response> {
        self.client.check_cancelled()?;
        self.execute_unchecked(operation, build)
    }

    fn execute_unchecked(
        &self,
        operation: &'static str,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Response> {
        let (header, value) = self.identity_header()?;
        self.client
            .execute_unchecked(operation, || build(&self.client).header(header, value.clone()))
    }
}

/// The display name for a track path: its base name, converted lossily
/// so non-UTF-8 names keep as much of the caller's spelling as possible.
fn track_display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string())
}

fn check_status(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(Error::Status {
            operation,
            status,
            body,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    response
        .json()
        .map_err(|source| Error::Decode { operation, source })
}
