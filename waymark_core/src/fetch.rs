//! Loading a GPX track from disk or over HTTP.
//!
//! Loads are one-shot: there are no retries and an in-flight request is
//! never aborted. If the selection a load was meant for has gone away in
//! the meantime, the caller cancels the [`CancelFlag`] and the result is
//! simply not applied.

use std::{
    fmt,
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    model::{GpxTrack, TrackStats},
    read::read_gpx_from_slice,
    resource::{LazyResource, LoadError},
    sync::{TrackSelection, TrackView},
};

/// The only message users ever see when a track cannot be shown. The
/// details go to the log.
pub const TRACK_UNAVAILABLE: &str = "Unable to display GPX track";

static HTTP_CLIENT: LazyResource<reqwest::Client> = LazyResource::new("HTTP client", || {
    async {
        reqwest::Client::builder()
            .user_agent(concat!("waymark/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Could not build the HTTP client")
    }
    .boxed()
});

/// The HTTP client shared by every download in the process.
pub async fn http_client() -> Result<Arc<reqwest::Client>, LoadError> {
    HTTP_CLIENT.get().await
}

/// Where a GPX file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Path(PathBuf),
    Url(String),
}

impl TrackSource {
    /// Anything starting with http:// or https:// is a URL, everything else
    /// is a path.
    pub fn parse(s: &str) -> Self {
        let lower = s.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            TrackSource::Url(s.trim().to_string())
        } else {
            TrackSource::Path(PathBuf::from(s))
        }
    }
}

impl FromStr for TrackSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<PathBuf> for TrackSource {
    fn from(path: PathBuf) -> Self {
        TrackSource::Path(path)
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::Path(path) => write!(f, "{}", path.display()),
            TrackSource::Url(url) => write!(f, "{url}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackError {
    /// The bytes could not be obtained: missing file, network failure or a
    /// non-2xx response.
    #[error("Unable to load GPX track from {location}: {cause:#}")]
    Fetch {
        location: String,
        #[source]
        cause: anyhow::Error,
    },
    /// The bytes are not well-formed XML.
    #[error("GPX track from {location} is malformed: {cause:#}")]
    Malformed {
        location: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl TrackError {
    pub fn user_message(&self) -> &'static str {
        TRACK_UNAVAILABLE
    }
}

/// Reads and parses a track. A well-formed file without any trackpoints is
/// not an error, it gives an empty track with zeroed stats.
pub async fn load_track(source: &TrackSource) -> Result<(GpxTrack, TrackStats), TrackError> {
    let location = source.to_string();
    info!("Loading GPX track from {location}");

    let bytes = fetch_bytes(source).await.map_err(|cause| TrackError::Fetch {
        location: location.clone(),
        cause,
    })?;

    let mut track = read_gpx_from_slice(&bytes).map_err(|cause| TrackError::Malformed {
        location: location.clone(),
        cause,
    })?;

    if let TrackSource::Path(path) = source {
        track.filename = Some(path.clone());
    }

    let stats = track.stats();
    Ok((track, stats))
}

async fn fetch_bytes(source: &TrackSource) -> Result<Vec<u8>> {
    match source {
        TrackSource::Path(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read {path:?}")),
        TrackSource::Url(url) => {
            let client = http_client().await?;
            let response = client
                .get(url)
                .send()
                .await
                .with_context(|| format!("Request to {url} failed"))?;

            let status = response.status();
            if !status.is_success() {
                bail!("Server returned {status}");
            }

            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("Could not read the body of {url}"))?;
            debug!("Downloaded {} bytes from {url}", bytes.len());
            Ok(bytes.to_vec())
        }
    }
}

/// Set when the consumer of a load has gone away.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Loads a track and publishes it to 'selection', unless 'cancel' was set
/// while the load was running. On failure the selection is cleared and shows
/// the generic message.
///
/// Returns the published view, or None if the track failed to load or the
/// result was discarded.
pub async fn load_into(
    selection: &TrackSelection,
    source: &TrackSource,
    cancel: &CancelFlag,
) -> Option<Arc<TrackView>> {
    let result = load_track(source).await;

    if cancel.is_cancelled() {
        debug!("Discarding load of {source}, it was cancelled");
        return None;
    }

    match result {
        Ok((track, _)) => Some(selection.load_track(track)),
        Err(err) => {
            warn!("{err}");
            selection.fail(err.user_message());
            None
        }
    }
}
