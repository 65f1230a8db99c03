//! Process-wide resources that are expensive to create and are only created
//! when something first asks for them.
//!
//! A [`LazyResource`] starts the load on the first `get()`. Every caller that
//! arrives while the load is running waits on the same future, and the
//! outcome, success or failure, is kept for the life of the process.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{info, warn};
use thiserror::Error;

/// Creates the resource. Plain function pointers keep `LazyResource::new`
/// usable in a `static`.
pub type Loader<T> = fn() -> BoxFuture<'static, anyhow::Result<T>>;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<Arc<T>, LoadError>>>;

/// Where a resource is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// A load that failed. Every caller gets a copy of the same error.
#[derive(Debug, Clone, Error)]
#[error("{name} failed to load: {source}")]
pub struct LoadError {
    name: &'static str,
    #[source]
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl LoadError {
    /// The name of the resource that failed.
    pub fn resource(&self) -> &'static str {
        self.name
    }
}

pub struct LazyResource<T: Send + Sync + 'static> {
    name: &'static str,
    loader: Loader<T>,
    load: OnceLock<SharedLoad<T>>,
}

impl<T: Send + Sync + 'static> LazyResource<T> {
    pub const fn new(name: &'static str, loader: Loader<T>) -> Self {
        Self {
            name,
            loader,
            load: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the resource, loading it if this is the first request.
    pub async fn get(&self) -> Result<Arc<T>, LoadError> {
        self.shared_load().clone().await
    }

    pub fn state(&self) -> LoadState {
        match self.load.get() {
            None => LoadState::Uninitialized,
            Some(load) => match load.peek() {
                None => LoadState::Loading,
                Some(Ok(_)) => LoadState::Ready,
                Some(Err(_)) => LoadState::Failed,
            },
        }
    }

    fn shared_load(&self) -> &SharedLoad<T> {
        self.load.get_or_init(|| {
            let name = self.name;
            let loader = self.loader;

            async move {
                info!("Loading {name}");
                match loader().await {
                    Ok(value) => {
                        info!("Loaded {name}");
                        Ok(Arc::new(value))
                    }
                    Err(err) => {
                        warn!("Failed to load {name}: {err:#}");
                        let source: Box<dyn std::error::Error + Send + Sync> = err.into();
                        Err(LoadError {
                            name,
                            source: Arc::from(source),
                        })
                    }
                }
            }
            .boxed()
            .shared()
        })
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResource")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
