//! Event-driven data resources for UI components.
//!
//! A [`DataResource`] owns the lifecycle a list view needs: fetch on mount,
//! refetch whenever one of its watched events fires, and stop touching its
//! state once it is dropped.

use super::{EventBus, EventKind, Watch};
use futures::future::{BoxFuture, FutureExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

type Fetcher<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// What a component renders: last good data, whether a fetch is running,
/// and the last fetch error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

struct Shared<T> {
    state: watch::Sender<ResourceState<T>>,
    fetcher: Fetcher<T>,
    mounted: AtomicBool,
    fetches: AtomicU64,
}

impl<T: Send + Sync + 'static> Shared<T> {
    async fn load(self: Arc<Self>) {
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|s| s.loading = true);

        let result = (self.fetcher)().await;

        if !self.mounted.load(Ordering::SeqCst) {
            debug!("Resource unmounted during fetch, result discarded");
            return;
        }
        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(data) => {
                    s.data = Some(data);
                    s.error = None;
                }
                Err(e) => s.error = Some(e),
            }
        });
    }
}

/// A fetched value that refreshes itself on data-change events.
///
/// Must be mounted inside a tokio runtime. Dropping it unsubscribes from
/// the bus and discards any fetch still in flight.
pub struct DataResource<T> {
    shared: Arc<Shared<T>>,
    _watch: Watch,
}

impl<T> DataResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn mount<F, Fut, E>(bus: &EventBus, kinds: &[EventKind], fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let (state, _) = watch::channel(ResourceState::default());
        let fetcher: Fetcher<T> = Box::new(move || {
            let fut = fetch();
            async move { fut.await.map_err(|e| e.to_string()) }.boxed()
        });
        let shared = Arc::new(Shared {
            state,
            fetcher,
            mounted: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
        });

        let handle = Handle::current();
        let weak: Weak<Shared<T>> = Arc::downgrade(&shared);
        let watch = bus.watch(kinds, move |event| {
            if let Some(shared) = weak.upgrade() {
                debug!(event = ?event.kind(), "Refreshing resource");
                handle.spawn(shared.load());
            }
        });

        tokio::spawn(shared.clone().load());

        Self {
            shared,
            _watch: watch,
        }
    }

    /// Refetch now and wait for the result to land
    pub async fn refresh(&self) {
        self.shared.clone().load().await;
    }

    pub fn snapshot(&self) -> ResourceState<T> {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn updates(&self) -> watch::Receiver<ResourceState<T>> {
        self.shared.state.subscribe()
    }

    /// Fetches started so far, including the initial one
    pub fn fetch_count(&self) -> u64 {
        self.shared.fetches.load(Ordering::SeqCst)
    }
}

impl<T> Drop for DataResource<T> {
    fn drop(&mut self) {
        self.shared.mounted.store(false, Ordering::SeqCst);
    }
}
