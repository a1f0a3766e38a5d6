//! Page location
//!
//! The client never touches a real browser location. Everything that reads
//! the current URL, rewrites it in place, or navigates away goes through
//! [`PageLocation`], so the one-time code cleanup and the entry-point
//! redirects are observable in tests and from the CLI.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::Result;

/// Current page location with history-replace and navigation
pub trait PageLocation: Send + Sync {
    /// Current URL
    fn current(&self) -> Url;

    /// Replace the visible URL without reloading
    fn replace(&self, url: Url);

    /// Navigate to `target`, resolved against the current URL
    fn assign(&self, target: &str);
}

/// Recorded location change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationEvent {
    /// History entry replaced in place
    Replaced(Url),
    /// Full navigation
    Navigated(Url),
}

/// In-memory location that records every change
pub struct MemoryLocation {
    current: RwLock<Url>,
    events: RwLock<Vec<LocationEvent>>,
}

impl MemoryLocation {
    /// Start at `url`
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            current: RwLock::new(url),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Start at a URL given as a string
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Every change so far, oldest first
    pub fn events(&self) -> Vec<LocationEvent> {
        self.events.read().clone()
    }

    /// Navigations only
    pub fn navigations(&self) -> Vec<Url> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                LocationEvent::Navigated(url) => Some(url.clone()),
                LocationEvent::Replaced(_) => None,
            })
            .collect()
    }

    /// In-place replacements only
    pub fn replacements(&self) -> Vec<Url> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                LocationEvent::Replaced(url) => Some(url.clone()),
                LocationEvent::Navigated(_) => None,
            })
            .collect()
    }
}

impl PageLocation for MemoryLocation {
    fn current(&self) -> Url {
        self.current.read().clone()
    }

    fn replace(&self, url: Url) {
        debug!(url = %url, "Replacing visible URL");
        *self.current.write() = url.clone();
        self.events.write().push(LocationEvent::Replaced(url));
    }

    fn assign(&self, target: &str) {
        let mut current = self.current.write();
        match current.join(target) {
            Ok(url) => {
                info!(url = %url, "Navigating");
                *current = url.clone();
                self.events.write().push(LocationEvent::Navigated(url));
            }
            Err(e) => warn!(target = %target, error = %e, "Ignoring navigation to invalid target"),
        }
    }
}

/// Remove `param` from the query of `url`, keeping other pairs and the fragment
#[must_use]
pub fn strip_query_param(url: &Url, param: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Strip-and-notify for the authorization code parameter.
///
/// Whichever resolution path gets here first performs the rewrite; every
/// later call is a no-op.
pub struct CodeCleanup {
    location: Arc<dyn PageLocation>,
    param: String,
    done: AtomicBool,
}

impl CodeCleanup {
    /// Cleanup for `param` on `location`
    pub fn new(location: Arc<dyn PageLocation>, param: impl Into<String>) -> Self {
        Self {
            location,
            param: param.into(),
            done: AtomicBool::new(false),
        }
    }

    /// Strip the parameter if nobody has yet. Returns `true` for the caller
    /// that performed the cleanup.
    pub fn strip_once(&self) -> bool {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let current = self.location.current();
        let stripped = strip_query_param(&current, &self.param);
        if stripped != current {
            self.location.replace(stripped);
            info!(param = %self.param, "Removed authorization code from URL");
        }
        true
    }

    /// Whether the cleanup has run
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Navigation back to the unauthenticated entry point
pub struct EntryRedirect {
    location: Arc<dyn PageLocation>,
    entry_point: String,
    lock: Mutex<()>,
}

impl EntryRedirect {
    /// Redirect to `entry_point` (a path such as `/`)
    pub fn new(location: Arc<dyn PageLocation>, entry_point: impl Into<String>) -> Self {
        Self {
            location,
            entry_point: entry_point.into(),
            lock: Mutex::new(()),
        }
    }

    /// Entry point path
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Navigate now unless already at the entry point. Returns whether a
    /// navigation happened.
    pub fn now(&self) -> bool {
        let _guard = self.lock.lock();
        if self.location.current().path() == self.entry_point {
            debug!(entry_point = %self.entry_point, "Already at entry point");
            return false;
        }
        self.location.assign(&self.entry_point);
        true
    }

    /// Navigate even when already at the entry point. A page that still
    /// carries a spent code has to be reloaded clean.
    pub fn force(&self) {
        let _guard = self.lock.lock();
        self.location.assign(&self.entry_point);
    }

    /// Unconditional navigation after `delay` on a background task
    pub fn after(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let redirect = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            redirect.force();
        })
    }
}
