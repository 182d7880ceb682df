//! Test doubles for the session core
//!
//! Used by this crate's tests and by downstream crates exercising the
//! pipeline against a mock identity provider.

use parking_lot::Mutex;

use crate::navigator::Navigator;

/// A navigation event observed by [`RecordingNavigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Full-page navigation to an external URL.
    External(String),
    /// Local route replacement.
    Route(String),
    /// Query parameters dropped from the visible URL.
    QueryStripped,
}

/// Navigator that records every navigation instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every navigation observed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Navigation> {
        self.events.lock().clone()
    }

    /// The most recent external redirect, if any.
    #[must_use]
    pub fn last_external(&self) -> Option<String> {
        self.events.lock().iter().rev().find_map(|event| match event {
            Navigation::External(url) => Some(url.clone()),
            _ => None,
        })
    }

    /// The most recent local route replacement, if any.
    #[must_use]
    pub fn last_route(&self) -> Option<String> {
        self.events.lock().iter().rev().find_map(|event| match event {
            Navigation::Route(route) => Some(route.clone()),
            _ => None,
        })
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.events.lock().clear();
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_external(&self, url: &str) {
        self.events.lock().push(Navigation::External(url.to_string()));
    }

    fn replace_route(&self, route: &str) {
        self.events.lock().push(Navigation::Route(route.to_string()));
    }

    fn strip_query(&self) {
        self.events.lock().push(Navigation::QueryStripped);
    }
}
