//! Navigation seam between the session core and the hosting shell
//!
//! Login and logout end in full-page navigations, and callback handling
//! rewrites the visible URL. Those effects belong to whatever embeds this
//! crate (a webview shell, a desktop window, a test harness), so they sit
//! behind a trait.

/// Window/history operations the session core needs from its host.
pub trait Navigator: Send + Sync {
    /// Full-page navigation to an external URL (identity provider
    /// authorization or end-session endpoint). Terminal for the current
    /// view; in-flight work is implicitly abandoned.
    fn redirect_external(&self, url: &str);

    /// Replace the current local route without adding a history entry.
    fn replace_route(&self, route: &str);

    /// Drop query parameters from the visible URL, leaving the route in
    /// place. Used to remove `code` and `state` after a callback.
    fn strip_query(&self);
}
