//! Source of the backend base URL.

/// Tells the health monitor where the backend currently listens.
///
/// Implementations must answer from memory; this is called on every check.
#[cfg_attr(test, mockall::automock)]
pub trait BackendUrlSource: Send + Sync {
    /// `http://127.0.0.1:<port>` while a port is known, otherwise `None`.
    fn base_url(&self) -> Option<String>;
}

/// A URL source that always answers with the same value.
///
/// Useful for monitoring a backend that was started outside the supervisor.
#[derive(Debug, Clone)]
pub struct FixedBackendUrl(Option<String>);

impl FixedBackendUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(Some(url.into()))
    }

    pub const fn unavailable() -> Self {
        Self(None)
    }
}

impl BackendUrlSource for FixedBackendUrl {
    fn base_url(&self) -> Option<String> {
        self.0.clone()
    }
}
