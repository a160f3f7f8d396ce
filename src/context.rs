//! Service context bundling all port trait objects.

use crate::adapters::live::{
    LiveClock, LiveFileSystem, LiveHttpClient, LiveIdGenerator, LiveShellExecutor,
};
use crate::ports::{Clock, FileSystem, HttpClient, IdGenerator, ShellExecutor};

/// Bundles the external boundaries the verification core touches.
///
/// Components receive the context explicitly (usually behind an `Arc`), so
/// tests can wire in fakes for any port.
pub struct ServiceContext {
    /// Clock for timestamping evidence and attempts.
    pub clock: Box<dyn Clock>,
    /// Filesystem for file checks, self-review and the task store.
    pub fs: Box<dyn FileSystem>,
    /// Shell executor for command-based checks and the shell task executor.
    pub shell: Box<dyn ShellExecutor>,
    /// HTTP client for endpoint checks.
    pub http: Box<dyn HttpClient>,
    /// ID generator for new tasks.
    pub id_gen: Box<dyn IdGenerator>,
}

impl ServiceContext {
    /// Creates a context backed entirely by live adapters.
    #[must_use]
    pub fn live() -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            shell: Box::new(LiveShellExecutor),
            http: Box::new(LiveHttpClient::new()),
            id_gen: Box::new(LiveIdGenerator::new()),
        }
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext").finish_non_exhaustive()
    }
}
