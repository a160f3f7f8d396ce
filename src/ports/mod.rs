//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the verification core and an
//! external system (time, filesystem, subprocesses, HTTP, IDs).
//! Implementations live in `src/adapters/`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub mod clock;
pub mod filesystem;
pub mod http;
pub mod id_gen;
pub mod shell;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use http::{HttpClient, HttpError, HttpResponse};
pub use id_gen::IdGenerator;
pub use shell::{ShellExecutor, ShellOutput};

/// Error type returned by port methods that have no dedicated error enum.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future type alias used by async ports to keep the traits dyn-compatible.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Renders a duration the way timeout messages report it (`300s`, `250ms`).
#[must_use]
pub fn describe_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_whole_and_fractional_timeouts() {
        assert_eq!(describe_timeout(Duration::from_secs(300)), "300s");
        assert_eq!(describe_timeout(Duration::from_millis(250)), "250ms");
    }
}
