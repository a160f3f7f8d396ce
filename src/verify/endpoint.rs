//! HTTP endpoint checker.

use std::time::Duration;

use super::{describe_timeout, CheckOutcome};
use crate::ports::{HttpClient, HttpError};
use crate::task::CompletionCriterion;

const DEFAULT_EXPECTED_STATUS: u16 = 200;

pub(super) async fn endpoint_responds(
    http: &dyn HttpClient,
    criterion: &CompletionCriterion,
    timeout: Duration,
) -> CheckOutcome {
    let url = criterion.target.as_str();
    let expected = match criterion.expected.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_EXPECTED_STATUS,
        Some(raw) => match raw.parse::<u16>() {
            Ok(status) => status,
            Err(_) => {
                return CheckOutcome::fail(
                    String::new(),
                    format!("Invalid expected status {raw:?} for {url}"),
                )
            }
        },
    };

    match http.get(url, timeout).await {
        Ok(response) => {
            let raw = format!("HTTP {}\n{}", response.status, response.body);
            if response.status == expected {
                CheckOutcome::pass(raw, format!("GET {url} returned {expected}"))
            } else {
                CheckOutcome::fail(
                    raw,
                    format!("GET {url} returned {}, expected {expected}", response.status),
                )
            }
        }
        Err(HttpError::Timeout(_)) => {
            let reason = format!("timed out after {}", describe_timeout(timeout));
            CheckOutcome::fail(String::new(), reason)
        }
        Err(err @ HttpError::Request(_)) => {
            CheckOutcome::fail(err.to_string(), format!("GET {url} failed: {err}"))
        }
    }
}
