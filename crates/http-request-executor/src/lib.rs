//! HTTP transport for the sequential request queue.
//!
//! `HttpExecutor` posts each request's payload to `{api_base_url}/api/{command}`
//! and maps the response onto the queue's failure taxonomy:
//! - 2xx: success, with optional server `updates`
//! - 408 and 5xx: transient
//! - 429: rate limited, honoring `Retry-After`
//! - other 4xx: terminal
//! - connection failures: offline

mod classify;
mod error;
mod executor;

pub use classify::{classify_status, parse_retry_after, parse_success_body};
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{ExecutorConfig, HttpExecutor};
