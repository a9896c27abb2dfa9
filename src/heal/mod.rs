//! Unhealthy-container remediation.
//!
//! The heart of the controller: a restart state store, the backoff policy
//! and the per-container decision state machine, plus the scheduler that
//! runs decision passes on a fixed interval.
//!
//! ## Components
//!
//! - [`backoff`]: `min(max, base * 2^count)` waits and the reset window
//! - [`store`]: lock-guarded restart records shared by all passes
//! - [`engine`]: the decision state machine and restart issuance
//! - [`scheduler`]: periodic, possibly overlapping, pass execution
//!
//! ## Usage
//!
//! ```rust,no_run
//! use autoheal::container::{ContainerClient, DockerGateway};
//! use autoheal::heal::{BackoffPolicy, Remediator, RestartStore, Scheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = DockerGateway::new(ContainerClient::new().await?, None);
//!     let remediator = Remediator::new(
//!         Arc::new(gateway),
//!         RestartStore::new(),
//!         BackoffPolicy::new(5, 300, 3600),
//!     );
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     Scheduler::new(remediator, Duration::from_secs(5))
//!         .run(shutdown_rx)
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod engine;
pub mod scheduler;
pub mod store;
pub mod types;


pub use backoff::BackoffPolicy;
pub use engine::{DEFAULT_CALL_TIMEOUT, Remediator, evaluate};
pub use scheduler::Scheduler;
pub use store::RestartStore;
pub use types::*;
