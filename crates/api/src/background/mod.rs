//! Long-running maintenance tasks spawned by the server binary.
//!
//! Each task loops on a fixed interval and exits when its
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires.

pub mod credential_cleanup;
pub mod rate_limit_sweep;
