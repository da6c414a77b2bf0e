//! Pieces of the TCP-over-HTTPS tunnel protocol shared between the client and
//! the server: the connection identifier, the fixed window size, and the
//! non-blocking "read with deadline" primitive used on both sides of the
//! tunnel to bound how long a single socket read may take.

mod deadline;
mod id;

pub use deadline::{read_with_deadline, ReadOutcome};
pub use id::ConnectionId;

use std::time::Duration;

/// Size of a single PUT/GET transfer window, in bytes. Bounds the body of
/// every PUT request and every GET response.
pub const WINDOW_SIZE: usize = 640 * 1024;

/// Hard upper bound on the wall-clock time a single non-blocking read may
/// take before it is reported as an empty deadline expiry.
pub const READ_DEADLINE: Duration = Duration::from_secs(30);

/// Total timeout applied to every HTTP request the client makes against the
/// tunnel server.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(63);

/// Consecutive transport failures a client loop tolerates before giving up
/// on the session.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;
