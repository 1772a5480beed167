//! Exit code constants for the snapsync CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Remote fetch failure
//! - 3: Persistence failure (write, publish, or corrupt snapshot)
//! - 4: Lock acquisition failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The remote source failed or returned a malformed payload.
pub const FETCH_FAILURE: i32 = 2;

/// The snapshot could not be written, published, or read back.
pub const PERSISTENCE_FAILURE: i32 = 3;

/// Lock acquisition failure: timed out or lock directory unusable.
pub const LOCK_FAILURE: i32 = 4;
