//! Exit code constants for the safelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, invalid request)
//! - 2: Lock timed out
//! - 3: Lock failed (server refused, e.g. wrong nonce)
//! - 4: Lock server unavailable
//! - 5: Protocol or transport failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration or an invalid lock request.
pub const USER_ERROR: i32 = 1;

/// The lock or unlock request did not succeed before its deadline.
pub const LOCK_TIMEOUT: i32 = 2;

/// The lock server refused the request in a way retrying cannot fix.
pub const LOCK_FAILED: i32 = 3;

/// No lock server could be reached.
pub const SERVER_UNAVAILABLE: i32 = 4;

/// The lock server sent a malformed reply or the connection broke mid-request.
pub const PROTOCOL_FAILURE: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            LOCK_TIMEOUT,
            LOCK_FAILED,
            SERVER_UNAVAILABLE,
            PROTOCOL_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_fit_in_a_byte() {
        for code in [LOCK_TIMEOUT, LOCK_FAILED, SERVER_UNAVAILABLE, PROTOCOL_FAILURE] {
            assert!((0..=255).contains(&code));
        }
    }
}
