//! Short job identifiers.
//!
//! Jobs use a 12-character lowercase-hex id instead of a UUID: the id
//! ends up in scratch directory names and result paths, where a compact
//! token is easier to work with.

use rand::RngCore;

/// Length of a job id in hex characters (6 random bytes).
pub const JOB_ID_LEN: usize = 12;

/// Generate a new random job id.
pub fn new_job_id() -> String {
    let mut bytes = [0u8; JOB_ID_LEN / 2];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Whether a string has the shape of a job id.
pub fn is_valid_job_id(id: &str) -> bool {
    id.len() == JOB_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
