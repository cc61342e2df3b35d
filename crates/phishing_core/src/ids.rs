//! crates/phishing_core/src/ids.rs
//!
//! Random identifiers for targets and pools.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Number of random bytes behind each identifier.
pub const ID_BYTES: usize = 8;

/// Generates an unguessable, URL-safe identifier.
///
/// The bytes must come from the OS CSPRNG: identifiers double as capability
/// tokens in tracking links.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
