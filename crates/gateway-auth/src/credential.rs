//! Opaque bearer credentials.
//!
//! A credential is the hex-encoded SHA-256 digest of 32 bytes drawn from the
//! OS CSPRNG. Credentials are never persisted; durable keys use a second
//! SHA-256 digest of the credential string.

use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use gateway_core::error::AppError;
use gateway_core::result::AppResult;

/// Length of an encoded credential.
pub const CREDENTIAL_LEN: usize = 64;

/// Generate a fresh credential.
pub fn generate() -> AppResult<String> {
    let mut seed = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| AppError::internal(format!("OS random source failed: {e}")))?;
    Ok(hex::encode(Sha256::digest(seed)))
}

/// Digest used as the durable key for a credential.
pub fn digest(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

/// Reject anything that could not have been produced by [`generate`].
pub fn check_format(credential: &str) -> AppResult<()> {
    let well_formed = credential.len() == CREDENTIAL_LEN
        && credential
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(AppError::validation("Malformed credential"))
    }
}
