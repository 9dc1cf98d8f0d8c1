//! signature authentication.
//!
//! callers prove possession of the private key whose public counterpart
//! is bound to a user id. the canonical signed message is the user id
//! string itself, bytes as received. the four outcomes stay distinct
//! here; the http layer collapses the denials into one 401 so the
//! distinction never leaks to clients.

use ed25519_dalek::Verifier;

use meshdir_db::{IdentityStore, MeshdirDb};
use meshdir_types::{IdentityRecord, UserId, parse_signature_text};

/// result of a signature authentication attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// signature verified; carries the fetched record.
    Authenticated(IdentityRecord),
    /// the signature text is unparseable.
    BadFormat,
    /// a well-formed signature that does not verify.
    Mismatch,
    /// no identity record for the user id.
    UnknownUser,
}

/// authenticate a caller against the stored public key.
///
/// never auto-creates identity records; every failure is terminal for
/// the caller's operation.
pub async fn authenticate(
    db: &MeshdirDb,
    user_id: &UserId,
    signature: &str,
) -> Result<AuthOutcome, meshdir_db::Error> {
    let Some(record) = db.get_by_id(user_id).await? else {
        return Ok(AuthOutcome::UnknownUser);
    };

    // a released record keeps its row but loses its key; nothing can
    // authenticate against it
    let Some(stored_key) = record.public_key else {
        return Ok(AuthOutcome::Mismatch);
    };

    let signature = match parse_signature_text(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(AuthOutcome::BadFormat),
    };

    let verifying_key = match stored_key.verifying_key() {
        Ok(key) => key,
        // stored bytes that are not a curve point can never verify
        Err(_) => return Ok(AuthOutcome::Mismatch),
    };

    match verifying_key.verify(user_id.as_bytes(), &signature) {
        Ok(()) => Ok(AuthOutcome::Authenticated(record)),
        Err(_) => Ok(AuthOutcome::Mismatch),
    }
}
