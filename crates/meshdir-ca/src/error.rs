//! certificate authority error types.

use thiserror::Error;

/// errors from ca bootstrap and leaf signing.
#[derive(Debug, Error)]
pub enum CaError {
    /// the ca has not been initialized.
    #[error("certificate authority is not initialized")]
    Uninitialized,

    /// reading or writing key material failed.
    #[error("ca file i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// persisted key material failed to parse; fatal at startup.
    #[error("failed to parse persisted ca material: {0}")]
    Parse(String),

    /// key or certificate generation failed.
    #[error("certificate generation error: {0}")]
    Generation(String),

    /// the csr could not be parsed.
    #[error("invalid certificate signing request: {0}")]
    CsrParse(String),

    /// the csr's self-signature did not verify.
    #[error("certificate signing request signature verification failed: {0}")]
    CsrSignature(String),

    /// the csr subject has no common name.
    #[error("certificate signing request has no common name")]
    MissingCommonName,

    /// the csr common name does not match the authenticated user.
    #[error("certificate common name '{found}' does not match user id '{expected}'")]
    CommonNameMismatch {
        /// the authenticated user id.
        expected: String,
        /// the common name the csr carried.
        found: String,
    },

    /// signing the leaf failed.
    #[error("certificate signing error: {0}")]
    Signing(String),

    /// a timestamp fell outside the representable range.
    #[error("time conversion failed")]
    Time,
}

impl CaError {
    /// whether this error is the caller's fault (maps to a 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CaError::CsrParse(_)
                | CaError::CsrSignature(_)
                | CaError::MissingCommonName
                | CaError::CommonNameMismatch { .. }
        )
    }
}
