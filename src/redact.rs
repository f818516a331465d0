//! Redaction of wallet secrets in logs and `Debug` output.
//!
//! The signing key is the only secret this crate handles; [`Redacted`] keeps it
//! out of tracing fields, error reports and the config's `Debug` output.

use std::fmt::{self, Debug, Display};

/// Wrapper that prints `<redacted>` instead of its inner value.
///
/// ```ignore
/// use bridge_client::redact::Redacted;
///
/// tracing::debug!(key = %Redacted(&config.private_key), "Loaded signer");
/// // Logs: key = <redacted>
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Access the secret for the code path that actually needs it
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
