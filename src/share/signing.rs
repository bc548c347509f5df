//! Shared Key authorisation for Azure Files share-level requests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::ShareError;

type HmacSha256 = Hmac<Sha256>;

/// Fields of a body-less share request that participate in the signature.
#[derive(Clone, Copy, Debug)]
pub(super) struct ShareRequest<'a> {
    pub(super) verb: &'a str,
    pub(super) account: &'a str,
    pub(super) share: &'a str,
    pub(super) date: &'a str,
    pub(super) version: &'a str,
}

impl ShareRequest<'_> {
    /// Canonical string covered by the HMAC. Content-Length is left empty
    /// because these requests never carry a body.
    pub(super) fn string_to_sign(&self) -> String {
        // VERB, then eleven standard headers that are all empty here.
        let mut rendered = format!("{}\n", self.verb);
        rendered.push_str(&"\n".repeat(11));
        rendered.push_str(&format!("x-ms-date:{}\nx-ms-version:{}\n", self.date, self.version));
        rendered.push_str(&format!("/{}/{}\nrestype:share", self.account, self.share));
        rendered
    }

    /// Value of the `Authorization` header.
    pub(super) fn authorization(&self, account_key: &str) -> Result<String, ShareError> {
        let key = STANDARD
            .decode(account_key.trim())
            .map_err(|err| ShareError::Credentials(format!("account key is not base64: {err}")))?;
        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|err| ShareError::Credentials(err.to_string()))?;
        mac.update(self.string_to_sign().as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{signature}", self.account))
    }
}
