//! Gateway token storage in the system keyring.

use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::{debug, warn};

const KEYRING_SERVICE: &str = "chatline";
const KEYRING_ACCOUNT: &str = "gateway-token";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors mean the credential backend was temporarily
/// unavailable (for example a locked keychain). Permanent errors surface
/// the underlying cause directly.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyring error: {}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Trim a pasted token; `None` when nothing is left.
pub fn normalize_token(input: &str) -> Option<String> {
    let token = input.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The keyring entry holding the gateway token.
pub struct TokenStore {
    entry: Entry,
}

impl TokenStore {
    pub fn open() -> Result<Self, KeyringAccessError> {
        Ok(Self {
            entry: Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?,
        })
    }

    pub fn store(&self, token: &str) -> Result<(), KeyringAccessError> {
        self.entry.set_password(token)?;
        debug!("gateway token stored in keyring");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<String>, KeyringAccessError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns false when there was nothing to remove.
    pub fn clear(&self) -> Result<bool, KeyringAccessError> {
        match self.entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Token from the keyring, or `None` when it is missing or unreadable.
///
/// Keyring problems are logged rather than returned: the gateway may not
/// require a token at all.
pub fn keyring_token() -> Option<String> {
    let result = TokenStore::open().and_then(|store| store.load());
    match result {
        Ok(token) => token,
        Err(err) if err.is_recoverable() => {
            warn!(error = %err, "keyring temporarily unavailable");
            None
        }
        Err(err) => {
            debug!(error = %err, "no usable keyring token");
            None
        }
    }
}
