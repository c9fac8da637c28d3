//! Login secrets live in the system keyring, keyed by profile and username,
//! and are only read back at acquisition time.

use keyring::Entry;
use log::debug;

use super::errors::StorageError;

const SERVICE_NAME: &str = "sapflow";

pub struct SecretVault;

impl SecretVault {
    fn entry(profile: &str, username: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(SERVICE_NAME, &format!("{profile}/{username}"))?)
    }

    /// The stored secret for a profile's user.
    pub fn get(profile: &str, username: &str) -> Result<String, StorageError> {
        match Self::entry(profile, username)?.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => {
                Err(StorageError::SecretNotFound(profile.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store or replace the secret.
    pub fn set(profile: &str, username: &str, secret: &str) -> Result<(), StorageError> {
        debug!("Storing secret for {profile}/{username}");
        Ok(Self::entry(profile, username)?.set_password(secret)?)
    }

    /// Remove the secret (`Ok` even if none was stored).
    pub fn delete(profile: &str, username: &str) -> Result<(), StorageError> {
        match Self::entry(profile, username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
