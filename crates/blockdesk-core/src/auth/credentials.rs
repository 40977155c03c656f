use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "blockdesk";

/// Keychain account under which the long-lived API key is kept.
const API_KEY_ACCOUNT: &str = "api-key";

/// OS keychain storage for the long-lived API key.
pub struct CredentialStore;

impl CredentialStore {
    /// Store an API key in the OS keychain
    pub fn store_api_key(key: &str) -> Result<()> {
        let entry =
            Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")?;
        entry
            .set_password(key)
            .context("Failed to store API key in keychain")?;
        Ok(())
    }

    /// Retrieve the stored API key, if any
    pub fn api_key() -> Result<Option<String>> {
        let entry =
            Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve API key from keychain"),
        }
    }

    /// Delete the stored API key; deleting a missing key succeeds.
    pub fn delete_api_key() -> Result<()> {
        let entry =
            Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete API key from keychain"),
        }
    }
}
