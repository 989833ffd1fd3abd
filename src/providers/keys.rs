//! Per-tenant API key resolution.
//!
//! Key material at rest belongs to the store; the core only sees decrypted
//! keys through this seam. Resolved keys are cached in a bounded map so a
//! tenant lookup does not hit the store on every provider call.

use std::collections::HashMap;
use std::sync::Mutex;

/// Upper bound on cached tenant keys. Beyond this the cache is cleared
/// rather than evicted piecemeal; tenants are few and lookups are cheap.
const KEY_CACHE_CAP: usize = 256;

pub trait Keyring: Send + Sync {
    /// The API key to use for the given tenant, if any is configured.
    fn api_key(&self, tenant_id: &str) -> Option<String>;
}

/// Keyring backed by the service configuration: one default key, with
/// optional per-tenant overrides.
pub struct ConfigKeyring {
    default_key: Option<String>,
    overrides: Mutex<HashMap<String, String>>,
}

impl ConfigKeyring {
    pub fn new(default_key: Option<String>) -> Self {
        Self {
            default_key,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_tenant_key(&self, tenant_id: &str, key: &str) {
        let mut overrides = self.overrides.lock().expect("keyring lock");
        if overrides.len() >= KEY_CACHE_CAP {
            overrides.clear();
        }
        overrides.insert(tenant_id.to_string(), key.to_string());
    }
}

impl Keyring for ConfigKeyring {
    fn api_key(&self, tenant_id: &str) -> Option<String> {
        let overrides = self.overrides.lock().expect("keyring lock");
        overrides
            .get(tenant_id)
            .cloned()
            .or_else(|| self.default_key.clone())
    }
}
