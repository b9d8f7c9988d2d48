//! Preference store adapters.
//!
//! Implements [`PreferenceStore`] for the operator settings namespace.
//!
//! - **`target_os = "espidf"`**: [`NvsPrefStore`] over the default NVS
//!   partition. Each `put_*` is one `nvs_set_*` followed by a commit, which
//!   ESP-IDF applies atomically.
//! - **everywhere**: [`MemoryStore`], a typed in-memory map used by host
//!   tests and simulation.

use std::collections::HashMap;

use log::info;

use crate::app::ports::{PreferenceStore, StorageError};

/// NVS namespace holding the operator settings.
pub const PREFS_NAMESPACE: &str = "astropixels";

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredValue {
    Str(String),
    Bool(bool),
}

/// Typed in-memory preference store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("MemoryStore: simulation backend");
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PreferenceStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(StoredValue::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(StoredValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .insert(key.to_string(), StoredValue::Str(value.to_string()));
        Ok(())
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.values.clear();
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF NVS backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::NvsPrefStore;

#[cfg(target_os = "espidf")]
mod esp {
    use anyhow::Context;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
    use esp_idf_svc::sys::{ESP_OK, nvs_commit, nvs_erase_all};
    use log::{info, warn};

    use super::PREFS_NAMESPACE;
    use crate::app::ports::{PreferenceStore, StorageError};

    /// Longest string value read back from NVS.
    const MAX_VALUE_LEN: usize = 128;

    /// Operator settings on the default NVS partition.
    pub struct NvsPrefStore {
        nvs: EspNvs<NvsDefault>,
    }

    impl NvsPrefStore {
        /// Open (creating if needed) the settings namespace.
        pub fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
            let nvs = EspNvs::new(partition, PREFS_NAMESPACE, true)
                .with_context(|| format!("opening NVS namespace {PREFS_NAMESPACE}"))?;
            info!("NvsPrefStore: namespace {PREFS_NAMESPACE} ready");
            Ok(Self { nvs })
        }
    }

    impl PreferenceStore for NvsPrefStore {
        fn get_string(&self, key: &str) -> Option<String> {
            let mut buf = [0u8; MAX_VALUE_LEN];
            match self.nvs.get_str(key, &mut buf) {
                Ok(v) => v.map(str::to_string),
                Err(e) => {
                    warn!("NVS read {key} failed: {e}");
                    None
                }
            }
        }

        fn get_bool(&self, key: &str) -> Option<bool> {
            self.nvs.get_u8(key).ok().flatten().map(|v| v != 0)
        }

        fn put_string(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.nvs.set_str(key, value).map_err(map_err)
        }

        fn put_bool(&mut self, key: &str, value: bool) -> Result<(), StorageError> {
            self.nvs.set_u8(key, u8::from(value)).map_err(map_err)
        }

        fn clear(&mut self) -> Result<(), StorageError> {
            // SAFETY: the handle is owned by `self.nvs` and stays open for
            // the duration of both calls; NVS is only used from the loop.
            let ret = unsafe { nvs_erase_all(self.nvs.handle()) };
            if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            let ret = unsafe { nvs_commit(self.nvs.handle()) };
            if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            Ok(())
        }
    }

    fn map_err(e: esp_idf_svc::sys::EspError) -> StorageError {
        if e.code() == esp_idf_svc::sys::ESP_ERR_NVS_NOT_ENOUGH_SPACE {
            StorageError::Full
        } else {
            warn!("NVS write failed: {e}");
            StorageError::IoError
        }
    }
}
