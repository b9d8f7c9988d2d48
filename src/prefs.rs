//! Restricted configuration proxy.
//!
//! Operators may only touch keys declared in the [`PreferenceSchema`]. The
//! schema fixes each key's type, value bound and sensitivity; values live
//! in the external [`PreferenceStore`]. Every write is validated in full
//! before the store is touched, so a rejected request leaves it unchanged.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::app::ports::PreferenceStore;
use crate::console_line;
use crate::error::{GatewayError, ValidationError};
use crate::log_capture::Console;

/// NVS key bound (bytes, excluding the terminator).
pub const PREF_KEY_MAX_LEN: usize = 15;

/// Writing this key erases the whole store.
pub const RESERVED_CLEAR_KEY: &str = "_clear";

/// Shown in place of a stored sensitive value.
const MASK: &str = "********";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefType {
    Bool,
    String,
}

/// One allow-listed setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: PrefType,
    /// Longest accepted value in bytes.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// Never logged, masked on read.
    #[serde(default)]
    pub sensitive: bool,
}

fn default_max_len() -> usize {
    32
}

impl PreferenceEntry {
    fn new(key: &str, kind: PrefType, max_len: usize, sensitive: bool) -> Self {
        Self {
            key: key.to_string(),
            kind,
            max_len,
            sensitive,
        }
    }
}

/// The allow-list of operator-editable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PreferenceEntry>", into = "Vec<PreferenceEntry>")]
pub struct PreferenceSchema {
    entries: Vec<PreferenceEntry>,
}

impl TryFrom<Vec<PreferenceEntry>> for PreferenceSchema {
    type Error = ValidationError;

    fn try_from(entries: Vec<PreferenceEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<PreferenceSchema> for Vec<PreferenceEntry> {
    fn from(schema: PreferenceSchema) -> Self {
        schema.entries
    }
}

impl Default for PreferenceSchema {
    fn default() -> Self {
        use PrefType::{Bool, String};
        Self {
            entries: vec![
                PreferenceEntry::new("ssid", String, 32, false),
                PreferenceEntry::new("pass", String, 64, true),
                PreferenceEntry::new("wifi", Bool, 5, false),
                PreferenceEntry::new("ap", Bool, 5, false),
                PreferenceEntry::new("remote", Bool, 5, false),
                PreferenceEntry::new("rhost", String, 32, false),
                PreferenceEntry::new("rsecret", String, 64, true),
                PreferenceEntry::new("msound", String, 16, false),
                PreferenceEntry::new("mvolume", String, 8, false),
                PreferenceEntry::new("mstartup", String, 32, false),
                PreferenceEntry::new("mrandom", Bool, 5, false),
                PreferenceEntry::new("devname", String, 32, false),
                PreferenceEntry::new("apitoken", String, 64, true),
            ],
        }
    }
}

impl PreferenceSchema {
    pub fn new(entries: Vec<PreferenceEntry>) -> Result<Self, ValidationError> {
        let schema = Self { entries };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse and validate a JSON schema document.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).map_err(|e| anyhow::anyhow!("invalid preference schema: {e}"))
    }

    /// Every key must be storable and must not shadow the reset key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for e in &self.entries {
            check_key(&e.key)?;
            if e.key == RESERVED_CLEAR_KEY {
                return Err(ValidationError::KeyNotAllowed);
            }
        }
        Ok(())
    }

    pub fn entry(&self, key: &str) -> Option<&PreferenceEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        Err(ValidationError::EmptyKey)
    } else if key.len() > PREF_KEY_MAX_LEN {
        Err(ValidationError::KeyTooLong)
    } else {
        Ok(())
    }
}

/// `"1"` and `"true"` are true; anything else is false.
pub fn coerce_bool(value: &str) -> bool {
    matches!(value, "1" | "true")
}

// ───────────────────────────────────────────────────────────────
// Proxy
// ───────────────────────────────────────────────────────────────

/// What a successful write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The reserved key wiped the store.
    Cleared,
    Stored { key: String },
}

/// A value as returned to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Str(String),
}

/// Values for a key list, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefReadout {
    entries: Vec<(String, PrefValue)>,
}

impl PrefReadout {
    pub fn get(&self, key: &str) -> Option<&PrefValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for PrefReadout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Allow-listed, typed facade over the preference store.
pub struct PreferenceProxy<'s> {
    schema: &'s PreferenceSchema,
    console: &'s Console,
}

impl<'s> PreferenceProxy<'s> {
    pub fn new(schema: &'s PreferenceSchema, console: &'s Console) -> Self {
        Self { schema, console }
    }

    /// Validate and persist one setting.
    pub fn write(
        &self,
        store: &mut dyn PreferenceStore,
        key: &str,
        value: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        let key = key.trim();
        check_key(key)?;

        if key == RESERVED_CLEAR_KEY {
            store.clear()?;
            console_line!(self.console, "[API] Factory reset: clearing all preferences");
            return Ok(WriteOutcome::Cleared);
        }

        let entry = self
            .schema
            .entry(key)
            .ok_or(ValidationError::KeyNotAllowed)?;
        if value.len() > entry.max_len {
            return Err(GatewayError::from(ValidationError::ValueTooLong));
        }

        match entry.kind {
            PrefType::Bool => store.put_bool(key, coerce_bool(value))?,
            PrefType::String => store.put_string(key, value)?,
        }

        if entry.sensitive {
            console_line!(self.console, "[API] pref: {} = {}", key, MASK);
        } else {
            console_line!(self.console, "[API] pref: {} = {}", key, value);
        }
        Ok(WriteOutcome::Stored {
            key: key.to_string(),
        })
    }

    /// Read a comma-separated key list. One unknown key fails the lot.
    pub fn read(
        &self,
        store: &dyn PreferenceStore,
        keys: &str,
    ) -> Result<PrefReadout, GatewayError> {
        let mut wanted = Vec::new();
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let entry = self
                .schema
                .entry(key)
                .ok_or(ValidationError::KeyNotAllowed)?;
            wanted.push(entry);
        }

        let entries = wanted
            .into_iter()
            .map(|entry| {
                let key = entry.key.as_str();
                let value = match entry.kind {
                    PrefType::Bool => PrefValue::Bool(store.get_bool(key).unwrap_or(false)),
                    PrefType::String => {
                        let raw = store.get_string(key).unwrap_or_default();
                        if entry.sensitive && !raw.is_empty() {
                            PrefValue::Str(MASK.to_string())
                        } else {
                            PrefValue::Str(raw)
                        }
                    }
                };
                (entry.key.clone(), value)
            })
            .collect();
        Ok(PrefReadout { entries })
    }
}
