use crate::{IMetadata, MemMetadata, RawValue, StoreId};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

impl StoreId {
    /// Hand out a fresh store identity.  Implementations of [IMetadata] call this once at
    /// construction and return the same id ever after.
    pub fn fresh() -> StoreId {
        StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl RawValue {
    /// The value as text, as it would appear when substituted into a string context.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawValue::Str(value) => Cow::from(value),
            RawValue::Int(value) => Cow::from(value.to_string()),
            RawValue::Bool(value) => Cow::from(if *value { "True" } else { "False" }),
        }
    }

    /// Truthiness of a flag value: unset flags are false, empty strings and zero are false,
    /// anything else is true.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            RawValue::Str(value) => !value.is_empty(),
            RawValue::Int(value) => *value != 0,
            RawValue::Bool(value) => *value,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Str(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Str(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// Whether a flag is set to a truthy value on a variable.
pub(crate) fn flag_set(metadata: &dyn IMetadata, name: &str, flag: &str) -> bool {
    metadata
        .get_flag(name, flag)
        .map_or(false, |value| value.is_truthy())
}

impl MemMetadata {
    pub fn new() -> Self {
        MemMetadata {
            id: StoreId::fresh(),
            vars: BTreeMap::new(),
            flags: BTreeMap::new(),
        }
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<RawValue>) {
        self.vars.insert(name.to_string(), value.into());
    }

    pub fn set_flag(&mut self, name: &str, flag: &str, value: impl Into<RawValue>) {
        self.flags
            .entry(name.to_string())
            .or_default()
            .insert(flag.to_string(), value.into());
    }

    pub fn del_var(&mut self, name: &str) {
        self.vars.remove(name);
        self.flags.remove(name);
    }
}

impl Default for MemMetadata {
    fn default() -> Self {
        MemMetadata::new()
    }
}

impl IMetadata for MemMetadata {
    fn ident(&self) -> StoreId {
        self.id
    }

    fn get(&self, name: &str) -> Option<RawValue> {
        self.vars.get(name).cloned()
    }

    fn get_flag(&self, name: &str, flag: &str) -> Option<RawValue> {
        self.flags.get(name)?.get(flag).cloned()
    }

    fn get_flags(&self, name: &str) -> Vec<(String, RawValue)> {
        self.flags
            .get(name)
            .map(|flags| {
                flags
                    .iter()
                    .map(|(flag, value)| (flag.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}
