/// Settings stored in chrome.storage.sync
use crate::error::{Error, Result};
use crate::sites::SiteKind;
use crate::tenants::{TenantMap, normalize_uuid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Key of the single sync-storage item holding all settings
pub const SETTINGS_KEY: &str = "tenant_lens_settings";

/// chrome.storage.sync.QUOTA_BYTES_PER_ITEM
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8192;

/// Share of the sync item quota at which users get warned
pub const QUOTA_WARNING_PERCENT: usize = 90;

/// Root storage structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub tenant_mappings: TenantMap,
    #[serde(default)]
    pub disabled_sites: BTreeSet<SiteKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing entries, imported ones win
    Merge,
    /// Imported entries become the whole user mapping
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub added: usize,
    pub updated: usize,
    /// Entries dropped by a replacing import
    pub removed: usize,
    /// Keys skipped because they are not UUIDs or have blank names
    pub rejected: Vec<String>,
}

/// Settings export: unlike `SyncSettings` the mapping field is required
#[derive(Deserialize)]
struct SettingsExport {
    tenant_mappings: TenantMap,
    #[serde(default)]
    disabled_sites: Option<BTreeSet<SiteKind>>,
}

/// Accepted import payloads: a whole settings export, or a bare mapping
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Settings(SettingsExport),
    Mapping(TenantMap),
}

impl SyncSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or rename a tenant. Returns the normalized UUID.
    pub fn set_mapping(&mut self, uuid: &str, name: &str) -> Result<String> {
        let key = normalize_uuid(uuid).ok_or_else(|| Error::InvalidUuid(uuid.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        self.tenant_mappings.insert(key.clone(), name.to_string());
        Ok(key)
    }

    pub fn remove_mapping(&mut self, uuid: &str) -> bool {
        match normalize_uuid(uuid) {
            Some(key) => self.tenant_mappings.remove(&key).is_some(),
            None => self.tenant_mappings.remove(uuid).is_some(),
        }
    }

    pub fn is_site_enabled(&self, kind: SiteKind) -> bool {
        !self.disabled_sites.contains(&kind)
    }

    pub fn set_site_enabled(&mut self, kind: SiteKind, enabled: bool) {
        if enabled {
            self.disabled_sites.remove(&kind);
        } else {
            self.disabled_sites.insert(kind);
        }
    }

    /// Import tenants from JSON. Invalid JSON leaves the settings untouched.
    ///
    /// Replacing with a full settings export also restores its site toggles.
    pub fn import_json(&mut self, json: &str, mode: ImportMode) -> Result<ImportReport> {
        let (incoming, disabled_sites) = match serde_json::from_str::<ImportPayload>(json)? {
            ImportPayload::Settings(export) => (export.tenant_mappings, export.disabled_sites),
            ImportPayload::Mapping(mapping) => (mapping, None),
        };

        let before = self.tenant_mappings.clone();
        if mode == ImportMode::Replace {
            self.tenant_mappings.clear();
            if let Some(disabled_sites) = disabled_sites {
                self.disabled_sites = disabled_sites;
            }
        }

        let mut report = ImportReport::default();
        for (uuid, name) in incoming {
            let previous = normalize_uuid(&uuid).and_then(|k| before.get(&k).cloned());

            match self.set_mapping(&uuid, &name) {
                Ok(key) => match previous {
                    None => report.added += 1,
                    Some(old) if old != self.tenant_mappings[&key] => report.updated += 1,
                    Some(_) => {}
                },
                Err(_) => report.rejected.push(uuid),
            }
        }

        report.removed = before
            .keys()
            .filter(|key| !self.tenant_mappings.contains_key(*key))
            .count();

        Ok(report)
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Size chrome.storage.sync charges for this item: key plus JSON value
    pub fn estimated_bytes(&self) -> Result<usize> {
        Ok(SETTINGS_KEY.len() + serde_json::to_string(self)?.len())
    }

    pub fn check_quota(&self) -> Result<usize> {
        let bytes = self.estimated_bytes()?;
        if bytes > SYNC_QUOTA_BYTES_PER_ITEM {
            return Err(Error::QuotaExceeded {
                bytes,
                limit: SYNC_QUOTA_BYTES_PER_ITEM,
            });
        }
        Ok(bytes)
    }

    /// Share of the per-item quota in use, 0-100+
    pub fn quota_percent(&self) -> Result<usize> {
        Ok(self.estimated_bytes()? * 100 / SYNC_QUOTA_BYTES_PER_ITEM)
    }

    /// Warning to show once the item is `QUOTA_WARNING_PERCENT` full
    pub fn quota_warning(&self) -> Option<String> {
        quota_warning_for(self.quota_percent().ok()?)
    }
}

pub fn quota_warning_for(percent: usize) -> Option<String> {
    (percent >= QUOTA_WARNING_PERCENT).then(|| format!("Tenant storage {}% full!", percent))
}

/// One entry of a `chrome.storage.onChanged` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StorageChange {
    #[serde(rename = "oldValue", default)]
    pub old_value: Option<SyncSettings>,
    #[serde(rename = "newValue", default)]
    pub new_value: Option<SyncSettings>,
}

/// Extract our settings from an onChanged payload.
///
/// `None`: the change does not touch our key. `Some(None)`: our key was removed.
pub fn settings_change(changes: &HashMap<String, StorageChange>) -> Option<Option<SyncSettings>> {
    changes
        .get(SETTINGS_KEY)
        .map(|change| change.new_value.clone())
}
