/// Tenant mapping resolution: bundled defaults merged with the user's own names
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Shown for a UUID that neither mapping knows
pub const UNKNOWN_TENANT: &str = "Unknown tenant";

const BUNDLED_MAPPING_JSON: &str = include_str!("../assets/default_mapping.json");

/// Raw UUID -> name table, as stored or bundled
pub type TenantMap = BTreeMap<String, String>;

/// Where a resolved tenant name comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantSource {
    Bundled,
    User,
    /// User entry shadowing a bundled entry with a different name
    Override,
}

/// One row of the merged mapping
#[derive(Debug, Clone, PartialEq)]
pub struct TenantEntry {
    pub uuid: String,
    pub name: String,
    pub source: TenantSource,
    pub bundled_name: Option<String>,
}

/// Canonical form of a tenant id: lowercase, hyphenated.
///
/// Accepts every spelling `uuid` parses (hyphenated, simple, braced, URN),
/// surrounded by any amount of whitespace.
pub fn normalize_uuid(text: &str) -> Option<String> {
    Uuid::parse_str(text.trim())
        .ok()
        .map(|id| id.hyphenated().to_string())
}

fn normalize_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Drop entries whose key is not a UUID or whose name is blank, normalize the rest
pub fn clean_mapping(raw: &TenantMap) -> TenantMap {
    raw.iter()
        .filter_map(|(uuid, name)| Some((normalize_uuid(uuid)?, normalize_name(name)?)))
        .collect()
}

/// Merge the bundled mapping with the user's mapping; user entries win.
///
/// A blank user name is ignored rather than hiding the bundled name.
pub fn merge_mappings(bundled: &TenantMap, user: &TenantMap) -> TenantMap {
    let mut merged = clean_mapping(bundled);
    merged.extend(clean_mapping(user));
    merged
}

/// The default mapping shipped inside the extension
pub fn bundled_mapping() -> Result<TenantMap> {
    let raw: TenantMap = serde_json::from_str(BUNDLED_MAPPING_JSON)?;
    Ok(clean_mapping(&raw))
}

/// Read-mostly view over both mappings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TenantDirectory {
    bundled: TenantMap,
    user: TenantMap,
    merged: TenantMap,
    revision: u64,
}

impl TenantDirectory {
    pub fn new(bundled: &TenantMap, user: &TenantMap) -> Self {
        let bundled = clean_mapping(bundled);
        let user = clean_mapping(user);
        let mut merged = bundled.clone();
        merged.extend(user.clone());

        TenantDirectory {
            bundled,
            user,
            merged,
            revision: 0,
        }
    }

    /// Directory over the bundled mapping plus `user`
    pub fn with_bundled(user: &TenantMap) -> Result<Self> {
        Ok(Self::new(&bundled_mapping()?, user))
    }

    /// Replace the user mapping. Returns true when the merged view changed.
    pub fn set_user_mapping(&mut self, user: &TenantMap) -> bool {
        self.user = clean_mapping(user);
        let mut merged = self.bundled.clone();
        merged.extend(self.user.clone());

        if merged == self.merged {
            return false;
        }

        self.merged = merged;
        self.revision += 1;
        true
    }

    /// Incremented every time the merged view changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn lookup(&self, uuid: &str) -> Option<&str> {
        if let Some(name) = self.merged.get(uuid) {
            return Some(name.as_str());
        }
        let key = normalize_uuid(uuid)?;
        self.merged.get(&key).map(String::as_str)
    }

    /// Lookup falling back to [`UNKNOWN_TENANT`]
    pub fn display_name(&self, uuid: &str) -> String {
        self.lookup(uuid).unwrap_or(UNKNOWN_TENANT).to_string()
    }

    pub fn source_of(&self, uuid: &str) -> Option<TenantSource> {
        let key = normalize_uuid(uuid)?;
        match (self.user.get(&key), self.bundled.get(&key)) {
            (Some(user), Some(bundled)) if user != bundled => Some(TenantSource::Override),
            (Some(_), _) => Some(TenantSource::User),
            (None, Some(_)) => Some(TenantSource::Bundled),
            (None, None) => None,
        }
    }

    /// Merged mapping, sorted by name (case-insensitive) then UUID
    pub fn entries(&self) -> Vec<TenantEntry> {
        let mut entries: Vec<TenantEntry> = self
            .merged
            .iter()
            .filter_map(|(uuid, name)| {
                Some(TenantEntry {
                    uuid: uuid.clone(),
                    name: name.clone(),
                    source: self.source_of(uuid)?,
                    bundled_name: self.bundled.get(uuid).cloned(),
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.uuid.cmp(&b.uuid))
        });
        entries
    }

    /// User entries that replace a bundled name
    pub fn overrides(&self) -> Vec<TenantEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.source == TenantSource::Override)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}
