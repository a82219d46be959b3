/// chrome.storage.sync access through the JS bridge module
use crate::error::Result;
use crate::storage::{SETTINGS_KEY, StorageChange, SyncSettings};
use serde::Serialize;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/storage_bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getSyncStorage(key: &str) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSyncStorage(key: &str, value: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSyncBytesInUse(key: &str) -> std::result::Result<JsValue, JsValue>;

    fn onSyncStorageChanged(callback: &js_sys::Function);

    #[wasm_bindgen(js_name = exportToFile)]
    pub fn export_to_file(data: &str, filename: &str);
}

/// Stored settings, or defaults when nothing was saved yet
pub async fn load_settings() -> Result<SyncSettings> {
    let value = getSyncStorage(SETTINGS_KEY).await?;

    if value.is_null() || value.is_undefined() {
        Ok(SyncSettings::new())
    } else {
        Ok(serde_wasm_bindgen::from_value(value)?)
    }
}

/// Write settings back; refuses items over the sync quota
pub async fn save_settings(settings: &SyncSettings) -> Result<()> {
    let bytes = settings.check_quota()?;

    // chrome.storage only keeps plain objects, not JS Maps
    let value = settings.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?;
    setSyncStorage(SETTINGS_KEY, value).await?;

    log::debug!("Saved {} tenant mappings ({} bytes)", settings.tenant_mappings.len(), bytes);
    Ok(())
}

/// Bytes the browser reports for our settings item
pub async fn bytes_in_use() -> Result<usize> {
    let value = getSyncBytesInUse(SETTINGS_KEY).await?;
    Ok(value.as_f64().unwrap_or(0.0) as usize)
}

/// Call `handler` whenever our settings item changes in sync storage.
///
/// Entries for other keys are filtered out before decoding, so foreign data
/// of any shape cannot break the listener.
pub fn subscribe_changes(handler: impl Fn(HashMap<String, StorageChange>) + 'static) {
    let callback = Closure::<dyn Fn(JsValue)>::new(move |changes: JsValue| {
        let ours = match js_sys::Reflect::get(&changes, &JsValue::from_str(SETTINGS_KEY)) {
            Ok(value) if !value.is_undefined() => value,
            _ => return,
        };

        match serde_wasm_bindgen::from_value::<StorageChange>(ours) {
            Ok(change) => handler(HashMap::from([(SETTINGS_KEY.to_string(), change)])),
            Err(e) => log::warn!("Ignoring malformed settings change: {}", e),
        }
    });

    onSyncStorageChanged(callback.as_ref().unchecked_ref());
    // Listener stays registered for the lifetime of the page
    callback.forget();
}
