/// Tenant Lens - Browser extension that puts tenant names next to tenant UUIDs
/// Built with Rust + WASM + Yew

mod bridge;
pub mod error;
pub mod registry;
pub mod scan;
pub mod sites;
pub mod storage;
pub mod tenants;
pub mod ui;
pub mod watcher;

use error::{Error, Result};
use registry::TenantRegistry;
use tenants::{TenantDirectory, TenantMap, UNKNOWN_TENANT};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use watcher::DomWatcher;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Resolve a UUID against the bundled mapping for JavaScript callers
#[wasm_bindgen]
pub fn lookup_tenant(uuid: &str) -> String {
    match TenantDirectory::with_bundled(&TenantMap::new()) {
        Ok(directory) => directory.display_name(uuid),
        Err(e) => {
            log::error!("Bundled tenant mapping is unreadable: {}", e);
            UNKNOWN_TENANT.to_string()
        }
    }
}

// Start the Yew app for the options page
#[wasm_bindgen]
pub fn start_options() {
    yew::Renderer::<ui::options::OptionsPage>::new().render();
}

// Entry point of the content script injected into the supported consoles
#[wasm_bindgen]
pub fn start_content_script() {
    spawn_local(async {
        if let Err(e) = run_content_script().await {
            log::error!("Tenant Lens failed to start: {}", e);
        }
    });
}

async fn run_content_script() -> Result<()> {
    let href = web_sys::window()
        .ok_or_else(|| Error::Browser("no window".to_string()))?
        .location()
        .href()?;

    let Some(profile) = sites::detect_site(&href) else {
        log::debug!("No tenant labels for {}", href);
        return Ok(());
    };
    let kind = profile.kind;
    log::info!("Tenant Lens active on {}", kind.display_name());

    let settings = bridge::load_settings().await?;
    let registry = TenantRegistry::new(TenantDirectory::with_bundled(&settings.tenant_mappings)?);
    let watcher = DomWatcher::new(profile, registry.clone());

    {
        let watcher = watcher.clone();
        bridge::subscribe_changes(move |changes| {
            let enabled = storage::settings_change(&changes)
                .map(|new| new.is_none_or(|settings| settings.is_site_enabled(kind)));

            if enabled == Some(false) && watcher.is_running() {
                watcher.stop();
            }
            registry.apply_storage_change(&changes);
            if enabled == Some(true) {
                watcher.start();
            }
        });
    }

    if settings.is_site_enabled(kind) {
        watcher.start();
    } else {
        log::info!("Tenant labels disabled for {}", kind.display_name());
    }
    Ok(())
}
