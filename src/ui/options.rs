/// Options page: edit the tenant mapping and choose where labels are shown

use yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlTextAreaElement};
use patternfly_yew::prelude::*;
use crate::bridge::{bytes_in_use, export_to_file, load_settings, save_settings, subscribe_changes};
use crate::sites::SiteKind;
use crate::storage::{quota_warning_for, ImportMode, SyncSettings, SYNC_QUOTA_BYTES_PER_ITEM};
use crate::tenants::{bundled_mapping, TenantDirectory, TenantMap};
use crate::ui::components::MappingRow;

#[derive(Clone, PartialEq)]
enum ViewState {
    Loading,
    Idle,
    Saving,
    Notice(String),
    Error(String),
}

#[function_component(OptionsPage)]
pub fn options_page() -> Html {
    let state = use_state(|| ViewState::Loading);
    let settings = use_state(SyncSettings::new);
    let bundled = use_state(|| {
        bundled_mapping().unwrap_or_else(|e| {
            log::error!("Bundled tenant mapping is unreadable: {}", e);
            TenantMap::new()
        })
    });
    let search_query = use_state(String::new);
    let form_uuid = use_state(String::new);
    let form_name = use_state(String::new);
    let form_error = use_state(|| None::<String>);
    let import_text = use_state(String::new);
    let import_replace = use_state(|| false);
    let quota_warning = use_state(|| None::<String>);

    // Load settings and follow changes made elsewhere (other tabs, other devices)
    {
        let state = state.clone();
        let settings = settings.clone();
        let quota_warning = quota_warning.clone();

        use_effect_with((), move |_| {
            {
                let settings = settings.clone();
                let quota_warning = quota_warning.clone();
                subscribe_changes(move |changes| {
                    if let Some(change) = changes.into_values().next() {
                        let new_settings = change.new_value.unwrap_or_default();
                        quota_warning.set(new_settings.quota_warning());
                        settings.set(new_settings);
                    }
                });
            }

            spawn_local(async move {
                match load_settings().await {
                    Ok(data) => {
                        settings.set(data);
                        state.set(ViewState::Idle);
                    }
                    Err(e) => {
                        state.set(ViewState::Error(format!("Failed to load: {}", e)));
                    }
                }

                if let Ok(bytes) = bytes_in_use().await {
                    quota_warning.set(quota_warning_for(bytes * 100 / SYNC_QUOTA_BYTES_PER_ITEM));
                }
            });
            || ()
        });
    }

    // Saves first, then shows the new settings
    let persist = {
        let state = state.clone();
        let settings = settings.clone();
        let quota_warning = quota_warning.clone();

        Callback::from(move |(new_settings, notice): (SyncSettings, Option<String>)| {
            let state = state.clone();
            let settings = settings.clone();
            let quota_warning = quota_warning.clone();

            state.set(ViewState::Saving);
            spawn_local(async move {
                match save_settings(&new_settings).await {
                    Ok(_) => {
                        quota_warning.set(new_settings.quota_warning());
                        settings.set(new_settings);
                        state.set(notice.map_or(ViewState::Idle, ViewState::Notice));
                    }
                    Err(e) => {
                        state.set(ViewState::Error(format!("Failed to save: {}", e)));
                    }
                }
            });
        })
    };

    let on_search_input = {
        let search_query = search_query.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                search_query.set(input.value());
            }
        })
    };

    let on_uuid_input = {
        let form_uuid = form_uuid.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                form_uuid.set(input.value());
            }
        })
    };

    let on_name_input = {
        let form_name = form_name.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                form_name.set(input.value());
            }
        })
    };

    // Add or rename a tenant
    let on_save_mapping = {
        let settings = settings.clone();
        let form_uuid = form_uuid.clone();
        let form_name = form_name.clone();
        let form_error = form_error.clone();
        let persist = persist.clone();

        Callback::from(move |_| {
            let mut new_settings = (*settings).clone();
            match new_settings.set_mapping(&form_uuid, &form_name) {
                Ok(uuid) => {
                    form_error.set(None);
                    form_uuid.set(String::new());
                    form_name.set(String::new());
                    persist.emit((new_settings, Some(format!("Saved {}", uuid))));
                }
                Err(e) => form_error.set(Some(e.to_string())),
            }
        })
    };

    // Load a row into the form
    let on_edit = {
        let form_uuid = form_uuid.clone();
        let form_name = form_name.clone();
        let form_error = form_error.clone();

        Callback::from(move |(uuid, name): (String, String)| {
            form_uuid.set(uuid);
            form_name.set(name);
            form_error.set(None);
        })
    };

    let on_remove = {
        let settings = settings.clone();
        let persist = persist.clone();

        Callback::from(move |uuid: String| {
            let mut new_settings = (*settings).clone();
            if new_settings.remove_mapping(&uuid) {
                persist.emit((new_settings, None));
            }
        })
    };

    let on_toggle_site = {
        let settings = settings.clone();
        let persist = persist.clone();

        move |kind: SiteKind| {
            let settings = settings.clone();
            let persist = persist.clone();
            Callback::from(move |e: Event| {
                if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                    let mut new_settings = (*settings).clone();
                    new_settings.set_site_enabled(kind, input.checked());
                    persist.emit((new_settings, None));
                }
            })
        }
    };

    let on_import_input = {
        let import_text = import_text.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlTextAreaElement>() {
                import_text.set(input.value());
            }
        })
    };

    let on_import_mode = {
        let import_replace = import_replace.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                import_replace.set(input.checked());
            }
        })
    };

    let on_import = {
        let settings = settings.clone();
        let import_text = import_text.clone();
        let import_replace = import_replace.clone();
        let state = state.clone();
        let persist = persist.clone();

        Callback::from(move |_| {
            let mode = if *import_replace { ImportMode::Replace } else { ImportMode::Merge };
            let mut new_settings = (*settings).clone();

            match new_settings.import_json(&import_text, mode) {
                Ok(report) => {
                    let mut notice = format!(
                        "Imported: {} added, {} updated",
                        report.added, report.updated
                    );
                    if report.removed > 0 {
                        notice.push_str(&format!(", {} removed", report.removed));
                    }
                    if !report.rejected.is_empty() {
                        notice.push_str(&format!(", skipped {}", report.rejected.join(", ")));
                    }
                    import_text.set(String::new());
                    persist.emit((new_settings, Some(notice)));
                }
                Err(e) => {
                    state.set(ViewState::Error(format!("Import failed: {}", e)));
                }
            }
        })
    };

    let on_export = {
        let settings = settings.clone();
        let state = state.clone();

        Callback::from(move |_| {
            match settings.export_json() {
                Ok(json) => {
                    let filename = format!("tenant-lens-export-{}.json", js_sys::Date::now() as i64);
                    export_to_file(&json, &filename);
                }
                Err(e) => {
                    state.set(ViewState::Error(format!("Export failed: {}", e)));
                }
            }
        })
    };

    let directory = TenantDirectory::new(&bundled, &settings.tenant_mappings);
    let override_count = directory.overrides().len();

    // Filter entries by search query
    let query = search_query.to_lowercase();
    let entries: Vec<_> = directory
        .entries()
        .into_iter()
        .filter(|entry| {
            query.is_empty()
                || entry.name.to_lowercase().contains(&query)
                || entry.uuid.contains(&query)
        })
        .collect();

    let is_busy = matches!(*state, ViewState::Loading | ViewState::Saving);

    html! {
        <div class="container">
            <div class="header">
                <h1 class="main-title">{"Tenant Lens"}</h1>
                <Button onclick={on_export} variant={ButtonVariant::Secondary}>
                    {"📥 Export"}
                </Button>
            </div>

            if let Some(warning) = (*quota_warning).clone() {
                <Alert r#type={AlertType::Warning} title={warning} inline={true}>
                </Alert>
            }

            // Status display
            {match &*state {
                ViewState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading tenants..."}</p>
                    </div>
                },
                ViewState::Saving => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Saving..."}</p>
                    </div>
                },
                ViewState::Notice(msg) => html! {
                    <Alert r#type={AlertType::Success} title={msg.clone()} inline={true}>
                    </Alert>
                },
                ViewState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                ViewState::Idle => html! {}
            }}

            // Add / rename form
            <div class="mapping-form">
                <h2 class="section-title">{"Add or rename a tenant"}</h2>
                <input
                    type="text"
                    placeholder="Tenant UUID"
                    value={(*form_uuid).clone()}
                    oninput={on_uuid_input}
                    class="form-input uuid-input"
                />
                <input
                    type="text"
                    placeholder="Display name"
                    value={(*form_name).clone()}
                    oninput={on_name_input}
                    class="form-input"
                />
                <Button onclick={on_save_mapping} disabled={is_busy}>
                    {"Save"}
                </Button>
                if let Some(err) = (*form_error).clone() {
                    <p class="form-error">{err}</p>
                }
            </div>

            // Mapping table
            <div class="search-container">
                <input
                    type="text"
                    placeholder="Search tenants by name or UUID..."
                    value={(*search_query).clone()}
                    oninput={on_search_input}
                    class="search-input"
                />
            </div>

            if entries.is_empty() {
                <div class="empty-state">
                    if search_query.is_empty() {
                        <p>{"No tenants mapped yet."}</p>
                    } else {
                        <p>{"No tenants match your search."}</p>
                    }
                </div>
            } else {
                <table class="mapping-table">
                    <thead>
                        <tr>
                            <th>{"Name"}</th>
                            <th>{"UUID"}</th>
                            <th>{"Source"}</th>
                            <th></th>
                        </tr>
                    </thead>
                    <tbody>
                        {for entries.into_iter().map(|entry| {
                            let key = entry.uuid.clone();
                            html! {
                                <MappingRow
                                    key={key}
                                    entry={entry}
                                    on_edit={on_edit.clone()}
                                    on_remove={on_remove.clone()}
                                />
                            }
                        })}
                    </tbody>
                </table>
            }

            // Sites
            <div class="sites-container">
                <h2 class="section-title">{"Show labels on"}</h2>
                {for SiteKind::ALL.iter().map(|kind| html! {
                    <label key={kind.id()} class="site-toggle">
                        <input
                            type="checkbox"
                            checked={settings.is_site_enabled(*kind)}
                            onchange={on_toggle_site(*kind)}
                            disabled={is_busy}
                        />
                        {kind.display_name()}
                    </label>
                })}
            </div>

            // Import
            <div class="import-container">
                <h2 class="section-title">{"Import"}</h2>
                <textarea
                    placeholder={r#"{"<tenant uuid>": "Tenant name"}"#}
                    value={(*import_text).clone()}
                    oninput={on_import_input}
                    class="import-input"
                />
                <label class="site-toggle">
                    <input
                        type="checkbox"
                        checked={*import_replace}
                        onchange={on_import_mode}
                    />
                    {"Replace my current mapping"}
                </label>
                <Button onclick={on_import} disabled={is_busy || import_text.trim().is_empty()}>
                    {"Import"}
                </Button>
            </div>

            // Footer stats
            <div class="footer">
                {format!("{} tenants • {} custom • {} overrides",
                    directory.len(),
                    settings.tenant_mappings.len(),
                    override_count
                )}
            </div>
        </div>
    }
}
