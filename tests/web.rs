//! Browser tests for DOM annotation. Run with `wasm-pack test --headless --chrome`.
#![cfg(target_arch = "wasm32")]

use tenant_lens::registry::TenantRegistry;
use tenant_lens::sites::{SiteKind, SiteProfile};
use tenant_lens::tenants::{TenantDirectory, TenantMap};
use tenant_lens::watcher::{DomWatcher, LABEL_CLASS};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

wasm_bindgen_test_configure!(run_in_browser);

const ACME: &str = "0b6f3a52-8d1e-4c7a-9f21-5e3d7c4a1b90";
const OTHER: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

fn map(entries: &[(&str, &str)]) -> TenantMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn clear_page() {
    document().body().unwrap().set_inner_html("");
}

/// Append a `<tag id=..>` root holding a one-column table to the body
fn mount_root(tag: &str, id: Option<&str>, rows: &[&str]) -> Element {
    let document = document();
    let cells: String = rows
        .iter()
        .map(|text| format!("<tr><td><span>{}</span></td></tr>", text))
        .collect();
    let root = document.create_element(tag).unwrap();
    if let Some(id) = id {
        root.set_id(id);
    }
    root.set_inner_html(&format!("<table><tbody>{}</tbody></table>", cells));
    document.body().unwrap().append_child(&root).unwrap();
    root
}

/// Fresh `<main>` holding a small workflow table
fn mount_page(rows: &[&str]) -> Element {
    clear_page();
    mount_root("main", None, rows)
}

fn append_row(root: &Element, text: &str) {
    let tbody = root.query_selector("tbody").unwrap().unwrap();
    let row = document().create_element("tr").unwrap();
    row.set_inner_html(&format!("<td><span>{}</span></td>", text));
    tbody.append_child(&row).unwrap();
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

/// Workflow profile with short timers
fn quick_profile() -> SiteProfile {
    SiteProfile {
        debounce_ms: 20,
        root_retries: 10,
        retry_interval_ms: 20,
        ..SiteProfile::for_kind(SiteKind::Workflow)
    }
}

fn labels(root: &Element) -> Vec<String> {
    let nodes = root
        .query_selector_all(&format!(".{}", LABEL_CLASS))
        .unwrap();
    (0..nodes.length())
        .filter_map(|i| nodes.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .filter_map(|el| el.text_content())
        .collect()
}

fn start_with(profile: SiteProfile, user: &TenantMap) -> (DomWatcher, TenantRegistry) {
    let bundled = map(&[(ACME, "Acme Corp")]);
    let registry = TenantRegistry::new(TenantDirectory::new(&bundled, user));
    let watcher = DomWatcher::new(profile, registry.clone());
    watcher.start();
    (watcher, registry)
}

fn start_watcher(user: &TenantMap) -> (DomWatcher, TenantRegistry) {
    start_with(SiteProfile::for_kind(SiteKind::Workflow), user)
}

#[wasm_bindgen_test]
fn labels_known_tenants() {
    let run = format!("run/{}/nightly", ACME);
    let root = mount_page(&[run.as_str(), OTHER, "no tenant"]);

    let (watcher, _registry) = start_watcher(&TenantMap::new());

    assert!(watcher.is_attached());
    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);
    watcher.stop();
}

#[wasm_bindgen_test]
fn rescan_leaves_current_labels_alone() {
    let root = mount_page(&[ACME]);
    let (watcher, _registry) = start_watcher(&TenantMap::new());

    assert_eq!(watcher.annotate_all().unwrap(), 0);
    assert_eq!(labels(&root).len(), 1);
    watcher.stop();
}

#[wasm_bindgen_test]
fn mapping_change_relabels() {
    let root = mount_page(&[ACME, OTHER]);
    let (watcher, registry) = start_watcher(&TenantMap::new());

    registry.apply_user_mapping(&map(&[(ACME, "Acme (EU)"), (OTHER, "Hooli")]));
    assert_eq!(labels(&root), vec![" (Acme (EU))".to_string(), " (Hooli)".to_string()]);

    // Removing the user entries drops the Hooli label and restores the default
    registry.apply_user_mapping(&TenantMap::new());
    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);
    watcher.stop();
}

#[wasm_bindgen_test]
fn stop_removes_labels() {
    let root = mount_page(&[ACME]);
    let (watcher, registry) = start_watcher(&TenantMap::new());

    watcher.stop();

    assert!(!watcher.is_running());
    assert!(labels(&root).is_empty());
    assert_eq!(registry.listener_count(), 0);
}

#[wasm_bindgen_test]
fn text_change_relabels() {
    let root = mount_page(&[ACME]);
    let (watcher, _registry) = start_watcher(&map(&[(OTHER, "Hooli")]));
    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);

    // Rewrite the id in place, keeping the old label and stamps
    let span = root.query_selector("td > span").unwrap().unwrap();
    span.first_child().unwrap().set_node_value(Some(OTHER));

    assert_eq!(watcher.annotate_all().unwrap(), 1);
    assert_eq!(labels(&root), vec![" (Hooli)".to_string()]);
    watcher.stop();
}

#[wasm_bindgen_test]
fn nested_targets_label_innermost_only() {
    let link = format!("<a href=\"#\">{}</a>", ACME);
    let root = mount_page(&[link.as_str()]);
    let (watcher, _registry) = start_watcher(&TenantMap::new());

    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);
    assert!(root.query_selector(&format!("a > .{}", LABEL_CLASS)).unwrap().is_some());
    assert!(root.query_selector(&format!("span > .{}", LABEL_CLASS)).unwrap().is_none());
    watcher.stop();
}

#[wasm_bindgen_test]
fn database_profile_labels_unknown_tenants() {
    clear_page();
    let root = mount_root("div", Some("__next"), &[ACME, OTHER]);
    let (watcher, _registry) = start_with(SiteProfile::for_kind(SiteKind::Database), &TenantMap::new());

    assert_eq!(
        labels(&root),
        vec![" (Acme Corp)".to_string(), " (Unknown tenant)".to_string()]
    );
    watcher.stop();
}

#[wasm_bindgen_test]
async fn mutation_triggers_debounced_rescan() {
    let root = mount_page(&[ACME]);
    let (watcher, _registry) = start_with(quick_profile(), &map(&[(OTHER, "Hooli")]));

    append_row(&root, OTHER);
    sleep(100).await;

    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string(), " (Hooli)".to_string()]);
    watcher.stop();
}

#[wasm_bindgen_test]
async fn root_appearing_later_is_watched() {
    clear_page();
    let (watcher, _registry) = start_with(quick_profile(), &TenantMap::new());
    assert!(!watcher.is_attached());
    assert!(watcher.is_waiting_for_root());

    let root = mount_root("main", None, &[ACME]);
    sleep(100).await;

    assert!(watcher.is_attached());
    assert!(!watcher.is_waiting_for_root());
    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);
    watcher.stop();
}

#[wasm_bindgen_test]
async fn gives_up_when_root_never_appears() {
    clear_page();
    let profile = SiteProfile {
        root_retries: 2,
        ..quick_profile()
    };
    let (watcher, _registry) = start_with(profile, &TenantMap::new());

    sleep(150).await;
    assert!(!watcher.is_waiting_for_root());

    let root = mount_root("main", None, &[ACME]);
    sleep(100).await;

    assert!(!watcher.is_attached());
    assert!(labels(&root).is_empty());
    watcher.stop();
}

#[wasm_bindgen_test]
async fn restart_while_waiting_attaches_once() {
    clear_page();
    let (watcher, registry) = start_with(quick_profile(), &TenantMap::new());
    watcher.stop();
    assert!(!watcher.is_waiting_for_root());

    watcher.start();
    let root = mount_root("main", None, &[ACME]);
    sleep(100).await;

    assert!(watcher.is_attached());
    assert_eq!(registry.listener_count(), 1);
    assert_eq!(labels(&root), vec![" (Acme Corp)".to_string()]);

    // A single observer: one debounced pass labels the new row once
    append_row(&root, ACME);
    sleep(100).await;
    assert_eq!(labels(&root).len(), 2);
    watcher.stop();
    assert!(labels(&root).is_empty());
}
