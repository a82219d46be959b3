/// DOM watcher: labels tenant UUIDs on a supported console and keeps the
/// labels current as the page and the mapping change.
///
/// One watcher serves every site; the `SiteProfile` says where to look.
use crate::error::{Error, Result};
use crate::registry::{SubscriptionId, TenantRegistry};
use crate::scan::label_for_text;
use crate::sites::SiteProfile;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, MutationObserver, MutationObserverInit, Window};

/// Class of the `<span>` carrying a tenant name
pub const LABEL_CLASS: &str = "tenant-lens-label";

/// Directory revision an element was last annotated with
pub const REVISION_ATTR: &str = "data-tenant-lens-rev";

/// Text content of an element right after it was annotated
pub const TEXT_ATTR: &str = "data-tenant-lens-text";

struct WatcherState {
    profile: SiteProfile,
    registry: TenantRegistry,
    root: Option<Element>,
    retries_left: u32,
    subscription: Option<SubscriptionId>,
    observer: Option<MutationObserver>,
    on_mutation: Option<Closure<dyn FnMut(js_sys::Array)>>,
    on_debounce: Option<Closure<dyn FnMut()>>,
    on_retry: Option<Closure<dyn FnMut()>>,
    debounce_handle: Option<i32>,
    retry_handle: Option<i32>,
}

#[derive(Clone)]
pub struct DomWatcher {
    state: Rc<RefCell<WatcherState>>,
}

fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| Error::Browser("no window".to_string()))
}

fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| Error::Browser("no document".to_string()))
}

impl DomWatcher {
    pub fn new(profile: SiteProfile, registry: TenantRegistry) -> Self {
        let retries_left = profile.root_retries;
        DomWatcher {
            state: Rc::new(RefCell::new(WatcherState {
                profile,
                registry,
                root: None,
                retries_left,
                subscription: None,
                observer: None,
                on_mutation: None,
                on_debounce: None,
                on_retry: None,
                debounce_handle: None,
                retry_handle: None,
            })),
        }
    }

    fn from_weak(weak: &Weak<RefCell<WatcherState>>) -> Option<Self> {
        weak.upgrade().map(|state| DomWatcher { state })
    }

    /// Hook the mapping and start looking for the page root. No-op when running.
    pub fn start(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.subscription.is_some() {
                return;
            }

            let weak = Rc::downgrade(&self.state);
            let id = state.registry.subscribe(move |revision| {
                if let Some(watcher) = Self::from_weak(&weak) {
                    log::info!("Tenant mapping revision {}, relabelling", revision);
                    watcher.rescan();
                }
            });
            state.subscription = Some(id);
            state.retries_left = state.profile.root_retries;
        }

        self.wait_for_root();
    }

    /// Disconnect from the page and the mapping, removing every label
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();

        if let Some(id) = state.subscription.take() {
            state.registry.unsubscribe(id);
        }
        if let Some(observer) = state.observer.take() {
            observer.disconnect();
        }
        state.on_mutation = None;
        if let Ok(window) = window() {
            if let Some(handle) = state.debounce_handle.take() {
                window.clear_timeout_with_handle(handle);
            }
            if let Some(handle) = state.retry_handle.take() {
                window.clear_timeout_with_handle(handle);
            }
        }

        if let Some(root) = state.root.take() {
            if let Err(e) = clear_annotations(&root) {
                log::warn!("Could not remove tenant labels: {}", e);
            }
        }
        log::info!("Stopped tenant labels on {}", state.profile.kind.display_name());
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().subscription.is_some()
    }

    /// Find the root now, or retry later while retries remain
    fn wait_for_root(&self) {
        if !self.is_running() {
            return;
        }
        let selector = self.state.borrow().profile.root_selector;
        let root = document().and_then(|doc| Ok(doc.query_selector(selector)?));

        match root {
            Ok(Some(root)) => {
                if let Err(e) = self.attach(root) {
                    log::error!("Failed to watch {}: {}", selector, e);
                }
            }
            Ok(None) => self.schedule_retry(),
            Err(e) => log::error!("Root lookup for {} failed: {}", selector, e),
        }
    }

    fn schedule_retry(&self) {
        let (selector, interval) = {
            let mut state = self.state.borrow_mut();
            if state.retry_handle.is_some() {
                return;
            }
            if state.retries_left == 0 {
                log::warn!(
                    "Root {} never appeared, giving up on {}",
                    state.profile.root_selector,
                    state.profile.kind.display_name()
                );
                return;
            }
            state.retries_left -= 1;

            if state.on_retry.is_none() {
                let weak = Rc::downgrade(&self.state);
                state.on_retry = Some(Closure::new(move || {
                    if let Some(watcher) = Self::from_weak(&weak) {
                        watcher.state.borrow_mut().retry_handle = None;
                        watcher.wait_for_root();
                    }
                }));
            }
            (state.profile.root_selector, state.profile.retry_interval_ms)
        };

        log::debug!("Root {} not found yet, retrying in {}ms", selector, interval);
        let mut state = self.state.borrow_mut();
        let scheduled = state.on_retry.as_ref().map(|callback| {
            window().and_then(|w| {
                Ok(w.set_timeout_with_callback_and_timeout_and_arguments_0(
                    callback.as_ref().unchecked_ref(),
                    interval,
                )?)
            })
        });
        match scheduled {
            Some(Ok(handle)) => state.retry_handle = Some(handle),
            Some(Err(e)) => log::error!("Could not schedule root retry: {}", e),
            None => {}
        }
    }

    /// Observe `root`. A watcher observes at most one root at a time.
    fn attach(&self, root: Element) -> Result<()> {
        if self.state.borrow().root.is_some() {
            return Ok(());
        }

        let weak = Rc::downgrade(&self.state);
        let on_mutation = Closure::<dyn FnMut(js_sys::Array)>::new(move |_records: js_sys::Array| {
            if let Some(watcher) = Self::from_weak(&weak) {
                watcher.schedule_rescan();
            }
        });

        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        observer.observe_with_options(&root, &init)?;

        {
            let mut state = self.state.borrow_mut();
            log::info!(
                "Watching {} for tenant ids on {}",
                state.profile.root_selector,
                state.profile.kind.display_name()
            );
            state.root = Some(root);
            state.observer = Some(observer);
            state.on_mutation = Some(on_mutation);
        }

        self.rescan();
        Ok(())
    }

    /// Debounced rescan; page updates tend to arrive in bursts
    fn schedule_rescan(&self) {
        let mut state = self.state.borrow_mut();
        let window = match window() {
            Ok(window) => window,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        };

        if let Some(handle) = state.debounce_handle.take() {
            window.clear_timeout_with_handle(handle);
        }

        if state.on_debounce.is_none() {
            let weak = Rc::downgrade(&self.state);
            state.on_debounce = Some(Closure::new(move || {
                if let Some(watcher) = Self::from_weak(&weak) {
                    watcher.state.borrow_mut().debounce_handle = None;
                    watcher.rescan();
                }
            }));
        }

        let delay = state.profile.debounce_ms;
        let handle = state.on_debounce.as_ref().map(|callback| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                delay,
            )
        });
        match handle {
            Some(Ok(handle)) => state.debounce_handle = Some(handle),
            Some(Err(e)) => log::error!("Could not schedule rescan: {:?}", e),
            None => {}
        }
    }

    /// Annotate everything under the root now
    pub fn rescan(&self) {
        match self.annotate_all() {
            Ok(0) => {}
            Ok(changed) => log::debug!("Updated tenant labels on {} elements", changed),
            Err(e) => log::warn!("Tenant scan failed: {}", e),
        }
    }

    /// Label every target element under the root. Returns how many elements
    /// were rewritten; up-to-date elements are left alone.
    pub fn annotate_all(&self) -> Result<usize> {
        let state = self.state.borrow();
        let Some(root) = state.root.as_ref() else {
            return Ok(0);
        };

        let document = document()?;
        let query = target_query(&state.profile);
        let annotate_unknown = state.profile.annotate_unknown;
        let targets = root.query_selector_all(&query)?;

        let label_selector = format!(".{}", LABEL_CLASS);

        state.registry.with_directory(|directory| -> Result<usize> {
            let revision = directory.revision().to_string();
            let mut changed = 0;

            for i in 0..targets.length() {
                let Some(element) = targets.item(i).and_then(|node| node.dyn_into::<Element>().ok())
                else {
                    continue;
                };

                // Inner targets carry the label themselves
                if element.closest(&label_selector)?.is_some()
                    || element.query_selector(&query)?.is_some()
                {
                    continue;
                }

                if is_current(&element, &revision) {
                    continue;
                }

                strip_labels(&element)?;
                let text = element.text_content().unwrap_or_default();
                if let Some(label) = label_for_text(&text, directory, annotate_unknown) {
                    let span = document.create_element("span")?;
                    span.set_class_name(LABEL_CLASS);
                    span.set_text_content(Some(&label));
                    element.append_child(&span)?;
                }

                element.set_attribute(REVISION_ATTR, &revision)?;
                element.set_attribute(TEXT_ATTR, &element.text_content().unwrap_or_default())?;
                changed += 1;
            }

            Ok(changed)
        })
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().root.is_some()
    }

    /// A root retry is scheduled
    pub fn is_waiting_for_root(&self) -> bool {
        self.state.borrow().retry_handle.is_some()
    }
}

/// Target selectors that never match our own label spans
fn target_query(profile: &SiteProfile) -> String {
    profile
        .target_selectors
        .iter()
        .map(|selector| format!("{}:not(.{})", selector, LABEL_CLASS))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Annotated with this revision and untouched since
fn is_current(element: &Element, revision: &str) -> bool {
    element.get_attribute(REVISION_ATTR).as_deref() == Some(revision)
        && element.get_attribute(TEXT_ATTR) == element.text_content()
}

fn strip_labels(element: &Element) -> Result<()> {
    let labels = element.query_selector_all(&format!(":scope > .{}", LABEL_CLASS))?;
    for i in 0..labels.length() {
        if let Some(label) = labels.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            label.remove();
        }
    }
    Ok(())
}

/// Remove labels and stamps from everything under `root`
fn clear_annotations(root: &Element) -> Result<()> {
    let labels = root.query_selector_all(&format!(".{}", LABEL_CLASS))?;
    for i in 0..labels.length() {
        if let Some(label) = labels.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            label.remove();
        }
    }

    let stamped = root.query_selector_all(&format!("[{}]", REVISION_ATTR))?;
    for i in 0..stamped.length() {
        if let Some(element) = stamped.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            element.remove_attribute(REVISION_ATTR)?;
            element.remove_attribute(TEXT_ATTR)?;
        }
    }
    Ok(())
}
