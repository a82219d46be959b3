/// Shared tenant directory with change notification for the page watchers
use crate::storage::{StorageChange, settings_change};
use crate::tenants::{TenantDirectory, TenantMap};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type SubscriptionId = u64;

/// Called with the new directory revision after the merged mapping changed
type Listener = Rc<dyn Fn(u64)>;

struct Inner {
    directory: TenantDirectory,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: SubscriptionId,
}

/// Cheap-to-clone handle; all clones share one directory.
///
/// Single-threaded: lives on the page's main thread only.
#[derive(Clone)]
pub struct TenantRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl TenantRegistry {
    pub fn new(directory: TenantDirectory) -> Self {
        TenantRegistry {
            inner: Rc::new(RefCell::new(Inner {
                directory,
                listeners: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(u64) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() < before
    }

    /// Swap in a new user mapping and notify listeners if anything visible changed
    pub fn apply_user_mapping(&self, user: &TenantMap) -> bool {
        // Release the borrow before dispatch so listeners can read the registry
        let (revision, listeners) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.directory.set_user_mapping(user) {
                return false;
            }
            let listeners: Vec<Listener> =
                inner.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
            (inner.directory.revision(), listeners)
        };

        log::debug!("Tenant mapping changed, revision {}", revision);
        for listener in listeners {
            listener(revision);
        }
        true
    }

    /// Feed a decoded `chrome.storage.onChanged` payload in.
    ///
    /// Changes to other keys are ignored; a removed settings item means an
    /// empty user mapping.
    pub fn apply_storage_change(&self, changes: &HashMap<String, StorageChange>) -> bool {
        match settings_change(changes) {
            Some(settings) => {
                let user = settings.map(|s| s.tenant_mappings).unwrap_or_default();
                self.apply_user_mapping(&user)
            }
            None => false,
        }
    }

    pub fn with_directory<R>(&self, f: impl FnOnce(&TenantDirectory) -> R) -> R {
        f(&self.inner.borrow().directory)
    }

    pub fn lookup(&self, uuid: &str) -> Option<String> {
        self.with_directory(|directory| directory.lookup(uuid).map(str::to_string))
    }

    pub fn display_name(&self, uuid: &str) -> String {
        self.with_directory(|directory| directory.display_name(uuid))
    }

    pub fn revision(&self) -> u64 {
        self.with_directory(TenantDirectory::revision)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SETTINGS_KEY;
    use std::cell::Cell;

    const ACME: &str = "0b6f3a52-8d1e-4c7a-9f21-5e3d7c4a1b90";
    const OTHER: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

    fn registry() -> TenantRegistry {
        let bundled: TenantMap = [(ACME.to_string(), "Acme Corp".to_string())]
            .into_iter()
            .collect();
        TenantRegistry::new(TenantDirectory::new(&bundled, &TenantMap::new()))
    }

    fn user(uuid: &str, name: &str) -> TenantMap {
        [(uuid.to_string(), name.to_string())].into_iter().collect()
    }

    #[test]
    fn test_notifies_on_change() {
        let registry = registry();
        let seen = Rc::new(Cell::new(0u64));
        let seen_in_listener = Rc::clone(&seen);
        registry.subscribe(move |revision| seen_in_listener.set(revision));

        assert!(registry.apply_user_mapping(&user(OTHER, "Hooli")));

        assert_eq!(seen.get(), 1);
        assert_eq!(registry.lookup(OTHER).as_deref(), Some("Hooli"));
    }

    #[test]
    fn test_no_notification_without_change() {
        let registry = registry();
        let calls = Rc::new(Cell::new(0));
        let calls_in_listener = Rc::clone(&calls);
        registry.subscribe(move |_| calls_in_listener.set(calls_in_listener.get() + 1));

        assert!(registry.apply_user_mapping(&user(OTHER, "Hooli")));
        assert!(!registry.apply_user_mapping(&user(OTHER, " Hooli ")));

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = registry();
        let calls = Rc::new(Cell::new(0));
        let calls_in_listener = Rc::clone(&calls);
        let id = registry.subscribe(move |_| calls_in_listener.set(calls_in_listener.get() + 1));

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert_eq!(registry.listener_count(), 0);

        registry.apply_user_mapping(&user(OTHER, "Hooli"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_listener_can_read_registry() {
        let registry = registry();
        let observed = Rc::new(RefCell::new(String::new()));
        {
            let registry_in_listener = registry.clone();
            let observed = Rc::clone(&observed);
            registry.subscribe(move |_| {
                *observed.borrow_mut() = registry_in_listener.display_name(ACME);
            });
        }

        registry.apply_user_mapping(&user(ACME, "Acme (EU)"));

        assert_eq!(*observed.borrow(), "Acme (EU)");
    }

    #[test]
    fn test_storage_change_flow() {
        let registry = registry();

        let payload = format!(
            r#"{{"{}": {{"newValue": {{"tenant_mappings": {{"{}": "Hooli"}}}}}}}}"#,
            SETTINGS_KEY, OTHER
        );
        let changes: HashMap<String, StorageChange> = serde_json::from_str(&payload).unwrap();
        assert!(registry.apply_storage_change(&changes));
        assert_eq!(registry.display_name(OTHER), "Hooli");

        let unrelated: HashMap<String, StorageChange> =
            serde_json::from_str(r#"{"other_key": {"newValue": {}}}"#).unwrap();
        assert!(!registry.apply_storage_change(&unrelated));

        let removed: HashMap<String, StorageChange> =
            serde_json::from_str(&format!(r#"{{"{}": {{}}}}"#, SETTINGS_KEY)).unwrap();
        assert!(registry.apply_storage_change(&removed));
        assert_eq!(registry.display_name(OTHER), crate::tenants::UNKNOWN_TENANT);
        assert_eq!(registry.display_name(ACME), "Acme Corp");
        assert_eq!(registry.revision(), 2);
    }
}
