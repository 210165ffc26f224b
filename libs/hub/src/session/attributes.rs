//! Typed per-session key/value store, allocated on first `set`.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub(crate) struct Attributes {
    values: RwLock<Option<HashMap<String, Value>>>,
}

impl Attributes {
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values
            .write()
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Arc::new(value));
    }

    /// Value stored under `key`, if present and of type `T`
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.values.read().as_ref()?.get(key)?.clone();
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .as_ref()
            .is_some_and(|values| values.contains_key(key))
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values
            .write()
            .as_mut()
            .is_some_and(|values| values.remove(key).is_some())
    }

    pub fn keys(&self) -> Vec<String> {
        self.values
            .read()
            .as_ref()
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }
}
