use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// 类型名 -> 解码函数 的注册表
pub(crate) struct Registry<F> {
    entries: RwLock<HashMap<String, F>>,
}

impl<F: Copy> Registry<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, name: String, decoder: F) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(name, decoder);
    }

    pub(crate) fn get(&self, name: &str) -> Option<F> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
