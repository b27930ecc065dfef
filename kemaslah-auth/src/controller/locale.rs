use std::sync::{Arc, RwLock};

/// A window or widget that re-renders its text when the language changes.
pub trait LocaleObserver: Send + Sync {
    fn apply_locale(&self, language_code: &str);
}

/// Fan-out of language changes to every subscribed observer.
#[derive(Clone, Default)]
pub struct LocaleRegistry {
    observers: Arc<RwLock<Vec<Arc<dyn LocaleObserver>>>>,
}

impl LocaleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn LocaleObserver>) {
        let mut observers = self.observers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.push(observer);
    }

    pub fn broadcast(&self, language_code: &str) {
        let observers = self.observers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::debug!(language_code, subscribers = observers.len(), "broadcasting locale");
        for observer in observers.iter() {
            observer.apply_locale(language_code);
        }
    }
}
