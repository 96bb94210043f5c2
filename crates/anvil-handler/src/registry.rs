//! Registry of [`LanguageHandler`]s keyed by [`Language`], so the core
//! calls handlers without knowing how many languages a workspace mixes
//! (§6: "The core calls these through a registry keyed by language tag").

use crate::handler::LanguageHandler;
use anvil_types::target::Language;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thread-safe registry mapping a [`Language`] tag to its handler.
/// Registration happens once at startup (driver binary wiring); lookups
/// happen per-target during dispatch, hence the reader-writer lock rather
/// than anything heavier.
#[derive(Default)]
pub struct HandlerRegistry {
    by_language: RwLock<BTreeMap<Language, Arc<dyn LanguageHandler>>>,
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `language`, replacing any prior registration.
    pub fn register(&self, language: Language, handler: Arc<dyn LanguageHandler>) {
        self.by_language.write().insert(language, handler);
    }

    /// Look up the handler registered for `language`, if any.
    #[must_use]
    pub fn get(&self, language: &Language) -> Option<Arc<dyn LanguageHandler>> {
        self.by_language.read().get(language).cloned()
    }

    /// Every language this registry currently has a handler for.
    #[must_use]
    pub fn registered_languages(&self) -> Vec<Language> {
        self.by_language.read().keys().cloned().collect()
    }
}
