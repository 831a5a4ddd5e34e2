//! Phase registry for definition lookup by name.

use rustc_hash::FxHashMap;

use super::definition::PhaseDef;

/// Registry of phase definitions.
pub struct PhaseRegistry<S> {
    phases: FxHashMap<String, PhaseDef<S>>,
}

impl<S> Default for PhaseRegistry<S> {
    fn default() -> Self {
        Self {
            phases: FxHashMap::default(),
        }
    }
}

impl<S> PhaseRegistry<S> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a phase definition.
    ///
    /// Panics if a phase with the same name already exists.
    pub fn register(&mut self, phase: PhaseDef<S>) {
        if self.phases.contains_key(phase.name()) {
            panic!("Phase `{}` already registered", phase.name());
        }
        self.phases.insert(phase.name().to_string(), phase);
    }

    /// Get a phase definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PhaseDef<S>> {
        self.phases.get(name)
    }

    /// Check if a phase name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.phases.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = PhaseRegistry::<()>::new();
        registry.register(PhaseDef::sequential("main").allow(["play"]));

        assert!(registry.contains("main"));
        assert_eq!(registry.get("main").unwrap().allowed(), ["play".to_string()]);
        assert!(registry.get("discard").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_name_panics() {
        let mut registry = PhaseRegistry::<()>::new();
        registry.register(PhaseDef::sequential("main"));
        registry.register(PhaseDef::simultaneous("main"));
    }
}
