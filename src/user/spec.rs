use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;

use super::Behavior;

/// A registered kind of virtual user. Immutable once built.
#[derive(Clone)]
pub struct UserSpec {
    name: String,
    weight: u64,
    behavior: Arc<dyn Behavior>,
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

impl UserSpec {
    pub fn new(name: impl Into<String>, weight: u64, behavior: Arc<dyn Behavior>) -> Self {
        Self {
            name: name.into(),
            weight,
            behavior,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn weight(&self) -> u64 {
        self.weight
    }

    #[must_use]
    pub fn behavior(&self) -> Arc<dyn Behavior> {
        self.behavior.clone()
    }
}

/// The set of user specs a runner knows, ordered by name.
///
/// Name order is the deterministic order used for remainder distribution.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: BTreeMap<String, UserSpec>,
}

impl SpecRegistry {
    /// Registers `specs`.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate names or a zero weight.
    pub fn new<I>(specs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = UserSpec>,
    {
        let mut registered = BTreeMap::new();
        for spec in specs {
            if spec.weight == 0 {
                return Err(ValidationError::ZeroWeight { name: spec.name });
            }
            if registered.contains_key(&spec.name) {
                return Err(ValidationError::DuplicateUserSpec { name: spec.name });
            }
            registered.insert(spec.name.clone(), spec);
        }
        Ok(Self { specs: registered })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UserSpec> {
        self.specs.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserSpec> {
        self.specs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn weights(&self) -> Vec<u64> {
        self.specs.values().map(UserSpec::weight).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
