//! Runtime type registry.
//!
//! [`TypeRegistry`] stores every [`TypeEntry`] by [`TypeHash`] and answers the
//! questions the dispatch engine needs: the precedence list of a type, how far
//! an ancestor sits from it, and what to call it in a diagnostic.
//!
//! # Inheritance Model
//!
//! - **Builtins** are registered on creation. `Any` is the root and matches
//!   everything; `Null` derives from `Any` only; every other builtin derives
//!   from `Object`.
//! - **Classes** are named types with an ordered parent list.
//! - **Instances** are unnamed singleton types, one per object. An object
//!   created from another object derives from that object's singleton, so a
//!   method specialized on a parent object also applies to its children.
//!
//! # Example
//!
//! ```
//! use protoduck_core::{TypeRegistry, builtins};
//!
//! let mut types = TypeRegistry::new();
//! let animal = types.register_class("Animal", &[]).unwrap();
//! let dog = types.register_class("Dog", &[animal]).unwrap();
//!
//! assert_eq!(types.precedence(dog), vec![dog, animal, builtins::OBJECT, builtins::ANY]);
//! assert_eq!(types.distance(dog, animal), Some(1));
//! ```

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{ConfigurationError, TypeHash, builtins};

/// Kind of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// One of the types in [`builtins`].
    Builtin,
    /// A named, host-registered type.
    Class,
    /// The singleton type of one object.
    Instance,
}

/// Registry entry for a runtime type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    /// Display name. Instances carry a synthetic name.
    pub name: String,
    /// Type hash for identity.
    pub type_hash: TypeHash,
    /// What sort of type this is.
    pub kind: TypeKind,
    /// Direct parents, most significant first.
    pub parents: Vec<TypeHash>,
}

impl TypeEntry {
    /// Whether this entry backs a single object.
    pub fn is_instance(&self) -> bool {
        self.kind == TypeKind::Instance
    }
}

/// Storage for all runtime types.
///
/// Not thread-safe. Types are registered during setup and only read while
/// dispatching.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHash, TypeEntry>,
    next_instance: u64,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry with all builtins registered.
    pub fn new() -> Self {
        let mut types = FxHashMap::default();
        for (hash, name) in builtins::ALL {
            let parents = match hash {
                builtins::ANY => vec![],
                builtins::OBJECT | builtins::NULL => vec![builtins::ANY],
                _ => vec![builtins::OBJECT],
            };
            types.insert(
                hash,
                TypeEntry {
                    name: name.to_string(),
                    type_hash: hash,
                    kind: TypeKind::Builtin,
                    parents,
                },
            );
        }
        Self {
            types,
            next_instance: 0,
        }
    }

    /// Register a named class.
    ///
    /// An empty parent list means the class derives from `Object`.
    pub fn register_class(
        &mut self,
        name: &str,
        parents: &[TypeHash],
    ) -> Result<TypeHash, ConfigurationError> {
        let hash = TypeHash::from_name(name);
        if self.types.contains_key(&hash) {
            return Err(ConfigurationError::DuplicateType(name.to_string()));
        }
        self.check_parents(parents)?;

        let parents = if parents.is_empty() {
            vec![builtins::OBJECT]
        } else {
            parents.to_vec()
        };
        self.types.insert(
            hash,
            TypeEntry {
                name: name.to_string(),
                type_hash: hash,
                kind: TypeKind::Class,
                parents,
            },
        );
        Ok(hash)
    }

    /// Register the singleton type of a new object deriving from `parent`.
    pub fn register_instance(&mut self, parent: TypeHash) -> Result<TypeHash, ConfigurationError> {
        self.check_parents(&[parent])?;
        Ok(self.derive_instance(parent))
    }

    /// Register the singleton type of a new object without checking `parent`.
    ///
    /// For parents known to be registered, such as another object's type.
    pub fn derive_instance(&mut self, parent: TypeHash) -> TypeHash {
        let n = self.next_instance;
        self.next_instance += 1;
        let hash = TypeHash::from_instance(n);
        self.types.insert(
            hash,
            TypeEntry {
                name: format!("#<instance {n}>"),
                type_hash: hash,
                kind: TypeKind::Instance,
                parents: vec![parent],
            },
        );
        hash
    }

    fn check_parents(&self, parents: &[TypeHash]) -> Result<(), ConfigurationError> {
        match parents.iter().find(|p| !self.types.contains_key(p)) {
            Some(missing) => Err(ConfigurationError::TypeNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Get a type entry by hash.
    pub fn get(&self, hash: TypeHash) -> Option<&TypeEntry> {
        self.types.get(&hash)
    }

    /// Get a type entry by name. Instances cannot be looked up by name.
    pub fn get_by_name(&self, name: &str) -> Option<&TypeEntry> {
        self.types
            .get(&TypeHash::from_name(name))
            .filter(|e| !e.is_instance())
    }

    /// Check if a type is registered.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.types.contains_key(&hash)
    }

    /// Number of registered types, builtins included.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Linearized ancestry of a type, most specific first.
    ///
    /// Depth-first and left-to-right over parents with duplicates removed.
    /// `Any` is always last. Unregistered hashes have the precedence
    /// `[hash, Any]`.
    pub fn precedence(&self, hash: TypeHash) -> Vec<TypeHash> {
        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![hash];

        while let Some(current) = stack.pop() {
            if current == builtins::ANY || !seen.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(entry) = self.types.get(&current) {
                stack.extend(entry.parents.iter().rev().copied());
            }
        }

        order.push(builtins::ANY);
        order
    }

    /// Position of `ancestor` in the precedence list of `hash`.
    ///
    /// `None` when `ancestor` is not in the ancestry at all.
    pub fn distance(&self, hash: TypeHash, ancestor: TypeHash) -> Option<usize> {
        self.precedence(hash).iter().position(|h| *h == ancestor)
    }

    /// Check if `hash` is `ancestor` or derives from it.
    pub fn is_subtype(&self, hash: TypeHash, ancestor: TypeHash) -> bool {
        self.distance(hash, ancestor).is_some()
    }

    /// Name used for a type in diagnostics.
    ///
    /// Instances display as their nearest named ancestor, so a plain object
    /// reads as `Object` and an instance of `Thing` reads as `Thing`.
    pub fn display_name(&self, hash: TypeHash) -> String {
        self.precedence(hash)
            .into_iter()
            .filter_map(|h| self.types.get(&h))
            .find(|e| !e.is_instance())
            .map(|e| e.name.clone())
            .unwrap_or_else(|| hash.to_string())
    }

    /// Iterate over all registered types.
    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.values()
    }
}
