//! Container namespaces and name resolution.
//!
//! A container is the namespace an expression is checked in, e.g.
//! `google.api.expr.v1`. Unqualified references are resolved by trying the
//! container prefixes from most to least qualified. Aliases map a simple
//! name to a fully qualified one and take priority over the namespace.

use std::collections::BTreeMap;

use log::trace;
use thiserror::Error;

/// Errors raised while configuring a [`Container`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("container name must not contain a leading '.': {0}")]
    LeadingDot(String),

    #[error("invalid qualified name: {0}, wanted name of the form 'qualified.name'")]
    InvalidQualifiedName(String),

    #[error("{kind} must be non-empty and simple (not qualified): {kind}={alias}")]
    InvalidAlias { kind: &'static str, alias: String },

    #[error("{kind} collides with existing reference: name={name}, {kind}={alias}, existing={existing}")]
    AliasCollision {
        kind: &'static str,
        name: String,
        alias: String,
        existing: String,
    },

    #[error("{kind} collides with container name: name={name}, {kind}={alias}, container={container}")]
    ContainerCollision {
        kind: &'static str,
        name: String,
        alias: String,
        container: String,
    },
}

/// Namespace plus alias table used for qualified name resolution.
///
/// Containers are immutable once built; every configuration method returns
/// a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    name: String,
    /// Alias to fully qualified name.
    aliases: BTreeMap<String, String>,
}

impl Container {
    /// Create a container for the given namespace. The empty name is the
    /// root namespace.
    pub fn new(name: impl Into<String>) -> Result<Self, ContainerError> {
        let name = name.into();
        if name.starts_with('.') {
            return Err(ContainerError::LeadingDot(name));
        }
        Ok(Self {
            name,
            aliases: BTreeMap::new(),
        })
    }

    /// The namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered aliases, keyed by alias.
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Add abbreviations: each qualified name becomes reachable by its last
    /// segment, e.g. `my.app.Request` as `Request`.
    pub fn with_abbreviations<S: AsRef<str>>(
        mut self,
        qualified_names: impl IntoIterator<Item = S>,
    ) -> Result<Self, ContainerError> {
        for qualified in qualified_names {
            let qualified = qualified.as_ref().trim();
            let valid_chars = qualified
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            let alias = match qualified.rfind('.') {
                Some(dot) if valid_chars && dot > 0 && dot < qualified.len() - 1 => {
                    &qualified[dot + 1..]
                }
                _ => return Err(ContainerError::InvalidQualifiedName(qualified.to_string())),
            };
            self.insert_alias("abbreviation", qualified, alias)?;
        }
        Ok(self)
    }

    /// Add an explicit alias for a qualified name.
    pub fn with_alias(mut self, qualified: &str, alias: &str) -> Result<Self, ContainerError> {
        self.insert_alias("alias", qualified, alias)?;
        Ok(self)
    }

    /// Layer `other` over this container.
    ///
    /// The namespace of `other` replaces this one when set, and its aliases
    /// are added to the existing ones.
    pub fn extend(&self, other: &Container) -> Result<Container, ContainerError> {
        let mut extended = self.clone();
        if !other.name.is_empty() {
            extended.name = other.name.clone();
        }
        for (alias, qualified) in &other.aliases {
            extended.insert_alias("alias", qualified, alias)?;
        }
        Ok(extended)
    }

    fn insert_alias(
        &mut self,
        kind: &'static str,
        qualified: &str,
        alias: &str,
    ) -> Result<(), ContainerError> {
        if alias.is_empty() || alias.contains('.') {
            return Err(ContainerError::InvalidAlias {
                kind,
                alias: alias.to_string(),
            });
        }
        if qualified.starts_with('.') {
            return Err(ContainerError::LeadingDot(qualified.to_string()));
        }
        match qualified.rfind('.') {
            Some(dot) if dot > 0 && dot < qualified.len() - 1 => {}
            _ => return Err(ContainerError::InvalidQualifiedName(qualified.to_string())),
        }
        if let Some(existing) = self.aliases.get(alias) {
            if existing == qualified {
                return Ok(());
            }
            return Err(ContainerError::AliasCollision {
                kind,
                name: qualified.to_string(),
                alias: alias.to_string(),
                existing: existing.clone(),
            });
        }
        if self.name == alias || self.name.starts_with(&format!("{}.", alias)) {
            return Err(ContainerError::ContainerCollision {
                kind,
                name: qualified.to_string(),
                alias: alias.to_string(),
                container: self.name.clone(),
            });
        }
        self.aliases.insert(alias.to_string(), qualified.to_string());
        Ok(())
    }

    /// Candidate fully qualified names for a reference, in resolution order.
    ///
    /// ```
    /// use cel_check_common::Container;
    /// let container = Container::new("a.b.c").unwrap();
    /// assert_eq!(
    ///     container.candidate_names("d.e"),
    ///     vec!["a.b.c.d.e", "a.b.d.e", "a.d.e", "d.e"],
    /// );
    /// ```
    pub fn candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![absolute.to_string()];
        }
        if let Some(expanded) = self.expand_alias(name) {
            trace!("'{}' expands through alias to '{}'", name, expanded);
            return vec![expanded];
        }
        if self.name.is_empty() {
            return vec![name.to_string()];
        }

        let mut candidates = vec![format!("{}.{}", self.name, name)];
        let mut prefix = self.name.as_str();
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            candidates.push(format!("{}.{}", prefix, name));
        }
        candidates.push(name.to_string());
        candidates
    }

    fn expand_alias(&self, name: &str) -> Option<String> {
        let (simple, qualifier) = match name.find('.') {
            Some(dot) => name.split_at(dot),
            None => (name, ""),
        };
        self.aliases
            .get(simple)
            .map(|qualified| format!("{}{}", qualified, qualifier))
    }
}
