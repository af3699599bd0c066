//! Declaration scopes for identifier and function resolution.
//!
//! Scopes form a persistent chain: each frame owns its own declarations and
//! shares its parent through an `Arc`. Pushing a frame never copies the
//! parent, so the standard library and environment declarations are shared
//! by every check that runs on top of them.

use std::collections::HashMap;
use std::sync::Arc;

use cel_check_common::{DeclError, FunctionDecl, VariableDecl};
use log::trace;

/// Declarations owned by a single frame.
#[derive(Debug, Clone, Default)]
struct Frame {
    idents: HashMap<String, VariableDecl>,
    functions: HashMap<String, FunctionDecl>,
}

/// A frame of declarations plus the chain of enclosing frames.
///
/// Lookups search from the innermost frame outwards, so inner declarations
/// shadow outer ones.
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    frame: Frame,
    parent: Option<Arc<Scopes>>,
}

impl Scopes {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty frame on top of a shared scope.
    pub fn child_of(parent: Arc<Scopes>) -> Self {
        Self {
            frame: Frame::default(),
            parent: Some(parent),
        }
    }

    /// Enter a new innermost frame.
    pub fn push(self) -> Self {
        trace!("push scope (depth {})", self.depth() + 1);
        Self::child_of(Arc::new(self))
    }

    /// Leave the innermost frame, returning the enclosing scope.
    ///
    /// Popping the root returns it unchanged.
    pub fn pop(mut self) -> Self {
        match self.parent.take() {
            Some(parent) => {
                trace!("pop scope (depth {})", parent.depth());
                Arc::unwrap_or_clone(parent)
            }
            None => self,
        }
    }

    /// Number of frames in the chain.
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    fn frames(&self) -> impl Iterator<Item = &Scopes> {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }

    /// Declare an identifier in the innermost frame.
    ///
    /// Redeclaring a name with the same type is allowed; a different type
    /// within the same frame is an error.
    pub fn add_ident(&mut self, decl: VariableDecl) -> Result<(), DeclError> {
        if let Some(existing) = self.frame.idents.get(&decl.name) {
            if existing.cel_type != decl.cel_type {
                return Err(DeclError::OverlappingIdentifier { name: decl.name });
            }
        }
        self.frame.idents.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Declare a function in the innermost frame, merging its overloads with
    /// any visible declaration of the same name.
    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<(), DeclError> {
        let mut merged = self
            .find_function(&decl.name)
            .cloned()
            .unwrap_or_else(|| FunctionDecl::new(decl.name.clone()));
        merged.merge(decl)?;
        self.frame.functions.insert(merged.name.clone(), merged);
        Ok(())
    }

    /// Find an identifier, innermost frame first.
    pub fn find_ident(&self, name: &str) -> Option<&VariableDecl> {
        self.frames().find_map(|scope| scope.frame.idents.get(name))
    }

    /// Find an identifier in the innermost frame only.
    pub fn find_ident_in_scope(&self, name: &str) -> Option<&VariableDecl> {
        self.frame.idents.get(name)
    }

    /// Find an identifier declared above `root`, i.e. in frames pushed on
    /// top of a shared environment.
    pub fn find_local_ident(&self, name: &str, root: &Scopes) -> Option<&VariableDecl> {
        self.frames()
            .take_while(|scope| !std::ptr::eq(*scope, root))
            .find_map(|scope| scope.frame.idents.get(name))
    }

    /// Find a function, innermost frame first.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.frames().find_map(|scope| scope.frame.functions.get(name))
    }

    /// Insert a function without merge validation. Used for the standard
    /// library, whose overloads are known not to collide.
    pub(crate) fn insert_function(&mut self, decl: FunctionDecl) {
        self.frame.functions.insert(decl.name.clone(), decl);
    }

    /// Insert an identifier without validation.
    pub(crate) fn insert_ident(&mut self, decl: VariableDecl) {
        self.frame.idents.insert(decl.name.clone(), decl);
    }

    /// Names of all functions visible from this scope.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .frames()
            .flat_map(|scope| scope.frame.functions.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
