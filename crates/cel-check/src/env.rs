use std::sync::Arc;

use cel_check_common::{
    Ast, CelType, Container, ContainerError, DeclError, FunctionDecl, ProtoTypeProvider,
    TypeProvider, VariableDecl,
};
use thiserror::Error;

use crate::checker::{CheckResult, Checker};
use crate::errors::CheckAbort;
use crate::scope::Scopes;
use crate::standard_library::STANDARD_LIBRARY;

/// Limits and switches for a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOptions {
    /// Maximum expression nesting before the check is aborted.
    pub max_recursion_depth: usize,
    /// Report presence tests (`has(x.f)`) on types without fields.
    pub validate_presence_tests: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 250,
            validate_presence_tests: false,
        }
    }
}

/// Errors raised while configuring an [`Env`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error(transparent)]
    Declaration(#[from] DeclError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Declarations, container and type provider an expression is checked
/// against.
///
/// Declarations are shared: cloning an `Env` or calling [`Env::extend`]
/// never copies the standard library, and every check runs on its own frame
/// above the environment's.
///
/// # Example
///
/// ```
/// use cel_check::Env;
/// use cel_check_common::{CelType, ExprFactory, Source};
///
/// let env = Env::with_standard_library()
///     .with_variable("x", CelType::Int)
///     .unwrap();
///
/// let mut factory = ExprFactory::new();
/// let x = factory.ident("x", 0..1);
/// let one = factory.int(1, 4..5);
/// let sum = factory.call("_+_", vec![x, one], 2..3);
/// let ast = factory.build(sum, Source::new("x + 1"));
///
/// let result = env.check(ast).unwrap();
/// assert!(result.is_ok());
/// assert_eq!(result.result_type(), Some(&CelType::Int));
/// ```
#[derive(Debug, Clone)]
pub struct Env {
    scopes: Arc<Scopes>,
    container: Container,
    provider: Option<Arc<dyn TypeProvider>>,
    options: CheckerOptions,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// Create an empty environment: no functions, variables or type provider.
    pub fn new() -> Self {
        Self {
            scopes: Arc::new(Scopes::new()),
            container: Container::default(),
            provider: None,
            options: CheckerOptions::default(),
        }
    }

    /// Create an environment on top of the standard library, with protobuf
    /// well-known types available through a [`ProtoTypeProvider`].
    pub fn with_standard_library() -> Self {
        Self {
            scopes: Arc::new(Scopes::child_of(STANDARD_LIBRARY.clone())),
            provider: Some(Arc::new(ProtoTypeProvider::new())),
            ..Self::new()
        }
    }

    /// Add a variable (builder pattern).
    pub fn with_variable(mut self, name: impl Into<String>, cel_type: CelType) -> Result<Self, EnvError> {
        self.add_variable(VariableDecl::new(name, cel_type))?;
        Ok(self)
    }

    /// Add a variable or constant declaration.
    ///
    /// Redeclaring a name with a different type in this environment fails.
    pub fn add_variable(&mut self, decl: VariableDecl) -> Result<(), EnvError> {
        Arc::make_mut(&mut self.scopes).add_ident(decl)?;
        Ok(())
    }

    /// Add a function declaration (builder pattern).
    pub fn with_function(mut self, decl: FunctionDecl) -> Result<Self, EnvError> {
        self.add_function(decl)?;
        Ok(self)
    }

    /// Add a function declaration, merging its overloads with any visible
    /// declaration of the same name.
    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<(), EnvError> {
        Arc::make_mut(&mut self.scopes).add_function(decl)?;
        Ok(())
    }

    /// Set the container namespace, keeping existing aliases.
    pub fn with_container(mut self, name: &str) -> Result<Self, EnvError> {
        let container = Container::new(name)?;
        self.container = self.container.extend(&container)?;
        Ok(self)
    }

    /// Add abbreviations for qualified names, e.g. `my.pkg.Msg` as `Msg`.
    pub fn with_abbreviations<S: AsRef<str>>(
        mut self,
        qualified_names: impl IntoIterator<Item = S>,
    ) -> Result<Self, EnvError> {
        self.container = self.container.with_abbreviations(qualified_names)?;
        Ok(self)
    }

    /// Replace the type provider used for messages and enum constants.
    pub fn with_type_provider(mut self, provider: Arc<dyn TypeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_options(mut self, options: CheckerOptions) -> Self {
        self.options = options;
        self
    }

    /// Create a child environment whose declarations shadow this one's.
    ///
    /// Variables may be redeclared with a different type in the child.
    pub fn extend(&self) -> Self {
        Self {
            scopes: Arc::new(Scopes::child_of(self.scopes.clone())),
            ..self.clone()
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    /// Find a visible variable declaration.
    pub fn find_variable(&self, name: &str) -> Option<&VariableDecl> {
        self.scopes.find_ident(name)
    }

    /// Find a visible function declaration.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.scopes.find_function(name)
    }

    /// Type-check an AST against this environment.
    ///
    /// Type errors are collected in the result; only exceeding the recursion
    /// limit fails the call.
    pub fn check(&self, ast: Ast) -> Result<CheckResult, CheckAbort> {
        let checker = Checker::new(
            self.scopes.clone(),
            &self.container,
            self.provider.as_deref(),
            &self.options,
        );
        checker.check(ast)
    }
}
