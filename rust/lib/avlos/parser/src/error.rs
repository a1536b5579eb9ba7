use std::fmt;

use avlos_ir::UnitResolutionError;
use thiserror::Error;

/// What went wrong with one document node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaIssueKind {
    #[error("Name is required.")]
    MissingName,

    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Either a getter, setter, caller or remote attributes list is required")]
    NoRole,

    #[error("A getter, setter, and caller cannot coexist in a single endpoint")]
    ConflictingRoles,

    #[error("Data type or flags field is required")]
    MissingType,

    #[error("only one of dtype, flags or options may be given")]
    AmbiguousType,

    #[error("a function cannot declare flags or options")]
    FunctionWithOptions,

    #[error("Empty flags list.")]
    EmptyFlags,

    #[error("Empty options list.")]
    EmptyOptions,

    #[error("{count} options declared, at most {max} fit the uint8 wire value")]
    TooManyOptions { count: usize, max: usize },

    #[error("unknown data type '{0}'")]
    UnknownType(String),

    #[error("an attribute cannot have type void")]
    VoidAttribute,

    #[error("arguments are only allowed on functions")]
    ArgumentsOnNonFunction,

    #[error("argument {index} requires a name")]
    ArgumentMissingName { index: usize },

    #[error("argument '{name}' must have a fixed-width data type, got '{dtype}'")]
    InvalidArgumentType { name: String, dtype: String },

    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    #[error("the root node requires a remote attributes list")]
    RootNotContainer,

    #[error("too many endpoints")]
    EndpointSpaceExhausted,

    #[error(transparent)]
    Unit(#[from] UnitResolutionError),
}

/// A structural problem located at a dotted document path.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    pub path: String,
    pub kind: SchemaIssueKind,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

/// Every issue found while building a tree. The build produces no tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    /// True if any issue is an unresolvable unit.
    pub fn has_unit_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.kind, SchemaIssueKind::Unit(_)))
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema has {} error(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}
