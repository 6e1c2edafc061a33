//! bbvalue is a library to parse BitBake-style metadata values into an Abstract Syntax Tree ([Node]),
//! resolve them against a metadata dictionary, and derive deterministic content signatures.
//!
//! # Overview
//! Build metadata values are strings containing variable references (`${VAR}`) and inline python
//! snippets (`${@...}`), both of which may nest arbitrarily.  Shell and python function bodies stored
//! in the metadata reference further variables and external commands, and incremental builds need to
//! know when any of that changes.  This library covers the three concerns that make the problem
//! interesting:
//!
//! - a recursive descent parser for the value language, which never fails: unbalanced closers stay
//!   literal and unclosed openers are recovered speculatively, so strings like `'s:IP{:I${:g'`
//!   survive a parse/resolve round trip verbatim,
//! - static inference of the variables a value references, the external commands it would run and
//!   the python functions it calls, by introspecting embedded shell and python code without
//!   executing either,
//! - a canonical, order independent rendering of a dependency closure which is hashed into a
//!   fixed-width [Signature] usable as a cache key.
//!
//! # Design
//! Values are parsed once per `(name, raw value, store)` triple and memoized by an [Engine], which
//! owns all mutable state.  The metadata dictionary itself is external and reached through the
//! [IMetadata] interface; inline snippet evaluation is likewise delegated to an [IEvaluator]
//! implementation supplied by the host.  Resolution walks the tree with an explicit path stack for
//! cycle detection, and reference tracking re-uses the same walk with cross-referencing enabled but
//! evaluation suppressed, so tracking never runs python code.
//!
//! # Example
//! ```
//! use bbvalue::{parse, Engine, MemMetadata};
//!
//! let mut metadata = MemMetadata::new();
//! metadata.set_var("TOPDIR", "/build");
//! metadata.set_var("S", "${TOPDIR}/src");
//!
//! let engine = Engine::new();
//! let value = parse("cd ${S}");
//! assert_eq!(engine.resolve(&value, &metadata).unwrap(), "cd /build/src");
//! assert_eq!(
//!     engine.references(&value, &metadata).unwrap(),
//!     ["S".to_string()].into_iter().collect()
//! );
//! ```

mod blacklist;
mod engine;
mod metadata;
mod node;
mod parsing;
mod python;
mod refs;
mod resolve;
pub mod shell;
mod signature;
mod tokenization;

#[cfg(test)]
mod __tests__;

pub use parsing::{parse, parse_python, parse_shell};
pub use python::PythonSyntaxError;
pub use shell::ShellError;
pub use signature::stable_repr;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use thiserror::Error;

/// Predicate deciding whether a [Conditional](Node::Conditional) value applies for a given store.
pub type Condition = Rc<dyn Fn(&dyn IMetadata) -> bool>;

/// Abstract syntax tree of a metadata value.
///
/// Trees are finite: a [VariableRef](Node::VariableRef) holds the components of the *name* to be
/// looked up, never an edge to the referred value, so cycles can only exist in the store and are
/// detected at resolution time.  Nodes are treated as immutable once parsed; transformations
/// produce new nodes.
#[derive(Clone)]
pub enum Node {
    /// A plain string fragment.  Adjacent literals coalesce on append.
    Literal(String),
    /// Concatenation of components.
    Compound(Vec<Node>),
    /// `${...}` reference whose name is the resolution of its components.
    VariableRef(Vec<Node>),
    /// `${@...}` inline snippet, evaluated by the configured [IEvaluator] at resolution time.
    PythonSnippet(Vec<Node>),
    /// A whole value holding a shell function body.
    ShellBlock(Vec<Node>),
    /// A whole value holding a python function body.
    PythonBlock(Vec<Node>),
    /// Deferred append/prepend semantics: resolves as `prepend ++ components ++ append`.
    LazyCompound {
        prepend: Vec<Node>,
        components: Vec<Node>,
        append: Vec<Node>,
    },
    /// Resolves to the empty string when the condition is present and false for the store.
    Conditional {
        condition: Option<Condition>,
        components: Vec<Node>,
    },
}

/// Scalar value held by a metadata store.  Values are usually strings, but the store also accepts
/// plain scalars, which bypass parsing entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// Identity of a metadata store, handed out once at store construction.
///
/// Two stores with identical contents are still distinct cache-wise; the id is part of the
/// [Engine] memoization key so values parsed from one store are never served for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u64);

/// Read-only interface to the metadata dictionary supplied by the host.
///
/// The engine never mutates the store and assumes it does not change during a single public call;
/// mutations between calls are picked up through the memoization key rather than any explicit
/// invalidation.
pub trait IMetadata {
    /// The store identity used in memoization keys.
    fn ident(&self) -> StoreId;
    /// The raw, unexpanded value of a variable.
    fn get(&self, name: &str) -> Option<RawValue>;
    /// A single flag of a variable.
    fn get_flag(&self, name: &str, flag: &str) -> Option<RawValue>;
    /// All flags of a variable.
    fn get_flags(&self, name: &str) -> Vec<(String, RawValue)>;
    /// Every variable name defined in the store.
    fn keys(&self) -> Vec<String>;
}

/// A simple in-memory [IMetadata] implementation.
///
/// Hosts embedding the engine will usually adapt their own dictionary type instead; this one backs
/// the test-suite and small tools.
pub struct MemMetadata {
    id: StoreId,
    vars: BTreeMap<String, RawValue>,
    flags: BTreeMap<String, BTreeMap<String, RawValue>>,
}

/// Interface to the external python evaluator used for `${@...}` snippet expansion.
///
/// The engine hands over the snippet code with the surrounding `${@`/`}` stripped and the embedded
/// variable references already resolved, together with [Bindings] exposing the store.  Whatever the
/// evaluator returns is re-parsed as a metadata value and resolved again, so snippets may produce
/// further references.
pub trait IEvaluator {
    fn evaluate(
        &self,
        code: &str,
        bindings: &Bindings<'_>,
    ) -> Result<String, Box<dyn std::error::Error>>;
}

/// Name bindings visible to an [IEvaluator] invocation.
///
/// The store is bound wholesale (the conventional `d`), and any variable can additionally be read
/// by bare name; those lookups expand lazily on first access and miss for undefined variables.
pub struct Bindings<'a> {
    engine: &'a Engine,
    metadata: &'a dyn IMetadata,
}

/// Parses, resolves and tracks metadata values, owning the per-session parse cache.
///
/// The engine is deliberately single threaded: every public call runs to completion on the
/// caller's thread and the only shared state is the write-once-per-key factory memo.  Hosts
/// wanting parallelism give each thread its own engine.
pub struct Engine {
    evaluator: Option<Rc<dyn IEvaluator>>,
    memo: RefCell<HashMap<(String, RawValue, StoreId), Rc<Node>>>,
}

/// Content signature of a set of metadata variables and everything they transitively reference.
///
/// `data` maps each contributing variable to its (deny-list transformed) value tree, `data_string`
/// is the canonical rendering of that mapping used as digest input, and the digest itself is a
/// 128-bit value independent of seed ordering.
pub struct Signature {
    pub data: BTreeMap<String, Rc<Node>>,
    pub data_string: String,
    digest: [u8; 16],
}

/// Failure while resolving a value to a string.  Parsing never fails; these are the only
/// user-visible errors of the resolution path.
#[derive(Debug, Error)]
pub enum ExpansionError {
    /// A variable reference re-entered a name already being resolved.
    #[error("recursive variable reference for '{variable}'")]
    Recursion {
        variable: String,
        /// Names on the resolution path when the cycle closed, outermost first.
        path: Vec<String>,
    },
    /// The external evaluator failed on a python snippet.
    #[error("{cause} while evaluating:\n{code}")]
    PythonExpansion {
        code: String,
        path: Vec<String>,
        cause: Box<dyn std::error::Error>,
    },
    /// A snippet needed evaluating but the engine has no [IEvaluator] configured.
    #[error("no python evaluator configured, needed for:\n{code}")]
    NoEvaluator { code: String },
}

/// Failure while inferring the references of a value.
///
/// Reference tracking introspects embedded shell and python code, so beyond expansion failures it
/// can surface syntax errors from either parser.  The signature builder catches these per
/// variable; callers of the tracking entry points see them directly.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Python(#[from] PythonSyntaxError),
}
