use crate::metadata::flag_set;
use crate::parsing::parse;
use crate::refs::RefTracker;
use crate::resolve::Resolver;
use crate::{
    Bindings, Engine, ExpansionError, IEvaluator, IMetadata, Node, RawValue, Signature, TrackError,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

impl Engine {
    /// Create an engine without a snippet evaluator.  Values parse, resolve and track as usual,
    /// but resolving a `${@...}` snippet fails with [ExpansionError::NoEvaluator].
    pub fn new() -> Self {
        Engine {
            evaluator: None,
            memo: RefCell::new(HashMap::new()),
        }
    }

    /// Create an engine that evaluates `${@...}` snippets through the supplied evaluator.
    pub fn with_evaluator(evaluator: Rc<dyn IEvaluator>) -> Self {
        Engine {
            evaluator: Some(evaluator),
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn set_evaluator(&mut self, evaluator: Rc<dyn IEvaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub(crate) fn evaluator(&self) -> Option<&Rc<dyn IEvaluator>> {
        self.evaluator.as_ref()
    }

    /// The value factory: parse the named variable's raw value into a [Node], wrapped as a
    /// [ShellBlock](Node::ShellBlock) or [PythonBlock](Node::PythonBlock) when the `func` flag is
    /// set.  Returns `None` when the store has no such variable.
    ///
    /// Results are memoized per `(name, raw value, store identity)`: while none of the three
    /// change, repeated calls return the same shared tree.  A store mutation makes the old entry
    /// inert rather than invalid, so no eviction is ever needed.
    pub fn value_for(&self, name: &str, metadata: &dyn IMetadata) -> Option<Rc<Node>> {
        let raw = metadata.get(name)?;
        let key = (name.to_string(), raw.clone(), metadata.ident());
        if let Some(hit) = self.memo.borrow().get(&key) {
            return Some(hit.clone());
        }

        let parsed = match &raw {
            RawValue::Str(value) => parse(value),
            scalar => Node::Compound(vec![Node::Literal(scalar.as_text().into_owned())]),
        };
        let value = if flag_set(metadata, name, "func") {
            if flag_set(metadata, name, "python") {
                Node::PythonBlock(vec![parsed])
            } else {
                Node::ShellBlock(vec![parsed])
            }
        } else {
            parsed
        };

        let value = Rc::new(value);
        self.memo.borrow_mut().insert(key, value.clone());
        Some(value)
    }

    /// Resolve a value to its fully expanded string.
    pub fn resolve(
        &self,
        value: &Node,
        metadata: &dyn IMetadata,
    ) -> Result<String, ExpansionError> {
        Resolver::full(self, metadata).resolve(value)
    }

    /// Resolve with cross-referencing optionally disabled: with `cross_ref` false, variable
    /// references are not followed and render as `${name}` instead.
    pub fn resolve_with(
        &self,
        value: &Node,
        metadata: &dyn IMetadata,
        cross_ref: bool,
    ) -> Result<String, ExpansionError> {
        if cross_ref {
            Resolver::full(self, metadata).resolve(value)
        } else {
            Resolver::flat(self, metadata).resolve(value)
        }
    }

    /// Expand a variable by name.  `Ok(None)` when the store does not define it.
    pub fn expand(
        &self,
        name: &str,
        metadata: &dyn IMetadata,
    ) -> Result<Option<String>, ExpansionError> {
        match self.value_for(name, metadata) {
            Some(value) => Ok(Some(self.resolve(&value, metadata)?)),
            None => Ok(None),
        }
    }

    /// The set of metadata variables a value references, inferred statically.
    ///
    /// This stops at names: referred variables are reported but not entered.  Following the
    /// closure is the signature builder's job.
    pub fn references(
        &self,
        value: &Node,
        metadata: &dyn IMetadata,
    ) -> Result<BTreeSet<String>, TrackError> {
        let mut tracker = RefTracker::new(self, metadata);
        tracker.visit(value)?;
        Ok(tracker.into_references())
    }

    /// [references](Engine::references) of a named variable, augmented with the references its
    /// `dirs` and `varrefs` flags contribute.
    pub fn references_from_name(
        &self,
        name: &str,
        metadata: &dyn IMetadata,
    ) -> Result<BTreeSet<String>, TrackError> {
        let mut refs = match self.value_for(name, metadata) {
            Some(value) => self.references(&value, metadata)?,
            None => BTreeSet::new(),
        };
        refs.extend(crate::refs::flag_references(self, name, metadata)?);
        Ok(refs)
    }

    /// The set of external commands a value would execute, inferred from its shell code.
    pub fn execs(
        &self,
        value: &Node,
        metadata: &dyn IMetadata,
    ) -> Result<BTreeSet<String>, TrackError> {
        let mut tracker = RefTracker::new(self, metadata);
        tracker.visit(value)?;
        Ok(tracker.into_execs())
    }

    /// The set of python functions a value calls, inferred from its python code.  Qualified
    /// names are reported in dotted form.
    pub fn calls(
        &self,
        value: &Node,
        metadata: &dyn IMetadata,
    ) -> Result<BTreeSet<String>, TrackError> {
        let mut tracker = RefTracker::new(self, metadata);
        tracker.visit(value)?;
        Ok(tracker.into_calls())
    }

    /// Build the content signature for a seed set of variables.
    ///
    /// `keys` defaults to every variable flagged `task`; `deny` defaults to the glob patterns in
    /// the store's `BB_HASH_BLACKLIST` variable.  Variables whose value cannot be tracked are
    /// logged and left out of the signature rather than failing the whole build.
    pub fn signature(
        &self,
        metadata: &dyn IMetadata,
        keys: Option<&[&str]>,
        deny: Option<&[&str]>,
    ) -> Signature {
        Signature::build(self, metadata, keys, deny)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl<'a> Bindings<'a> {
    pub(crate) fn new(engine: &'a Engine, metadata: &'a dyn IMetadata) -> Self {
        Bindings { engine, metadata }
    }

    /// The whole store, conventionally bound as `d`.
    pub fn metadata(&self) -> &dyn IMetadata {
        self.metadata
    }

    /// Look a variable up by bare name, expanding it on first access.  Undefined variables and
    /// variables that fail to expand both miss.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.engine.expand(name, self.metadata) {
            Ok(value) => value,
            Err(error) => {
                log::debug!("binding lookup of '{}' failed: {}", name, error);
                None
            }
        }
    }
}

/// Closures taking `(code, bindings)` act as evaluators, which keeps simple hosts and tests free
/// of a dedicated type.
impl<F> IEvaluator for F
where
    F: Fn(&str, &Bindings<'_>) -> Result<String, Box<dyn std::error::Error>>,
{
    fn evaluate(
        &self,
        code: &str,
        bindings: &Bindings<'_>,
    ) -> Result<String, Box<dyn std::error::Error>> {
        self(code, bindings)
    }
}
