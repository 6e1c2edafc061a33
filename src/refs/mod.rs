//! Static inference of what a value depends on: the metadata variables it references, the
//! external commands its shell code runs and the python functions its python code calls.
//!
//! Tracking stops at variable *names*; following the reference graph transitively is the
//! signature builder's business.  It is also deliberately side-effect free: snippets are never
//! evaluated here, only their code text is examined.

mod shell;

use crate::metadata::flag_set;
use crate::parsing::parse;
use crate::python::{calls_in, PyArg};
use crate::resolve::Resolver;
use crate::{Engine, IMetadata, Node, TrackError};
use shell::ShellScan;
use std::collections::BTreeSet;

/// The metadata getter/expander entry points recognized in embedded python code, matched
/// tail-first against the call's dotted name.
const GETVARS: [&str; 3] = ["d.getVar", "bb.data.getVar", "data.getVar"];
const EXPANDS: [&str; 3] = ["d.expand", "bb.data.expand", "data.expand"];
/// Executors whose string argument names a metadata function, which is a variable like any other.
const EXEC_FUNCS: [&str; 2] = ["bb.build.exec_func", "bb.build.exec_task"];

pub(crate) struct RefTracker<'a> {
    engine: &'a Engine,
    metadata: &'a dyn IMetadata,
    references: BTreeSet<String>,
    execs: BTreeSet<String>,
    calls: BTreeSet<String>,
}

impl<'a> RefTracker<'a> {
    pub(crate) fn new(engine: &'a Engine, metadata: &'a dyn IMetadata) -> Self {
        RefTracker {
            engine,
            metadata,
            references: BTreeSet::new(),
            execs: BTreeSet::new(),
            calls: BTreeSet::new(),
        }
    }

    pub(crate) fn into_references(self) -> BTreeSet<String> {
        self.references
    }

    pub(crate) fn into_execs(self) -> BTreeSet<String> {
        self.execs
    }

    pub(crate) fn into_calls(self) -> BTreeSet<String> {
        self.calls
    }

    pub(crate) fn visit(&mut self, value: &Node) -> Result<(), TrackError> {
        match value {
            Node::Literal(_) => Ok(()),
            Node::Compound(components) => self.visit_all(components),
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => {
                self.visit_all(prepend)?;
                self.visit_all(components)?;
                self.visit_all(append)
            }
            // entered whether or not the condition holds, so a flipped condition cannot
            // change which variables a signature covers
            Node::Conditional { components, .. } => self.visit_all(components),
            Node::VariableRef(components) => {
                self.visit_all(components)?;
                if let Some(name) = self.tracking_text(components, "variable reference name") {
                    self.references.insert(name);
                }
                Ok(())
            }
            Node::ShellBlock(components) => {
                self.visit_all(components)?;
                self.shell_block(components)
            }
            Node::PythonSnippet(components) | Node::PythonBlock(components) => {
                self.visit_all(components)?;
                self.python_code(components)
            }
        }
    }

    fn visit_all(&mut self, components: &[Node]) -> Result<(), TrackError> {
        for component in components {
            self.visit(component)?;
        }
        Ok(())
    }

    /// Resolve components for introspection: references are followed but snippets stay textual.
    /// A cycle here is logged and the contribution skipped rather than failing the whole walk.
    fn tracking_text(&self, components: &[Node], what: &str) -> Option<String> {
        match Resolver::tracking(self.engine, self.metadata).concat(components) {
            Ok(text) => Some(text),
            Err(error) => {
                log::debug!("skipping {}: {}", what, error);
                None
            }
        }
    }

    fn shell_block(&mut self, components: &[Node]) -> Result<(), TrackError> {
        let Some(text) = self.tracking_text(components, "shell block") else {
            return Ok(());
        };
        let mut scan = ShellScan::default();
        scan.script(&text)?;
        for exec in scan.execs.difference(&scan.funcdefs) {
            self.execs.insert(exec.clone());
        }

        // exported variables are visible to any shell code, and an executed name that is itself
        // a (shell) metadata function is a reference to that variable
        for var in self.metadata.keys() {
            if flag_set(self.metadata, &var, "export") {
                self.references.insert(var);
            } else if scan.execs.contains(&var)
                && !scan.funcdefs.contains(&var)
                && flag_set(self.metadata, &var, "func")
                && !flag_set(self.metadata, &var, "python")
            {
                self.references.insert(var);
            }
        }
        Ok(())
    }

    fn python_code(&mut self, components: &[Node]) -> Result<(), TrackError> {
        let Some(code) = self.tracking_text(components, "python code") else {
            return Ok(());
        };
        for call in calls_in(&code)? {
            if api_match(&GETVARS, &call.name) {
                match call.args.first() {
                    Some(PyArg::Str(name)) => {
                        self.references.insert(name.clone());
                    }
                    _ => non_literal_argument(&call.name),
                }
            } else if api_match(&EXPANDS, &call.name) {
                match call.args.first() {
                    Some(PyArg::Str(value)) => {
                        // the expanded string is a metadata value of its own
                        let mut sub = RefTracker::new(self.engine, self.metadata);
                        sub.visit(&parse(value))?;
                        self.references.extend(sub.references);
                    }
                    Some(PyArg::Call(inner)) if api_match(&GETVARS, inner) => {}
                    _ => non_literal_argument(&call.name),
                }
            } else if api_match(&EXEC_FUNCS, &call.name) {
                match call.args.first() {
                    Some(PyArg::Str(name)) => {
                        self.references.insert(name.clone());
                    }
                    _ => non_literal_argument(&call.name),
                }
            } else {
                self.calls.insert(call.name);
            }
        }
        Ok(())
    }
}

fn non_literal_argument(func: &str) {
    log::debug!("in call to '{}', the argument is not a literal", func);
}

fn api_match(patterns: &[&str], name: &str) -> bool {
    patterns.iter().any(|pattern| {
        name == *pattern
            || name
                .strip_suffix(pattern)
                .map_or(false, |head| head.ends_with('.'))
    })
}

/// References contributed by a named variable's flags: `dirs` is a value whose references count,
/// and `varrefs` is a whitespace separated list of glob patterns matched against every store key.
pub(crate) fn flag_references(
    engine: &Engine,
    name: &str,
    metadata: &dyn IMetadata,
) -> Result<BTreeSet<String>, TrackError> {
    let mut refs = BTreeSet::new();
    if let Some(dirs) = metadata.get_flag(name, "dirs") {
        let mut tracker = RefTracker::new(engine, metadata);
        tracker.visit(&parse(&dirs.as_text()))?;
        refs.extend(tracker.into_references());
    }
    if let Some(varrefs) = metadata.get_flag(name, "varrefs") {
        match engine.resolve(&parse(&varrefs.as_text()), metadata) {
            Ok(text) => {
                let patterns: Vec<glob::Pattern> = text
                    .split_whitespace()
                    .filter_map(|raw| match glob::Pattern::new(raw) {
                        Ok(pattern) => Some(pattern),
                        Err(error) => {
                            log::warn!(
                                "ignoring invalid varrefs pattern '{}' on {}: {}",
                                raw,
                                name,
                                error
                            );
                            None
                        }
                    })
                    .collect();
                for key in metadata.keys() {
                    if patterns.iter().any(|pattern| pattern.matches(&key)) {
                        refs.insert(key);
                    }
                }
            }
            Err(error) => log::warn!("unable to expand the varrefs of {}: {}", name, error),
        }
    }
    Ok(refs)
}
