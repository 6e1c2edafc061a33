use crate::parsing::parse;
use crate::{Bindings, Engine, ExpansionError, IMetadata, Node};

/// Tree-to-string visitor.
///
/// One resolver serves three callers through two switches: the public resolution path follows
/// references and evaluates snippets; reference tracking follows references but renders snippets
/// as their `${@code}` spelling so tracking stays side-effect free; and the non-cross-referencing
/// form renders references as `${name}` without touching the store.
pub(crate) struct Resolver<'a> {
    engine: &'a Engine,
    metadata: &'a dyn IMetadata,
    cross_ref: bool,
    evaluate: bool,
    /// Variable names currently being dereferenced, outermost first.  Scoped to one top-level
    /// resolve call; both the success and the error exits of a dereference pop their entry.
    path: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Full resolution: follow references, evaluate snippets.
    pub(crate) fn full(engine: &'a Engine, metadata: &'a dyn IMetadata) -> Self {
        Resolver {
            engine,
            metadata,
            cross_ref: true,
            evaluate: true,
            path: Vec::new(),
        }
    }

    /// Tracking resolution: follow references but keep snippets textual.
    pub(crate) fn tracking(engine: &'a Engine, metadata: &'a dyn IMetadata) -> Self {
        Resolver {
            engine,
            metadata,
            cross_ref: true,
            evaluate: false,
            path: Vec::new(),
        }
    }

    /// Non-cross-referencing resolution: references render as `${name}`.
    pub(crate) fn flat(engine: &'a Engine, metadata: &'a dyn IMetadata) -> Self {
        Resolver {
            engine,
            metadata,
            cross_ref: false,
            evaluate: true,
            path: Vec::new(),
        }
    }

    pub(crate) fn resolve(&mut self, value: &Node) -> Result<String, ExpansionError> {
        match value {
            Node::Literal(text) => Ok(text.clone()),
            Node::Compound(components)
            | Node::ShellBlock(components)
            | Node::PythonBlock(components) => self.concat(components),
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => {
                let mut resolved = self.concat(prepend)?;
                resolved.push_str(&self.concat(components)?);
                resolved.push_str(&self.concat(append)?);
                Ok(resolved)
            }
            Node::Conditional {
                condition,
                components,
            } => match condition {
                Some(applies) if !applies(self.metadata) => Ok(String::new()),
                _ => self.concat(components),
            },
            Node::VariableRef(components) => {
                let name = self.concat(components)?;
                self.cross_reference(&name)
            }
            Node::PythonSnippet(components) => {
                let code = self.concat(components)?;
                self.evaluate_snippet(code)
            }
        }
    }

    /// Resolve a component list to the concatenation of its resolutions, left to right.
    pub(crate) fn concat(&mut self, components: &[Node]) -> Result<String, ExpansionError> {
        let mut resolved = String::new();
        for component in components {
            resolved.push_str(&self.resolve(component)?);
        }
        Ok(resolved)
    }

    fn cross_reference(&mut self, name: &str) -> Result<String, ExpansionError> {
        if !self.cross_ref {
            return Ok(format!("${{{}}}", name));
        }
        if self.path.iter().any(|entry| entry == name) {
            return Err(ExpansionError::Recursion {
                variable: name.to_string(),
                path: self.path.clone(),
            });
        }
        let Some(referred) = self.engine.value_for(name, self.metadata) else {
            // undefined references are not an error; they stay verbatim
            return Ok(format!("${{{}}}", name));
        };
        self.path.push(name.to_string());
        let resolved = self.resolve(&referred);
        self.path.pop();
        resolved
    }

    fn evaluate_snippet(&mut self, code: String) -> Result<String, ExpansionError> {
        if !self.evaluate {
            return Ok(format!("${{@{}}}", code));
        }
        let Some(evaluator) = self.engine.evaluator() else {
            return Err(ExpansionError::NoEvaluator { code });
        };
        let bindings = Bindings::new(self.engine, self.metadata);
        match evaluator.evaluate(code.trim(), &bindings) {
            // the snippet's output is itself a metadata value
            Ok(output) => self.resolve(&parse(&output)),
            Err(cause) => Err(ExpansionError::PythonExpansion {
                code,
                path: self.path.clone(),
                cause,
            }),
        }
    }
}
