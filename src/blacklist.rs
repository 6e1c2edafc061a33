use crate::resolve::Resolver;
use crate::{Engine, ExpansionError, IMetadata, Node};
use std::rc::Rc;

/// Rewrites a value tree so that nothing behind a denied variable name can leak into a
/// signature: a reference whose name matches the deny list folds to the literal marker
/// `${name}`, and any ancestor touched by such a replacement is tainted, which additionally
/// folds its inline snippets to their code text so they are never evaluated in a denied
/// context.
///
/// Reference names are computed with the non-cross-referencing resolver, so a name built by an
/// embedded snippet (`${${@'black'+'listed'+'var'}}`) is matched against the deny list in its
/// evaluated form while referred variables themselves stay unexpanded.  A name that fails to
/// resolve fails the transform; the signature builder drops that variable.
///
/// Untouched branches come back structurally identical; transforming an already transformed
/// tree is a no-op.
pub(crate) struct Blacklister<'a> {
    engine: &'a Engine,
    metadata: &'a dyn IMetadata,
    deny: &'a [glob::Pattern],
}

impl<'a> Blacklister<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        metadata: &'a dyn IMetadata,
        deny: &'a [glob::Pattern],
    ) -> Self {
        Blacklister {
            engine,
            metadata,
            deny,
        }
    }

    pub(crate) fn is_denied(&self, name: &str) -> bool {
        self.deny.iter().any(|pattern| pattern.matches(name))
    }

    /// Transform a shared value, preserving sharing when nothing changed.
    pub(crate) fn transform(&self, value: &Rc<Node>) -> Result<Rc<Node>, ExpansionError> {
        match self.fold(value)? {
            (Some(changed), _) => Ok(Rc::new(changed)),
            (None, _) => Ok(value.clone()),
        }
    }

    /// The name a reference resolves to without following it: snippets evaluate, nested
    /// references stay as `${name}` markers.
    fn reference_name(&self, components: &[Node]) -> Result<String, ExpansionError> {
        Resolver::flat(self.engine, self.metadata).concat(components)
    }

    /// Returns the replacement node (or `None` when unchanged) and whether the subtree is
    /// tainted by a denied reference.
    fn fold(&self, value: &Node) -> Result<(Option<Node>, bool), ExpansionError> {
        Ok(match value {
            Node::Literal(_) => (None, false),
            Node::VariableRef(components) => {
                let (_, tainted) = self.fold_list(components)?;
                let name = self.reference_name(components)?;
                if tainted || self.is_denied(&name) {
                    (Some(Node::Literal(format!("${{{}}}", name))), true)
                } else {
                    (None, false)
                }
            }
            Node::PythonSnippet(components) => {
                // a snippet over denied content degrades to its code text
                let (_, tainted) = self.fold_list(components)?;
                if tainted {
                    let code = list_text(components);
                    (Some(Node::Literal(code)), true)
                } else {
                    (None, false)
                }
            }
            Node::Compound(components) => self.fold_container(components, Node::Compound)?,
            Node::ShellBlock(components) => self.fold_container(components, Node::ShellBlock)?,
            Node::PythonBlock(components) => self.fold_container(components, Node::PythonBlock)?,
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => {
                let (new_prepend, taint_prepend) = self.fold_list(prepend)?;
                let (new_components, taint_components) = self.fold_list(components)?;
                let (new_append, taint_append) = self.fold_list(append)?;
                let tainted = taint_prepend || taint_components || taint_append;
                if !tainted {
                    return Ok((None, false));
                }
                (
                    Some(Node::LazyCompound {
                        prepend: fold_snippets(new_prepend),
                        components: fold_snippets(new_components),
                        append: fold_snippets(new_append),
                    }),
                    true,
                )
            }
            Node::Conditional {
                condition,
                components,
            } => {
                let (new_components, tainted) = self.fold_list(components)?;
                if !tainted {
                    return Ok((None, false));
                }
                (
                    Some(Node::Conditional {
                        condition: condition.clone(),
                        components: fold_snippets(new_components),
                    }),
                    true,
                )
            }
        })
    }

    fn fold_container(
        &self,
        components: &[Node],
        make: fn(Vec<Node>) -> Node,
    ) -> Result<(Option<Node>, bool), ExpansionError> {
        let (new_components, tainted) = self.fold_list(components)?;
        if !tainted {
            return Ok((None, false));
        }
        Ok((Some(make(fold_snippets(new_components))), true))
    }

    fn fold_list(&self, components: &[Node]) -> Result<(Vec<Node>, bool), ExpansionError> {
        let mut tainted = false;
        let mut folded = Vec::with_capacity(components.len());
        for component in components {
            match self.fold(component)? {
                (Some(changed), taint) => {
                    tainted |= taint;
                    folded.push(changed);
                }
                (None, taint) => {
                    tainted |= taint;
                    folded.push(component.clone());
                }
            }
        }
        Ok((folded, tainted))
    }
}

/// In a tainted container, surviving snippet children degrade to their code text as well; a
/// denied sibling means the value as a whole is no longer resolved, so the snippet must not be
/// either.
fn fold_snippets(components: Vec<Node>) -> Vec<Node> {
    components
        .into_iter()
        .map(|component| match component {
            Node::PythonSnippet(inner) => Node::Literal(list_text(&inner)),
            other => other,
        })
        .collect()
}

fn list_text(components: &[Node]) -> String {
    components.iter().map(Node::text).collect()
}
