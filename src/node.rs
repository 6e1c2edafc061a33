use crate::{Condition, Node};
use ptree::TreeItem;
use std::borrow::Cow;
use std::fmt::{Debug, Formatter};

impl Node {
    /// Create a literal component.
    pub fn literal(value: impl Into<String>) -> Node {
        Node::Literal(value.into())
    }

    /// Create an empty [LazyCompound](Node::LazyCompound) to be filled through [Node::append],
    /// [Node::lazy_prepend] and [Node::lazy_append].
    pub fn lazy() -> Node {
        Node::LazyCompound {
            prepend: Vec::new(),
            components: Vec::new(),
            append: Vec::new(),
        }
    }

    /// Create a [Conditional](Node::Conditional) value.  A `None` condition always applies.
    pub fn conditional(condition: Option<Condition>, components: Vec<Node>) -> Node {
        Node::Conditional {
            condition,
            components,
        }
    }

    /// Append a component, coalescing adjacent literals.
    ///
    /// Appending targets the main component list of any concatenating kind; appending to a
    /// [Literal](Node::Literal) is a programming error.
    pub fn append(&mut self, value: Node) {
        match self {
            Node::Literal(_) => panic!("cannot append to a literal value"),
            Node::Compound(components)
            | Node::VariableRef(components)
            | Node::PythonSnippet(components)
            | Node::ShellBlock(components)
            | Node::PythonBlock(components)
            | Node::LazyCompound { components, .. }
            | Node::Conditional { components, .. } => push_coalescing(components, value),
        }
    }

    /// Append every component in order, with the same coalescing as [Node::append].
    pub fn extend(&mut self, values: impl IntoIterator<Item = Node>) {
        for value in values {
            self.append(value);
        }
    }

    /// Queue a component to resolve *before* the main components of a
    /// [LazyCompound](Node::LazyCompound).  Successive prepends resolve in the order given.
    pub fn lazy_prepend(&mut self, value: Node) {
        match self {
            Node::LazyCompound { prepend, .. } => push_coalescing(prepend, value),
            _ => panic!("lazy_prepend on a non-lazy value"),
        }
    }

    /// Queue a component to resolve *after* the main components of a
    /// [LazyCompound](Node::LazyCompound).
    pub fn lazy_append(&mut self, value: Node) {
        match self {
            Node::LazyCompound { append, .. } => push_coalescing(append, value),
            _ => panic!("lazy_append on a non-lazy value"),
        }
    }

    /// Canonical name of the node kind, as rendered by [stable_repr](crate::stable_repr).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Literal(_) => "Literal",
            Node::Compound(_) => "Compound",
            Node::VariableRef(_) => "VariableRef",
            Node::PythonSnippet(_) => "PythonSnippet",
            Node::ShellBlock(_) => "ShellBlock",
            Node::PythonBlock(_) => "PythonBlock",
            Node::LazyCompound { .. } => "LazyCompound",
            Node::Conditional { .. } => "Conditional",
        }
    }

    /// The textual form of the value without consulting any store: references render as
    /// `${name}`, snippets as `${@code}`, conditionals as if they applied.
    pub fn text(&self) -> String {
        fn concat(components: &[Node]) -> String {
            components.iter().map(Node::text).collect()
        }
        match self {
            Node::Literal(value) => value.clone(),
            Node::Compound(components)
            | Node::ShellBlock(components)
            | Node::PythonBlock(components)
            | Node::Conditional { components, .. } => concat(components),
            Node::VariableRef(components) => format!("${{{}}}", concat(components)),
            Node::PythonSnippet(components) => format!("${{@{}}}", concat(components)),
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => format!("{}{}{}", concat(prepend), concat(components), concat(append)),
        }
    }

    /// Print the tree structure of the value to stdout.
    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

/// Push a component onto a list, merging it into the previous component when both are literals.
/// Keeps the invariant that no two adjacent components of a parsed value are literals.
pub(crate) fn push_coalescing(components: &mut Vec<Node>, value: Node) {
    if let (Some(Node::Literal(last)), Node::Literal(next)) = (components.last_mut(), &value) {
        last.push_str(next);
        return;
    }
    components.push(value);
}

/// Structural equality.  Conditions are compared by presence only: the predicate itself is
/// host-supplied code and contributes nothing to a value's identity or its stable repr.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Literal(a), Node::Literal(b)) => a == b,
            (Node::Compound(a), Node::Compound(b))
            | (Node::VariableRef(a), Node::VariableRef(b))
            | (Node::PythonSnippet(a), Node::PythonSnippet(b))
            | (Node::ShellBlock(a), Node::ShellBlock(b))
            | (Node::PythonBlock(a), Node::PythonBlock(b)) => a == b,
            (
                Node::LazyCompound {
                    prepend: ap,
                    components: ac,
                    append: aa,
                },
                Node::LazyCompound {
                    prepend: bp,
                    components: bc,
                    append: ba,
                },
            ) => ap == bp && ac == bc && aa == ba,
            (
                Node::Conditional {
                    condition: acond,
                    components: ac,
                },
                Node::Conditional {
                    condition: bcond,
                    components: bc,
                },
            ) => acond.is_some() == bcond.is_some() && ac == bc,
            _ => false,
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Node::Compound(components)
            | Node::VariableRef(components)
            | Node::PythonSnippet(components)
            | Node::ShellBlock(components)
            | Node::PythonBlock(components) => {
                f.debug_tuple(self.kind_name()).field(components).finish()
            }
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => f
                .debug_tuple("LazyCompound")
                .field(prepend)
                .field(components)
                .field(append)
                .finish(),
            Node::Conditional {
                condition,
                components,
            } => f
                .debug_struct("Conditional")
                .field("conditional", &condition.is_some())
                .field("components", components)
                .finish(),
        }
    }
}

impl TreeItem for Node {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match self {
            Node::Literal(value) => write!(f, "Literal({:?})", value),
            other => write!(f, "{}", other.kind_name()),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        match self {
            Node::Literal(_) => Cow::Borrowed(&[]),
            Node::Compound(components)
            | Node::VariableRef(components)
            | Node::PythonSnippet(components)
            | Node::ShellBlock(components)
            | Node::PythonBlock(components)
            | Node::Conditional { components, .. } => Cow::from(components),
            Node::LazyCompound {
                prepend,
                components,
                append,
            } => {
                let mut all = prepend.clone();
                all.extend(components.iter().cloned());
                all.extend(append.iter().cloned());
                Cow::from(all)
            }
        }
    }
}
