use crate::node::push_coalescing;
use crate::tokenization::{Token, Tokenizer};
use crate::Node;

/// Parse a metadata value into its [Node] tree.
///
/// Parsing never fails.  A `}` with no opener stays a literal, and an opener that never closes is
/// re-emitted as literal text followed by whatever was speculatively parsed after it, so any input
/// string resolves back to itself as long as it references nothing.
pub fn parse(raw: &str) -> Node {
    if !raw.contains("${") {
        return Node::Compound(vec![Node::Literal(raw.to_string())]);
    }

    let mut toker = Tokenizer::new(raw);
    match parse_nested(&mut toker, false) {
        Parsed::Ended(components) | Parsed::Closed(components) => Node::Compound(components),
    }
}

/// Parse a shell function body: the value parse wrapped as a [ShellBlock](Node::ShellBlock).
pub fn parse_shell(raw: &str) -> Node {
    Node::ShellBlock(vec![parse(raw)])
}

/// Parse a python function body: the value parse wrapped as a [PythonBlock](Node::PythonBlock).
pub fn parse_python(raw: &str) -> Node {
    Node::PythonBlock(vec![parse(raw)])
}

enum Parsed {
    /// The frame's closer was seen; it is left for the caller to consume.
    Closed(Vec<Node>),
    /// The tokens ran out first.  The components parsed so far are handed back so the caller can
    /// demote the opener to a literal in front of them.
    Ended(Vec<Node>),
}

fn parse_nested(toker: &mut Tokenizer<'_>, in_frame: bool) -> Parsed {
    let mut components: Vec<Node> = Vec::new();
    while let Some(token) = toker.current() {
        match token {
            Token::Open | Token::OpenPython => {
                toker.advance();
                match parse_nested(toker, true) {
                    Parsed::Closed(children) => {
                        let node = match token {
                            Token::OpenPython => Node::PythonSnippet(children),
                            _ => Node::VariableRef(children),
                        };
                        push_coalescing(&mut components, node);
                        // the closer is still current and consumed below
                    }
                    Parsed::Ended(children) => {
                        push_coalescing(&mut components, Node::Literal(token.marker().to_string()));
                        for child in children {
                            push_coalescing(&mut components, child);
                        }
                        // out of tokens; the advance below is a no-op
                    }
                }
            }
            Token::Close if in_frame => return Parsed::Closed(components),
            Token::Close => push_coalescing(&mut components, Node::Literal("}".to_string())),
            Token::Text(text) => push_coalescing(&mut components, Node::Literal(text.to_string())),
        }
        toker.advance();
    }
    Parsed::Ended(components)
}
