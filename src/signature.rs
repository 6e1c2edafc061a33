use crate::blacklist::Blacklister;
use crate::metadata::flag_set;
use crate::refs::flag_references;
use crate::{Engine, IMetadata, Node, Signature, TrackError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use md5::{Digest, Md5};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Canonical rendering of a value tree: a pure function of the tree's structure, so equal trees
/// render byte-identically no matter how they were produced.  This is the form signatures hash.
pub fn stable_repr(value: &Node) -> String {
    match value {
        Node::Literal(text) => format!("Literal('{}')", text),
        Node::Compound(c)
        | Node::VariableRef(c)
        | Node::PythonSnippet(c)
        | Node::ShellBlock(c)
        | Node::PythonBlock(c) => format!("{}({})", value.kind_name(), list_repr(c)),
        Node::LazyCompound {
            prepend,
            components,
            append,
        } => format!(
            "LazyCompound({}, {}, {})",
            list_repr(prepend),
            list_repr(components),
            list_repr(append)
        ),
        Node::Conditional { components, .. } => format!("Conditional({})", list_repr(components)),
    }
}

fn list_repr(components: &[Node]) -> String {
    let rendered: Vec<String> = components.iter().map(stable_repr).collect();
    format!("[{}]", rendered.join(", "))
}

/// Canonical rendering of a name set, sorted.
pub(crate) fn set_repr(items: &BTreeSet<String>) -> String {
    let rendered: Vec<String> = items.iter().map(|item| format!("'{}'", item)).collect();
    format!("Set([{}])", rendered.join(", "))
}

/// Canonical rendering of the dependency mapping, with entries ordered by key.
fn map_repr(data: &BTreeMap<String, Rc<Node>>) -> String {
    let rendered: Vec<String> = data
        .iter()
        .map(|(key, value)| format!("'{}': {}", key, stable_repr(value)))
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

impl Signature {
    pub(crate) fn build(
        engine: &Engine,
        metadata: &dyn IMetadata,
        keys: Option<&[&str]>,
        deny: Option<&[&str]>,
    ) -> Signature {
        let keys: Vec<String> = match keys {
            Some(keys) => keys.iter().map(|key| key.to_string()).collect(),
            None => metadata
                .keys()
                .into_iter()
                .filter(|key| flag_set(metadata, key, "task"))
                .collect(),
        };
        let deny_globs: Vec<String> = match deny {
            Some(globs) => globs.iter().map(|glob| glob.to_string()).collect(),
            None => match engine.expand("BB_HASH_BLACKLIST", metadata) {
                Ok(Some(text)) => text.split_whitespace().map(str::to_string).collect(),
                Ok(None) => Vec::new(),
                Err(error) => {
                    log::warn!("unable to expand BB_HASH_BLACKLIST: {}", error);
                    Vec::new()
                }
            },
        };
        let deny: Vec<glob::Pattern> = deny_globs
            .iter()
            .filter_map(|raw| match glob::Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(error) => {
                    log::warn!("ignoring invalid deny pattern '{}': {}", raw, error);
                    None
                }
            })
            .collect();
        let blacklister = Blacklister::new(engine, metadata, &deny);

        let mut seen = BTreeSet::new();
        let mut data = BTreeMap::new();
        for key in &keys {
            collect(engine, metadata, &blacklister, key, &mut seen, &mut data);
        }

        let data_string = map_repr(&data);
        let digest = Md5::digest(data_string.as_bytes()).into();
        Signature {
            data,
            data_string,
            digest,
        }
    }

    /// The 128-bit digest of [data_string](Signature::data_string).
    pub fn digest(&self) -> &[u8; 16] {
        &self.digest
    }

    /// The digest as an integer, for hosts that key caches numerically.
    pub fn hash_value(&self) -> u128 {
        u128::from_be_bytes(self.digest)
    }

    /// The human-facing form: URL-safe base64 of the digest with the padding stripped.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.digest)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Depth-first walk of the reference graph.  Traversal order does not matter for the result;
/// the rendering is canonical.  A variable that cannot be tracked is logged and excluded, and a
/// denied or undefined variable is simply skipped.
fn collect(
    engine: &Engine,
    metadata: &dyn IMetadata,
    blacklister: &Blacklister<'_>,
    key: &str,
    seen: &mut BTreeSet<String>,
    data: &mut BTreeMap<String, Rc<Node>>,
) {
    if !seen.insert(key.to_string()) {
        return;
    }
    if blacklister.is_denied(key) {
        return;
    }
    let Some(value) = engine.value_for(key, metadata) else {
        return;
    };

    let tracked = blacklister
        .transform(&value)
        .map_err(TrackError::from)
        .and_then(|value| {
            let mut refs = engine.references(&value, metadata)?;
            refs.extend(flag_references(engine, key, metadata)?);
            Ok((value, refs))
        });
    match tracked {
        Ok((value, refs)) => {
            log::debug!("{} references {}", key, set_repr(&refs));
            data.insert(key.to_string(), value);
            for reference in refs {
                collect(engine, metadata, blacklister, &reference, seen, data);
            }
        }
        Err(error) => {
            log::error!(
                "unable to track {}, excluding it from the signature: {}",
                key,
                error
            );
        }
    }
}
