use super::support;
use crate::{parse, parse_shell, Engine, ExpansionError, IMetadata, MemMetadata, Node};
use assert_matches::assert_matches;
use std::cell::RefCell;
use std::rc::Rc;

fn simple_store() -> MemMetadata {
    let mut metadata = MemMetadata::new();
    metadata.set_var("foo", "value of foo");
    metadata.set_var("bar", "value of bar");
    metadata.set_var("value of foo", "value of 'value of foo'");
    metadata
}

fn engine() -> Engine {
    Engine::with_evaluator(support::evaluator())
}

fn resolve(engine: &Engine, metadata: &MemMetadata, raw: &str) -> String {
    engine.resolve(&parse(raw), metadata).unwrap()
}

#[test]
fn one_var() {
    let metadata = simple_store();
    assert_eq!(resolve(&engine(), &metadata, "${foo}"), "value of foo");
}

#[test]
fn indirect_one_var() {
    let metadata = simple_store();
    assert_eq!(
        resolve(&engine(), &metadata, "${${foo}}"),
        "value of 'value of foo'"
    );
}

#[test]
fn indirect_and_another() {
    let metadata = simple_store();
    assert_eq!(
        resolve(&engine(), &metadata, "${${foo}} ${bar}"),
        "value of 'value of foo' value of bar"
    );
}

#[test]
fn python_snippet() {
    let metadata = simple_store();
    assert_eq!(resolve(&engine(), &metadata, "${@5*12}"), "60");
}

#[test]
fn expand_in_python_snippet() {
    let metadata = simple_store();
    assert_eq!(
        resolve(&engine(), &metadata, "${@'boo ' + '${foo}'}"),
        "boo value of foo"
    );
}

#[test]
fn python_snippet_getvar() {
    let metadata = simple_store();
    assert_eq!(
        resolve(&engine(), &metadata, "${@d.getVar('foo', True) + ' ${bar}'}"),
        "value of foo value of bar"
    );
}

#[test]
fn snippet_code_and_bindings_reach_the_evaluator() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("foo", "v");
    let observed = Rc::new(RefCell::new(Vec::new()));
    let log = observed.clone();
    let engine = Engine::with_evaluator(Rc::new(
        move |code: &str, bindings: &crate::Bindings<'_>| -> Result<String, Box<dyn std::error::Error>> {
            log.borrow_mut().push(code.to_string());
            assert_eq!(bindings.get("foo").as_deref(), Some("v"));
            assert!(bindings.metadata().get("foo").is_some());
            Ok("boo v".to_string())
        },
    ));
    assert_eq!(
        engine.resolve(&parse("${@'boo '+'${foo}'}"), &metadata).unwrap(),
        "boo v"
    );
    assert_eq!(observed.borrow().as_slice(), ["'boo '+'v'"]);
}

#[test]
fn python_snippet_syntax_error() {
    let metadata = simple_store();
    let result = engine().resolve(&parse("${@foo = 5}"), &metadata);
    assert_matches!(result, Err(ExpansionError::PythonExpansion { .. }));
}

#[test]
fn python_snippet_runtime_error() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "${@int('test')}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_matches!(
        engine.resolve(&value, &metadata),
        Err(ExpansionError::PythonExpansion { .. })
    );
}

#[test]
fn python_snippet_error_reports_the_path() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "foo value ${BAR}");
    metadata.set_var("BAR", "bar value ${@int('test')}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_matches!(
        engine.resolve(&value, &metadata),
        Err(ExpansionError::PythonExpansion { path, .. }) => {
            assert_eq!(path, vec!["BAR".to_string()]);
        }
    );
}

#[test]
fn snippet_without_evaluator_fails() {
    let metadata = simple_store();
    let engine = Engine::new();
    assert_matches!(
        engine.resolve(&parse("${@5}"), &metadata),
        Err(ExpansionError::NoEvaluator { code }) => {
            assert_eq!(code, "5");
        }
    );
}

#[test]
fn reference_undefined_var() {
    let metadata = simple_store();
    assert_eq!(
        resolve(&engine(), &metadata, "${undefinedvar} meh"),
        "${undefinedvar} meh"
    );
}

#[test]
fn double_reference() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("BAR", "bar value");
    metadata.set_var("FOO", "${BAR} foo ${BAR}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_eq!(
        engine.resolve(&value, &metadata).unwrap(),
        "bar value foo bar value"
    );
}

#[test]
fn direct_recursion() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "${FOO}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_matches!(
        engine.resolve(&value, &metadata),
        Err(ExpansionError::Recursion { variable, path }) => {
            assert_eq!(variable, "FOO");
            assert!(path.contains(&"FOO".to_string()));
        }
    );
}

#[test]
fn indirect_recursion() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "${BAR}");
    metadata.set_var("BAR", "${BAZ}");
    metadata.set_var("BAZ", "${FOO}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_matches!(
        engine.resolve(&value, &metadata),
        Err(ExpansionError::Recursion { variable, .. }) => {
            assert_eq!(variable, "FOO");
        }
    );
}

#[test]
fn recursion_through_a_snippet() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "${BAR}");
    metadata.set_var("BAR", "${${@'FOO'}}");
    let engine = engine();
    let value = engine.value_for("FOO", &metadata).unwrap();
    assert_matches!(
        engine.resolve(&value, &metadata),
        Err(ExpansionError::Recursion { variable, .. }) => {
            assert_eq!(variable, "FOO");
        }
    );
}

#[test]
fn incomplete_varexp_single_quotes() {
    let metadata = MemMetadata::new();
    let engine = Engine::new();
    let value = parse_shell("sed -i -e 's:IP{:I${:g' $pc");
    assert_eq!(
        engine.resolve(&value, &metadata).unwrap(),
        "sed -i -e 's:IP{:I${:g' $pc"
    );
}

#[test]
fn nonstring_value() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("TEST", 5i64);
    let engine = Engine::new();
    let value = engine.value_for("TEST", &metadata).unwrap();
    assert_eq!(engine.resolve(&value, &metadata).unwrap(), "5");
}

#[test]
fn no_cross_ref_keeps_reference_markers() {
    let metadata = simple_store();
    let engine = Engine::new();
    let value = parse("a ${foo} b");
    assert_eq!(
        engine.resolve_with(&value, &metadata, false).unwrap(),
        "a ${foo} b"
    );
}

mod nested {
    use super::*;

    fn nested_store() -> MemMetadata {
        let mut metadata = MemMetadata::new();
        metadata.set_var("foo", "foo");
        metadata.set_var("bar", "bar");
        metadata.set_var("value of foobar", "187");
        metadata
    }

    #[test]
    fn refs() {
        let metadata = nested_store();
        assert_eq!(
            resolve(&engine(), &metadata, "${value of ${foo}${bar}}"),
            "187"
        );
    }

    #[test]
    fn python_refs() {
        let metadata = nested_store();
        assert_eq!(resolve(&engine(), &metadata, "${@${@3}**2 + ${@4}**2}"), "25");
    }

    #[test]
    fn ref_in_python_ref() {
        let metadata = nested_store();
        assert_eq!(resolve(&engine(), &metadata, "${@'${foo}' + 'bar'}"), "foobar");
    }

    #[test]
    fn python_ref_in_ref() {
        let metadata = nested_store();
        assert_eq!(resolve(&engine(), &metadata, "${${@'f'+'o'+'o'}}"), "foo");
    }

    #[test]
    fn deep_nesting() {
        let metadata = nested_store();
        let depth = 100;
        let raw = format!("{}foo{}", "${".repeat(depth), "}".repeat(depth));
        assert_eq!(resolve(&engine(), &metadata, &raw), "foo");
    }

    #[test]
    fn deep_python_nesting() {
        let metadata = nested_store();
        let depth = 50;
        let raw = format!("{}1{}", "${@".repeat(depth), "+1}".repeat(depth));
        assert_eq!(resolve(&engine(), &metadata, &raw), (depth + 1).to_string());
    }

    #[test]
    fn runtime_name_construction() {
        let metadata = nested_store();
        assert_eq!(
            resolve(
                &engine(),
                &metadata,
                "${${@'value of' + ' f'+'o'+'o'+'b'+'a'+'r'}}"
            ),
            "187"
        );
    }

    #[test]
    fn snippet_reads_variables_as_locals() {
        let mut metadata = MemMetadata::new();
        metadata.set_var("foo", "bar");
        metadata.set_var("test", "${@foo + '/baz'}");
        let engine = engine();
        let value = engine.value_for("test", &metadata).unwrap();
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "bar/baz");
    }
}

mod lazy {
    use super::*;

    fn lazy_store() -> MemMetadata {
        let mut metadata = MemMetadata::new();
        metadata.set_var("FOO", "foo");
        metadata.set_var("VAL", "val");
        metadata.set_var("BAR", "bar");
        metadata
    }

    #[test]
    fn prepend() {
        let metadata = lazy_store();
        let engine = Engine::new();
        let mut value = Node::lazy();
        value.append(parse("${VAL}"));
        value.lazy_prepend(parse("${FOO}:"));
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "foo:val");
    }

    #[test]
    fn append() {
        let metadata = lazy_store();
        let engine = Engine::new();
        let mut value = Node::lazy();
        value.append(parse("${VAL}"));
        value.lazy_append(parse(":${BAR}"));
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "val:bar");
    }

    #[test]
    fn normal_append_stays_in_the_middle() {
        let metadata = lazy_store();
        let engine = Engine::new();
        let mut value = Node::lazy();
        value.append(parse("${VAL}"));
        value.lazy_prepend(parse("${FOO}:"));
        value.lazy_append(parse(":${BAR}"));
        value.append(parse(":val2"));
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "foo:val:val2:bar");
    }
}

mod conditional {
    use super::*;
    use crate::Condition;

    fn overrides_store() -> MemMetadata {
        let mut metadata = MemMetadata::new();
        metadata.set_var("OVERRIDES", "foo:bar:local");
        metadata.set_var("TEST", "testvalue");
        metadata
    }

    fn foo_in_overrides() -> Condition {
        Rc::new(|metadata: &dyn IMetadata| {
            metadata
                .get("OVERRIDES")
                .map_or(false, |overrides| {
                    overrides.as_text().split(':').any(|item| item == "foo")
                })
        })
    }

    #[test]
    fn no_condition() {
        let metadata = overrides_store();
        let engine = Engine::new();
        let value = Node::conditional(None, vec![parse("${TEST}")]);
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "testvalue");
    }

    #[test]
    fn true_condition() {
        let metadata = overrides_store();
        let engine = Engine::new();
        let value = Node::conditional(Some(foo_in_overrides()), vec![parse("${TEST}")]);
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "testvalue");
    }

    #[test]
    fn false_condition() {
        let mut metadata = overrides_store();
        metadata.set_var("OVERRIDES", "bar:local");
        let engine = Engine::new();
        let value = Node::conditional(Some(foo_in_overrides()), vec![parse("${TEST}")]);
        assert_eq!(engine.resolve(&value, &metadata).unwrap(), "");
    }
}

mod properties {
    use super::*;

    #[test]
    fn parse_resolve_identity_without_markers() {
        let metadata = MemMetadata::new();
        let engine = Engine::new();
        for raw in ["", "plain", "a } b", "half { open", "tabs\tand\nnewlines"] {
            assert_eq!(engine.resolve(&parse(raw), &metadata).unwrap(), raw);
        }
    }

    #[test]
    fn unbalanced_openers_resolve_verbatim() {
        let metadata = MemMetadata::new();
        let engine = Engine::new();
        for raw in ["${", "${@", "a ${ b", "${x", "${@x", "s:IP{:I${:g", "${a${b"] {
            assert_eq!(engine.resolve(&parse(raw), &metadata).unwrap(), raw);
        }
    }
}
