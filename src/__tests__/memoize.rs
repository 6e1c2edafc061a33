use crate::{Engine, MemMetadata};
use std::rc::Rc;

#[test]
fn repeated_lookups_share_one_tree() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("FOO", "bar");
    let engine = Engine::new();
    let first = engine.value_for("FOO", &metadata).unwrap();
    let second = engine.value_for("FOO", &metadata).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn distinct_stores_do_not_share() {
    let mut one = MemMetadata::new();
    let mut two = MemMetadata::new();
    one.set_var("FOO", "bar");
    two.set_var("FOO", "bar");
    let engine = Engine::new();
    let first = engine.value_for("FOO", &one).unwrap();
    let second = engine.value_for("FOO", &two).unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
}

#[test]
fn mutation_supersedes_the_cached_tree() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("foo", "value of foo");
    let engine = Engine::new();
    let value = engine.value_for("foo", &metadata).unwrap();
    assert_eq!(engine.resolve(&value, &metadata).unwrap(), "value of foo");

    metadata.set_var("foo", "second value of foo");
    let value = engine.value_for("foo", &metadata).unwrap();
    assert_eq!(
        engine.resolve(&value, &metadata).unwrap(),
        "second value of foo"
    );
}

#[test]
fn equal_raw_values_parse_to_equal_trees() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("foo", "value of");
    metadata.set_var("bar", "value of");
    let engine = Engine::new();
    let foo = engine.value_for("foo", &metadata).unwrap();
    let bar = engine.value_for("bar", &metadata).unwrap();
    assert_eq!(foo, bar);
    assert!(!Rc::ptr_eq(&foo, &bar));
}

#[test]
fn flags_select_the_wrapper_kind() {
    let mut metadata = MemMetadata::new();
    metadata.set_var("sh", "echo hi");
    metadata.set_flag("sh", "func", true);
    metadata.set_var("py", "return 1");
    metadata.set_flag("py", "func", true);
    metadata.set_flag("py", "python", true);
    metadata.set_var("plain", "echo hi");

    let engine = Engine::new();
    assert_eq!(
        engine.value_for("sh", &metadata).unwrap().kind_name(),
        "ShellBlock"
    );
    assert_eq!(
        engine.value_for("py", &metadata).unwrap().kind_name(),
        "PythonBlock"
    );
    assert_eq!(
        engine.value_for("plain", &metadata).unwrap().kind_name(),
        "Compound"
    );
    assert!(engine.value_for("missing", &metadata).is_none());
}
