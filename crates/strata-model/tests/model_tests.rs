//! Tests for the code model: kernel, generics, properties, annotations,
//! copy, merge, and writing

use std::rc::Rc;
use strata_model::{
    CodeError, CodeModel, DescriptorRegistry, Expression, Layer, Literal, MergeStrategy, Modifiers,
    NodeId, Visibility,
};

const DESCRIPTORS: &str = r#"{
    "classes": [
        {
            "name": "java.lang.Enum",
            "package": "java.lang",
            "modifiers": { "visibility": "public", "keywords": ["abstract"] },
            "type_parameters": [{
                "name": "E",
                "bound": {
                    "kind": "parameterized",
                    "base": "java.lang.Enum",
                    "arguments": [{ "kind": "variable", "name": "E" }]
                }
            }]
        },
        {
            "name": "a.Base",
            "package": "a",
            "modifiers": { "visibility": "public" },
            "type_parameters": [{ "name": "T" }],
            "annotations": [{ "type_name": "a.Entity", "values": { "table": { "string": "bases" } } }],
            "fields": [{
                "name": "value",
                "type": { "kind": "variable", "name": "T" },
                "modifiers": { "visibility": "private" }
            }],
            "methods": [
                {
                    "name": "getValue",
                    "modifiers": { "visibility": "public" },
                    "returns": { "kind": "variable", "name": "T" },
                    "annotations": [{ "type_name": "a.Traced" }]
                },
                {
                    "name": "setValue",
                    "modifiers": { "visibility": "public" },
                    "parameters": [{ "type": { "kind": "variable", "name": "T" } }]
                }
            ]
        },
        {
            "name": "a.Leaf",
            "package": "a",
            "modifiers": { "visibility": "public" },
            "super_class": {
                "kind": "parameterized",
                "base": "a.Base",
                "arguments": [{ "kind": "class", "name": "java.lang.String" }]
            },
            "methods": [{
                "name": "getValue",
                "modifiers": { "visibility": "public" },
                "returns": { "kind": "class", "name": "java.lang.String" },
                "annotations": [{ "type_name": "java.lang.Override" }]
            }]
        }
    ]
}"#;

fn reflective_model() -> CodeModel {
    let registry = DescriptorRegistry::from_json(DESCRIPTORS).unwrap();
    CodeModel::new().with_reflective_loader(Rc::new(registry))
}

fn new_type(model: &mut CodeModel, package: &str, name: &str) -> NodeId {
    let package = model.get_or_create_package(Layer::Main, package).unwrap();
    let file = model.create_file(package, name).unwrap();
    model.add_type(file, name).unwrap()
}

fn annotation_names(model: &mut CodeModel, annotations: Vec<NodeId>) -> Vec<String> {
    annotations
        .into_iter()
        .map(|a| model.annotation_type_name(a).unwrap())
        .collect()
}

// ============================================================================
// Kernel Tests
// ============================================================================

#[test]
fn test_root_type_rejects_changes() {
    let mut model = CodeModel::new();
    let root = model.root_type().unwrap();
    assert!(model.is_system_immutable(root));
    assert!(matches!(model.add_field(root, "x"), Err(CodeError::ImmutableState { .. })));
}

#[test]
fn test_frozen_type_rejects_changes() {
    let mut model = reflective_model();
    let leaf = model.get_type("a.Leaf").unwrap().unwrap();
    model.set_immutable(leaf).unwrap();
    assert!(model.is_immutable(leaf));
    assert!(!model.is_system_immutable(leaf));

    let error = model.add_field(leaf, "extra").unwrap_err();
    assert!(error.is_immutable_state());
    let method = model.method(leaf, "getValue").unwrap().unwrap();
    assert!(model.set_modifiers(method, Modifiers::private()).is_err());
}

#[test]
fn test_reflective_types_are_registered_once() {
    let mut model = reflective_model();
    let first = model.get_type("a.Base").unwrap().unwrap();
    let second = model.get_type("a.Base").unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(model.qualified_name(first), "a.Base");
    assert_eq!(model.get_type("a.Missing").unwrap(), None);
}

#[test]
fn test_root_enumeration_type_uses_metadata() {
    let mut model = reflective_model();
    let loaded = model.get_type("java.lang.Enum").unwrap().unwrap();
    let enumeration = model.root_enumeration_type().unwrap();
    assert_eq!(enumeration, loaded);
    assert!(model.is_system_immutable(enumeration));
    assert_eq!(model.type_variables(enumeration).unwrap().len(), 1);
    assert!(model.add_field(enumeration, "ordinal").is_err());

    let throwable = model.root_exception_type().unwrap();
    assert_eq!(model.qualified_name(throwable), "java.lang.Throwable");
    let root = model.root_type().unwrap();
    assert_eq!(model.super_class(throwable).unwrap(), Some(root));
}

// ============================================================================
// Generic Resolution Tests
// ============================================================================

#[test]
fn test_resolve_field_type_in_subtype() {
    let mut model = reflective_model();
    let base = model.get_type("a.Base").unwrap().unwrap();
    let leaf = model.get_type("a.Leaf").unwrap().unwrap();
    let value = model.field(base, "value").unwrap().unwrap();
    let declared = model.field_type(value).unwrap().unwrap();
    assert_eq!(model.qualified_name(declared), "T");

    let resolved = model.resolve(declared, leaf).unwrap();
    assert_eq!(model.qualified_name(resolved), "java.lang.String");
    assert_eq!(model.resolve(declared, base).unwrap(), declared);
}

#[test]
fn test_self_referential_enum_bound() {
    let mut model = reflective_model();
    let enumeration = model.get_type("java.lang.Enum").unwrap().unwrap();
    let variables = model.type_variables(enumeration).unwrap();
    assert_eq!(variables.len(), 1);
    let e = variables[0];

    let bound = model.bound(e).unwrap().unwrap();
    assert_eq!(model.base_type(bound), Some(enumeration));
    assert_eq!(model.type_arguments(bound), vec![e]);
    assert_eq!(model.resolve_bound(e, enumeration).unwrap(), Some(bound));
    assert_eq!(model.erased_name(e).unwrap(), "java.lang.Enum");
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_reflective_properties() {
    let mut model = reflective_model();
    let base = model.get_type("a.Base").unwrap().unwrap();
    let value = model.property(base, "value").unwrap().unwrap();

    assert!(model.property_getter(value).unwrap().is_some());
    assert!(model.property_setter(value).unwrap().is_some());
    assert!(model.property_field(value).unwrap().is_some());
    assert!(model.is_readable(value, Visibility::Public).unwrap());
    assert!(model.is_writable(value, Visibility::Public).unwrap());

    let setter = model.method(base, "setValue").unwrap().unwrap();
    let parameters = model.parameters(setter).unwrap();
    assert_eq!(model.simple_name(parameters[0]), "arg0");
}

// ============================================================================
// Annotation Tests
// ============================================================================

#[test]
fn test_effective_annotations_follow_hierarchy() {
    let mut model = reflective_model();
    let leaf = model.get_type("a.Leaf").unwrap().unwrap();
    let base = model.get_type("a.Base").unwrap().unwrap();

    let entity = model.annotation_declared(base, "a.Entity").unwrap().unwrap();
    assert_eq!(
        model.annotation_parameter(entity, "table").unwrap(),
        Some(Expression::Literal(Literal::String("bases".into())))
    );

    let effective = model.effective_annotations(leaf).unwrap();
    assert_eq!(annotation_names(&mut model, effective), vec!["a.Entity"]);

    let method = model.method(leaf, "getValue").unwrap().unwrap();
    let effective = model.effective_annotations(method).unwrap();
    assert_eq!(
        annotation_names(&mut model, effective),
        vec!["java.lang.Override", "a.Traced"]
    );
}

#[test]
fn test_redeclared_annotation_hides_inherited_one() {
    let mut model = CodeModel::new();
    let parent = new_type(&mut model, "a", "Parent");
    let child = new_type(&mut model, "a", "Child");
    model.set_super_class(child, Some(parent)).unwrap();

    let inherited = model.add_annotation(parent, "a.Table").unwrap();
    model
        .set_annotation_parameter(inherited, "name", Some(Expression::string("parents")))
        .unwrap();
    model.add_annotation(parent, "a.Audited").unwrap();
    let own = model.add_annotation(child, "a.Table").unwrap();
    model
        .set_annotation_parameter(own, "name", Some(Expression::string("children")))
        .unwrap();

    let effective = model.effective_annotations(child).unwrap();
    assert!(effective.contains(&own));
    assert!(!effective.contains(&inherited));
    assert_eq!(annotation_names(&mut model, effective), vec!["a.Table", "a.Audited"]);
    assert_eq!(
        model.annotation_parameter(own, "name").unwrap(),
        Some(Expression::string("children"))
    );
}

// ============================================================================
// Copy Tests
// ============================================================================

#[test]
fn test_copy_type_rehomes_every_member() {
    let mut model = CodeModel::new();
    let int = model.primitive("int").unwrap();
    let person = new_type(&mut model, "a", "Person");
    let age = model.add_field(person, "age").unwrap();
    model.set_field_type(age, int).unwrap();
    model.add_field(person, "name").unwrap();
    let getter = model.add_method(person, "getAge").unwrap();
    model.set_return_type(getter, int).unwrap();
    let setter = model.add_method(person, "setAge").unwrap();
    model.add_parameter(setter, "age", int).unwrap();
    model.add_constructor(person).unwrap();
    model.add_nested_type(person, "Builder").unwrap();
    model.add_annotation(person, "a.Entity").unwrap();
    assert_eq!(model.properties(person).unwrap().len(), 2);

    let package = model.get_or_create_package(Layer::Main, "b").unwrap();
    let file = model.create_file(package, "Person").unwrap();
    let copy = model.copy(person, file).unwrap();
    assert_ne!(copy, person);
    assert_eq!(model.qualified_name(copy), "b.Person");
    assert_eq!(model.get_type("b.Person").unwrap(), Some(copy));

    let members: Vec<NodeId> = [
        model.fields(copy).unwrap(),
        model.methods(copy).unwrap(),
        model.constructors(copy).unwrap(),
        model.nested_types(copy).unwrap(),
    ]
    .concat();
    assert_eq!(members.len(), 6);
    for member in &members {
        assert_eq!(model.declaring_type(*member), Some(copy));
    }
    let copied_setter = model.method(copy, "setAge").unwrap().unwrap();
    for parameter in model.parameters(copied_setter).unwrap() {
        assert_eq!(model.parent(parameter), Some(copied_setter));
    }
    for property in model.properties(copy).unwrap() {
        assert_eq!(model.parent(property), Some(copy));
        for accessor in [model.property_getter(property).unwrap(), model.property_setter(property).unwrap()]
            .into_iter()
            .flatten()
        {
            assert_eq!(model.declaring_type(accessor), Some(copy));
        }
    }
    assert_eq!(model.annotations(copy).unwrap().len(), 1);
    assert_eq!(model.declaring_type(getter), Some(person));
    assert_eq!(model.fields(person).unwrap().len(), 2);
}

#[test]
fn test_copy_method_into_new_type() {
    let mut model = reflective_model();
    let base = model.get_type("a.Base").unwrap().unwrap();
    let getter = model.method(base, "getValue").unwrap().unwrap();
    let target = new_type(&mut model, "b", "Target");

    let copy = model.copy(getter, target).unwrap();
    assert_ne!(copy, getter);
    assert_eq!(model.declaring_type(copy), Some(target));
    assert_eq!(model.method(target, "getValue").unwrap(), Some(copy));
    assert!(model.node(copy).reflective_object().is_none());
    let copied = model.annotations(copy).unwrap();
    assert_eq!(annotation_names(&mut model, copied), vec!["a.Traced"]);

    model.set_modifiers(copy, Modifiers::private()).unwrap();
    assert_eq!(model.modifiers(getter).unwrap().visibility(), Visibility::Public);
    assert_eq!(model.methods(base).unwrap().len(), 2);
}

// ============================================================================
// Merge Tests
// ============================================================================

#[test]
fn test_override_merge_is_idempotent() {
    let mut model = CodeModel::new();
    let left = new_type(&mut model, "a", "Left");
    let right = new_type(&mut model, "a", "Right");
    model.add_field(left, "old").unwrap();
    model.add_field(right, "first").unwrap();
    model.add_field(right, "second").unwrap();

    model.merge(left, right, MergeStrategy::Override).unwrap();
    model.merge(left, right, MergeStrategy::Override).unwrap();
    let names: Vec<String> = model
        .fields(left)
        .unwrap()
        .into_iter()
        .map(|f| model.simple_name(f))
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn test_keep_merge_changes_nothing() {
    let mut model = CodeModel::new();
    let left = new_type(&mut model, "a", "Left");
    let right = new_type(&mut model, "a", "Right");
    model.add_field(left, "own").unwrap();
    model.add_field(right, "other").unwrap();
    model.add_annotation(right, "a.Marker").unwrap();

    model.merge(left, right, MergeStrategy::Keep).unwrap();
    assert_eq!(model.fields(left).unwrap().len(), 1);
    assert!(model.annotations(left).unwrap().is_empty());
}

#[test]
fn test_combine_rejects_parameter_mismatch() {
    let mut model = CodeModel::new();
    let ty = new_type(&mut model, "a", "A");
    let int = model.primitive("int").unwrap();
    let left = model.add_method(ty, "put").unwrap();
    model.add_parameter(left, "key", int).unwrap();
    let other = new_type(&mut model, "a", "B");
    let right = model.add_method(other, "put").unwrap();
    model.add_parameter(right, "key", int).unwrap();
    model.add_parameter(right, "value", int).unwrap();

    assert!(matches!(
        model.merge(left, right, MergeStrategy::Combine),
        Err(CodeError::UnsupportedMerge { .. })
    ));
}

// ============================================================================
// Writer Tests
// ============================================================================

#[test]
fn test_write_generic_class() {
    let mut model = CodeModel::new();
    let comparable = new_type(&mut model, "java.lang", "Comparable");
    let package = model.get_or_create_package(Layer::Main, "a").unwrap();
    let file = model.create_file(package, "Box").unwrap();
    let ty = model.add_type(file, "Box").unwrap();
    model.set_modifiers(ty, Modifiers::public()).unwrap();
    let t = model.add_type_variable(ty, "T").unwrap();
    let bound = model.parameterize(t, comparable, vec![t]).unwrap();
    model.set_bound(t, Some(bound)).unwrap();
    let item = model.add_field(ty, "item").unwrap();
    model.set_field_type(item, t).unwrap();
    model.set_modifiers(item, Modifiers::private()).unwrap();

    let text = model.write_to_string(file).unwrap();
    assert!(text.starts_with("package a;\n"));
    assert!(text.contains("public class Box<T extends Comparable<T>> {"));
    assert!(text.contains("private T item;"));
}
