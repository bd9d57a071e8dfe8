//! Tests for loading source units into the model: directory and in-memory
//! loaders, source merges, and recovered syntax problems

use std::fs;
use std::rc::Rc;
use strata_model::{
    CodeError, CodeModel, CollectingSink, DescriptorRegistry, DiagnosticCode, Layer, SourceLoader,
    TypeCategory,
};
use strata_parser::{render_diagnostics, DirectorySourceLoader, InMemorySourceLoader};

const PERSON: &str = r#"package com.example;

import java.util.List;

/**
 * Somebody with a name.
 */
public class Person extends Base {
    private String name;
    private List<Person> friends;

    public String getName() {
        return name;
    }

    public void setName(String name) {
        this.name = name;
    }
}
"#;

const BASE: &str = r#"package com.example;

public abstract class Base {
    protected long id;
}
"#;

fn names(model: &CodeModel, ids: &[strata_model::NodeId]) -> Vec<String> {
    ids.iter().map(|id| model.simple_name(*id)).collect()
}

// ============================================================================
// Directory Loader Tests
// ============================================================================

#[test]
fn test_directory_loader_backs_main_types() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("com").join("example");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("Person.java"), PERSON).unwrap();
    fs::write(package.join("Base.java"), BASE).unwrap();

    let loader = DirectorySourceLoader::new(dir.path());
    assert!(loader.has_type("com.example.Person"));
    assert!(!loader.has_type("com.example.Missing"));

    let mut model = CodeModel::new().with_source_loader(Rc::new(loader));
    let person = model.get_type("com.example.Person").unwrap().unwrap();
    assert_eq!(model.layer(person), Layer::Main);

    let fields = model.fields(person).unwrap();
    assert_eq!(names(&model, &fields), vec!["name", "friends"]);
    assert_eq!(model.doc(person).unwrap(), vec!["Somebody with a name."]);

    let base = model.super_class(person).unwrap().unwrap();
    assert_eq!(model.layer(base), Layer::Main);
    assert_eq!(model.qualified_name(base), "com.example.Base");
    assert_eq!(model.category(base).unwrap(), TypeCategory::Class);
    assert!(model.modifiers(base).unwrap().is_abstract());
}

#[test]
fn test_directory_loader_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = CodeModel::new().with_source_loader(Rc::new(DirectorySourceLoader::new(dir.path())));
    assert_eq!(model.get_type("com.example.Person").unwrap(), None);
    assert!(!model.is_type_known("com.example.Person"));
}

// ============================================================================
// Source Merge Tests
// ============================================================================

#[test]
fn test_properties_from_source() {
    let loader = InMemorySourceLoader::new()
        .with_unit("com.example.Person", PERSON)
        .with_unit("com.example.Base", BASE);
    let mut model = CodeModel::new().with_source_loader(Rc::new(loader));
    let person = model.get_type("com.example.Person").unwrap().unwrap();

    let name = model.property(person, "name").unwrap().unwrap();
    assert!(model.property_getter(name).unwrap().is_some());
    assert!(model.property_setter(name).unwrap().is_some());
    assert!(model.property_field(name).unwrap().is_some());

    let setter = model.method(person, "setName").unwrap().unwrap();
    assert_eq!(model.signature(setter).unwrap(), "setName(java.lang.String)");
}

#[test]
fn test_write_loaded_type() {
    let loader = InMemorySourceLoader::new()
        .with_unit("com.example.Person", PERSON)
        .with_unit("com.example.Base", BASE);
    let mut model = CodeModel::new().with_source_loader(Rc::new(loader));
    let person = model.get_type("com.example.Person").unwrap().unwrap();
    model.initialize_deep(person).unwrap();

    let file = model.file_of(person).unwrap();
    let text = model.write_to_string(file).unwrap();
    assert!(text.starts_with("package com.example;\n"));
    assert!(text.contains("public class Person extends Base {"));
    assert!(text.contains("private String name;"));
    assert!(text.contains("public String getName() {"));
    assert!(text.contains("return name;"));
}

#[test]
fn test_nested_and_secondary_types() {
    let source = r#"package a;

public class Outer {
    private Helper helper;

    public static class Inner {
        int value;
    }
}

class Helper {
}
"#;
    let loader = InMemorySourceLoader::new().with_unit("a.Outer", source);
    let mut model = CodeModel::new().with_source_loader(Rc::new(loader));

    let inner = model.get_type("a.Outer.Inner").unwrap().unwrap();
    assert_eq!(model.layer(inner), Layer::Main);
    let fields = model.fields(inner).unwrap();
    assert_eq!(names(&model, &fields), vec!["value"]);

    let outer = model.get_type("a.Outer").unwrap().unwrap();
    let helper = model.field(outer, "helper").unwrap().unwrap();
    let helper_type = model.field_type(helper).unwrap().unwrap();
    assert_eq!(model.layer(helper_type), Layer::Main);
    assert_eq!(model.qualified_name(helper_type), "a.Helper");
}

#[test]
fn test_source_names_replace_synthetic_parameters() {
    let registry = DescriptorRegistry::from_json(
        r#"{
            "classes": [{
                "name": "com.example.Greeter",
                "package": "com.example",
                "modifiers": { "visibility": "public" },
                "methods": [{
                    "name": "greet",
                    "modifiers": { "visibility": "public" },
                    "parameters": [{ "type": { "kind": "class", "name": "java.lang.String" } }],
                    "returns": { "kind": "class", "name": "java.lang.String" }
                }]
            }]
        }"#,
    )
    .unwrap();
    let source = r#"package com.example;

public class Greeter {
    /** Says hello. */
    public String greet(final String who) {
        return "Hello " + who;
    }
}
"#;
    let loader = InMemorySourceLoader::new().with_unit("com.example.Greeter", source);
    let mut model = CodeModel::new()
        .with_reflective_loader(Rc::new(registry))
        .with_source_loader(Rc::new(loader));

    let greeter = model.get_type("com.example.Greeter").unwrap().unwrap();
    let methods = model.methods(greeter).unwrap();
    assert_eq!(methods.len(), 1);
    let greet = methods[0];

    let parameters = model.parameters(greet).unwrap();
    assert_eq!(names(&model, &parameters), vec!["who"]);
    assert!(model.doc(greet).unwrap().iter().any(|line| line.contains("Says hello.")));
    assert!(model.body(greet).unwrap().is_some_and(|body| !body.is_empty()));
}

// ============================================================================
// Error and Diagnostic Tests
// ============================================================================

#[test]
fn test_syntax_error_surfaces_on_initialization() {
    let loader = InMemorySourceLoader::new().with_unit("a.Broken", "package a; public class Broken { int x;");
    let mut model = CodeModel::new().with_source_loader(Rc::new(loader));
    let broken = model.get_type("a.Broken").unwrap().unwrap();

    match model.fields(broken) {
        Err(CodeError::Source { name, .. }) => assert_eq!(name, "a.Broken"),
        other => panic!("expected a source error, got {:?}", other),
    }
}

#[test]
fn test_malformed_annotations_are_warnings() {
    let source = r#"package a;

@Config(1, 2)
public public class Odd {
    @Named(value = "x", value = "y")
    int field;
}
"#;
    let sink = Rc::new(CollectingSink::new());
    let loader = InMemorySourceLoader::new().with_unit("a.Odd", source);
    let mut model = CodeModel::new()
        .with_source_loader(Rc::new(loader))
        .with_diagnostics(sink.clone());

    let odd = model.get_type("a.Odd").unwrap().unwrap();
    let fields = model.fields(odd).unwrap();
    assert_eq!(names(&model, &fields), vec!["field"]);
    assert_eq!(model.annotations(odd).unwrap().len(), 1);

    assert!(sink.count(DiagnosticCode::MalformedInput) >= 3);
    assert!(!sink.is_clean());

    let warnings: Vec<_> = sink
        .diagnostics()
        .into_iter()
        .filter(|d| d.code == DiagnosticCode::MalformedInput)
        .collect();
    assert!(warnings.iter().all(|d| d.location.is_some()));
    let text = render_diagnostics(&warnings, "Odd.java", source).unwrap();
    assert!(text.contains("warning[S001]"));
    assert!(text.contains("Odd.java:"));
}
