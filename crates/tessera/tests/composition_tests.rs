//! Integration tests for include, extends and block composition.

use pretty_assertions::assert_eq;
use serde_json::json;
use tessera::{Tessera, TesseraError, Value};

// ============================================================================
// include
// ============================================================================

#[test]
fn include_registered_template() {
    let mut tmpl = Tessera::parse("{{ include header }} Its {{.time}}.").unwrap();
    tmpl.add_template("header", "Hello {{.name}}!").unwrap();
    let result = tmpl
        .render(json!({"name": "Patrick", "time": "10:00"}))
        .unwrap();
    assert_eq!(result, "Hello Patrick! Its 10:00.");
}

#[test]
fn include_name_ignores_case() {
    let mut tmpl = Tessera::parse("[{{ include Header }}]").unwrap();
    tmpl.add_template("HEADER", "h").unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "[h]");
}

#[test]
fn include_missing_renders_nothing() {
    let mut tmpl = Tessera::parse("a{{ include nowhere }}b").unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "ab");
    assert_eq!(tmpl.context().pending_templates(), vec!["nowhere"]);
}

#[test]
fn include_sees_loop_bindings() {
    let mut tmpl = Tessera::parse("{{ foreach(p in .people) }}{{ include row }}{{ end }}").unwrap();
    tmpl.add_template("row", "<{{ .p }}>").unwrap();
    let result = tmpl.render(json!({"people": ["a", "b"]})).unwrap();
    assert_eq!(result, "<a><b>");
}

#[test]
fn nested_includes() {
    let mut tmpl = Tessera::parse("{{ include page }}").unwrap();
    tmpl.add_template("page", "[{{ include body }}]").unwrap();
    tmpl.add_template("body", "{{ .text }}").unwrap();
    assert_eq!(tmpl.render(json!({"text": "hi"})).unwrap(), "[hi]");
}

#[test]
fn repeated_include_is_not_circular() {
    let mut tmpl = Tessera::parse("{{ include dot }}{{ include dot }}{{ include dot }}").unwrap();
    tmpl.add_template("dot", ".").unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "...");
}

#[test]
fn circular_include_is_an_error() {
    let mut tmpl = Tessera::parse("{{ include a }}").unwrap();
    tmpl.add_template("a", "{{ include b }}").unwrap();
    tmpl.add_template("b", "{{ include A }}").unwrap();
    let err = tmpl.render(Value::Null).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        TesseraError::CircularReference { name } if name == "A"
    ));
}

#[test]
fn errors_in_included_template_carry_its_name() {
    let mut tmpl = Tessera::parse("{{ include broken }}").unwrap();
    tmpl.add_template("broken", "{{ nope() }}").unwrap();
    let err = tmpl.render(Value::Null).unwrap_err();
    assert_eq!(err.to_string(), "Error at broken: Invalid function: nope");
    assert!(matches!(err.root_cause(), TesseraError::UnknownFunction { .. }));
}

// ============================================================================
// extends / block
// ============================================================================

#[test]
fn extends_overrides_block() {
    let mut tmpl = Tessera::parse("{{ extends main }} {{ block name }}Bill{{ end }} ").unwrap();
    tmpl.add_template("main", "Hello {{ block name }}{{ end }}!").unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "Hello Bill!");
}

#[test]
fn extends_with_two_blocks_and_model() {
    let mut tmpl = Tessera::parse(
        "{{ extends main }} {{ block name }}Bill{{ end }}  {{ block lastname }}{{ .last }}{{ end }}",
    )
    .unwrap();
    tmpl.add_template("main", "Hello {{ block name }}{{ end }} {{ block lastName }}{{ end }}!")
        .unwrap();
    let result = tmpl.render(json!({"last": "Smith"})).unwrap();
    assert_eq!(result, "Hello Bill Smith!");
}

#[test]
fn unoverridden_block_renders_empty() {
    let mut tmpl = Tessera::parse("{{ extends main }}{{ block title }}T{{ end }}").unwrap();
    tmpl.add_template("main", "<{{ block title }}{{ end }}|{{ block footer }}default{{ end }}>")
        .unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "<T|>");
}

#[test]
fn base_template_can_include() {
    let mut tmpl = Tessera::parse("{{ extends layout }}{{ block body }}B{{ end }}").unwrap();
    tmpl.add_template("layout", "{{ include nav }}|{{ block body }}{{ end }}")
        .unwrap();
    tmpl.add_template("nav", "N").unwrap();
    assert_eq!(tmpl.render(Value::Null).unwrap(), "N|B");
}

#[test]
fn block_body_can_loop() {
    let mut tmpl = Tessera::parse(
        "{{ extends main }}{{ block items }}{{ foreach(x in .xs) }}[{{ .x }}]{{ end }}{{ end }}",
    )
    .unwrap();
    tmpl.add_template("main", "Items: {{ block items }}{{ end }}").unwrap();
    assert_eq!(tmpl.render(json!({"xs": [1, 2]})).unwrap(), "Items: [1][2]");
}

#[test]
fn extends_declares_base_as_pending() {
    let tmpl = Tessera::parse("{{ extends main }}{{ block a }}{{ end }}").unwrap();
    assert_eq!(tmpl.template().base(), Some("main"));
    assert_eq!(tmpl.context().pending_templates(), vec!["main"]);
}

#[test]
fn missing_base_template() {
    let mut tmpl = Tessera::parse("{{ extends main }}{{ block a }}x{{ end }}").unwrap();
    let err = tmpl.render(Value::Null).unwrap_err();
    assert!(matches!(err, TesseraError::BaseTemplateNotFound { name } if name == "main"));
}

#[test]
fn rendering_twice_gives_the_same_output() {
    let mut tmpl = Tessera::parse("{{ extends main }}{{ block name }}{{ .n }}{{ end }}").unwrap();
    tmpl.add_template("main", "Hi {{ block name }}{{ end }}").unwrap();
    assert_eq!(tmpl.render(json!({"n": "a"})).unwrap(), "Hi a");
    assert_eq!(tmpl.render(json!({"n": "b"})).unwrap(), "Hi b");
}

// ============================================================================
// Nested templates as model values
// ============================================================================

#[test]
fn template_value_renders_in_place() {
    let card = tessera_ast::parse("<{{ .title }}>").unwrap();
    let model: Value = vec![("title", Value::from("T")), ("card", Value::from(card))]
        .into_iter()
        .collect();
    let mut tmpl = Tessera::parse("{{ .card }}!").unwrap();
    assert_eq!(tmpl.render(model).unwrap(), "<T>!");
}
