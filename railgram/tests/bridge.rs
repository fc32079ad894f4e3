use std::time::Duration;

use railgram::{
    ebnf::parse_grammar,
    render::{DiagramRepr, RenderError, RenderOptions, Rendered, Renderer, render_grammar},
};

fn repr_of(src: &str, name: &str) -> DiagramRepr {
    let grm = parse_grammar(src).unwrap();
    DiagramRepr::from(grm.get(name).unwrap())
}

#[test]
fn list_fixture() {
    let expected = DiagramRepr::from_ron_str(include_str!("fixtures/list.ron")).unwrap();
    assert_eq!(
        repr_of(
            "List ::= '(' (Number | String | List | Map | Vector)* ')'",
            "List"
        ),
        expected
    );
    // Alternatives written in a different order give the same bridge value.
    assert_eq!(
        repr_of(
            "List ::= '(' (Vector | Map | List | String | Number)* ')'",
            "List"
        ),
        expected
    );
}

#[test]
fn string_fixture() {
    let expected = DiagramRepr::from_ron_str(include_str!("fixtures/string.ron")).unwrap();
    assert_eq!(
        repr_of(
            "String ::= '\"' Anything* '\"' | \"'\" Anything* \"'\"",
            "String"
        ),
        expected
    );
    assert_eq!(
        expected.to_diagram_expr(),
        r#"Diagram(Choice(0, Sequence(Terminal("\""), ZeroOrMore(NonTerminal("Anything")), Terminal("\"")), Sequence(Terminal("'"), ZeroOrMore(NonTerminal("Anything")), Terminal("'"))))"#
    );
}

#[test]
fn ron_round_trip() {
    let repr = repr_of(
        "URL ::= [^#x5D:/?#]+ '://' [^#x5D#]+ ('#' NCName)?",
        "URL",
    );
    let s = repr.to_ron_string().unwrap();
    assert_eq!(DiagramRepr::from_ron_str(s).unwrap(), repr);
}

/// Pretends every diagram takes longer to draw than it is allowed to.
struct SlowRenderer;

impl Renderer for SlowRenderer {
    fn content_type(&self) -> &str {
        "image/svg+xml"
    }

    fn render(
        &self,
        _diagram: &DiagramRepr,
        options: &RenderOptions,
    ) -> Result<Rendered, RenderError> {
        Err(RenderError::Timeout(options.timeout()))
    }
}

#[test]
fn render_timeout() {
    let grm = parse_grammar("A ::= B").unwrap();
    let opts = RenderOptions::builder()
        .timeout(Duration::from_secs(1))
        .build();
    let e = render_grammar(&grm, &SlowRenderer, &opts).unwrap_err();
    assert_eq!(e, RenderError::Timeout(Duration::from_secs(1)));
    assert_eq!(e.to_string(), "Rendering timed out after 1s");
}
