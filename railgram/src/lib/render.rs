//! The boundary between canonical diagram trees and whatever draws them.
//!
//! A [`Node`] is converted into a [`DiagramRepr`], which can be serialised (e.g. to RON) or
//! printed as an expression for the railroad-diagrams JavaScript library. Drawing itself is the
//! job of a [`Renderer`]: none is provided here.

use std::{error::Error, fmt, time::Duration};

use log::debug;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::ebnf::{Grammar, Node};

/// How long a renderer may take for one diagram unless told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A serialisable mirror of [`Node`]. Choice members are listed in the canonical order of the
/// [`Node::Choice`] set, so equal nodes always convert to equal `DiagramRepr`s.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DiagramRepr {
    Terminal(String),
    NonTerminal(String),
    Sequence(Vec<DiagramRepr>),
    Choice(Vec<DiagramRepr>),
    Optional(Box<DiagramRepr>),
    ZeroOrMore(Box<DiagramRepr>),
    OneOrMore(Box<DiagramRepr>),
}

impl DiagramRepr {
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, PrettyConfig::new())
    }

    pub fn from_ron_str<S: AsRef<str>>(s: S) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s.as_ref())
    }

    /// The complete railroad-diagrams expression, wrapped in the top-level `Diagram(...)` call.
    pub fn to_diagram_expr(&self) -> String {
        format!("Diagram({})", self)
    }
}

impl From<&Node> for DiagramRepr {
    fn from(n: &Node) -> Self {
        match n {
            Node::Terminal(s) => DiagramRepr::Terminal(s.clone()),
            Node::NonTerminal(s) => DiagramRepr::NonTerminal(s.clone()),
            Node::Sequence(ns) => DiagramRepr::Sequence(ns.iter().map(DiagramRepr::from).collect()),
            Node::Choice(ns) => DiagramRepr::Choice(ns.iter().map(DiagramRepr::from).collect()),
            Node::Optional(n) => DiagramRepr::Optional(Box::new(DiagramRepr::from(&**n))),
            Node::ZeroOrMore(n) => DiagramRepr::ZeroOrMore(Box::new(DiagramRepr::from(&**n))),
            Node::OneOrMore(n) => DiagramRepr::OneOrMore(Box::new(DiagramRepr::from(&**n))),
        }
    }
}

/// Writes `s` as a double quoted JavaScript string literal.
fn write_str_lit(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", u32::from(c))?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

fn write_args(f: &mut fmt::Formatter, args: &[DiagramRepr]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

/// Prints the railroad-diagrams constructor calls which build this diagram. A choice's default
/// branch is always its first member.
impl fmt::Display for DiagramRepr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiagramRepr::Terminal(s) => {
                write!(f, "Terminal(")?;
                write_str_lit(f, s)?;
                write!(f, ")")
            }
            DiagramRepr::NonTerminal(s) => {
                write!(f, "NonTerminal(")?;
                write_str_lit(f, s)?;
                write!(f, ")")
            }
            DiagramRepr::Sequence(ns) => {
                write!(f, "Sequence(")?;
                write_args(f, ns)?;
                write!(f, ")")
            }
            DiagramRepr::Choice(ns) => {
                write!(f, "Choice(0, ")?;
                write_args(f, ns)?;
                write!(f, ")")
            }
            DiagramRepr::Optional(n) => write!(f, "Optional({})", n),
            DiagramRepr::ZeroOrMore(n) => write!(f, "ZeroOrMore({})", n),
            DiagramRepr::OneOrMore(n) => write!(f, "OneOrMore({})", n),
        }
    }
}

/// Controls how a [`Renderer`] goes about its work.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    timeout: Duration,
    standalone: bool,
}

pub struct RenderOptionsBuilder {
    timeout: Duration,
    standalone: bool,
}

impl Default for RenderOptionsBuilder {
    fn default() -> Self {
        RenderOptionsBuilder {
            timeout: DEFAULT_TIMEOUT,
            standalone: true,
        }
    }
}

impl RenderOptionsBuilder {
    /// The longest a renderer may spend on one diagram before giving up with
    /// [`RenderError::Timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// If `true` (the default), output is a complete document, e.g. an SVG file with its XML
    /// prologue; if `false` a fragment suitable for embedding.
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn build(self) -> RenderOptions {
        RenderOptions {
            timeout: self.timeout,
            standalone: self.standalone,
        }
    }
}

impl RenderOptions {
    /// Returns a `RenderOptionsBuilder` for configuring a `RenderOptions`.
    pub fn builder() -> RenderOptionsBuilder {
        Default::default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn standalone(&self) -> bool {
        self.standalone
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions::builder().build()
    }
}

/// The output of rendering one diagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rendered {
    /// A MIME type such as `image/svg+xml`.
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RenderError {
    /// The renderer did not finish within the given time.
    Timeout(Duration),
    /// The renderer failed for any other reason.
    Failed(String),
}

impl Error for RenderError {}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RenderError::Timeout(d) => write!(f, "Rendering timed out after {:?}", d),
            RenderError::Failed(s) => write!(f, "Rendering failed: {}", s),
        }
    }
}

/// Something that can turn a diagram into an image (or any other document).
pub trait Renderer {
    /// The MIME type of what [`Renderer::render`] produces.
    fn content_type(&self) -> &str;

    fn render(
        &self,
        diagram: &DiagramRepr,
        options: &RenderOptions,
    ) -> Result<Rendered, RenderError>;
}

/// Render every production of `grm`, in order, returning each production's name with its
/// rendering. Fails as a whole on the first production which can not be rendered.
pub fn render_grammar<R: Renderer + ?Sized>(
    grm: &Grammar,
    renderer: &R,
    options: &RenderOptions,
) -> Result<Vec<(String, Rendered)>, RenderError> {
    let mut out = Vec::with_capacity(grm.len());
    for (name, node) in grm.iter() {
        debug!("rendering {} as {}", name, renderer.content_type());
        let rendered = renderer.render(&DiagramRepr::from(node), options)?;
        out.push((name.to_owned(), rendered));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, time::Duration};

    use super::{
        DiagramRepr, RenderError, RenderOptions, Rendered, Renderer, render_grammar,
    };
    use crate::ebnf::{Node, parse_grammar};

    /// Renders a diagram as its expression text, failing on any diagram mentioning `Boom`.
    struct ExprRenderer {
        calls: Cell<usize>,
    }

    impl Renderer for ExprRenderer {
        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn render(
            &self,
            diagram: &DiagramRepr,
            options: &RenderOptions,
        ) -> Result<Rendered, RenderError> {
            self.calls.set(self.calls.get() + 1);
            let expr = diagram.to_diagram_expr();
            if expr.contains("Boom") {
                return Err(RenderError::Failed("boom".to_owned()));
            }
            let body = if options.standalone() {
                format!("<!-- standalone -->\n{}", expr)
            } else {
                expr
            };
            Ok(Rendered {
                content_type: self.content_type().to_owned(),
                body: body.into_bytes(),
            })
        }
    }

    #[test]
    fn test_display() {
        let grm = parse_grammar("List ::= '(' (List | Atom | Anything)* ')'").unwrap();
        assert_eq!(
            grm.get("List").unwrap().to_string(),
            "Sequence(Terminal(\"(\"), ZeroOrMore(Choice(0, NonTerminal(\"Anything\"), \
             NonTerminal(\"Atom\"), NonTerminal(\"List\"))), Terminal(\")\"))"
        );
    }

    #[test]
    fn test_display_escapes() {
        let n = Node::Sequence(vec![
            Node::terminal("\""),
            Node::terminal("a\\b"),
            Node::optional(Node::terminal("\n")),
        ]);
        assert_eq!(
            DiagramRepr::from(&n).to_diagram_expr(),
            r#"Diagram(Sequence(Terminal("\""), Terminal("a\\b"), Optional(Terminal("\n"))))"#
        );
    }

    #[test]
    fn test_choice_order_is_canonical() {
        let g1 = parse_grammar("A ::= B | 'c' | D+").unwrap();
        let g2 = parse_grammar("A ::= D+ | B | 'c'").unwrap();
        let r1 = DiagramRepr::from(g1.get("A").unwrap());
        let r2 = DiagramRepr::from(g2.get("A").unwrap());
        assert_eq!(r1, r2);
        assert_eq!(r1.to_string(), r2.to_string());
    }

    #[test]
    fn test_ron_round_trip() {
        let grm = parse_grammar("S ::= '\"' (A - B | [^\"])* '\"'").unwrap();
        let repr = DiagramRepr::from(grm.get("S").unwrap());
        let ron = repr.to_ron_string().unwrap();
        assert_eq!(DiagramRepr::from_ron_str(&ron).unwrap(), repr);
    }

    #[test]
    fn test_ron_fixture() {
        let repr = DiagramRepr::from_ron_str(
            r#"Sequence([Terminal("("), ZeroOrMore(NonTerminal("Item")), Terminal(")")])"#,
        )
        .unwrap();
        let grm = parse_grammar("L ::= '(' Item* ')'").unwrap();
        assert_eq!(repr, DiagramRepr::from(grm.get("L").unwrap()));
        assert!(DiagramRepr::from_ron_str("Sequence([Bogus(\"x\")])").is_err());
    }

    #[test]
    fn test_options() {
        let opts = RenderOptions::default();
        assert_eq!(opts.timeout(), Duration::from_secs(10));
        assert!(opts.standalone());
        let opts = RenderOptions::builder()
            .timeout(Duration::from_millis(500))
            .standalone(false)
            .build();
        assert_eq!(opts.timeout(), Duration::from_millis(500));
        assert!(!opts.standalone());
    }

    #[test]
    fn test_render_grammar() {
        let grm = parse_grammar("A ::= B C\nD ::= 'e' | F").unwrap();
        let r = ExprRenderer {
            calls: Cell::new(0),
        };
        let opts = RenderOptions::builder().standalone(false).build();
        let out = render_grammar(&grm, &r, &opts).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "A");
        assert_eq!(out[1].0, "D");
        assert_eq!(out[0].1.content_type, "text/plain");
        assert_eq!(
            String::from_utf8(out[0].1.body.clone()).unwrap(),
            "Diagram(Sequence(NonTerminal(\"B\"), NonTerminal(\"C\")))"
        );
    }

    #[test]
    fn test_render_grammar_fails_as_a_whole() {
        let grm = parse_grammar("A ::= B\nC ::= Boom\nD ::= E").unwrap();
        let r = ExprRenderer {
            calls: Cell::new(0),
        };
        assert_eq!(
            render_grammar(&grm, &r, &RenderOptions::default()),
            Err(RenderError::Failed("boom".to_owned()))
        );
        // Nothing after the failing production is attempted.
        assert_eq!(r.calls.get(), 2);
    }
}
