use std::{collections::BTreeSet, error::Error, fmt};

use log::debug;

use super::{
    ast::{Grammar, Node},
    cst::{
        Cardinality, Choice, Definition, GrammarCST, Item, Primary, Production, SeqOrDiff,
    },
};
use crate::{Span, Spanned};

pub type TransformResult<T> = Result<T, TransformError>;

/// The various different possible transformation errors. None of these can arise from a tree
/// produced by [`EbnfParser`](super::parser::EbnfParser); they guard against hand-built trees.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransformErrorKind {
    EmptyChoice,
    EmptySequence,
}

/// Any error from rewriting a [`GrammarCST`] into a [`Grammar`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransformError {
    pub kind: TransformErrorKind,
    /// The choice or sequence which is empty.
    pub span: Span,
}

impl Error for TransformError {}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for TransformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TransformErrorKind::EmptyChoice => "Choice has no alternatives",
            TransformErrorKind::EmptySequence => "Sequence has no items",
        };
        write!(f, "{}", s)
    }
}

impl Spanned for TransformError {
    fn span(&self) -> Span {
        self.span
    }
}

/// What a choice rewrites to: either the elements of its only distinct alternative, or the set
/// of its (two or more) distinct alternatives.
enum Alternatives {
    Single(Vec<Node>),
    Many(BTreeSet<Node>),
}

/// Rewrite a concrete parse tree into the canonical diagram tree, one production at a time.
pub fn transform(cst: &GrammarCST) -> TransformResult<Grammar> {
    debug!("transforming {} productions", cst.productions.len());
    let mut grm = Grammar::new();
    for p in &cst.productions {
        let value = production(p)?;
        grm.add_production(p.name.text.clone(), value);
    }
    debug!("transformed {} productions", grm.len());
    Ok(grm)
}

/// A production's value: a `Choice` if it has two or more distinct alternatives, otherwise the
/// elements of its sole alternative as a `Sequence`. A sole element that is already compound
/// (a repetition, a parenthesised sequence or choice) is the value by itself.
fn production(p: &Production) -> TransformResult<Node> {
    match &p.definition {
        Definition::Link(l) => Ok(Node::Sequence(vec![Node::NonTerminal(l.target())])),
        Definition::Choice(c) => match choice(c)? {
            Alternatives::Many(alts) => Ok(Node::Choice(alts)),
            Alternatives::Single(mut elems) => {
                if elems.len() == 1 && !elems[0].is_terminal() {
                    Ok(elems.remove(0))
                } else {
                    Ok(Node::Sequence(elems))
                }
            }
        },
    }
}

fn choice(c: &Choice) -> TransformResult<Alternatives> {
    if c.options.is_empty() {
        return Err(TransformError {
            kind: TransformErrorKind::EmptyChoice,
            span: c.span,
        });
    }
    let mut alts = c
        .options
        .iter()
        .map(seq_or_diff)
        .collect::<TransformResult<Vec<_>>>()?;
    let distinct = alts
        .iter()
        .cloned()
        .map(singularize)
        .collect::<BTreeSet<_>>();
    if distinct.len() == 1 {
        // Every alternative is the same, so any of them will do.
        Ok(Alternatives::Single(alts.swap_remove(0)))
    } else {
        Ok(Alternatives::Many(distinct))
    }
}

fn seq_or_diff(sd: &SeqOrDiff) -> TransformResult<Vec<Node>> {
    match sd {
        SeqOrDiff::Sequence(items, span) => {
            if items.is_empty() {
                return Err(TransformError {
                    kind: TransformErrorKind::EmptySequence,
                    span: *span,
                });
            }
            items.iter().map(item).collect()
        }
        SeqOrDiff::Difference(lhs, rhs, _) => {
            Ok(vec![item(lhs)?, Node::terminal("-"), item(rhs)?])
        }
    }
}

fn item(it: &Item) -> TransformResult<Node> {
    let v = primary(&it.primary)?;
    Ok(match it.cardinality {
        None => v,
        Some(Cardinality::Optional) => Node::optional(v),
        Some(Cardinality::ZeroOrMore) => Node::zero_or_more(v),
        Some(Cardinality::OneOrMore) => Node::one_or_more(v),
    })
}

fn primary(p: &Primary) -> TransformResult<Node> {
    Ok(match p {
        Primary::Name(n) => Node::NonTerminal(n.text.clone()),
        Primary::StringLiteral(s) => Node::Terminal(s.value.clone()),
        Primary::CharCode(c) => Node::Terminal(c.to_string()),
        Primary::CharClass(c) => Node::Terminal(c.to_string()),
        Primary::Group(c) => match choice(c)? {
            Alternatives::Single(elems) => singularize(elems),
            Alternatives::Many(alts) => Node::Choice(alts),
        },
    })
}

/// A single element stands for itself; anything else is a sequence.
fn singularize(mut elems: Vec<Node>) -> Node {
    if elems.len() == 1 {
        elems.remove(0)
    } else {
        Node::Sequence(elems)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::{TransformErrorKind, transform};
    use crate::{
        Span,
        ebnf::{
            ast::{Grammar, Node},
            cst::{Choice, Definition, GrammarCST, Name, Production, SeqOrDiff},
            parser::EbnfParser,
        },
    };

    fn grammar(src: &str) -> Grammar {
        let cst = EbnfParser::new(src).parse().unwrap();
        transform(&cst).unwrap()
    }

    fn value(src: &str) -> Node {
        let grm = grammar(src);
        assert_eq!(grm.len(), 1);
        grm.productions()[0].1.clone()
    }

    fn t(s: &str) -> Node {
        Node::terminal(s)
    }

    fn nt(s: &str) -> Node {
        Node::nonterminal(s)
    }

    fn seq(ns: Vec<Node>) -> Node {
        Node::Sequence(ns)
    }

    fn choice(ns: Vec<Node>) -> Node {
        Node::Choice(ns.into_iter().collect::<BTreeSet<_>>())
    }

    #[test]
    fn test_single_element() {
        assert_eq!(value("Foo ::= Bar"), seq(vec![nt("Bar")]));
        assert_eq!(value("Foo ::= 'bar'"), seq(vec![t("bar")]));
        assert_eq!(value("Foo ::= (Bar)"), value("Foo ::= Bar"));
        assert_eq!(value("Foo ::= ((Bar))"), value("Foo ::= Bar"));
    }

    #[test]
    fn test_sequence() {
        assert_eq!(
            value("Str ::= '\"' Anything* '\"'"),
            seq(vec![t("\""), Node::zero_or_more(nt("Anything")), t("\"")])
        );
        assert_eq!(value("Foo ::= (A B)"), value("Foo ::= A B"));
    }

    #[test]
    fn test_choice() {
        assert_eq!(
            value("Or ::= A | B | '123'"),
            choice(vec![nt("A"), nt("B"), t("123")])
        );
        assert_eq!(value("Or ::= A | B | A"), choice(vec![nt("A"), nt("B")]));
        assert_eq!(value("Or ::= A | B"), value("Or ::= B | A"));
        assert_eq!(value("Or ::= A | B"), value("Or ::= (A | B)"));
        // A choice whose alternatives are all the same is no choice at all.
        assert_eq!(value("A ::= B | B"), seq(vec![nt("B")]));
        assert_eq!(value("A ::= B C | B C"), seq(vec![nt("B"), nt("C")]));
    }

    #[test]
    fn test_cardinality() {
        assert_eq!(value("Repeat ::= A?"), Node::optional(nt("A")));
        assert_eq!(value("Repeat ::= A*"), Node::zero_or_more(nt("A")));
        assert_eq!(value("Repeat ::= A+"), Node::one_or_more(nt("A")));
        assert_eq!(
            value("Repeat ::= (A B)+"),
            Node::one_or_more(seq(vec![nt("A"), nt("B")]))
        );
        assert_eq!(
            value("Repeat ::= (A | B)*"),
            Node::zero_or_more(choice(vec![nt("A"), nt("B")]))
        );
        assert_eq!(value("Repeat ::= (A)?"), Node::optional(nt("A")));
    }

    #[test]
    fn test_list() {
        assert_eq!(
            value("List ::= '(' (List | Atom | Anything)* ')'"),
            seq(vec![
                t("("),
                Node::zero_or_more(choice(vec![nt("List"), nt("Atom"), nt("Anything")])),
                t(")"),
            ])
        );
    }

    #[test]
    fn test_multiple_productions() {
        let grm = grammar(
            "Map ::= '{' (Anything Anything)* '}'
             String ::= '\"' Anything* '\"' | \"'\" Anything* \"'\"
             List ::= '(' Anything* ')'",
        );
        assert_eq!(grm.names().collect::<Vec<_>>(), vec!["Map", "String", "List"]);
        assert_eq!(
            grm.get("Map").unwrap(),
            &seq(vec![
                t("{"),
                Node::zero_or_more(seq(vec![nt("Anything"), nt("Anything")])),
                t("}"),
            ])
        );
        assert_eq!(
            grm.get("String").unwrap(),
            &choice(vec![
                seq(vec![t("\""), Node::zero_or_more(nt("Anything")), t("\"")]),
                seq(vec![t("'"), Node::zero_or_more(nt("Anything")), t("'")]),
            ])
        );
        assert_eq!(
            grm.get("List").unwrap(),
            &seq(vec![t("("), Node::zero_or_more(nt("Anything")), t(")")])
        );
    }

    #[test]
    fn test_duplicate_names() {
        let grm = grammar("A ::= B\nA ::= C");
        assert_eq!(grm.len(), 2);
        assert_eq!(grm.get("A"), Some(&seq(vec![nt("B")])));
        assert_eq!(
            grm.get_all("A").collect::<Vec<_>>(),
            vec![&seq(vec![nt("B")]), &seq(vec![nt("C")])]
        );
    }

    #[test]
    fn test_chars() {
        assert_eq!(value("S ::= #x20"), seq(vec![t("#x20")]));
        assert_eq!(
            value("S ::= [^<&] | #x9"),
            choice(vec![t("[^<&]"), t("#x9")])
        );
        assert_eq!(
            value("S ::= [#x20#x9a-z]+"),
            Node::one_or_more(t("[#x20#x9a-z]"))
        );
    }

    #[test]
    fn test_link_and_difference() {
        assert_eq!(
            value("QName ::= [http://www.w3.org/TR/xml-names/#QName]"),
            seq(vec![nt("http://www.w3.org/TR/xml-names/#QName")])
        );
        assert_eq!(
            value("Char ::= Any - ']'"),
            seq(vec![nt("Any"), t("-"), t("]")])
        );
        assert_eq!(
            value("C ::= (A - B) | D"),
            choice(vec![seq(vec![nt("A"), t("-"), nt("B")]), nt("D")])
        );
    }

    #[test]
    fn test_hand_built_errors() {
        let mk = |options: Vec<SeqOrDiff>| GrammarCST {
            productions: vec![Production {
                name: Name {
                    text: "A".to_string(),
                    span: Span::new(0, 1),
                },
                definition: Definition::Choice(Choice {
                    options,
                    span: Span::new(6, 6),
                }),
                span: Span::new(0, 6),
            }],
        };
        let e = transform(&mk(vec![])).unwrap_err();
        assert_eq!(e.kind, TransformErrorKind::EmptyChoice);
        assert_eq!(e.span, Span::new(6, 6));
        let e = transform(&mk(vec![SeqOrDiff::Sequence(vec![], Span::new(6, 6))])).unwrap_err();
        assert_eq!(e.kind, TransformErrorKind::EmptySequence);
    }

    #[test]
    fn test_deterministic() {
        let src = "Expr ::= Term (('+' | '-') Term)*\nTerm ::= Num | '(' Expr ')'";
        assert_eq!(grammar(src), grammar(src));
    }
}
