//! The concrete parse tree produced by [`EbnfParser`](super::parser::EbnfParser). Its shape
//! follows the rules of the grammar notation one to one; whitespace and comments are consumed
//! by the parser and not retained. Every node records the [`Span`] of input it was parsed from.

use std::fmt;

use crate::{Span, Spanned};

/// A whole grammar: its productions in source order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrammarCST {
    pub productions: Vec<Production>,
}

/// `Name ::= definition`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Production {
    pub name: Name,
    pub definition: Definition,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Definition {
    Choice(Choice),
    Link(Link),
}

/// A name starting with an upper case ASCII letter, followed by ASCII letters and digits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

/// One or more alternatives separated by `|`. A parenthesised group always produces a `Choice`,
/// even when it only has a single alternative.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Choice {
    pub options: Vec<SeqOrDiff>,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SeqOrDiff {
    /// One or more whitespace separated items.
    Sequence(Vec<Item>, Span),
    /// `Item - Item`
    Difference(Box<Item>, Box<Item>, Span),
}

/// A primary with an optional cardinality marker directly after it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Item {
    pub primary: Primary,
    pub cardinality: Option<Cardinality>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Primary {
    Name(Name),
    StringLiteral(StringLiteral),
    CharCode(CharCode),
    CharClass(CharClass),
    /// `( choice )`
    Group(Box<Choice>),
}

/// `"..."` or `'...'`. `value` excludes the quotes; no escape processing takes place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub quote: char,
    pub span: Span,
}

/// `#x` followed by one or more hex digits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharCode {
    pub hex: String,
    pub span: Span,
}

/// `[` `^`? items `]`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharClass {
    pub negated: bool,
    pub items: Vec<CharClassItem>,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CharClassItem {
    Char(char),
    CharRange(char, char),
    CharCode(CharCode),
    CharCodeRange(CharCode, CharCode),
}

/// `[scheme://body#Fragment]`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub url: String,
    pub fragment: Option<Name>,
    pub span: Span,
}

impl CharCode {
    /// The code point this char code denotes, or `None` if it is not a valid Unicode scalar
    /// value.
    pub fn value(&self) -> Option<char> {
        u32::from_str_radix(&self.hex, 16)
            .ok()
            .and_then(char::from_u32)
    }
}

impl Link {
    /// The full link target, including any `#Fragment`.
    pub fn target(&self) -> String {
        match &self.fragment {
            Some(n) => format!("{}#{}", self.url, n.text),
            None => self.url.clone(),
        }
    }
}

impl Cardinality {
    pub fn from_char(c: char) -> Option<Cardinality> {
        match c {
            '?' => Some(Cardinality::Optional),
            '*' => Some(Cardinality::ZeroOrMore),
            '+' => Some(Cardinality::OneOrMore),
            _ => None,
        }
    }
}

// The `Display` impls print nodes back in the grammar notation: spacing is normalised and
// comments are gone, but the result parses to an equal tree.

impl fmt::Display for GrammarCST {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, p) in self.productions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ::= {}", self.name, self.definition)
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Definition::Choice(c) => write!(f, "{}", c),
            Definition::Link(l) => write!(f, "[{}]", l.target()),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, o) in self.options.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", o)?;
        }
        Ok(())
    }
}

impl fmt::Display for SeqOrDiff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SeqOrDiff::Sequence(items, _) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            SeqOrDiff::Difference(lhs, rhs, _) => write!(f, "{} - {}", lhs, rhs),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        match self.cardinality {
            Some(Cardinality::Optional) => write!(f, "?"),
            Some(Cardinality::ZeroOrMore) => write!(f, "*"),
            Some(Cardinality::OneOrMore) => write!(f, "+"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Primary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primary::Name(n) => write!(f, "{}", n),
            Primary::StringLiteral(s) => write!(f, "{}{}{}", s.quote, s.value, s.quote),
            Primary::CharCode(c) => write!(f, "{}", c),
            Primary::CharClass(c) => write!(f, "{}", c),
            Primary::Group(c) => write!(f, "({})", c),
        }
    }
}

impl fmt::Display for CharCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#x{}", self.hex)
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        if self.negated {
            write!(f, "^")?;
        }
        for item in &self.items {
            match item {
                CharClassItem::Char(c) => write!(f, "{}", c)?,
                CharClassItem::CharRange(a, b) => write!(f, "{}-{}", a, b)?,
                CharClassItem::CharCode(c) => write!(f, "{}", c)?,
                CharClassItem::CharCodeRange(a, b) => write!(f, "{}-{}", a, b)?,
            }
        }
        write!(f, "]")
    }
}

impl Spanned for Production {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for Name {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for Choice {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for SeqOrDiff {
    fn span(&self) -> Span {
        match self {
            SeqOrDiff::Sequence(_, span) | SeqOrDiff::Difference(_, _, span) => *span,
        }
    }
}

impl Spanned for Item {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for Primary {
    fn span(&self) -> Span {
        match self {
            Primary::Name(n) => n.span,
            Primary::StringLiteral(s) => s.span,
            Primary::CharCode(c) => c.span,
            Primary::CharClass(c) => c.span,
            Primary::Group(c) => c.span,
        }
    }
}

impl Spanned for Definition {
    fn span(&self) -> Span {
        match self {
            Definition::Choice(c) => c.span,
            Definition::Link(l) => l.span,
        }
    }
}

impl Spanned for StringLiteral {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for CharCode {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for CharClass {
    fn span(&self) -> Span {
        self.span
    }
}

impl Spanned for Link {
    fn span(&self) -> Span {
        self.span
    }
}

#[cfg(test)]
mod test {
    use super::{CharCode, Link, Name};
    use crate::Span;

    #[test]
    fn test_char_code_value() {
        let cc = |hex: &str| CharCode {
            hex: hex.to_string(),
            span: Span::new(0, 0),
        };
        assert_eq!(cc("20").value(), Some(' '));
        assert_eq!(cc("5D").value(), Some(']'));
        assert_eq!(cc("1F600").value(), Some('😀'));
        assert_eq!(cc("D800").value(), None);
        assert_eq!(cc("FFFFFFFFF").value(), None);
    }

    #[test]
    fn test_link_target() {
        let mut link = Link {
            url: "http://www.w3.org/TR/xml-names/".to_string(),
            fragment: None,
            span: Span::new(0, 0),
        };
        assert_eq!(link.target(), "http://www.w3.org/TR/xml-names/");
        link.fragment = Some(Name {
            text: "NT".to_string(),
            span: Span::new(0, 0),
        });
        assert_eq!(link.target(), "http://www.w3.org/TR/xml-names/#NT");
    }
}
