// The parser for the EBNF-flavoured grammar notation:
//
//   grammar     = production (newline+ production)*
//   production  = S name S '::=' S definition
//   definition  = link | choice
//   choice      = seqOrDiff (S '|' S seqOrDiff)*
//   seqOrDiff   = item ( (S '-' S item) | (space+ item)* )?
//   item        = primary ('?' | '*' | '+')?
//   primary     = name | stringLiteral | charCode | charClass | '(' S choice S ')'
//
// Every rule is a function from a byte offset to either the offset after the text it matched
// (plus what it built) or a `Backtrack`. Alternatives are tried in order and a failed
// alternative never consumes input, so the parser as a whole behaves like a PEG. Whenever a rule
// fails, the offset and the expectation are recorded: the error finally reported is the one at
// the furthest offset reached, with every expectation that failed there.

use std::{collections::BTreeSet, error::Error, fmt};

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;

use crate::{Span, Spanned};

use super::cst::{
    Cardinality, CharClass, CharClassItem, CharCode, Choice, Definition, GrammarCST, Item, Link,
    Name, Primary, Production, SeqOrDiff, StringLiteral,
};

type ParseResult<T> = Result<(usize, T), Backtrack>;

/// How deeply parenthesised groups may be nested. Every later stage walks the tree recursively,
/// so this bounds the stack used by the whole pipeline.
pub const MAX_NESTING: usize = 64;

/// Returned by a rule which did not match. Why it did not match has already been recorded in
/// the parser's furthest failure.
#[derive(Debug)]
struct Backtrack;

/// Something the parser expected to find at the position an error is reported at.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Expected {
    Name,
    StringLiteral,
    CharCode,
    CharClassItem,
    Url,
    Newline,
    EndOfInput,
    /// A fixed piece of punctuation such as `::=` or `)`.
    Literal(&'static str),
}

/// The two ways grammar text can fail to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EbnfGrammarErrorKind {
    /// The furthest failure is at a character the parser could not make sense of.
    UnexpectedInput(char),
    /// The furthest failure is at the end of the input.
    PrematureEnd,
    /// Parenthesised groups are nested more than [`MAX_NESTING`] deep.
    NestingTooDeep,
}

/// Any error from the EBNF parser returns an instance of this struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EbnfGrammarError {
    pub kind: EbnfGrammarErrorKind,
    /// A zero-width span at the furthest position the parser reached.
    pub span: Span,
    /// Everything that would have allowed parsing to continue at `span`, sorted.
    pub expected: Vec<Expected>,
}

impl EbnfGrammarError {
    /// Byte offset of the furthest failure.
    pub fn position(&self) -> usize {
        self.span.start()
    }
}

impl Error for EbnfGrammarError {}

impl Spanned for EbnfGrammarError {
    fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for EbnfGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match self.expected.as_slice() {
            [] => Ok(()),
            [e] => write!(f, ": expected {}", e),
            es => {
                write!(f, ": expected one of ")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for EbnfGrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EbnfGrammarErrorKind::UnexpectedInput(c) => write!(f, "Unexpected {:?}", c),
            EbnfGrammarErrorKind::PrematureEnd => write!(f, "File ends prematurely"),
            EbnfGrammarErrorKind::NestingTooDeep => write!(
                f,
                "Parentheses nested more than {} deep",
                MAX_NESTING
            ),
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expected::Name => write!(f, "name"),
            Expected::StringLiteral => write!(f, "string literal"),
            Expected::CharCode => write!(f, "char code"),
            Expected::CharClassItem => write!(f, "char class item"),
            Expected::Url => write!(f, "URL"),
            Expected::Newline => write!(f, "newline"),
            Expected::EndOfInput => write!(f, "end of input"),
            Expected::Literal(s) => write!(f, "'{}'", s),
        }
    }
}

lazy_static! {
    static ref RE_NAME: Regex = Regex::new(r"^[A-Z][a-zA-Z0-9]*").unwrap();
    static ref RE_CHAR_CODE: Regex = Regex::new(r"^#x[0-9a-fA-F]+").unwrap();
    static ref RE_URL: Regex = Regex::new(r"^[^\]:/?#\s]+://[^\]#\s]+").unwrap();
}

pub struct EbnfParser<'a> {
    src: &'a str,
    /// The furthest byte offset at which a rule failed.
    furthest: usize,
    /// What was expected at `furthest`.
    expected: BTreeSet<Expected>,
    /// How many groups enclose the current position.
    depth: usize,
    /// The `(` of the first group which exceeded `MAX_NESTING`.
    too_deep: Option<usize>,
}

impl<'a> EbnfParser<'a> {
    pub fn new(src: &'a str) -> EbnfParser<'a> {
        EbnfParser {
            src,
            furthest: 0,
            expected: BTreeSet::new(),
            depth: 0,
            too_deep: None,
        }
    }

    /// Parse the whole input. A parser can be used for a single parse only.
    pub fn parse(&mut self) -> Result<GrammarCST, EbnfGrammarError> {
        // We pass around an index into the *bytes* of self.src. We guarantee that at all times
        // this points to the beginning of a UTF-8 character.
        debug!("parsing {} bytes of grammar", self.src.len());
        match self.grammar(0) {
            Ok((_, cst)) => {
                debug!("parsed {} productions", cst.productions.len());
                Ok(cst)
            }
            Err(Backtrack) => {
                let e = self.mk_error();
                debug!("parse failed at byte {}: {}", e.position(), e);
                Err(e)
            }
        }
    }

    fn grammar(&mut self, i: usize) -> ParseResult<GrammarCST> {
        let i = self.parse_ws(i, true);
        let (mut i, p) = self.production(i)?;
        let mut productions = vec![p];
        while let Ok((j, ())) = self.production_separator(i) {
            match self.production(j) {
                Ok((k, p)) => {
                    productions.push(p);
                    i = k;
                }
                Err(Backtrack) => break,
            }
        }
        let i = self.parse_ws(i, true);
        let i = self.end_of_input(i)?;
        Ok((i, GrammarCST { productions }))
    }

    /// Productions are separated by whitespace containing at least one newline.
    fn production_separator(&mut self, i: usize) -> ParseResult<()> {
        let j = self.parse_ws(i, false);
        match self.peek(j) {
            Some('\n') | Some('\r') => Ok((self.parse_ws(j, true), ())),
            _ => self.fail(j, Expected::Newline),
        }
    }

    fn production(&mut self, i: usize) -> ParseResult<Production> {
        let start = self.parse_ws(i, false);
        let (i, name) = self.name(start)?;
        let i = self.parse_ws(i, false);
        let i = self.literal("::=", i)?;
        let i = self.parse_ws(i, false);
        let (i, definition) = self.definition(i)?;
        Ok((
            i,
            Production {
                name,
                definition,
                span: Span::new(start, i),
            },
        ))
    }

    /// A link and a char class look the same up to the `://` of the URL, so a link is only
    /// accepted if the production ends straight after it; anything else is a choice.
    fn definition(&mut self, i: usize) -> ParseResult<Definition> {
        if let Ok((j, link)) = self.link(i) {
            if self.at_production_end(j) {
                return Ok((j, Definition::Link(link)));
            }
        }
        let (j, choice) = self.choice(i)?;
        Ok((j, Definition::Choice(choice)))
    }

    fn at_production_end(&mut self, i: usize) -> bool {
        let j = self.parse_ws(i, false);
        matches!(self.peek(j), None | Some('\n') | Some('\r'))
    }

    fn choice(&mut self, start: usize) -> ParseResult<Choice> {
        let (mut i, first) = self.seq_or_diff(start)?;
        let mut options = vec![first];
        loop {
            let j = self.parse_ws(i, false);
            let Ok(j) = self.literal("|", j) else {
                break;
            };
            let j = self.parse_ws(j, false);
            match self.seq_or_diff(j) {
                Ok((k, o)) => {
                    options.push(o);
                    i = k;
                }
                Err(Backtrack) => break,
            }
        }
        Ok((
            i,
            Choice {
                options,
                span: Span::new(start, i),
            },
        ))
    }

    fn seq_or_diff(&mut self, start: usize) -> ParseResult<SeqOrDiff> {
        let (mut i, first) = self.item(start)?;

        let j = self.parse_ws(i, false);
        if let Ok(j) = self.literal("-", j) {
            let j = self.parse_ws(j, false);
            if let Ok((k, rhs)) = self.item(j) {
                return Ok((
                    k,
                    SeqOrDiff::Difference(Box::new(first), Box::new(rhs), Span::new(start, k)),
                ));
            }
        }

        let mut items = vec![first];
        loop {
            // Items must be separated by at least some whitespace.
            let j = self.parse_ws(i, false);
            if j == i {
                break;
            }
            match self.item(j) {
                Ok((k, item)) => {
                    items.push(item);
                    i = k;
                }
                Err(Backtrack) => break,
            }
        }
        Ok((i, SeqOrDiff::Sequence(items, Span::new(start, i))))
    }

    fn item(&mut self, start: usize) -> ParseResult<Item> {
        let (i, primary) = self.primary(start)?;
        match self.peek(i).and_then(Cardinality::from_char) {
            Some(c) => {
                // All cardinality markers are a single byte.
                let j = i + 1;
                Ok((
                    j,
                    Item {
                        primary,
                        cardinality: Some(c),
                        span: Span::new(start, j),
                    },
                ))
            }
            None => Ok((
                i,
                Item {
                    primary,
                    cardinality: None,
                    span: Span::new(start, i),
                },
            )),
        }
    }

    fn primary(&mut self, i: usize) -> ParseResult<Primary> {
        if let Ok((j, n)) = self.name(i) {
            return Ok((j, Primary::Name(n)));
        }
        if let Ok((j, s)) = self.string_literal(i) {
            return Ok((j, Primary::StringLiteral(s)));
        }
        if let Ok((j, c)) = self.char_code(i) {
            return Ok((j, Primary::CharCode(c)));
        }
        if let Ok((j, c)) = self.char_class(i) {
            return Ok((j, Primary::CharClass(c)));
        }
        let j = self.literal("(", i)?;
        if self.too_deep.is_some() {
            return Err(Backtrack);
        }
        if self.depth == MAX_NESTING {
            debug!("groups nested too deeply at byte {}", i);
            self.too_deep = Some(i);
            return Err(Backtrack);
        }
        self.depth += 1;
        let r = self.group(j);
        self.depth -= 1;
        let (j, choice) = r?;
        Ok((j, Primary::Group(Box::new(choice))))
    }

    /// The inside of a group, from just after its `(` up to and including its `)`.
    fn group(&mut self, i: usize) -> ParseResult<Choice> {
        let i = self.parse_ws(i, false);
        let (i, choice) = self.choice(i)?;
        let i = self.parse_ws(i, false);
        let i = self.literal(")", i)?;
        Ok((i, choice))
    }

    fn name(&mut self, i: usize) -> ParseResult<Name> {
        match RE_NAME.find(&self.src[i..]) {
            Some(m) => {
                let j = i + m.end();
                Ok((
                    j,
                    Name {
                        text: self.src[i..j].to_string(),
                        span: Span::new(i, j),
                    },
                ))
            }
            None => self.fail(i, Expected::Name),
        }
    }

    /// A quoted string. There are no escape characters: a string simply runs up to the next
    /// occurrence of its opening quote.
    fn string_literal(&mut self, i: usize) -> ParseResult<StringLiteral> {
        let (quote, closing) = match self.peek(i) {
            Some('"') => ('"', "\""),
            Some('\'') => ('\'', "'"),
            _ => return self.fail(i, Expected::StringLiteral),
        };
        let body = i + 1;
        match self.src[body..].find(quote) {
            Some(off) => {
                let j = body + off;
                Ok((
                    j + 1,
                    StringLiteral {
                        value: self.src[body..j].to_string(),
                        quote,
                        span: Span::new(i, j + 1),
                    },
                ))
            }
            None => self.fail(self.src.len(), Expected::Literal(closing)),
        }
    }

    fn char_code(&mut self, i: usize) -> ParseResult<CharCode> {
        match RE_CHAR_CODE.find(&self.src[i..]) {
            Some(m) => {
                let j = i + m.end();
                Ok((
                    j,
                    CharCode {
                        hex: self.src[i + "#x".len()..j].to_string(),
                        span: Span::new(i, j),
                    },
                ))
            }
            None => self.fail(i, Expected::CharCode),
        }
    }

    fn char_class(&mut self, start: usize) -> ParseResult<CharClass> {
        let mut i = self.literal("[", start)?;
        let negated = self.peek(i) == Some('^');
        if negated {
            i += 1;
        }
        let mut items = Vec::new();
        while let Ok((j, item)) = self.char_class_item(i) {
            items.push(item);
            i = j;
        }
        if items.is_empty() {
            return Err(Backtrack);
        }
        let i = self.literal("]", i)?;
        Ok((
            i,
            CharClass {
                negated,
                items,
                span: Span::new(start, i),
            },
        ))
    }

    fn char_class_item(&mut self, i: usize) -> ParseResult<CharClassItem> {
        if let Ok((j, lo)) = self.char_code(i) {
            if self.peek(j) == Some('-') {
                if let Ok((k, hi)) = self.char_code(j + 1) {
                    return Ok((k, CharClassItem::CharCodeRange(lo, hi)));
                }
            }
        }
        if let Ok((j, lo)) = self.class_char(i) {
            if self.peek(j) == Some('-') {
                if let Ok((k, hi)) = self.class_char(j + 1) {
                    return Ok((k, CharClassItem::CharRange(lo, hi)));
                }
            }
        }
        if let Ok((j, c)) = self.char_code(i) {
            return Ok((j, CharClassItem::CharCode(c)));
        }
        let (j, c) = self.class_char(i)?;
        Ok((j, CharClassItem::Char(c)))
    }

    /// Any printable character other than `]`.
    fn class_char(&mut self, i: usize) -> ParseResult<char> {
        match self.peek(i) {
            Some(c) if c != ']' && !c.is_control() => Ok((i + c.len_utf8(), c)),
            _ => self.fail(i, Expected::CharClassItem),
        }
    }

    fn link(&mut self, start: usize) -> ParseResult<Link> {
        let i = self.literal("[", start)?;
        let Some(m) = RE_URL.find(&self.src[i..]) else {
            return self.fail(i, Expected::Url);
        };
        let mut j = i + m.end();
        let url = self.src[i..j].to_string();
        let mut fragment = None;
        if self.peek(j) == Some('#') {
            if let Ok((k, n)) = self.name(j + 1) {
                fragment = Some(n);
                j = k;
            }
        }
        let j = self.literal("]", j)?;
        Ok((
            j,
            Link {
                url,
                fragment,
                span: Span::new(start, j),
            },
        ))
    }

    /// `/*` up to the first following `*/`.
    fn comment(&mut self, i: usize) -> ParseResult<Span> {
        let j = self.literal("/*", i)?;
        match self.src[j..].find("*/") {
            Some(off) => {
                let k = j + off + "*/".len();
                Ok((k, Span::new(i, k)))
            }
            None => self.fail(self.src.len(), Expected::Literal("*/")),
        }
    }

    /// Skip whitespace and comments from `i` onwards. If `inc_newlines` is `false`, stops at the
    /// first newline outside a comment. Never fails: an unterminated comment is left unconsumed
    /// (with the missing `*/` recorded) for the caller to choke on.
    fn parse_ws(&mut self, mut i: usize, inc_newlines: bool) -> usize {
        while let Some(c) = self.peek(i) {
            match c {
                ' ' | '\t' => i += c.len_utf8(),
                '\n' | '\r' if inc_newlines => i += c.len_utf8(),
                '/' => match self.comment(i) {
                    Ok((j, _)) => i = j,
                    Err(Backtrack) => break,
                },
                _ => break,
            }
        }
        i
    }

    fn end_of_input(&mut self, i: usize) -> Result<usize, Backtrack> {
        if i == self.src.len() {
            Ok(i)
        } else {
            self.fail(i, Expected::EndOfInput)
        }
    }

    fn literal(&mut self, s: &'static str, i: usize) -> Result<usize, Backtrack> {
        if self.src[i..].starts_with(s) {
            Ok(i + s.len())
        } else {
            self.fail(i, Expected::Literal(s))
        }
    }

    fn peek(&self, i: usize) -> Option<char> {
        self.src[i..].chars().next()
    }

    fn fail<T>(&mut self, i: usize, e: Expected) -> Result<T, Backtrack> {
        if i > self.furthest {
            trace!("furthest failure now at byte {}", i);
            self.furthest = i;
            self.expected.clear();
        }
        if i == self.furthest {
            self.expected.insert(e);
        }
        Err(Backtrack)
    }

    fn mk_error(&self) -> EbnfGrammarError {
        if let Some(i) = self.too_deep {
            return EbnfGrammarError {
                kind: EbnfGrammarErrorKind::NestingTooDeep,
                span: Span::new(i, i + 1),
                expected: Vec::new(),
            };
        }
        let kind = match self.peek(self.furthest) {
            Some(c) => EbnfGrammarErrorKind::UnexpectedInput(c),
            None => EbnfGrammarErrorKind::PrematureEnd,
        };
        EbnfGrammarError {
            kind,
            span: Span::new(self.furthest, self.furthest),
            expected: self.expected.iter().copied().collect(),
        }
    }
}
