#![deny(unreachable_pub)]

//! The EBNF dialect used by the W3C XML recommendations, e.g.:
//!
//! ```text
//! List ::= '(' (List | Atom | Anything)* ')'
//! Atom ::= [a-zA-Z]+ /* letters only */
//! ```
//!
//! Grammar text goes through two stages: [`parse`] turns it into a [`GrammarCST`] which mirrors
//! the notation exactly, and [`transform`] rewrites that into a [`Grammar`] of canonical
//! [`Node`] trees ready to be drawn as railroad diagrams. [`parse_grammar`] does both.

use std::{error::Error, fmt};

pub mod ast;
pub mod cst;
pub mod parser;
pub mod transformer;

pub use self::{
    ast::{Grammar, Node},
    cst::GrammarCST,
    parser::{EbnfGrammarError, EbnfGrammarErrorKind, EbnfParser, Expected, MAX_NESTING},
    transformer::{TransformError, TransformErrorKind, transform},
};
use crate::{Span, Spanned};

/// Parse grammar text into its concrete parse tree.
pub fn parse(src: &str) -> Result<GrammarCST, EbnfGrammarError> {
    EbnfParser::new(src).parse()
}

/// Parse grammar text and transform it into canonical diagram trees.
pub fn parse_grammar(src: &str) -> Result<Grammar, EbnfError> {
    let cst = parse(src)?;
    Ok(transform(&cst)?)
}

/// An error from either stage of [`parse_grammar`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EbnfError {
    Parse(EbnfGrammarError),
    Transform(TransformError),
}

impl From<EbnfGrammarError> for EbnfError {
    fn from(e: EbnfGrammarError) -> Self {
        EbnfError::Parse(e)
    }
}

impl From<TransformError> for EbnfError {
    fn from(e: TransformError) -> Self {
        EbnfError::Transform(e)
    }
}

impl fmt::Display for EbnfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EbnfError::Parse(e) => write!(f, "{}", e),
            EbnfError::Transform(e) => write!(f, "{}", e),
        }
    }
}

impl Error for EbnfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EbnfError::Parse(e) => Some(e),
            EbnfError::Transform(e) => Some(e),
        }
    }
}

impl Spanned for EbnfError {
    fn span(&self) -> Span {
        match self {
            EbnfError::Parse(e) => e.span(),
            EbnfError::Transform(e) => e.span(),
        }
    }
}
