#![allow(clippy::upper_case_acronyms)]

//! A library for turning EBNF grammars (in the notation of the W3C XML recommendations) into
//! the trees from which railroad diagrams are drawn.
//!
//! Some terminology:
//!
//!   * A *grammar* is an ordered sequence of *productions*.
//!   * A *production* binds a *name* to a *definition*.
//!   * A *definition* is one or more *alternatives*, each an ordered sequence of *items*.
//!
//! For example, in the following grammar:
//!
//!   R1 ::= 'a' 'b' | R2
//!   R2 ::= 'c'
//!
//! there are two productions; `R1` has two alternatives, the first of which has two items.
//!
//! Grammars are parsed by [`ebnf::parse_grammar`], which yields an [`ebnf::Grammar`]: for each
//! production, a [`ebnf::Node`] tree in a canonical form (structurally equal definitions give
//! equal trees, whatever order their alternatives were written in). [`render`] turns those trees
//! into the representation handed to a diagram renderer.

pub mod diagnostics;
pub mod ebnf;
pub mod newlinecache;
pub mod render;
pub mod span;

pub use newlinecache::NewlineCache;
pub use span::{Span, Spanned};
