use std::{collections::BTreeSet, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EbnfError, parse_grammar};
use crate::render::DiagramRepr;

/// A node of the canonical diagram tree. The derived `Ord` is what gives `Choice` its set
/// semantics: members are kept in one canonical order, so two choices with the same members
/// are equal (and hash equally) whatever order their alternatives were written in.
///
/// Trees built by the transformer, by [`Node::choice`], or by deserialisation never contain a
/// `Choice` with fewer than two members. Building a `Node::Choice` directly bypasses that check.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "UncheckedNode")]
pub enum Node {
    /// A literal string to be rendered verbatim.
    Terminal(String),
    /// A reference, by name, to a production. It is never resolved.
    NonTerminal(String),
    Sequence(Vec<Node>),
    /// Mutually exclusive alternatives, at least two of them.
    Choice(BTreeSet<Node>),
    Optional(Box<Node>),
    ZeroOrMore(Box<Node>),
    OneOrMore(Box<Node>),
}

impl Node {
    pub fn terminal<S: Into<String>>(s: S) -> Node {
        Node::Terminal(s.into())
    }

    pub fn nonterminal<S: Into<String>>(s: S) -> Node {
        Node::NonTerminal(s.into())
    }

    /// Build a choice from `alts`, collapsing structurally equal alternatives. A single
    /// remaining alternative is returned as is; `None` is returned if `alts` is empty.
    pub fn choice<I: IntoIterator<Item = Node>>(alts: I) -> Option<Node> {
        let mut set = alts.into_iter().collect::<BTreeSet<_>>();
        match set.len() {
            0 => None,
            1 => set.pop_first(),
            _ => Some(Node::Choice(set)),
        }
    }

    pub fn optional(n: Node) -> Node {
        Node::Optional(Box::new(n))
    }

    pub fn zero_or_more(n: Node) -> Node {
        Node::ZeroOrMore(Box::new(n))
    }

    pub fn one_or_more(n: Node) -> Node {
        Node::OneOrMore(Box::new(n))
    }

    /// Is this a leaf (`Terminal` or `NonTerminal`)?
    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::Terminal(_) | Node::NonTerminal(_))
    }

    /// This node's direct children. Sequence children are in order; choice members in their
    /// canonical order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Terminal(_) | Node::NonTerminal(_) => Vec::new(),
            Node::Sequence(ns) => ns.iter().collect(),
            Node::Choice(ns) => ns.iter().collect(),
            Node::Optional(n) | Node::ZeroOrMore(n) | Node::OneOrMore(n) => vec![n],
        }
    }
}

// Deserialised as-is, then checked by `TryFrom`. Children are `Node`s, so every level is checked.
#[derive(Deserialize)]
#[serde(rename = "Node")]
enum UncheckedNode {
    Terminal(String),
    NonTerminal(String),
    Sequence(Vec<Node>),
    Choice(BTreeSet<Node>),
    Optional(Box<Node>),
    ZeroOrMore(Box<Node>),
    OneOrMore(Box<Node>),
}

impl TryFrom<UncheckedNode> for Node {
    type Error = String;

    fn try_from(n: UncheckedNode) -> Result<Self, Self::Error> {
        Ok(match n {
            UncheckedNode::Terminal(s) => Node::Terminal(s),
            UncheckedNode::NonTerminal(s) => Node::NonTerminal(s),
            UncheckedNode::Sequence(ns) => Node::Sequence(ns),
            UncheckedNode::Choice(ns) => {
                if ns.len() < 2 {
                    return Err(format!(
                        "Choice must have at least two distinct members, not {}",
                        ns.len()
                    ));
                }
                Node::Choice(ns)
            }
            UncheckedNode::Optional(n) => Node::Optional(n),
            UncheckedNode::ZeroOrMore(n) => Node::ZeroOrMore(n),
            UncheckedNode::OneOrMore(n) => Node::OneOrMore(n),
        })
    }
}

/// Prints the railroad-diagram expression for this node (see [`DiagramRepr`]).
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", DiagramRepr::from(self))
    }
}

/// The result of transforming a grammar: the value of each production, in source order.
/// Production names need not be unique and no reference between productions is checked.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Node)>", into = "Vec<(String, Node)>")]
pub struct Grammar {
    productions: Vec<(String, Node)>,
    // map from a production name to indexes into `productions`
    names: IndexMap<String, Vec<usize>>,
}

impl Grammar {
    pub fn new() -> Grammar {
        Grammar {
            productions: Vec::new(),
            names: IndexMap::new(),
        }
    }

    pub(crate) fn add_production(&mut self, name: String, value: Node) {
        self.names
            .entry(name.clone())
            .or_default()
            .push(self.productions.len());
        self.productions.push((name, value));
    }

    pub fn productions(&self) -> &[(String, Node)] {
        &self.productions
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// Iterate over `(name, value)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.productions.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// The value of the first production called `name`.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.names
            .get(name)
            .and_then(|idxs| idxs.first())
            .map(|&i| &self.productions[i].1)
    }

    /// The values of all productions called `name`, in source order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.names
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.productions[i].1)
    }

    /// Each distinct production name, in order of first appearance.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|n| n.as_str())
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}

// `names` is derived entirely from `productions`.
impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.productions == other.productions
    }
}

impl Eq for Grammar {}

impl From<Vec<(String, Node)>> for Grammar {
    fn from(productions: Vec<(String, Node)>) -> Self {
        let mut grm = Grammar::new();
        for (name, value) in productions {
            grm.add_production(name, value);
        }
        grm
    }
}

impl From<Grammar> for Vec<(String, Node)> {
    fn from(grm: Grammar) -> Self {
        grm.productions
    }
}

impl FromStr for Grammar {
    type Err = EbnfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_grammar(s)
    }
}
