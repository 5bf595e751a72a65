//! The grammar trie.
//!
//! All signatures in scope are indexed into a single prefix tree over their
//! terms. Each node has word-labelled edges, at most one "an argument fits
//! here" edge, and an optional signature payload marking a complete callable
//! form. The parser walks this trie to resolve multi-word calls with
//! longest-match behavior.
//!
//! Nodes live in an arena and are addressed by [`NodeId`], so the parser can
//! hold a cursor while recursively parsing argument expressions.

use ahash::AHashMap;

use crate::signature::{Signature, Term};

/// Index of a node in the grammar arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct Node {
    terms: AHashMap<String, NodeId>,
    argument: Option<NodeId>,
    signature: Option<Signature>,
}

#[derive(Debug)]
pub struct Grammar {
    nodes: Vec<Node>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Creates an empty grammar.
    ///
    /// The root always carries an argument edge, so that any parsed
    /// expression can begin a postfix call attempt even before signatures
    /// are declared.
    #[must_use]
    pub fn new() -> Self {
        let mut grammar = Self {
            nodes: vec![Node::default()],
        };
        let argument = grammar.push_node();
        grammar.nodes[0].argument = Some(argument);
        grammar
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Inserts a signature, branching through choices and options.
    ///
    /// Returns `false` when an equal signature was already present (the new
    /// one replaces it).
    pub fn insert(&mut self, signature: &Signature) -> bool {
        let mut positions = vec![self.root()];
        for term in &signature.terms {
            let mut next = Vec::with_capacity(positions.len());
            match term {
                Term::Word(token) => {
                    for &position in &positions {
                        push_unique(&mut next, self.term_edge(position, &token.word()));
                    }
                }
                Term::Choice(tokens) => {
                    for token in tokens {
                        for i in 0..positions.len() {
                            let position = positions[i];
                            push_unique(&mut next, self.term_edge(position, &token.word()));
                        }
                    }
                }
                Term::Option(tokens) => {
                    // Both the "skip" and "include" branches continue.
                    next.extend(positions.iter().copied());
                    for token in tokens {
                        for i in 0..positions.len() {
                            let position = positions[i];
                            push_unique(&mut next, self.term_edge(position, &token.word()));
                        }
                    }
                }
                Term::Argument(_) => {
                    for &position in &positions {
                        push_unique(&mut next, self.argument_edge(position));
                    }
                }
            }
            positions = next;
        }

        let mut fresh = true;
        for position in positions {
            let slot = &mut self.nodes[position.0].signature;
            if slot.as_ref() == Some(signature) {
                fresh = false;
            }
            *slot = Some(signature.clone());
        }
        fresh
    }

    /// Follows a word edge.
    #[must_use]
    pub fn term(&self, node: NodeId, word: &str) -> Option<NodeId> {
        self.nodes[node.0].terms.get(word).copied()
    }

    /// Follows the argument edge.
    #[must_use]
    pub fn argument(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].argument
    }

    /// The signature completed at this node, if any.
    #[must_use]
    pub fn signature(&self, node: NodeId) -> Option<&Signature> {
        self.nodes[node.0].signature.as_ref()
    }

    /// A node with no outgoing edges; a trailing argument parsed at a leaf
    /// may consume a whole comma-list.
    #[must_use]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        let node = &self.nodes[node.0];
        node.terms.is_empty() && node.argument.is_none()
    }

    /// Collects up to `limit` distinct signatures reachable from `node`,
    /// used to suggest completions in "no matching function" errors.
    #[must_use]
    pub fn signatures_under(&self, node: NodeId, limit: usize) -> Vec<Signature> {
        let mut found: Vec<Signature> = Vec::new();
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if found.len() > limit {
                break;
            }
            let current = &self.nodes[current.0];
            if let Some(signature) = &current.signature
                && !found.contains(signature)
            {
                found.push(signature.clone());
            }
            pending.extend(current.terms.values().copied());
            pending.extend(current.argument);
        }
        found
    }

    fn term_edge(&mut self, node: NodeId, word: &str) -> NodeId {
        if let Some(&next) = self.nodes[node.0].terms.get(word) {
            return next;
        }
        let next = self.push_node();
        self.nodes[node.0].terms.insert(word.to_string(), next);
        next
    }

    fn argument_edge(&mut self, node: NodeId) -> NodeId {
        if let Some(next) = self.nodes[node.0].argument {
            return next;
        }
        let next = self.push_node();
        self.nodes[node.0].argument = Some(next);
        next
    }

    fn push_node(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        NodeId(self.nodes.len() - 1)
    }
}

fn push_unique(positions: &mut Vec<NodeId>, node: NodeId) {
    if !positions.contains(&node) {
        positions.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(source: &str) -> Signature {
        Signature::parse(source).unwrap()
    }

    #[test]
    fn words_and_arguments_walk_edges() {
        let mut grammar = Grammar::new();
        grammar.insert(&signature("the size of {}"));

        let node = grammar.term(grammar.root(), "the").unwrap();
        let node = grammar.term(node, "size").unwrap();
        let node = grammar.term(node, "of").unwrap();
        let node = grammar.argument(node).unwrap();
        assert_eq!(grammar.signature(node).unwrap().name(), "the size of (:)");
        assert!(grammar.is_leaf(node));
    }

    #[test]
    fn options_insert_skip_and_include_branches() {
        let mut grammar = Grammar::new();
        grammar.insert(&signature("(the) size of {}"));

        assert!(grammar.term(grammar.root(), "the").is_some());
        assert!(grammar.term(grammar.root(), "size").is_some());
    }

    #[test]
    fn choices_insert_every_alternate() {
        let mut grammar = Grammar::new();
        grammar.insert(&signature("remove char/character {} from {}"));

        let remove = grammar.term(grammar.root(), "remove").unwrap();
        assert!(grammar.term(remove, "char").is_some());
        assert!(grammar.term(remove, "character").is_some());
    }

    #[test]
    fn equal_signatures_collide() {
        let mut grammar = Grammar::new();
        assert!(grammar.insert(&signature("sort a/b {}")));
        assert!(!grammar.insert(&signature("sort b/a {}")));
    }

    #[test]
    fn longest_match_keeps_both_signatures() {
        let mut grammar = Grammar::new();
        grammar.insert(&signature("print {}"));
        grammar.insert(&signature("print error {}"));

        let print = grammar.term(grammar.root(), "print").unwrap();
        let error = grammar.term(print, "error").unwrap();
        assert!(grammar.signature(grammar.argument(print).unwrap()).is_some());
        assert!(grammar.signature(grammar.argument(error).unwrap()).is_some());
    }
}
