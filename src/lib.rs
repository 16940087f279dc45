//! An LALR(1) parser generator.
//!
//! Grammars are supplied through a programmatic symbol/production API,
//! augmented, and compiled into a deterministic shift/reduce parse table.
//! Lookaheads are computed with DeRemer and Pennello's relational method
//! over the LR(0) automaton, so every LALR(1) grammar builds without
//! conflicts; grammars outside LALR(1) still yield a table plus a list of
//! the conflicting action assignments. The [`parser`] module drives a
//! finished table over a token stream and produces a concrete parse tree.

mod digraph;
pub mod first_sets;
pub mod grammar;
pub mod lalr;
pub mod lr0;
pub mod parse_table;
pub mod parser;

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered map used throughout the crate. Iteration order is the
/// order of first insertion, which keeps every derived artifact (state ids,
/// table rows, conflict lists) reproducible across runs.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;

/// Insertion-ordered set, same rationale as [`Map`].
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

pub use crate::grammar::{
    Grammar, GrammarError, GrammarIssue, NonterminalID, ProductionID, SymbolID, TerminalID,
    TerminalSet, TokenKind,
};
pub use crate::parse_table::{build, Action, BuildError, Conflict, ConflictKind, ParseTable};
pub use crate::parser::{parse, ParseError, ParseNode, Parser, Token, TokenBuffer, TokenStream};
