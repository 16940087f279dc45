//! Grammar types and the symbol table.

use crate::first_sets::{self, Analysis};
use crate::{Map, Set};
use std::{fmt, sync::OnceLock};

/// The tag carried by terminal symbols and matched against incoming tokens.
///
/// Kind `0` is reserved for the end-of-input token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKind(pub u16);

impl TokenKind {
    /// Reserved kind carried by end-of-input tokens.
    pub const EOF: Self = Self(0);
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID(u16);

impl TerminalID {
    /// Reserved terminal representing the end-of-input sentinel, written `$`.
    pub const EOI: Self = Self(0);
    const OFFSET: u16 = 1;

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }
}

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => write!(f, "t#eoi"),
            Self(raw) => write!(f, "t#{}", raw),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID(u16);

impl NonterminalID {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n#{}", self.0)
    }
}

/// Identifier of a production. Index 0 is reserved for the augmenting
/// production `S' -> S` installed by [`Grammar::augment`]; user productions
/// are numbered from 1 in insertion order. Indices are stable for the
/// lifetime of the grammar and are the identity used by the action table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID(u16);

impl ProductionID {
    /// Reserved index of the augmenting production `S' -> S`.
    pub const AUGMENT: Self = Self(0);
    const OFFSET: u16 = 1;

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p#{}", self.0)
    }
}

impl fmt::Display for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A grammar symbol.
///
/// `T(TerminalID::EOI)` is the unique end-of-input sentinel and `Epsilon`
/// the unique empty-string symbol; both exist without being interned.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    /// A terminal symbol, including the reserved `$` sentinel.
    T(TerminalID),
    /// A nonterminal symbol.
    N(NonterminalID),
    /// The empty-string symbol `ε`.
    Epsilon,
}

impl SymbolID {
    pub fn as_terminal(self) -> Option<TerminalID> {
        match self {
            Self::T(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_nonterminal(self) -> Option<NonterminalID> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => fmt::Debug::fmt(t, f),
            Self::N(n) => fmt::Debug::fmt(n, f),
            Self::Epsilon => f.write_str("ε"),
        }
    }
}

/// A set of terminals, backed by a bitset indexed by [`TerminalID`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.index())
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.index())
    }

    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner)
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner.iter().map(TerminalID::from_index)
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(TerminalID::index).collect(),
        }
    }
}

#[derive(Debug)]
pub struct TerminalData {
    name: String,
    kind: TokenKind,
}

impl TerminalData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct NonterminalData {
    name: String,
    augmented_start: bool,
}

impl NonterminalData {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the fresh start symbol `S'` created by augmentation.
    pub fn is_augmented_start(&self) -> bool {
        self.augmented_start
    }
}

/// A production rule `A -> X1 ... Xk`. An empty body denotes `A -> ε`.
#[derive(Debug, PartialEq, Eq)]
pub struct Production {
    left: NonterminalID,
    right: Vec<SymbolID>,
}

impl Production {
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        ProductionDisplay {
            grammar,
            production: self,
        }
    }
}

struct ProductionDisplay<'g> {
    grammar: &'g Grammar,
    production: &'g Production,
}

impl fmt::Display for ProductionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Production { left, right } = self.production;
        write!(f, "{} ->", self.grammar.nonterminal(*left).name())?;
        if right.is_empty() {
            f.write_str(" ε")?;
        } else {
            for symbol in right {
                write!(f, " {}", self.grammar.symbol_name(*symbol))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("symbol `{name}` is already interned with a different class")]
    SymbolClassConflict { name: String },

    #[error("terminal `{name}` is already interned with a different token kind")]
    TokenKindConflict { name: String },

    #[error("token kind {0} is reserved for the end-of-input token")]
    ReservedTokenKind(u16),

    #[error("the left-hand side of a production must be a nonterminal")]
    LeftHandSideNotNonterminal,

    #[error("the end-of-input symbol cannot appear in a production body")]
    EoiInProduction,

    #[error("duplicate production for `{name}`")]
    DuplicateProduction { name: String },

    #[error("the start symbol must be a nonterminal")]
    StartNotNonterminal,

    #[error("no start symbol has been set")]
    MissingStart,

    #[error("the grammar is frozen after augmentation")]
    Frozen,
}

/// A defect reported by [`Grammar::validate`] or table construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarIssue {
    #[error("no start symbol defined")]
    MissingStart,

    #[error("no productions defined")]
    NoProductions,

    #[error("nonterminal `{0}` is used but has no production")]
    UndefinedNonterminal(String),

    #[error("grammar is not augmented")]
    NotAugmented,
}

/// A context-free grammar under construction or, after [`augment`], frozen
/// and ready for table construction.
///
/// [`augment`]: Grammar::augment
#[derive(Debug)]
pub struct Grammar {
    terminals: Map<TerminalID, TerminalData>,
    nonterminals: Map<NonterminalID, NonterminalData>,
    productions: Map<ProductionID, Production>,
    augment_production: Option<Production>,
    start: Option<NonterminalID>,
    next_terminal: u16,
    next_nonterminal: u16,
    next_production: u16,
    analysis: OnceLock<Analysis>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let mut terminals = Map::default();
        terminals.insert(
            TerminalID::EOI,
            TerminalData {
                name: "$".into(),
                kind: TokenKind::EOF,
            },
        );
        Self {
            terminals,
            nonterminals: Map::default(),
            productions: Map::default(),
            augment_production: None,
            start: None,
            next_terminal: TerminalID::OFFSET,
            next_nonterminal: 0,
            next_production: ProductionID::OFFSET,
            analysis: OnceLock::new(),
        }
    }

    fn ensure_mutable(&self) -> Result<(), GrammarError> {
        if self.augment_production.is_some() {
            return Err(GrammarError::Frozen);
        }
        Ok(())
    }

    /// Intern a terminal symbol. Interning the same `(name, kind)` pair again
    /// returns the original symbol; reusing the name with a different kind or
    /// as a nonterminal is an error.
    pub fn intern_terminal(
        &mut self,
        name: &str,
        kind: TokenKind,
    ) -> Result<SymbolID, GrammarError> {
        self.ensure_mutable()?;
        if kind == TokenKind::EOF {
            return Err(GrammarError::ReservedTokenKind(kind.0));
        }
        if let Some((&id, data)) = self.terminals.iter().find(|(_, data)| data.name == name) {
            if data.kind != kind {
                return Err(GrammarError::TokenKindConflict { name: name.into() });
            }
            return Ok(SymbolID::T(id));
        }
        if self.nonterminals.values().any(|data| data.name == name) {
            return Err(GrammarError::SymbolClassConflict { name: name.into() });
        }
        let id = TerminalID(self.next_terminal);
        self.next_terminal += 1;
        self.terminals.insert(
            id,
            TerminalData {
                name: name.into(),
                kind,
            },
        );
        Ok(SymbolID::T(id))
    }

    /// Intern a nonterminal symbol. Idempotent per name.
    pub fn intern_nonterminal(&mut self, name: &str) -> Result<SymbolID, GrammarError> {
        self.ensure_mutable()?;
        if let Some((&id, _)) = self
            .nonterminals
            .iter()
            .find(|(_, data)| data.name == name)
        {
            return Ok(SymbolID::N(id));
        }
        if self.terminals.values().any(|data| data.name == name) {
            return Err(GrammarError::SymbolClassConflict { name: name.into() });
        }
        let id = NonterminalID(self.next_nonterminal);
        self.next_nonterminal += 1;
        self.nonterminals.insert(
            id,
            NonterminalData {
                name: name.into(),
                augmented_start: false,
            },
        );
        Ok(SymbolID::N(id))
    }

    /// The unique empty-string symbol `ε`.
    pub fn epsilon(&self) -> SymbolID {
        SymbolID::Epsilon
    }

    /// The unique end-of-input sentinel `$`.
    pub fn end_of_input(&self) -> SymbolID {
        SymbolID::T(TerminalID::EOI)
    }

    /// Append a production. An `ε` inside the body is normalized away, so
    /// `A -> ε` is stored with an empty body and pops zero frames at reduce
    /// time. Invalidates the memoized set analysis.
    pub fn add_production(
        &mut self,
        lhs: SymbolID,
        rhs: &[SymbolID],
    ) -> Result<ProductionID, GrammarError> {
        self.ensure_mutable()?;
        let left = match lhs {
            SymbolID::N(n) => n,
            _ => return Err(GrammarError::LeftHandSideNotNonterminal),
        };
        let mut right = Vec::with_capacity(rhs.len());
        for &symbol in rhs {
            match symbol {
                SymbolID::T(TerminalID::EOI) => return Err(GrammarError::EoiInProduction),
                SymbolID::Epsilon => {}
                symbol => right.push(symbol),
            }
        }
        if self
            .productions
            .values()
            .any(|p| p.left == left && p.right == right)
        {
            return Err(GrammarError::DuplicateProduction {
                name: self.nonterminals[&left].name.clone(),
            });
        }
        let id = ProductionID(self.next_production);
        self.next_production += 1;
        self.productions.insert(id, Production { left, right });
        self.analysis = OnceLock::new();
        Ok(id)
    }

    pub fn set_start(&mut self, symbol: SymbolID) -> Result<(), GrammarError> {
        self.ensure_mutable()?;
        match symbol {
            SymbolID::N(n) => {
                self.start = Some(n);
                Ok(())
            }
            _ => Err(GrammarError::StartNotNonterminal),
        }
    }

    /// Install the fresh start symbol `S'` and the production `S' -> S` at
    /// index 0, and freeze the grammar. Idempotent.
    pub fn augment(&mut self) -> Result<(), GrammarError> {
        if self.augment_production.is_some() {
            return Ok(());
        }
        let user_start = self.start.ok_or(GrammarError::MissingStart)?;
        let mut name = format!("{}'", self.nonterminals[&user_start].name);
        while self.terminals.values().any(|t| t.name == name)
            || self.nonterminals.values().any(|n| n.name == name)
        {
            name.push('\'');
        }
        let id = NonterminalID(self.next_nonterminal);
        self.next_nonterminal += 1;
        self.nonterminals.insert(
            id,
            NonterminalData {
                name,
                augmented_start: true,
            },
        );
        self.augment_production = Some(Production {
            left: id,
            right: vec![SymbolID::N(user_start)],
        });
        self.start = Some(id);
        self.analysis = OnceLock::new();
        Ok(())
    }

    pub fn is_augmented(&self) -> bool {
        self.augment_production.is_some()
    }

    /// The current start symbol: `S'` once augmented, otherwise the symbol
    /// passed to [`set_start`](Grammar::set_start).
    pub fn start_symbol(&self) -> Option<NonterminalID> {
        self.start
    }

    /// The start symbol of the unaugmented grammar. Parse trees are rooted
    /// at this symbol, never at `S'`.
    pub fn user_start(&self) -> Option<NonterminalID> {
        match &self.augment_production {
            Some(p) => p.right[0].as_nonterminal(),
            None => self.start,
        }
    }

    pub fn terminals(&self) -> impl Iterator<Item = (TerminalID, &TerminalData)> + '_ {
        self.terminals.iter().map(|(&id, data)| (id, data))
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = (NonterminalID, &NonterminalData)> + '_ {
        self.nonterminals.iter().map(|(&id, data)| (id, data))
    }

    pub fn terminal(&self, id: TerminalID) -> &TerminalData {
        &self.terminals[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &NonterminalData {
        &self.nonterminals[&id]
    }

    pub(crate) fn nonterminal_count(&self) -> usize {
        self.nonterminals.len()
    }

    /// All productions in index order, the augmenting production first once
    /// the grammar is augmented.
    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.augment_production
            .iter()
            .map(|p| (ProductionID::AUGMENT, p))
            .chain(self.productions.iter().map(|(&id, p)| (id, p)))
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        match id {
            ProductionID::AUGMENT => self
                .augment_production
                .as_ref()
                .expect("grammar is not augmented"),
            id => &self.productions[&id],
        }
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal(t).name(),
            SymbolID::N(n) => self.nonterminal(n).name(),
            SymbolID::Epsilon => "ε",
        }
    }

    /// Report structural defects: a missing start symbol, an empty production
    /// list, and nonterminals used in a body but defined by no production.
    pub fn validate(&self) -> Vec<GrammarIssue> {
        let mut issues = Vec::new();
        if self.start.is_none() {
            issues.push(GrammarIssue::MissingStart);
        }
        if self.productions.is_empty() {
            issues.push(GrammarIssue::NoProductions);
        }

        let defined: Set<NonterminalID> = self.productions().map(|(_, p)| p.left).collect();
        let mut undefined = Set::default();
        for (_, production) in self.productions() {
            for symbol in &production.right {
                if let SymbolID::N(n) = symbol {
                    if !defined.contains(n) {
                        undefined.insert(*n);
                    }
                }
            }
        }
        for n in undefined {
            issues.push(GrammarIssue::UndefinedNonterminal(
                self.nonterminals[&n].name.clone(),
            ));
        }

        issues
    }

    /// Nullability, FIRST, and FOLLOW, computed on first read and memoized
    /// until the next production is added.
    pub fn analysis(&self) -> &Analysis {
        self.analysis.get_or_init(|| first_sets::compute(self))
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals:")?;
        for (i, (_, data)) in self.terminals().enumerate() {
            write!(f, "{}{}", if i > 0 { ", " } else { " " }, data.name())?;
        }
        write!(f, "\nnonterminals:")?;
        for (i, (_, data)) in self.nonterminals().enumerate() {
            write!(f, "{}{}", if i > 0 { ", " } else { " " }, data.name())?;
        }
        write!(f, "\nstart: ")?;
        match self.start {
            Some(start) => writeln!(f, "{}", self.nonterminal(start).name())?,
            None => writeln!(f, "<unset>")?,
        }
        writeln!(f, "productions:")?;
        for (id, production) in self.productions() {
            writeln!(f, "  [{:02}] {}", id, production.display(self))?;
        }
        Ok(())
    }
}
