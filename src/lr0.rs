//! LR(0) items and the canonical collection.

use crate::grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID};
use crate::{Map, Set};
use std::collections::VecDeque;
use std::fmt;

/// Identifier of a state in the canonical collection, assigned in BFS
/// discovery order from the initial state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID(u16);

impl StateID {
    /// The initial state, `closure({S' -> . S})`.
    pub const INITIAL: Self = Self(0);

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s#{}", self.0)
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An LR(0) item: a production with a dot position inside its body.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR0Item {
    pub production: ProductionID,
    pub dot: u16,
}

impl LR0Item {
    /// Whether the dot sits at the end of the body.
    pub fn is_complete(&self, grammar: &Grammar) -> bool {
        self.dot as usize == grammar.production(self.production).right().len()
    }

    /// The symbol immediately after the dot, if any.
    pub fn next_symbol(&self, grammar: &Grammar) -> Option<SymbolID> {
        grammar
            .production(self.production)
            .right()
            .get(self.dot as usize)
            .copied()
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        ItemDisplay {
            grammar,
            item: self,
        }
    }
}

struct ItemDisplay<'g> {
    grammar: &'g Grammar,
    item: &'g LR0Item,
}

impl fmt::Display for ItemDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let production = self.grammar.production(self.item.production);
        write!(
            f,
            "{} ->",
            self.grammar.nonterminal(production.left()).name()
        )?;
        for (i, &symbol) in production.right().iter().enumerate() {
            if i == self.item.dot as usize {
                f.write_str(" .")?;
            }
            write!(f, " {}", self.grammar.symbol_name(symbol))?;
        }
        if self.item.dot as usize == production.right().len() {
            f.write_str(" .")?;
        }
        Ok(())
    }
}

/// Saturate an item set under "a dot before a nonterminal admits that
/// nonterminal's productions with the dot at the left". Returns the items
/// sorted by (production, dot), the canonical state representation.
pub fn closure(grammar: &Grammar, kernel: Vec<LR0Item>) -> Vec<LR0Item> {
    let mut items: Set<LR0Item> = kernel.into_iter().collect();
    let mut queue: VecDeque<LR0Item> = items.iter().copied().collect();

    while let Some(item) = queue.pop_front() {
        if let Some(SymbolID::N(n)) = item.next_symbol(grammar) {
            for (id, production) in grammar.productions() {
                if production.left() != n {
                    continue;
                }
                let admitted = LR0Item {
                    production: id,
                    dot: 0,
                };
                if items.insert(admitted) {
                    queue.push_back(admitted);
                }
            }
        }
    }

    let mut items: Vec<LR0Item> = items.into_iter().collect();
    items.sort_unstable();
    items
}

/// Goto: advance the dot over `symbol` in every item that expects it, then
/// close the result. Empty when no item expects `symbol`.
pub fn goto_set(grammar: &Grammar, items: &[LR0Item], symbol: SymbolID) -> Vec<LR0Item> {
    let kernel = items
        .iter()
        .filter(|item| item.next_symbol(grammar) == Some(symbol))
        .map(|item| LR0Item {
            production: item.production,
            dot: item.dot + 1,
        })
        .collect();
    closure(grammar, kernel)
}

/// A state of the canonical collection: a closed item set plus its outgoing
/// transitions, split by symbol class.
#[derive(Debug)]
pub struct State {
    items: Vec<LR0Item>,
    shifts: Map<TerminalID, StateID>,
    gotos: Map<NonterminalID, StateID>,
}

impl State {
    /// The closed item set, sorted by (production, dot).
    pub fn items(&self) -> &[LR0Item] {
        &self.items[..]
    }

    pub fn shifts(&self) -> &Map<TerminalID, StateID> {
        &self.shifts
    }

    pub fn gotos(&self) -> &Map<NonterminalID, StateID> {
        &self.gotos
    }

    /// Whether this state contains the complete augmented item `S' -> S .`.
    pub fn is_accepting(&self) -> bool {
        self.items
            .binary_search(&LR0Item {
                production: ProductionID::AUGMENT,
                dot: 1,
            })
            .is_ok()
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        StateDisplay {
            grammar,
            state: self,
        }
    }
}

struct StateDisplay<'g> {
    grammar: &'g Grammar,
    state: &'g State,
}

impl fmt::Display for StateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.state.items {
            writeln!(f, "  {}", item.display(self.grammar))?;
        }
        for (t, target) in &self.state.shifts {
            writeln!(
                f,
                "  {} => shift {:?}",
                self.grammar.terminal(*t).name(),
                target
            )?;
        }
        for (n, target) in &self.state.gotos {
            writeln!(
                f,
                "  {} => goto {:?}",
                self.grammar.nonterminal(*n).name(),
                target
            )?;
        }
        Ok(())
    }
}

/// The canonical collection of LR(0) states and its transition map.
#[derive(Debug)]
pub struct Automaton {
    states: Map<StateID, State>,
}

impl Automaton {
    /// Build the collection from an augmented grammar, discovering states in
    /// BFS order from `closure({(AUGMENT, 0)})` so that ids are deterministic.
    /// Two states are identified iff their closed item sets are equal.
    pub fn build(grammar: &Grammar) -> Self {
        let initial = closure(
            grammar,
            vec![LR0Item {
                production: ProductionID::AUGMENT,
                dot: 0,
            }],
        );

        let mut states = Map::default();
        let mut ids: Map<Vec<LR0Item>, StateID> = Map::default();
        let mut next_id: u16 = 1;
        let mut pending = VecDeque::new();

        ids.insert(initial.clone(), StateID::INITIAL);
        pending.push_back((StateID::INITIAL, initial));

        while let Some((id, items)) = pending.pop_front() {
            let mut expected: Set<SymbolID> = Set::default();
            for item in &items {
                if let Some(symbol) = item.next_symbol(grammar) {
                    expected.insert(symbol);
                }
            }

            let mut shifts = Map::default();
            let mut gotos = Map::default();
            for &symbol in &expected {
                let successor = goto_set(grammar, &items, symbol);
                let target = match ids.get(&successor) {
                    Some(&target) => target,
                    None => {
                        let target = StateID(next_id);
                        next_id += 1;
                        ids.insert(successor.clone(), target);
                        pending.push_back((target, successor));
                        target
                    }
                };
                match symbol {
                    SymbolID::T(t) => {
                        shifts.insert(t, target);
                    }
                    SymbolID::N(n) => {
                        gotos.insert(n, target);
                    }
                    SymbolID::Epsilon => {}
                }
            }

            states.insert(
                id,
                State {
                    items,
                    shifts,
                    gotos,
                },
            );
        }

        Automaton { states }
    }

    /// States in id order.
    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states.iter().map(|(&id, state)| (id, state))
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[&id]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The transition map as a partial function; `None` means no move.
    pub fn transition(&self, from: StateID, symbol: SymbolID) -> Option<StateID> {
        let state = &self.states[&from];
        match symbol {
            SymbolID::T(t) => state.shifts.get(&t).copied(),
            SymbolID::N(n) => state.gotos.get(&n).copied(),
            SymbolID::Epsilon => None,
        }
    }
}
