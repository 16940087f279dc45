//! LALR(1) lookahead computation over the LR(0) automaton.
//!
//! Implements DeRemer and Pennello's relational method: lookaheads are
//! assigned per (state, completed production) pair without splitting
//! states, via the `reads`, `includes` and `lookback` relations and two
//! DIGRAPH passes.
//!
//! DeRemer and Pennello, Efficient Computation of LALR(1) Look-Ahead Sets,
//! <https://dl.acm.org/doi/10.1145/69622.357187>

use crate::digraph::digraph;
use crate::grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID, TerminalSet};
use crate::lr0::{Automaton, StateID};
use crate::Map;

/// A nonterminal transition `p --(A)--> r` of the LR(0) automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GotoRef {
    pub from: StateID,
    pub symbol: NonterminalID,
}

/// A reduction point: production `p` is complete in `state`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReduceRef {
    pub state: StateID,
    pub production: ProductionID,
}

/// The computed lookahead sets, `LA(q, A -> ω)` per reduction point.
#[derive(Debug)]
pub struct Lookaheads {
    sets: Map<ReduceRef, TerminalSet>,
}

impl Lookaheads {
    pub fn get(&self, state: StateID, production: ProductionID) -> Option<&TerminalSet> {
        self.sets.get(&ReduceRef { state, production })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReduceRef, &TerminalSet)> + '_ {
        self.sets.iter().map(|(&key, set)| (key, set))
    }
}

/// Compute the LALR(1) lookahead sets for every reduction of the automaton.
///
/// The complete augmented item `S' -> S .` is not covered here; its
/// lookahead is `{$}` by definition and is realized directly as the Accept
/// action during table emission.
pub fn compute(grammar: &Grammar, automaton: &Automaton) -> Lookaheads {
    let analysis = grammar.analysis();

    // Number the goto transitions; the digraph passes work over their
    // indices.
    let mut gotos: Vec<GotoRef> = Vec::new();
    let mut targets: Vec<StateID> = Vec::new();
    let mut goto_index: Map<GotoRef, usize> = Map::default();
    for (from, state) in automaton.states() {
        for (&symbol, &to) in state.gotos() {
            let key = GotoRef { from, symbol };
            goto_index.insert(key, gotos.len());
            gotos.push(key);
            targets.push(to);
        }
    }
    tracing::trace!(transitions = gotos.len(), "collected goto transitions");

    // DirectRead(p,A): the terminals shifted out of r = goto(p,A). The goto
    // on the user start symbol out of the initial state also reads `$`,
    // standing in for the `S' -> S $` form of the augmented production.
    let mut sets: Vec<TerminalSet> = targets
        .iter()
        .map(|&to| automaton.state(to).shifts().keys().copied().collect())
        .collect();
    if let Some(start) = grammar.user_start() {
        let key = GotoRef {
            from: StateID::INITIAL,
            symbol: start,
        };
        if let Some(&i) = goto_index.get(&key) {
            sets[i].insert(TerminalID::EOI);
        }
    }

    // (p,A) reads (r,C)  <=>  r = goto(p,A), r --(C)--> and C =>* ε
    let reads: Vec<Vec<usize>> = targets
        .iter()
        .map(|&r| {
            automaton
                .state(r)
                .gotos()
                .keys()
                .filter(|&&c| analysis.is_nullable(c))
                .map(|&c| goto_index[&GotoRef { from: r, symbol: c }])
                .collect()
        })
        .collect();
    digraph(&mut sets, &reads);

    // (p,A) includes (p',B)  <=>  B -> β A γ, γ =>* ε, p' --(β)--> p.
    // Found by walking each production of B from p' and marking every
    // nonterminal position followed by a nullable suffix.
    let mut includes: Vec<Vec<usize>> = vec![Vec::new(); gotos.len()];
    for (b_index, b_key) in gotos.iter().enumerate() {
        for (_, production) in grammar.productions() {
            if production.left() != b_key.symbol {
                continue;
            }
            let right = production.right();
            let mut current = b_key.from;
            for (i, &symbol) in right.iter().enumerate() {
                if let SymbolID::N(a) = symbol {
                    if analysis.sequence_nullable(&right[i + 1..]) {
                        let key = GotoRef {
                            from: current,
                            symbol: a,
                        };
                        if let Some(&a_index) = goto_index.get(&key) {
                            includes[a_index].push(b_index);
                        }
                    }
                }
                match automaton.transition(current, symbol) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
    }
    digraph(&mut sets, &includes);

    // (q, A -> ω) lookback (p,A)  <=>  p --(ω)--> q, and then
    // LA(q, A -> ω) = ∪ { Follow(p,A) | (q, A -> ω) lookback (p,A) }.
    let mut lookaheads: Map<ReduceRef, TerminalSet> = Map::default();
    for (goto_i, key) in gotos.iter().enumerate() {
        for (id, production) in grammar.productions() {
            if production.left() != key.symbol {
                continue;
            }
            let mut current = key.from;
            let mut reaches_reduction = true;
            for &symbol in production.right() {
                match automaton.transition(current, symbol) {
                    Some(next) => current = next,
                    None => {
                        reaches_reduction = false;
                        break;
                    }
                }
            }
            if reaches_reduction {
                lookaheads
                    .entry(ReduceRef {
                        state: current,
                        production: id,
                    })
                    .or_default()
                    .union_with(&sets[goto_i]);
            }
        }
    }

    tracing::trace!(reductions = lookaheads.len(), "lookahead sets computed");
    Lookaheads { sets: lookaheads }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenKind;
    use crate::lr0::Automaton;

    fn names(grammar: &Grammar, set: &TerminalSet) -> Vec<String> {
        let mut names: Vec<String> = set
            .iter()
            .map(|t| grammar.terminal(t).name().to_owned())
            .collect();
        names.sort();
        names
    }

    fn nt(grammar: &Grammar, name: &str) -> NonterminalID {
        grammar
            .nonterminals()
            .find(|(_, data)| data.name() == name)
            .map(|(id, _)| id)
            .unwrap()
    }

    /// E -> E + T | T;  T -> T * F | F;  F -> ( E ) | num
    fn expr_grammar() -> Grammar {
        let mut g = Grammar::new();
        let plus = g.intern_terminal("+", TokenKind(1)).unwrap();
        let star = g.intern_terminal("*", TokenKind(2)).unwrap();
        let lparen = g.intern_terminal("(", TokenKind(3)).unwrap();
        let rparen = g.intern_terminal(")", TokenKind(4)).unwrap();
        let num = g.intern_terminal("num", TokenKind(5)).unwrap();

        let e = g.intern_nonterminal("E").unwrap();
        let t = g.intern_nonterminal("T").unwrap();
        let f = g.intern_nonterminal("F").unwrap();

        g.set_start(e).unwrap();
        g.add_production(e, &[e, plus, t]).unwrap();
        g.add_production(e, &[t]).unwrap();
        g.add_production(t, &[t, star, f]).unwrap();
        g.add_production(t, &[f]).unwrap();
        g.add_production(f, &[lparen, e, rparen]).unwrap();
        g.add_production(f, &[num]).unwrap();
        g.augment().unwrap();
        g
    }

    #[test]
    fn lookaheads_are_contained_in_follow_of_lhs() {
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        let lookaheads = compute(&g, &automaton);
        let analysis = g.analysis();
        for (key, set) in lookaheads.iter() {
            let lhs = g.production(key.production).left();
            assert!(
                set.is_subset(analysis.follow(lhs)),
                "LA({:?}) = {:?} exceeds FOLLOW({})",
                key,
                names(&g, set),
                g.nonterminal(lhs).name()
            );
        }
    }

    #[test]
    fn every_reduction_state_gets_a_lookahead_set() {
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        let lookaheads = compute(&g, &automaton);
        for (id, state) in automaton.states() {
            for item in state.items() {
                if !item.is_complete(&g) || item.production == ProductionID::AUGMENT {
                    continue;
                }
                let set = lookaheads.get(id, item.production);
                assert!(
                    set.is_some_and(|set| !set.is_empty()),
                    "no lookaheads for {:?} in state {:?}",
                    item,
                    id
                );
            }
        }
    }

    #[test]
    fn expression_grammar_lookaheads_match_follow() {
        // this grammar is SLR(1), so the propagated lookaheads coincide with
        // the FOLLOW sets of the reduced nonterminals
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        let lookaheads = compute(&g, &automaton);
        let analysis = g.analysis();
        let e = nt(&g, "E");
        for (key, set) in lookaheads.iter() {
            let lhs = g.production(key.production).left();
            if lhs == e {
                assert_eq!(names(&g, set), names(&g, analysis.follow(e)));
            }
        }
    }

    #[test]
    fn lalr_lookaheads_are_sharper_than_follow() {
        // S -> L = R | R;  L -> * R | id;  R -> L
        //
        // FOLLOW(R) contains `=`, but in the state reached after `R` from the
        // start the reduction R -> L must not fire on `=`; LALR propagation
        // keeps the sets apart where SLR's FOLLOW approximation cannot.
        let mut g = Grammar::new();
        let eq = g.intern_terminal("=", TokenKind(1)).unwrap();
        let star = g.intern_terminal("*", TokenKind(2)).unwrap();
        let id = g.intern_terminal("id", TokenKind(3)).unwrap();
        let s = g.intern_nonterminal("S").unwrap();
        let l = g.intern_nonterminal("L").unwrap();
        let r = g.intern_nonterminal("R").unwrap();
        g.set_start(s).unwrap();
        g.add_production(s, &[l, eq, r]).unwrap();
        g.add_production(s, &[r]).unwrap();
        g.add_production(l, &[star, r]).unwrap();
        g.add_production(l, &[id]).unwrap();
        let r_to_l = g.add_production(r, &[l]).unwrap();
        g.augment().unwrap();

        let automaton = Automaton::build(&g);
        let lookaheads = compute(&g, &automaton);
        let analysis = g.analysis();
        assert!(analysis.follow(nt(&g, "R")).contains(eq.as_terminal().unwrap()));

        // the state holding the kernel { S -> L . = R, R -> L . }
        let conflict_state = automaton
            .states()
            .find(|(_, state)| {
                state.items().iter().any(|item| {
                    item.production == r_to_l && item.is_complete(&g)
                }) && state.shifts().len() == 1
            })
            .map(|(id, _)| id)
            .unwrap();
        let set = lookaheads.get(conflict_state, r_to_l).unwrap();
        assert_eq!(names(&g, set), ["$"]);
    }
}
