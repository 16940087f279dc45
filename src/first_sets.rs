//! Nullability, FIRST, and FOLLOW set computation.
//!
//! All three are monotone fixed points iterated until a pass adds nothing.
//! ε-membership of a FIRST set is carried as nullability rather than as a
//! pseudo-terminal bit, so `A =>* ε` iff `ε ∈ FIRST(A)` iff `A` is in the
//! nullable set, by construction.

use crate::grammar::{Grammar, NonterminalID, SymbolID, TerminalID, TerminalSet};
use crate::{Map, Set};

/// The memoized result of the set analysis, obtained from
/// [`Grammar::analysis`]. Valid for both augmented and unaugmented grammars;
/// `$` is seeded into the FOLLOW set of the current start symbol.
#[derive(Debug)]
pub struct Analysis {
    nullables: Set<NonterminalID>,
    first: Map<NonterminalID, TerminalSet>,
    follow: Map<NonterminalID, TerminalSet>,
}

impl Analysis {
    pub fn is_nullable(&self, n: NonterminalID) -> bool {
        self.nullables.contains(&n)
    }

    pub fn nullables(&self) -> impl Iterator<Item = NonterminalID> + '_ {
        self.nullables.iter().copied()
    }

    /// `FIRST(A)` restricted to terminals; `ε`-membership is
    /// [`is_nullable`](Self::is_nullable).
    pub fn first(&self, n: NonterminalID) -> &TerminalSet {
        &self.first[&n]
    }

    /// `FOLLOW(A)`, possibly containing [`TerminalID::EOI`].
    pub fn follow(&self, n: NonterminalID) -> &TerminalSet {
        &self.follow[&n]
    }

    /// `FIRST(X1 ... Xk)` of a symbol sequence: its terminal set and whether
    /// the whole sequence derives ε. The empty sequence yields `(∅, true)`.
    pub fn first_of_sequence(&self, sequence: &[SymbolID]) -> (TerminalSet, bool) {
        let mut terminals = TerminalSet::default();
        for &symbol in sequence {
            match symbol {
                SymbolID::T(t) => {
                    terminals.insert(t);
                    return (terminals, false);
                }
                SymbolID::N(n) => {
                    terminals.union_with(&self.first[&n]);
                    if !self.nullables.contains(&n) {
                        return (terminals, false);
                    }
                }
                SymbolID::Epsilon => {}
            }
        }
        (terminals, true)
    }

    /// Whether every symbol of the sequence derives ε.
    pub fn sequence_nullable(&self, sequence: &[SymbolID]) -> bool {
        sequence.iter().all(|symbol| match symbol {
            SymbolID::T(_) => false,
            SymbolID::N(n) => self.nullables.contains(n),
            SymbolID::Epsilon => true,
        })
    }
}

pub(crate) fn compute(grammar: &Grammar) -> Analysis {
    let nullables = nullable_set(grammar);
    let first = first_sets(grammar, &nullables);
    let mut analysis = Analysis {
        nullables,
        first,
        follow: Map::default(),
    };
    analysis.follow = follow_sets(grammar, &analysis);
    analysis
}

/// The smallest set of nonterminals N with `A ∈ N` whenever some production
/// `A -> X1 ... Xk` has every `Xi ∈ N` (base case: `A -> ε`).
fn nullable_set(grammar: &Grammar) -> Set<NonterminalID> {
    let mut nullables: Set<NonterminalID> = grammar
        .productions()
        .filter_map(|(_, p)| p.right().is_empty().then_some(p.left()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (_, production) in grammar.productions() {
            if nullables.contains(&production.left()) {
                continue;
            }
            let body_nullable = production
                .right()
                .iter()
                .all(|symbol| matches!(symbol, SymbolID::N(n) if nullables.contains(n)));
            if body_nullable {
                nullables.insert(production.left());
                changed = true;
            }
        }
    }

    nullables
}

fn first_sets(
    grammar: &Grammar,
    nullables: &Set<NonterminalID>,
) -> Map<NonterminalID, TerminalSet> {
    let mut first = vec![TerminalSet::default(); grammar.nonterminal_count()];

    let mut changed = true;
    while changed {
        changed = false;
        for (_, production) in grammar.productions() {
            let lhs = production.left().index();
            for &symbol in production.right() {
                match symbol {
                    SymbolID::T(t) => {
                        changed |= first[lhs].insert(t);
                        break;
                    }
                    SymbolID::N(n) => {
                        changed |= union_into(&mut first, lhs, n.index());
                        if !nullables.contains(&n) {
                            break;
                        }
                    }
                    SymbolID::Epsilon => {}
                }
            }
        }
    }

    grammar
        .nonterminals()
        .map(|(id, _)| (id, std::mem::take(&mut first[id.index()])))
        .collect()
}

/// `FOLLOW(start) ⊇ {$}`; for every production `A -> α B β`, `FOLLOW(B)`
/// absorbs `FIRST(β) \ {ε}`, and `FOLLOW(A)` when β is nullable or empty.
fn follow_sets(grammar: &Grammar, analysis: &Analysis) -> Map<NonterminalID, TerminalSet> {
    let mut follow = vec![TerminalSet::default(); grammar.nonterminal_count()];
    if let Some(start) = grammar.start_symbol() {
        follow[start.index()].insert(TerminalID::EOI);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (_, production) in grammar.productions() {
            let lhs = production.left().index();
            for (i, &symbol) in production.right().iter().enumerate() {
                let SymbolID::N(b) = symbol else { continue };
                let beta = &production.right()[i + 1..];
                let (beta_first, beta_nullable) = analysis.first_of_sequence(beta);
                for t in beta_first.iter() {
                    changed |= follow[b.index()].insert(t);
                }
                if beta_nullable {
                    changed |= union_into(&mut follow, b.index(), lhs);
                }
            }
        }
    }

    grammar
        .nonterminals()
        .map(|(id, _)| (id, std::mem::take(&mut follow[id.index()])))
        .collect()
}

/// `sets[dst] ∪= sets[src]`, reporting growth.
fn union_into(sets: &mut [TerminalSet], dst: usize, src: usize) -> bool {
    if dst == src {
        return false;
    }
    let (dst, src) = if dst < src {
        let (head, tail) = sets.split_at_mut(src);
        (&mut head[dst], &tail[0])
    } else {
        let (head, tail) = sets.split_at_mut(dst);
        (&mut tail[0], &head[src])
    };
    let before = dst.len();
    dst.union_with(src);
    dst.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenKind;

    /// The LL-style expression grammar with ε-productions:
    ///
    /// ```text
    /// E  -> T E'        T  -> F T'        F -> num | ( E )
    /// E' -> + T E' | ε  T' -> * F T' | ε
    /// ```
    fn ll_expr_grammar() -> Grammar {
        let mut g = Grammar::new();
        let plus = g.intern_terminal("+", TokenKind(1)).unwrap();
        let star = g.intern_terminal("*", TokenKind(2)).unwrap();
        let num = g.intern_terminal("num", TokenKind(3)).unwrap();
        let lparen = g.intern_terminal("(", TokenKind(4)).unwrap();
        let rparen = g.intern_terminal(")", TokenKind(5)).unwrap();

        let e = g.intern_nonterminal("E").unwrap();
        let e1 = g.intern_nonterminal("E'").unwrap();
        let t = g.intern_nonterminal("T").unwrap();
        let t1 = g.intern_nonterminal("T'").unwrap();
        let f = g.intern_nonterminal("F").unwrap();

        g.set_start(e).unwrap();
        g.add_production(e, &[t, e1]).unwrap();
        g.add_production(e1, &[plus, t, e1]).unwrap();
        g.add_production(e1, &[]).unwrap();
        g.add_production(t, &[f, t1]).unwrap();
        g.add_production(t1, &[star, f, t1]).unwrap();
        g.add_production(t1, &[]).unwrap();
        g.add_production(f, &[num]).unwrap();
        g.add_production(f, &[lparen, e, rparen]).unwrap();
        g
    }

    fn terminal_names(grammar: &Grammar, set: &TerminalSet) -> Vec<String> {
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

    #[test]
    fn nullable_set_of_ll_expr() {
        let g = ll_expr_grammar();
        let analysis = g.analysis();
        assert!(analysis.is_nullable(nt(&g, "E'")));
        assert!(analysis.is_nullable(nt(&g, "T'")));
        assert!(!analysis.is_nullable(nt(&g, "E")));
        assert!(!analysis.is_nullable(nt(&g, "T")));
        assert!(!analysis.is_nullable(nt(&g, "F")));
    }

    #[test]
    fn first_sets_of_ll_expr() {
        let g = ll_expr_grammar();
        let analysis = g.analysis();
        assert_eq!(terminal_names(&g, analysis.first(nt(&g, "E"))), ["(", "num"]);
        assert_eq!(terminal_names(&g, analysis.first(nt(&g, "T"))), ["(", "num"]);
        assert_eq!(terminal_names(&g, analysis.first(nt(&g, "F"))), ["(", "num"]);
        assert_eq!(terminal_names(&g, analysis.first(nt(&g, "E'"))), ["+"]);
        assert_eq!(terminal_names(&g, analysis.first(nt(&g, "T'"))), ["*"]);
    }

    #[test]
    fn follow_sets_of_ll_expr() {
        let g = ll_expr_grammar();
        let analysis = g.analysis();
        assert_eq!(
            terminal_names(&g, analysis.follow(nt(&g, "E"))),
            ["$", ")"]
        );
        assert_eq!(
            terminal_names(&g, analysis.follow(nt(&g, "E'"))),
            ["$", ")"]
        );
        assert_eq!(
            terminal_names(&g, analysis.follow(nt(&g, "T"))),
            ["$", ")", "+"]
        );
        assert_eq!(
            terminal_names(&g, analysis.follow(nt(&g, "F"))),
            ["$", ")", "*", "+"]
        );
    }

    #[test]
    fn first_of_production_bodies_is_contained_in_first_of_lhs() {
        let g = ll_expr_grammar();
        let analysis = g.analysis();
        for (_, production) in g.productions() {
            let (body_first, body_nullable) = analysis.first_of_sequence(production.right());
            assert!(body_first.is_subset(analysis.first(production.left())));
            if body_nullable {
                assert!(analysis.is_nullable(production.left()));
            }
        }
    }

    #[test]
    fn first_of_sequence_skips_nullable_prefix() {
        let g = ll_expr_grammar();
        let analysis = g.analysis();
        let e1 = SymbolID::N(nt(&g, "E'"));
        let t1 = SymbolID::N(nt(&g, "T'"));
        let f = SymbolID::N(nt(&g, "F"));

        let (set, nullable) = analysis.first_of_sequence(&[e1, t1, f]);
        assert_eq!(terminal_names(&g, &set), ["(", "*", "+", "num"]);
        assert!(!nullable);

        let (set, nullable) = analysis.first_of_sequence(&[e1, t1]);
        assert_eq!(terminal_names(&g, &set), ["*", "+"]);
        assert!(nullable);

        let (set, nullable) = analysis.first_of_sequence(&[]);
        assert!(set.is_empty());
        assert!(nullable);
    }

    #[test]
    fn follow_of_start_contains_eoi_after_augmentation() {
        let mut g = ll_expr_grammar();
        g.augment().unwrap();
        let analysis = g.analysis();
        let start = g.start_symbol().unwrap();
        assert!(analysis.follow(start).contains(TerminalID::EOI));
        // and FOLLOW(E) inherits it through S' -> E
        assert!(analysis.follow(nt(&g, "E")).contains(TerminalID::EOI));
    }

    #[test]
    fn analysis_is_recomputed_after_mutation() {
        let mut g = Grammar::new();
        let num = g.intern_terminal("num", TokenKind(1)).unwrap();
        let a = g.intern_nonterminal("A").unwrap();
        g.add_production(a, &[num]).unwrap();
        g.set_start(a).unwrap();
        assert!(!g.analysis().is_nullable(nt(&g, "A")));

        g.add_production(a, &[]).unwrap();
        assert!(g.analysis().is_nullable(nt(&g, "A")));
    }
}
