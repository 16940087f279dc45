//! Action/goto table construction, conflict capture, and table display.

use crate::grammar::{Grammar, GrammarIssue, NonterminalID, ProductionID, TerminalID};
use crate::lalr;
use crate::lr0::{Automaton, StateID};
use crate::Map;
use std::fmt;

/// The move the automaton performs in a state on a lookahead terminal.
/// `Error` is the implicit value of every unpopulated cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(StateID),
    Reduce(ProductionID),
    Accept,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shift(state) => write!(f, "s{}", state),
            Action::Reduce(production) => write!(f, "r{}", production),
            Action::Accept => f.write_str("acc"),
            Action::Error => f.write_str("err"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShiftReduce => f.write_str("shift/reduce"),
            Self::ReduceReduce => f.write_str("reduce/reduce"),
        }
    }
}

/// Two incompatible actions assigned to one (state, terminal) cell. The
/// first assignment stays in the table; `new` is the rejected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    pub terminal: String,
    pub existing: Action,
    pub new: Action,
    pub kind: ConflictKind,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state {} on terminal {}: existing={}, new={}",
            self.state, self.terminal, self.existing, self.new
        )
    }
}

#[derive(Debug)]
struct Row {
    actions: Map<TerminalID, Action>,
    gotos: Map<NonterminalID, StateID>,
}

/// The finished action/goto table. Immutable once built; may be shared
/// across threads together with its grammar for concurrent parses.
#[derive(Debug)]
pub struct ParseTable {
    rows: Map<StateID, Row>,
    conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("incomplete grammar: {}", issue_summary(.0))]
    IncompleteGrammar(Vec<GrammarIssue>),
}

impl BuildError {
    pub fn issues(&self) -> &[GrammarIssue] {
        match self {
            Self::IncompleteGrammar(issues) => issues,
        }
    }
}

fn issue_summary(issues: &[GrammarIssue]) -> String {
    let descriptions: Vec<String> = issues.iter().map(|issue| issue.to_string()).collect();
    descriptions.join("; ")
}

/// Build the LALR(1) table of an augmented grammar.
///
/// The table is produced even when the grammar is not LALR(1); conflicting
/// assignments keep the first action and are recorded on the table. Fails
/// only on an incomplete grammar: unaugmented, missing its start symbol,
/// empty, or referencing undefined nonterminals.
pub fn build(grammar: &Grammar) -> Result<ParseTable, BuildError> {
    let mut issues = grammar.validate();
    if !grammar.is_augmented() {
        issues.push(GrammarIssue::NotAugmented);
    }
    if !issues.is_empty() {
        return Err(BuildError::IncompleteGrammar(issues));
    }

    let automaton = Automaton::build(grammar);
    tracing::debug!(states = automaton.len(), "canonical LR(0) collection built");
    let lookaheads = lalr::compute(grammar, &automaton);

    let mut rows = Map::default();
    let mut conflicts = Vec::new();
    for (id, state) in automaton.states() {
        let mut row = Row {
            actions: Map::default(),
            gotos: Map::default(),
        };

        // Shift actions first, in terminal-name order.
        let mut shifts: Vec<(TerminalID, StateID)> =
            state.shifts().iter().map(|(&t, &to)| (t, to)).collect();
        shifts.sort_by(|a, b| grammar.terminal(a.0).name().cmp(grammar.terminal(b.0).name()));
        for (terminal, target) in shifts {
            set_action(
                grammar,
                &mut row,
                &mut conflicts,
                id,
                terminal,
                Action::Shift(target),
            );
        }

        // Then reductions, in production order; items are sorted by
        // (production, dot), so the augmented item comes first and its
        // Accept cell wins any conflict on `$`.
        for item in state.items() {
            if !item.is_complete(grammar) {
                continue;
            }
            if item.production == ProductionID::AUGMENT {
                set_action(
                    grammar,
                    &mut row,
                    &mut conflicts,
                    id,
                    TerminalID::EOI,
                    Action::Accept,
                );
                continue;
            }
            let Some(set) = lookaheads.get(id, item.production) else {
                continue;
            };
            let mut terminals: Vec<TerminalID> = set.iter().collect();
            terminals.sort_by(|&a, &b| {
                (a == TerminalID::EOI, grammar.terminal(a).name())
                    .cmp(&(b == TerminalID::EOI, grammar.terminal(b).name()))
            });
            for terminal in terminals {
                set_action(
                    grammar,
                    &mut row,
                    &mut conflicts,
                    id,
                    terminal,
                    Action::Reduce(item.production),
                );
            }
        }

        for (&n, &target) in state.gotos() {
            row.gotos.insert(n, target);
        }
        rows.insert(id, row);
    }

    if conflicts.is_empty() {
        tracing::debug!("table built without conflicts");
    } else {
        tracing::debug!(count = conflicts.len(), "table built with conflicts");
    }
    Ok(ParseTable { rows, conflicts })
}

/// First assignment wins; a differing reassignment is recorded as a
/// conflict and dropped.
fn set_action(
    grammar: &Grammar,
    row: &mut Row,
    conflicts: &mut Vec<Conflict>,
    state: StateID,
    terminal: TerminalID,
    action: Action,
) {
    match row.actions.get(&terminal) {
        Some(&existing) if existing != action => {
            conflicts.push(Conflict {
                state,
                terminal: grammar.terminal(terminal).name().to_owned(),
                existing,
                new: action,
                kind: classify(existing, action),
            });
        }
        Some(_) => {}
        None => {
            row.actions.insert(terminal, action);
        }
    }
}

fn classify(existing: Action, new: Action) -> ConflictKind {
    match (existing, new) {
        (Action::Shift(_), _) | (_, Action::Shift(_)) => ConflictKind::ShiftReduce,
        _ => ConflictKind::ReduceReduce,
    }
}

impl ParseTable {
    /// The action for `(state, terminal)`; unpopulated cells are `Error`.
    pub fn action(&self, state: StateID, terminal: TerminalID) -> Action {
        self.rows
            .get(&state)
            .and_then(|row| row.actions.get(&terminal).copied())
            .unwrap_or(Action::Error)
    }

    /// The goto target for `(state, nonterminal)`; absence is an error at
    /// parse time.
    pub fn goto(&self, state: StateID, nonterminal: NonterminalID) -> Option<StateID> {
        self.rows
            .get(&state)
            .and_then(|row| row.gotos.get(&nonterminal).copied())
    }

    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    /// The terminals with a non-`Error` action in `state`.
    pub fn expected_terminals(&self, state: StateID) -> Vec<TerminalID> {
        self.rows
            .get(&state)
            .map(|row| row.actions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the grammar failed to be LALR(1).
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Render the table with one row per state: terminal (action) columns
    /// first, then nonterminal (goto) columns, both in name order with `$`
    /// last and the augmented start omitted.
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        TableDisplay {
            grammar,
            table: self,
        }
    }

    /// Render the conflict list, one line per conflict.
    pub fn display_conflicts(&self) -> impl fmt::Display + '_ {
        ConflictsDisplay { table: self }
    }
}

struct TableDisplay<'g> {
    grammar: &'g Grammar,
    table: &'g ParseTable,
}

impl TableDisplay<'_> {
    fn terminal_columns(&self) -> Vec<TerminalID> {
        let mut columns: Vec<TerminalID> = self
            .grammar
            .terminals()
            .map(|(id, _)| id)
            .filter(|&id| id != TerminalID::EOI)
            .collect();
        columns.sort_by(|&a, &b| {
            self.grammar
                .terminal(a)
                .name()
                .cmp(self.grammar.terminal(b).name())
        });
        columns.push(TerminalID::EOI);
        columns
    }

    fn nonterminal_columns(&self) -> Vec<NonterminalID> {
        let mut columns: Vec<NonterminalID> = self
            .grammar
            .nonterminals()
            .filter(|(_, data)| !data.is_augmented_start())
            .map(|(id, _)| id)
            .collect();
        columns.sort_by(|&a, &b| {
            self.grammar
                .nonterminal(a)
                .name()
                .cmp(self.grammar.nonterminal(b).name())
        });
        columns
    }
}

impl fmt::Display for TableDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminals = self.terminal_columns();
        let nonterminals = self.nonterminal_columns();

        write!(f, "{:<6} |", "state")?;
        for &t in &terminals {
            write!(f, " {:>6}", self.grammar.terminal(t).name())?;
        }
        write!(f, " |")?;
        for &n in &nonterminals {
            write!(f, " {:>6}", self.grammar.nonterminal(n).name())?;
        }
        writeln!(f)?;

        for &state in self.table.rows.keys() {
            write!(f, "{:<6} |", state)?;
            for &t in &terminals {
                match self.table.action(state, t) {
                    Action::Error => write!(f, " {:>6}", "")?,
                    action => write!(f, " {:>6}", action.to_string())?,
                }
            }
            write!(f, " |")?;
            for &n in &nonterminals {
                match self.table.goto(state, n) {
                    Some(target) => write!(f, " {:>6}", target)?,
                    None => write!(f, " {:>6}", "")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

struct ConflictsDisplay<'t> {
    table: &'t ParseTable,
}

impl fmt::Display for ConflictsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.conflicts.is_empty() {
            return writeln!(f, "no conflicts");
        }
        for conflict in &self.table.conflicts {
            writeln!(f, "{}", conflict)?;
        }
        Ok(())
    }
}
