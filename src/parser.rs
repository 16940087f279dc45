//! The table-driven shift/reduce parser.

use crate::grammar::{Grammar, SymbolID, TerminalID, TokenKind};
use crate::lr0::StateID;
use crate::parse_table::{Action, ParseTable};
use crate::Map;
use std::fmt;

/// A lexed token. Coordinates are 1-based. The end-of-input token carries
/// the reserved [`TokenKind::EOF`] kind and the position just past the
/// final real token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    /// The end-of-input sentinel at the given position.
    pub fn eoi(line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::EOF,
            lexeme: String::new(),
            line,
            column,
        }
    }

    pub fn is_eoi(&self) -> bool {
        self.kind == TokenKind::EOF
    }
}

/// A source of tokens. After the last real token the stream keeps yielding
/// end-of-input tokens; `next_token` is total.
pub trait TokenStream {
    fn next_token(&mut self) -> Token;
}

/// A pre-lexed token sequence. Yields the tokens in order, then
/// end-of-input tokens positioned just past the final token, indefinitely.
#[derive(Debug)]
pub struct TokenBuffer {
    tokens: std::vec::IntoIter<Token>,
    eoi_line: u32,
    eoi_column: u32,
}

impl TokenBuffer {
    pub fn new(tokens: Vec<Token>) -> Self {
        let (eoi_line, eoi_column) = tokens
            .last()
            .map(|t| (t.line, t.column + t.lexeme.chars().count() as u32))
            .unwrap_or((1, 1));
        Self {
            tokens: tokens.into_iter(),
            eoi_line,
            eoi_column,
        }
    }
}

impl TokenStream for TokenBuffer {
    fn next_token(&mut self) -> Token {
        self.tokens
            .next()
            .unwrap_or_else(|| Token::eoi(self.eoi_line, self.eoi_column))
    }
}

/// A node of the concrete parse tree. Terminal nodes carry the matched
/// lexeme and have no children; nonterminal nodes hold their children in
/// left-to-right source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    symbol: SymbolID,
    lexeme: Option<String>,
    children: Vec<ParseNode>,
}

impl ParseNode {
    fn terminal(symbol: SymbolID, lexeme: String) -> Self {
        Self {
            symbol,
            lexeme: Some(lexeme),
            children: Vec::new(),
        }
    }

    fn nonterminal(symbol: SymbolID, children: Vec<ParseNode>) -> Self {
        Self {
            symbol,
            lexeme: None,
            children,
        }
    }

    pub fn symbol(&self) -> SymbolID {
        self.symbol
    }

    pub fn lexeme(&self) -> Option<&str> {
        self.lexeme.as_deref()
    }

    pub fn children(&self) -> &[ParseNode] {
        &self.children[..]
    }

    /// The left-to-right terminal lexemes of the subtree.
    pub fn terminal_yield(&self) -> Vec<&str> {
        let mut lexemes = Vec::new();
        self.collect_yield(&mut lexemes);
        lexemes
    }

    fn collect_yield<'a>(&'a self, lexemes: &mut Vec<&'a str>) {
        match &self.lexeme {
            Some(lexeme) => lexemes.push(lexeme),
            None => {
                for child in &self.children {
                    child.collect_yield(lexemes);
                }
            }
        }
    }

    /// Render the subtree with two-space indentation per level.
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        NodeDisplay {
            grammar,
            node: self,
            indent: 0,
        }
    }
}

struct NodeDisplay<'g> {
    grammar: &'g Grammar,
    node: &'g ParseNode,
    indent: usize,
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.indent {
            f.write_str("  ")?;
        }
        let name = self.grammar.symbol_name(self.node.symbol);
        f.write_str(name)?;
        if let Some(lexeme) = &self.node.lexeme {
            if lexeme != name {
                write!(f, " (\"{}\")", lexeme)?;
            }
        }
        for child in &self.node.children {
            writeln!(f)?;
            fmt::Display::fmt(
                &NodeDisplay {
                    grammar: self.grammar,
                    node: child,
                    indent: self.indent + 1,
                },
                f,
            )?;
        }
        Ok(())
    }
}

/// A failed parse. Every variant carries the 1-based source position the
/// driver was looking at when it gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The token's kind matches no terminal of the grammar.
    #[error("Parse error at line {line}, column {column}: unknown token `{lexeme}`")]
    UnknownToken {
        lexeme: String,
        line: u32,
        column: u32,
    },

    /// The action table holds `Error` for the current (state, terminal).
    #[error(
        "Parse error at line {line}, column {column}: unexpected token `{lexeme}`. Expected: {}",
        .expected.join(", ")
    )]
    UnexpectedToken {
        lexeme: String,
        line: u32,
        column: u32,
        /// Names of the terminals with a non-error action, name-sorted with
        /// `$` last.
        expected: Vec<String>,
    },

    /// A reduction needed more frames than the stack holds; indicates a
    /// corrupt table.
    #[error(
        "Parse error at line {line}, column {column}: stack underflow while reducing production {production}"
    )]
    StackUnderflow {
        production: usize,
        line: u32,
        column: u32,
    },

    /// No goto entry after a reduction; indicates a corrupt table.
    #[error(
        "Parse error at line {line}, column {column}: no goto from state {state} on `{nonterminal}`"
    )]
    MissingGoto {
        state: u16,
        nonterminal: String,
        line: u32,
        column: u32,
    },

    /// Accept fired with an unexpected stack layout; indicates a corrupt
    /// table.
    #[error("Parse error at line {line}, column {column}: invalid stack layout at accept")]
    InvalidAccept { line: u32, column: u32 },
}

impl ParseError {
    /// The (line, column) the error refers to.
    pub fn position(&self) -> (u32, u32) {
        match *self {
            Self::UnknownToken { line, column, .. }
            | Self::UnexpectedToken { line, column, .. }
            | Self::StackUnderflow { line, column, .. }
            | Self::MissingGoto { line, column, .. }
            | Self::InvalidAccept { line, column } => (line, column),
        }
    }
}

struct Frame {
    state: StateID,
    node: Option<ParseNode>,
}

/// Drives a built table over a token stream and produces parse trees. The
/// parser itself is stateless across invocations; a `(Grammar, ParseTable)`
/// pair can serve concurrent parses from multiple threads.
#[derive(Debug, Copy, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    table: &'g ParseTable,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar, table: &'g ParseTable) -> Self {
        Self { grammar, table }
    }

    /// Recognize one sentence and build its parse tree, rooted at the user
    /// start symbol.
    pub fn parse<S>(&self, tokens: &mut S) -> Result<ParseNode, ParseError>
    where
        S: TokenStream,
    {
        let mut by_kind: Map<TokenKind, TerminalID> = Map::default();
        for (id, data) in self.grammar.terminals() {
            if id != TerminalID::EOI {
                by_kind.entry(data.kind()).or_insert(id);
            }
        }

        let mut stack = vec![Frame {
            state: StateID::INITIAL,
            node: None,
        }];
        let mut token = tokens.next_token();

        loop {
            let state = stack.last().expect("the initial frame is never popped").state;
            let terminal = if token.is_eoi() {
                TerminalID::EOI
            } else {
                match by_kind.get(&token.kind) {
                    Some(&t) => t,
                    None => {
                        return Err(ParseError::UnknownToken {
                            lexeme: token.lexeme,
                            line: token.line,
                            column: token.column,
                        })
                    }
                }
            };

            match self.table.action(state, terminal) {
                Action::Shift(next) => {
                    let node = ParseNode::terminal(SymbolID::T(terminal), token.lexeme);
                    stack.push(Frame {
                        state: next,
                        node: Some(node),
                    });
                    token = tokens.next_token();
                }

                Action::Reduce(production) => {
                    let p = self.grammar.production(production);
                    let arity = p.right().len();
                    if stack.len() < arity + 1 {
                        return Err(ParseError::StackUnderflow {
                            production: production.index(),
                            line: token.line,
                            column: token.column,
                        });
                    }
                    let mut children = Vec::with_capacity(arity);
                    for _ in 0..arity {
                        let frame = stack.pop().expect("length checked above");
                        children.push(frame.node.expect("only the initial frame lacks a node"));
                    }
                    children.reverse();

                    let lhs = p.left();
                    let state = stack.last().expect("the initial frame remains").state;
                    let Some(target) = self.table.goto(state, lhs) else {
                        return Err(ParseError::MissingGoto {
                            state: state.raw(),
                            nonterminal: self.grammar.nonterminal(lhs).name().to_owned(),
                            line: token.line,
                            column: token.column,
                        });
                    };
                    stack.push(Frame {
                        state: target,
                        node: Some(ParseNode::nonterminal(SymbolID::N(lhs), children)),
                    });
                }

                Action::Accept => {
                    let start = self.grammar.user_start();
                    if stack.len() != 2 {
                        return Err(ParseError::InvalidAccept {
                            line: token.line,
                            column: token.column,
                        });
                    }
                    let top = stack.pop().expect("length checked above");
                    return match (top.node, start) {
                        (Some(node), Some(start)) if node.symbol() == SymbolID::N(start) => {
                            Ok(node)
                        }
                        _ => Err(ParseError::InvalidAccept {
                            line: token.line,
                            column: token.column,
                        }),
                    };
                }

                Action::Error => {
                    let mut expected: Vec<String> = self
                        .table
                        .expected_terminals(state)
                        .into_iter()
                        .map(|t| self.grammar.terminal(t).name().to_owned())
                        .collect();
                    expected.sort_by(|a, b| (a.as_str() == "$", a).cmp(&(b.as_str() == "$", b)));
                    let lexeme = if token.is_eoi() {
                        "$".to_owned()
                    } else {
                        token.lexeme
                    };
                    return Err(ParseError::UnexpectedToken {
                        lexeme,
                        line: token.line,
                        column: token.column,
                        expected,
                    });
                }
            }
        }
    }
}

/// Single-shot convenience for [`Parser::parse`].
pub fn parse<S>(
    grammar: &Grammar,
    table: &ParseTable,
    tokens: &mut S,
) -> Result<ParseNode, ParseError>
where
    S: TokenStream,
{
    Parser::new(grammar, table).parse(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_buffer_yields_eoi_indefinitely() {
        let mut stream = TokenBuffer::new(vec![Token::new(TokenKind(1), "ab", 1, 1)]);
        assert_eq!(stream.next_token().lexeme, "ab");
        let eoi = stream.next_token();
        assert!(eoi.is_eoi());
        assert_eq!((eoi.line, eoi.column), (1, 3));
        assert_eq!(stream.next_token(), eoi);
        assert_eq!(stream.next_token(), eoi);
    }

    #[test]
    fn empty_token_buffer_starts_at_origin() {
        let mut stream = TokenBuffer::new(Vec::new());
        let eoi = stream.next_token();
        assert!(eoi.is_eoi());
        assert_eq!((eoi.line, eoi.column), (1, 1));
    }
}
