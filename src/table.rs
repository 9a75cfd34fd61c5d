//! Flat transition tables: the persisted form of an automaton.
//!
//! The text form is line oriented:
//!
//! ```text
//! automaton "name" dfa
//! alphabet 'a' 'b'
//! state "q0" initial
//!   'a' -> "q1"
//! state "q1" accepting
//!   'b' -> "q1"
//! end
//! ```
//!
//! Epsilon is written as a bare `ε`. Inside quotes `\\`, `\'`, `\"`, `\n`,
//! `\t` and `\r` are escapes.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, none_of},
    combinator::{all_consuming, map, value},
    multi::{many0, many1},
    sequence::{delimited, preceded, separated_pair, tuple},
    IResult,
};

use crate::{
    automaton::{symbol_label, Automaton, AutomatonKind, State, Symbol, EPSILON_MARKER},
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub state: String,
    pub transitions: BTreeMap<Symbol, Vec<String>>,
    pub accepting: bool,
    pub initial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    pub name: String,
    pub kind: AutomatonKind,
    pub alphabet: Vec<char>,
    pub rows: Vec<Row>,
}

impl TransitionTable {
    /// One row per state, in state order.
    pub fn from_automaton(automaton: &Automaton) -> TransitionTable {
        let rows = automaton
            .states()
            .iter()
            .map(|state| Row {
                state: state.name().to_string(),
                transitions: state
                    .transitions()
                    .iter()
                    .map(|(&symbol, targets)| {
                        let names = targets
                            .iter()
                            .map(|&t| automaton.state(t).name().to_string())
                            .collect();
                        (symbol, names)
                    })
                    .collect(),
                accepting: state.is_accepting(),
                initial: state.is_initial(),
            })
            .collect();
        TransitionTable {
            name: automaton.name().to_string(),
            kind: automaton.kind(),
            alphabet: automaton.alphabet().to_vec(),
            rows,
        }
    }

    /// Rebuilds an automaton: first every state, then every transition by name.
    pub fn to_automaton(&self) -> Result<Automaton> {
        let mut automaton = Automaton::new(self.name.clone(), self.kind);
        for &c in &self.alphabet {
            automaton.add_symbol(c);
        }
        for row in &self.rows {
            if automaton.find_state(&row.state).is_some() {
                return Err(Error::invalid(
                    &self.name,
                    format!("state `{}` appears twice", row.state),
                ));
            }
            automaton.add_state(State::new(row.state.clone()).accepting(row.accepting));
        }
        let initial_rows = self.rows.iter().filter(|row| row.initial).count();
        if initial_rows > 1 {
            return Err(Error::invalid(
                &self.name,
                format!("{} initial states", initial_rows),
            ));
        }
        for (id, row) in self.rows.iter().enumerate() {
            if row.initial {
                automaton.set_initial(id)?;
            }
            for (&symbol, names) in &row.transitions {
                let mut targets = Vec::with_capacity(names.len());
                for name in names {
                    let target =
                        automaton
                            .find_state(name)
                            .ok_or_else(|| Error::DanglingReference {
                                state: row.state.clone(),
                                target: name.clone(),
                            })?;
                    targets.push(target);
                }
                automaton.add_transition(id, symbol, &targets)?;
            }
        }
        automaton.validate()?;
        Ok(automaton)
    }

    /// Parses the text form. Anything malformed counts as a missing automaton.
    pub fn parse(input: &str) -> Result<TransitionTable> {
        match all_consuming(table)(input) {
            Ok((_, table)) => Ok(table),
            Err(e) => Err(Error::NotFound {
                key: header_name(input).unwrap_or_default(),
                reason: format!("corrupt table: {}", e),
            }),
        }
    }

    /// Human-oriented grid with one column per symbol.
    pub fn grid(&self) -> String {
        let mut symbols: Vec<Symbol> = self
            .rows
            .iter()
            .flat_map(|row| row.transitions.keys().copied())
            .filter(|symbol| symbol.is_none())
            .unique()
            .collect();
        symbols.extend(self.alphabet.iter().map(|&c| Some(c)));

        let mut lines: Vec<Vec<String>> = vec![];
        let mut header = vec!["".to_string()];
        header.extend(symbols.iter().map(|&s| symbol_label(s)));
        lines.push(header);
        for row in &self.rows {
            let mut marks = String::new();
            if row.initial {
                marks.push_str("->");
            }
            if row.accepting {
                marks.push('*');
            }
            let mut line = vec![format!("{}{}", marks, row.state)];
            line.extend(symbols.iter().map(|symbol| match row.transitions.get(symbol) {
                Some(targets) => targets.join(","),
                None => "-".to_string(),
            }));
            lines.push(line);
        }

        let widths: Vec<usize> = (0..symbols.len() + 1)
            .map(|col| {
                lines
                    .iter()
                    .map(|line| line[col].chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let mut out = format!("Table: {}\n", self.name);
        for line in &lines {
            let cells = line
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
                .join(" | ");
            out.push_str(cells.trim_end());
            out.push('\n');
        }
        out
    }
}

impl From<&Automaton> for TransitionTable {
    fn from(automaton: &Automaton) -> Self {
        TransitionTable::from_automaton(automaton)
    }
}

fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn write_symbol(symbol: Symbol) -> String {
    match symbol {
        Some(c) => format!("'{}'", escape(&c.to_string(), '\'')),
        None => EPSILON_MARKER.to_string(),
    }
}

fn write_name(name: &str) -> String {
    format!("\"{}\"", escape(name, '"'))
}

impl fmt::Display for TransitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "automaton {} {}", write_name(&self.name), self.kind)?;
        writeln!(
            f,
            "alphabet{}",
            self.alphabet
                .iter()
                .map(|&c| format!(" {}", write_symbol(Some(c))))
                .join("")
        )?;
        for row in &self.rows {
            write!(f, "state {}", write_name(&row.state))?;
            if row.initial {
                write!(f, " initial")?;
            }
            if row.accepting {
                write!(f, " accepting")?;
            }
            writeln!(f)?;
            for (&symbol, targets) in &row.transitions {
                writeln!(
                    f,
                    "  {} -> {}",
                    write_symbol(symbol),
                    targets.iter().map(|t| write_name(t)).join(" ")
                )?;
            }
        }
        writeln!(f, "end")
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            value('\\', char('\\')),
            value('\'', char('\'')),
            value('"', char('"')),
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
        )),
    )(input)
}

fn quoted_name(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((escaped_char, none_of("\\\"")))),
            char('"'),
        ),
        |chars: Vec<char>| chars.into_iter().collect(),
    )(input)
}

fn symbol(input: &str) -> IResult<&str, Symbol> {
    alt((
        value(None, char(EPSILON_MARKER)),
        map(
            delimited(char('\''), alt((escaped_char, none_of("\\'"))), char('\'')),
            Some,
        ),
    ))(input)
}

fn kind(input: &str) -> IResult<&str, AutomatonKind> {
    alt((
        value(AutomatonKind::Nfa, tag("nfa")),
        value(AutomatonKind::Dfa, tag("dfa")),
    ))(input)
}

#[derive(Clone, Copy)]
enum Flag {
    Initial,
    Accepting,
}

fn transition(input: &str) -> IResult<&str, (Symbol, Vec<String>)> {
    separated_pair(ws(symbol), tag("->"), many1(ws(quoted_name)))(input)
}

fn row(input: &str) -> IResult<&str, Row> {
    let (input, (_, state, flags, transitions)) = tuple((
        ws(tag("state")),
        ws(quoted_name),
        many0(ws(alt((
            value(Flag::Initial, tag("initial")),
            value(Flag::Accepting, tag("accepting")),
        )))),
        many0(transition),
    ))(input)?;
    let mut row = Row {
        state,
        transitions: BTreeMap::new(),
        accepting: false,
        initial: false,
    };
    for flag in flags {
        match flag {
            Flag::Initial => row.initial = true,
            Flag::Accepting => row.accepting = true,
        }
    }
    for (symbol, targets) in transitions {
        let entry = row.transitions.entry(symbol).or_insert_with(Vec::new);
        for target in targets {
            if !entry.contains(&target) {
                entry.push(target);
            }
        }
    }
    Ok((input, row))
}

fn table(input: &str) -> IResult<&str, TransitionTable> {
    let (input, (_, name, kind, _, alphabet, rows, _)) = tuple((
        ws(tag("automaton")),
        ws(quoted_name),
        ws(kind),
        ws(tag("alphabet")),
        many0(ws(symbol)),
        many0(row),
        ws(tag("end")),
    ))(input)?;
    Ok((
        input,
        TransitionTable {
            name,
            kind,
            alphabet: alphabet.into_iter().flatten().collect(),
            rows,
        },
    ))
}

fn header_name(input: &str) -> Option<String> {
    preceded(ws(tag("automaton")), quoted_name)(input)
        .ok()
        .map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{automaton::EPSILON, dfa, nfa, postfix, rename};

    fn pipeline(expr: &str) -> (Automaton, Automaton) {
        let mut nfa = nfa::from_postfix("nfa", &postfix::compile(expr).unwrap()).unwrap();
        rename::rename_states(&mut nfa, "e").unwrap();
        let mut dfa = dfa::determinize(&nfa, "dfa").unwrap();
        rename::rename_states(&mut dfa, "q").unwrap();
        (nfa, dfa)
    }

    #[test]
    fn test_encoding_rows() {
        let (_, dfa) = pipeline("ab");
        let table = TransitionTable::from_automaton(&dfa);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].state, "q0");
        assert!(table.rows[0].initial);
        assert_eq!(table.rows[0].transitions[&Some('a')], vec!["q1".to_string()]);
        assert!(table.rows[2].accepting);
        assert!(table.rows[2].transitions.is_empty());
    }

    #[test]
    fn test_encoding_is_stable() {
        let (_, dfa) = pipeline("(a|b)*abb");
        let first = TransitionTable::from_automaton(&dfa);
        let second = TransitionTable::from_automaton(&dfa);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_round_trip_preserves_language() {
        for expr in ["a", "ab|a", "(a|b)*", "a+", "ε", "(a|b)*abb"] {
            let (_, dfa) = pipeline(expr);
            let text = TransitionTable::from_automaton(&dfa).to_string();
            let back = TransitionTable::parse(&text).unwrap().to_automaton().unwrap();
            assert_eq!(back.kind(), AutomatonKind::Dfa);
            assert_eq!(back.alphabet(), dfa.alphabet());
            for word in crate::dfa::words(&['a', 'b'], 5) {
                assert_eq!(back.accepts(&word), dfa.accepts(&word), "{} on {:?}", expr, word);
            }
        }
    }

    #[test]
    fn test_empty_alphabet_round_trip() {
        let (_, dfa) = pipeline("ε");
        let table = TransitionTable::from_automaton(&dfa);
        assert!(table.alphabet.is_empty());
        let back = TransitionTable::parse(&table.to_string())
            .unwrap()
            .to_automaton()
            .unwrap();
        assert!(back.accepts(""));
        assert!(!back.accepts("a"));
    }

    #[test]
    fn test_nfa_round_trip_keeps_epsilon_and_multiple_targets() {
        let (nfa, _) = pipeline("a|b");
        let table = TransitionTable::from_automaton(&nfa);
        let text = table.to_string();
        assert!(text.contains("ε -> "));
        let parsed = TransitionTable::parse(&text).unwrap();
        assert_eq!(parsed, table);
        let back = parsed.to_automaton().unwrap();
        let initial = back.initial_state().unwrap();
        assert_eq!(back.state(initial).targets(EPSILON).len(), 2);
        assert_eq!(back, nfa);
    }

    #[test]
    fn test_text_escapes() {
        let mut aut = Automaton::new("odd \"name\"", AutomatonKind::Dfa);
        aut.add_symbol('\'');
        aut.add_symbol(' ');
        let s0 = aut.add_state(State::new("s 0"));
        let s1 = aut.add_state(State::new("s\\1").accepting(true));
        aut.set_initial(s0).unwrap();
        aut.add_transition(s0, Some('\''), &[s1]).unwrap();
        aut.add_transition(s1, Some(' '), &[s0]).unwrap();
        let table = TransitionTable::from_automaton(&aut);
        let parsed = TransitionTable::parse(&table.to_string()).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.to_automaton().unwrap(), aut);
    }

    #[test]
    fn test_dangling_reference() {
        let (_, dfa) = pipeline("ab");
        let mut table = TransitionTable::from_automaton(&dfa);
        table.rows[1]
            .transitions
            .insert(Some('b'), vec!["ghost".to_string()]);
        match table.to_automaton() {
            Err(Error::DanglingReference { state, target }) => {
                assert_eq!(state, "q1");
                assert_eq!(target, "ghost");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tables() {
        let (_, dfa) = pipeline("ab");
        let mut twice = TransitionTable::from_automaton(&dfa);
        twice.rows[1].state = "q0".to_string();
        assert!(matches!(
            twice.to_automaton(),
            Err(Error::InvalidAutomaton { .. })
        ));

        let mut two_initial = TransitionTable::from_automaton(&dfa);
        two_initial.rows[1].initial = true;
        assert!(matches!(
            two_initial.to_automaton(),
            Err(Error::InvalidAutomaton { .. })
        ));

        let mut nondeterministic = TransitionTable::from_automaton(&dfa);
        nondeterministic.rows[0]
            .transitions
            .insert(Some('a'), vec!["q1".to_string(), "qf".to_string()]);
        assert!(matches!(
            nondeterministic.to_automaton(),
            Err(Error::InvalidAutomaton { .. })
        ));
    }

    #[test]
    fn test_corrupt_text_is_not_found() {
        let text = "automaton \"broken\" dfa\nalphabet 'a'\nstate \"q0\" initial\n  'a' ->\nend\n";
        match TransitionTable::parse(text) {
            Err(Error::NotFound { key, .. }) => assert_eq!(key, "broken"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            TransitionTable::parse(""),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_grid() {
        let (_, dfa) = pipeline("ab");
        let grid = TransitionTable::from_automaton(&dfa).grid();
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines[0], "Table: dfa");
        assert_eq!(lines[1], "     | a  | b");
        assert_eq!(lines[2], "->q0 | q1 | -");
        assert_eq!(lines[3], "q1   | -  | qf");
        assert_eq!(lines[4], "*qf  | -  | -");
    }
}
