use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};

use itertools::Itertools;

use crate::error::{Error, Result};

pub type StateId = usize;

/// A transition label. `None` is the epsilon symbol and never appears in an alphabet.
pub type Symbol = Option<char>;

pub const EPSILON: Symbol = None;

/// Character standing for the empty string in regexes, tables and dumps.
pub const EPSILON_MARKER: char = 'ε';

/// Display form of a symbol. A literal `ε` is shown escaped so it cannot be
/// mistaken for epsilon.
pub fn symbol_label(symbol: Symbol) -> String {
    match symbol {
        Some(c) if c == EPSILON_MARKER => format!("\\{}", c),
        Some(c) => c.to_string(),
        None => EPSILON_MARKER.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomatonKind {
    Nfa,
    Dfa,
}

impl fmt::Display for AutomatonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomatonKind::Nfa => write!(f, "nfa"),
            AutomatonKind::Dfa => write!(f, "dfa"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    name: String,
    transitions: BTreeMap<Symbol, Vec<StateId>>,
    accepting: bool,
    initial: bool,
}

impl State {
    pub fn new(name: impl Into<String>) -> State {
        State {
            name: name.into(),
            transitions: BTreeMap::new(),
            accepting: false,
            initial: false,
        }
    }

    pub fn accepting(mut self, accepting: bool) -> State {
        self.accepting = accepting;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Transitions keyed by symbol; epsilon sorts first.
    pub fn transitions(&self) -> &BTreeMap<Symbol, Vec<StateId>> {
        &self.transitions
    }

    /// States reached on `symbol`, empty when there is no such transition.
    pub fn targets(&self, symbol: Symbol) -> &[StateId] {
        self.transitions
            .get(&symbol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub(crate) fn set_initial(&mut self, initial: bool) {
        self.initial = initial;
    }

    fn targets_of_any(&self) -> impl Iterator<Item = StateId> + '_ {
        self.transitions.values().flatten().copied()
    }

    // never leaves an empty target list behind
    fn merge_transition(&mut self, symbol: Symbol, targets: &[StateId]) {
        if targets.is_empty() {
            return;
        }
        let entry = self.transitions.entry(symbol).or_default();
        for &target in targets {
            if !entry.contains(&target) {
                entry.push(target);
            }
        }
    }
}

/// An automaton owning its states. Transitions refer to states by their index
/// in this automaton, so a state can never be shared between two automata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    name: String,
    kind: AutomatonKind,
    states: Vec<State>,
    alphabet: Vec<char>,
}

impl Automaton {
    pub fn new(name: impl Into<String>, kind: AutomatonKind) -> Automaton {
        Automaton {
            name: name.into(),
            kind,
            states: vec![],
            alphabet: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AutomatonKind {
        self.kind
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Panics when `id` is out of range; see `get` for the checked form.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn get(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    /// Declared alphabet in insertion order.
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn in_alphabet(&self, symbol: char) -> bool {
        self.alphabet.contains(&symbol)
    }

    /// Returns false when the symbol was already declared.
    pub fn add_symbol(&mut self, symbol: char) -> bool {
        if self.in_alphabet(symbol) {
            return false;
        }
        self.alphabet.push(symbol);
        true
    }

    /// Adds a state and returns its id. An initial state takes the flag away
    /// from the previous holder; transitions carried by `state` are dropped.
    pub fn add_state(&mut self, mut state: State) -> StateId {
        let initial = state.initial;
        state.initial = false;
        state.transitions.clear();
        let id = self.states.len();
        self.states.push(state);
        if initial {
            self.mark_initial(id);
        }
        id
    }

    pub fn add_states(&mut self, states: impl IntoIterator<Item = State>) -> Vec<StateId> {
        states
            .into_iter()
            .map(|state| self.add_state(state))
            .collect()
    }

    /// Removes a state nobody else points at. Ids above `id` shift down by one.
    /// The initial state can only go once it is the last state left.
    pub fn remove_state(&mut self, id: StateId) -> Result<State> {
        self.check_id(id)?;
        if self.states[id].initial && self.states.len() > 1 {
            return Err(Error::invalid(
                &self.name,
                format!(
                    "state `{}` is initial; move the flag before removing it",
                    self.states[id].name
                ),
            ));
        }
        if let Some(holder) = self
            .states
            .iter()
            .enumerate()
            .find(|(other, state)| *other != id && state.targets_of_any().any(|t| t == id))
            .map(|(_, state)| state)
        {
            return Err(Error::DanglingReference {
                state: holder.name.clone(),
                target: self.states[id].name.clone(),
            });
        }
        let removed = self.states.remove(id);
        for state in self.states.iter_mut() {
            for targets in state.transitions.values_mut() {
                for target in targets.iter_mut() {
                    if *target > id {
                        *target -= 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Looks a state up by name, scanning the whole collection.
    pub fn find_state(&self, name: &str) -> Option<StateId> {
        let mut found = None;
        for (id, state) in self.states.iter().enumerate() {
            if found.is_none() && state.name == name {
                found = Some(id);
            }
        }
        found
    }

    pub fn accepting_states(&self) -> Vec<StateId> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.accepting)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn initial_state(&self) -> Option<StateId> {
        self.states.iter().position(|state| state.initial)
    }

    /// Makes `id` the only initial state. A bad id leaves the flags untouched.
    pub fn set_initial(&mut self, id: StateId) -> Result<()> {
        self.check_id(id)?;
        self.mark_initial(id);
        Ok(())
    }

    fn mark_initial(&mut self, id: StateId) {
        for state in self.states.iter_mut() {
            state.set_initial(false);
        }
        self.states[id].set_initial(true);
    }

    pub fn set_accepting(&mut self, id: StateId, accepting: bool) -> Result<()> {
        self.check_id(id)?;
        self.states[id].set_accepting(accepting);
        Ok(())
    }

    pub fn set_state_name(&mut self, id: StateId, name: impl Into<String>) -> Result<()> {
        self.check_id(id)?;
        self.states[id].set_name(name);
        Ok(())
    }

    /// Adds `from --symbol--> targets`, merged with existing targets.
    pub fn add_transition(
        &mut self,
        from: StateId,
        symbol: Symbol,
        targets: &[StateId],
    ) -> Result<()> {
        self.check_id(from)?;
        for &target in targets {
            if target >= self.states.len() {
                return Err(Error::DanglingReference {
                    state: self.states[from].name.clone(),
                    target: format!("#{}", target),
                });
            }
        }
        if let Some(c) = symbol {
            if !self.in_alphabet(c) {
                return Err(Error::invalid(
                    &self.name,
                    format!("symbol `{}` is not in the alphabet", c),
                ));
            }
        }
        if self.kind == AutomatonKind::Dfa {
            if symbol.is_none() {
                return Err(Error::invalid(&self.name, "epsilon transition in a dfa"));
            }
            let existing = self.states[from].targets(symbol);
            let merged = existing
                .iter()
                .chain(targets.iter())
                .unique()
                .count();
            if merged > 1 {
                return Err(Error::invalid(
                    &self.name,
                    format!(
                        "state `{}` would have {} targets on `{}`",
                        self.states[from].name,
                        merged,
                        symbol_label(symbol)
                    ),
                ));
            }
        }
        self.states[from].merge_transition(symbol, targets);
        Ok(())
    }

    /// States reachable from the initial state, in breadth-first order.
    pub fn reachable_states(&self) -> Vec<StateId> {
        let Some(initial) = self.initial_state() else {
            return vec![];
        };
        let mut seen = vec![false; self.states.len()];
        let mut order = vec![];
        let mut queue = VecDeque::new();
        seen[initial] = true;
        queue.push_back(initial);
        while let Some(cur) = queue.pop_front() {
            order.push(cur);
            for next in self.states[cur].targets_of_any() {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Drops every state the initial state cannot reach. Returns how many were dropped.
    pub fn retain_reachable(&mut self) -> usize {
        let mut keep = vec![false; self.states.len()];
        for id in self.reachable_states() {
            keep[id] = true;
        }
        let mut remap = vec![None; self.states.len()];
        let mut next = 0;
        for (id, kept) in keep.iter().enumerate() {
            if *kept {
                remap[id] = Some(next);
                next += 1;
            }
        }
        let dropped = self.states.len() - next;
        let states = std::mem::take(&mut self.states);
        self.states = states
            .into_iter()
            .zip(keep)
            .filter(|(_, kept)| *kept)
            .map(|(mut state, _)| {
                for targets in state.transitions.values_mut() {
                    *targets = targets.iter().filter_map(|t| remap[*t]).collect();
                }
                state.transitions.retain(|_, targets| !targets.is_empty());
                state
            })
            .collect();
        dropped
    }

    /// Checks every structural invariant at once.
    pub fn validate(&self) -> Result<()> {
        let initial = self.states.iter().filter(|s| s.initial).count();
        if initial > 1 {
            return Err(Error::invalid(
                &self.name,
                format!("{} initial states", initial),
            ));
        }
        if initial == 0 && !self.states.is_empty() {
            return Err(Error::MissingInitialState {
                automaton: self.name.clone(),
            });
        }
        for state in &self.states {
            for (&symbol, targets) in &state.transitions {
                if targets.is_empty() {
                    return Err(Error::invalid(
                        &self.name,
                        format!("state `{}` has an empty target set", state.name),
                    ));
                }
                if let Some(&target) = targets.iter().find(|&&t| t >= self.states.len()) {
                    return Err(Error::DanglingReference {
                        state: state.name.clone(),
                        target: format!("#{}", target),
                    });
                }
                match symbol {
                    Some(c) if !self.in_alphabet(c) => {
                        return Err(Error::invalid(
                            &self.name,
                            format!("symbol `{}` is not in the alphabet", c),
                        ))
                    }
                    None if self.kind == AutomatonKind::Dfa => {
                        return Err(Error::invalid(&self.name, "epsilon transition in a dfa"))
                    }
                    _ => {}
                }
                if self.kind == AutomatonKind::Dfa && targets.len() > 1 {
                    return Err(Error::invalid(
                        &self.name,
                        format!("state `{}` is not deterministic", state.name),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_id(&self, id: StateId) -> Result<()> {
        if id < self.states.len() {
            Ok(())
        } else {
            Err(Error::invalid(&self.name, format!("no state with id {}", id)))
        }
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Automaton: {} ({})", self.name, self.kind)?;
        writeln!(f, "alphabet: {{{}}}", self.alphabet.iter().join(", "))?;
        for state in &self.states {
            let marker = if state.initial { "->" } else { "  " };
            let suffix = if state.accepting { " (f)" } else { "" };
            let transitions = state
                .transitions
                .iter()
                .map(|(&symbol, targets)| {
                    format!(
                        "{} => {}",
                        symbol_label(symbol),
                        targets.iter().map(|&t| &self.states[t].name).join(",")
                    )
                })
                .join("; ");
            writeln!(f, "{} {}{}: {{{}}}", marker, state.name, suffix, transitions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn chain(name: &str, word: &str) -> Automaton {
    let mut aut = Automaton::new(name, AutomatonKind::Dfa);
    for c in word.chars() {
        aut.add_symbol(c);
    }
    let mut prev = aut.add_state(State::new("s0"));
    aut.set_initial(prev).unwrap();
    for (i, c) in word.chars().enumerate() {
        let next = aut.add_state(State::new(format!("s{}", i + 1)));
        aut.add_transition(prev, Some(c), &[next]).unwrap();
        prev = next;
    }
    aut.set_accepting(prev, true).unwrap();
    aut
}

#[test]
fn test_fresh_containers_per_instance() {
    let mut a = Automaton::new("a", AutomatonKind::Nfa);
    let b = Automaton::new("b", AutomatonKind::Nfa);
    a.add_symbol('x');
    a.add_state(State::new("q"));
    assert!(b.alphabet().is_empty());
    assert!(b.states().is_empty());
}

#[test]
fn test_find_state_scans_everything() {
    let aut = chain("abc", "abc");
    assert_eq!(aut.find_state("s0"), Some(0));
    assert_eq!(aut.find_state("s3"), Some(3));
    assert_eq!(aut.find_state("nope"), None);
}

#[test]
fn test_set_initial_is_exclusive() {
    let mut aut = chain("ab", "ab");
    aut.set_initial(2).unwrap();
    assert_eq!(aut.initial_state(), Some(2));
    assert_eq!(aut.states().iter().filter(|s| s.is_initial()).count(), 1);

    let id = aut.add_state(State::new("fresh"));
    assert_eq!(aut.initial_state(), Some(2));
    aut.set_initial(id).unwrap();
    assert_eq!(aut.initial_state(), Some(id));
    assert!(aut.validate().is_ok());
}

#[test]
fn test_add_transition_merges_without_duplicates() {
    let mut aut = Automaton::new("n", AutomatonKind::Nfa);
    aut.add_symbol('a');
    let ids = aut.add_states((0..3).map(|i| State::new(format!("n{}", i))));
    aut.add_transition(ids[0], Some('a'), &[ids[1]]).unwrap();
    aut.add_transition(ids[0], Some('a'), &[ids[1], ids[2]]).unwrap();
    aut.add_transition(ids[0], EPSILON, &[]).unwrap();
    assert_eq!(aut.state(ids[0]).targets(Some('a')), &[ids[1], ids[2]]);
    assert!(aut.state(ids[0]).targets(EPSILON).is_empty());
    assert!(!aut.state(ids[0]).transitions().contains_key(&EPSILON));
}

#[test]
fn test_add_transition_rejects_bad_input() {
    let mut aut = chain("ab", "ab");
    assert!(matches!(
        aut.add_transition(0, Some('z'), &[1]),
        Err(Error::InvalidAutomaton { .. })
    ));
    assert!(matches!(
        aut.add_transition(0, EPSILON, &[1]),
        Err(Error::InvalidAutomaton { .. })
    ));
    assert!(matches!(
        aut.add_transition(0, Some('a'), &[2]),
        Err(Error::InvalidAutomaton { .. })
    ));
    assert!(matches!(
        aut.add_transition(0, Some('a'), &[9]),
        Err(Error::DanglingReference { .. })
    ));
    // same target again is fine for a dfa
    assert!(aut.add_transition(0, Some('a'), &[1]).is_ok());
}

#[test]
fn test_remove_state_forbidden_while_referenced() {
    let mut aut = chain("ab", "ab");
    match aut.remove_state(1) {
        Err(Error::DanglingReference { state, target }) => {
            assert_eq!(state, "s0");
            assert_eq!(target, "s1");
        }
        other => panic!("unexpected {:?}", other),
    }
    let orphan = aut.add_state(State::new("orphan"));
    aut.add_transition(orphan, Some('a'), &[2]).unwrap();
    let removed = aut.remove_state(orphan).unwrap();
    assert_eq!(removed.name(), "orphan");
    assert_eq!(aut.state_count(), 3);
    assert!(aut.validate().is_ok());
}

#[test]
fn test_remove_initial_state_needs_the_flag_moved() {
    let mut aut = Automaton::new("p", AutomatonKind::Nfa);
    let ids = aut.add_states(vec![State::new("a"), State::new("b")]);
    aut.set_initial(ids[0]).unwrap();
    assert!(matches!(
        aut.remove_state(ids[0]),
        Err(Error::InvalidAutomaton { .. })
    ));
    assert_eq!(aut.state_count(), 2);
    assert_eq!(aut.initial_state(), Some(ids[0]));

    aut.set_initial(ids[1]).unwrap();
    assert_eq!(aut.remove_state(ids[0]).unwrap().name(), "a");
    assert_eq!(aut.initial_state(), Some(0));
    assert!(aut.validate().is_ok());

    // the last state may go, initial or not
    assert!(aut.remove_state(0).is_ok());
    assert!(aut.validate().is_ok());
}

#[test]
fn test_bad_ids_are_rejected_without_side_effects() {
    let mut aut = chain("ab", "ab");
    assert!(matches!(
        aut.set_initial(7),
        Err(Error::InvalidAutomaton { .. })
    ));
    assert_eq!(aut.initial_state(), Some(0));
    assert!(aut.set_accepting(7, true).is_err());
    assert!(aut.set_state_name(7, "x").is_err());
    assert!(aut.get(7).is_none());
    assert_eq!(aut.get(2).map(|s| s.name()), Some("s2"));
    assert!(aut.validate().is_ok());
}

#[test]
fn test_literal_epsilon_label_is_escaped() {
    assert_eq!(symbol_label(EPSILON), "ε");
    assert_eq!(symbol_label(Some(EPSILON_MARKER)), "\\ε");
    assert_eq!(symbol_label(Some('a')), "a");
}

#[test]
fn test_remove_state_remaps_ids() {
    let mut aut = Automaton::new("o", AutomatonKind::Nfa);
    aut.add_symbol('a');
    let ids = aut.add_states(vec![State::new("x"), State::new("y"), State::new("z")]);
    aut.set_initial(ids[0]).unwrap();
    aut.add_transition(ids[0], Some('a'), &[ids[2]]).unwrap();
    aut.remove_state(ids[1]).unwrap();
    assert_eq!(aut.state(0).targets(Some('a')), &[1]);
    assert_eq!(aut.state(1).name(), "z");
}

#[test]
fn test_reachable_and_retain() {
    let mut aut = chain("ab", "ab");
    let lost = aut.add_state(State::new("lost"));
    aut.add_transition(lost, Some('b'), &[2]).unwrap();
    assert_eq!(aut.reachable_states(), vec![0, 1, 2]);
    assert_eq!(aut.retain_reachable(), 1);
    assert_eq!(aut.state_count(), 3);
    assert_eq!(aut.find_state("lost"), None);
    assert_eq!(aut.accepting_states(), vec![2]);
}

#[test]
fn test_display_marks_initial_and_accepting() {
    let aut = chain("ab", "ab");
    let dump = aut.to_string();
    assert!(dump.contains("Automaton: ab (dfa)"));
    assert!(dump.contains("-> s0: {a => s1}"));
    assert!(dump.contains("s2 (f): {}"));
}
