use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::{
    automaton::{Automaton, AutomatonKind, State, StateId, EPSILON},
    error::{Error, Result},
};

/// A set of NFA states, compared by value.
pub type Subset = BTreeSet<StateId>;

/// Identity of a DFA state: the states of a subset that have a symbol
/// transition, plus whether the subset accepts. Subsets agreeing on both
/// behave the same on every input.
type Kernel = (Subset, bool);

/// Every state reachable from `states` through epsilon transitions alone.
pub fn epsilon_closure(nfa: &Automaton, states: &Subset) -> Subset {
    let mut closure = states.clone();
    let mut stack: Vec<StateId> = states.iter().copied().collect();
    while let Some(state) = stack.pop() {
        for &next in nfa.state(state).targets(EPSILON) {
            if closure.insert(next) {
                stack.push(next);
            }
        }
    }
    closure
}

/// Union of the `symbol` targets of every state in `states`.
pub fn move_on(nfa: &Automaton, states: &Subset, symbol: char) -> Subset {
    states
        .iter()
        .flat_map(|&state| nfa.state(state).targets(Some(symbol)))
        .copied()
        .collect()
}

/// `epsilon_closure(move_on(states, symbol))`.
pub fn go_to(nfa: &Automaton, states: &Subset, symbol: char) -> Subset {
    epsilon_closure(nfa, &move_on(nfa, states, symbol))
}

/// Subset construction. The NFA is only read.
pub struct Determinizer<'a> {
    nfa: &'a Automaton,
    dfa: Automaton,
    ids_by_kernel: HashMap<Kernel, StateId>,
    worklist: VecDeque<(Subset, StateId)>,
}

impl<'a> Determinizer<'a> {
    pub fn new(nfa: &'a Automaton, name: impl Into<String>) -> Self {
        let mut dfa = Automaton::new(name, AutomatonKind::Dfa);
        for &c in nfa.alphabet() {
            dfa.add_symbol(c);
        }
        Self {
            nfa,
            dfa,
            ids_by_kernel: HashMap::new(),
            worklist: VecDeque::new(),
        }
    }

    pub fn determinize(mut self) -> Result<Automaton> {
        let nfa = self.nfa;
        let initial = nfa
            .initial_state()
            .ok_or_else(|| Error::MissingInitialState {
                automaton: nfa.name().to_string(),
            })?;
        let start = epsilon_closure(nfa, &Subset::from([initial]));
        let start_id = self.get_or_create_state(start);
        self.dfa.set_initial(start_id)?;

        while let Some((subset, id)) = self.worklist.pop_front() {
            for &symbol in nfa.alphabet() {
                let target = go_to(nfa, &subset, symbol);
                if target.is_empty() {
                    continue;
                }
                let target_id = self.get_or_create_state(target);
                self.dfa.add_transition(id, Some(symbol), &[target_id])?;
            }
        }
        log::debug!(
            "dfa `{}`: {} states from {} nfa states",
            self.dfa.name(),
            self.dfa.state_count(),
            nfa.state_count()
        );
        Ok(self.dfa)
    }

    fn kernel(&self, subset: &Subset) -> Kernel {
        let important = subset
            .iter()
            .copied()
            .filter(|&state| {
                self.nfa
                    .state(state)
                    .transitions()
                    .keys()
                    .any(|symbol| symbol.is_some())
            })
            .collect();
        let accepting = subset
            .iter()
            .any(|&state| self.nfa.state(state).is_accepting());
        (important, accepting)
    }

    fn get_or_create_state(&mut self, subset: Subset) -> StateId {
        let kernel = self.kernel(&subset);
        if let Some(&id) = self.ids_by_kernel.get(&kernel) {
            return id;
        }
        let id = self.dfa.add_state(
            State::new(format!("d{}", self.dfa.state_count())).accepting(kernel.1),
        );
        self.ids_by_kernel.insert(kernel, id);
        self.worklist.push_back((subset, id));
        id
    }
}

/// Builds the DFA equivalent to `nfa`.
pub fn determinize(nfa: &Automaton, name: impl Into<String>) -> Result<Automaton> {
    Determinizer::new(nfa, name).determinize()
}

impl Automaton {
    /// Runs `input` through the automaton with closure/move steps. Works for
    /// both kinds; a DFA simply never has more than one live state.
    pub fn accepts(&self, input: &str) -> bool {
        let Some(initial) = self.initial_state() else {
            return false;
        };
        let mut current = epsilon_closure(self, &Subset::from([initial]));
        for c in input.chars() {
            current = go_to(self, &current, c);
            if current.is_empty() {
                return false;
            }
        }
        current.iter().any(|&state| self.state(state).is_accepting())
    }
}

/// Every word over `alphabet` up to `max_len` characters, shortest first.
#[cfg(test)]
pub(crate) fn words(alphabet: &[char], max_len: usize) -> Vec<String> {
    use itertools::Itertools;

    let mut words = vec![String::new()];
    for len in 1..=max_len {
        words.extend(
            (0..len)
                .map(|_| alphabet.iter().copied())
                .multi_cartesian_product()
                .map(|chars| chars.into_iter().collect::<String>()),
        );
    }
    words
}
