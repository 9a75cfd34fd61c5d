use std::collections::VecDeque;

use crate::{
    automaton::{Automaton, StateId},
    error::{Error, Result},
};

/// Breadth-first order from the initial state. Transitions are followed in
/// symbol order (epsilon first) and targets in insertion order.
fn traversal_order(automaton: &Automaton, initial: StateId) -> Vec<StateId> {
    let mut visited = vec![false; automaton.state_count()];
    let mut pending = VecDeque::from([initial]);
    let mut order = vec![];
    visited[initial] = true;
    while let Some(cur) = pending.pop_front() {
        order.push(cur);
        for targets in automaton.state(cur).transitions().values() {
            for &next in targets {
                if !visited[next] {
                    visited[next] = true;
                    pending.push_back(next);
                }
            }
        }
    }
    order
}

/// Computes canonical names without touching the automaton.
///
/// The initial state is `{prefix}0` and every other non-accepting state takes
/// the next integer in discovery order. Accepting states other than the
/// initial one are `{prefix}f` when there is only one of them, and
/// `{prefix}f0`, `{prefix}f1`, ... otherwise, so names stay unique.
pub fn canonical_names(automaton: &Automaton, prefix: &str) -> Result<Vec<String>> {
    let initial = automaton
        .initial_state()
        .ok_or_else(|| Error::MissingInitialState {
            automaton: automaton.name().to_string(),
        })?;
    let order = traversal_order(automaton, initial);
    if order.len() != automaton.state_count() {
        return Err(Error::UnreachableState {
            automaton: automaton.name().to_string(),
            reachable: order.len(),
            total: automaton.state_count(),
        });
    }

    let final_count = order
        .iter()
        .filter(|&&id| id != initial && automaton.state(id).is_accepting())
        .count();
    let mut names = vec![String::new(); automaton.state_count()];
    let mut number = 0;
    let mut final_number = 0;
    for &id in &order {
        names[id] = if id == initial {
            format!("{}0", prefix)
        } else if !automaton.state(id).is_accepting() {
            number += 1;
            format!("{}{}", prefix, number)
        } else if final_count == 1 {
            format!("{}f", prefix)
        } else {
            final_number += 1;
            format!("{}f{}", prefix, final_number - 1)
        };
    }
    Ok(names)
}

/// Renames every state canonically. On error no name is changed.
pub fn rename_states(automaton: &mut Automaton, prefix: &str) -> Result<()> {
    let names = canonical_names(automaton, prefix)?;
    for (id, name) in names.into_iter().enumerate() {
        automaton.set_state_name(id, name)?;
    }
    log::debug!(
        "renamed {} states of `{}` with prefix {:?}",
        automaton.state_count(),
        automaton.name(),
        prefix
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        automaton::{AutomatonKind, State},
        dfa, nfa, postfix,
    };

    fn dfa_of(expr: &str) -> Automaton {
        let nfa = nfa::from_postfix("nfa", &postfix::compile(expr).unwrap()).unwrap();
        dfa::determinize(&nfa, "dfa").unwrap()
    }

    fn names(automaton: &Automaton) -> Vec<&str> {
        automaton.states().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_single_final_state_gets_the_suffix() {
        let mut dfa = dfa_of("ab");
        rename_states(&mut dfa, "q").unwrap();
        assert_eq!(names(&dfa), vec!["q0", "q1", "qf"]);
    }

    #[test]
    fn test_several_final_states_stay_distinct() {
        // a -> accepting, ab -> accepting
        let mut dfa = dfa_of("ab|a");
        rename_states(&mut dfa, "q").unwrap();
        assert_eq!(names(&dfa), vec!["q0", "qf0", "qf1"]);
    }

    #[test]
    fn test_initial_accepting_state_keeps_zero() {
        let mut dfa = dfa_of("(a|b)*");
        rename_states(&mut dfa, "e").unwrap();
        assert_eq!(names(&dfa), vec!["e0"]);
    }

    #[test]
    fn test_nfa_names_are_unique_and_cover_every_state() {
        let mut nfa = nfa::from_postfix("nfa", &postfix::compile("(a|b)*abb").unwrap()).unwrap();
        rename_states(&mut nfa, "e").unwrap();
        let distinct: HashSet<&str> = nfa.states().iter().map(|s| s.name()).collect();
        assert_eq!(distinct.len(), nfa.reachable_states().len());
        assert_eq!(distinct.len(), nfa.state_count());
        assert_eq!(nfa.state(nfa.initial_state().unwrap()).name(), "e0");
        assert_eq!(nfa.state(nfa.accepting_states()[0]).name(), "ef");
    }

    #[test]
    fn test_unreachable_state_fails_without_renaming() {
        let mut dfa = dfa_of("ab");
        dfa.add_state(State::new("island"));
        let before: Vec<String> = dfa.states().iter().map(|s| s.name().to_string()).collect();
        match rename_states(&mut dfa, "q") {
            Err(Error::UnreachableState {
                reachable, total, ..
            }) => {
                assert_eq!(reachable, 3);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        let after: Vec<String> = dfa.states().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(before, after);

        dfa.retain_reachable();
        assert!(rename_states(&mut dfa, "q").is_ok());
    }

    #[test]
    fn test_requires_initial_state() {
        let mut aut = Automaton::new("bare", AutomatonKind::Dfa);
        aut.add_state(State::new("x"));
        assert!(matches!(
            rename_states(&mut aut, "q"),
            Err(Error::MissingInitialState { .. })
        ));
    }

    #[test]
    fn test_repeated_calls_are_independent() {
        let mut first = dfa_of("(a|b)*abb");
        let mut second = dfa_of("(a|b)*abb");
        rename_states(&mut first, "q").unwrap();
        rename_states(&mut first, "q").unwrap();
        rename_states(&mut second, "q").unwrap();
        assert_eq!(first, second);
    }
}
