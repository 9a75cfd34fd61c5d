use regex::Regex;

use crate::{
    automaton::Automaton,
    dfa,
    error::{Error, Result},
    nfa,
    postfix::{self, Postfix},
    rename,
    table::TransitionTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Name given to the DFA, also used as the storage key.
    pub name: String,
    pub nfa_prefix: String,
    pub dfa_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            name: "automaton".to_string(),
            nfa_prefix: "e".to_string(),
            dfa_prefix: "q".to_string(),
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        let prefix = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").map_err(invalid_pattern)?;
        let name = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").map_err(invalid_pattern)?;
        for (option, value) in [
            ("nfa_prefix", &self.nfa_prefix),
            ("dfa_prefix", &self.dfa_prefix),
        ] {
            if !prefix.is_match(value) {
                return Err(Error::InvalidOption {
                    option,
                    value: value.clone(),
                });
            }
        }
        if !name.is_match(&self.name) {
            return Err(Error::InvalidOption {
                option: "name",
                value: self.name.clone(),
            });
        }
        Ok(())
    }
}

fn invalid_pattern(e: regex::Error) -> Error {
    Error::InvalidOption {
        option: "pattern",
        value: e.to_string(),
    }
}

/// Everything produced while compiling one regex.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub postfix: Postfix,
    pub nfa: Automaton,
    pub dfa: Automaton,
}

impl Compilation {
    pub fn table(&self) -> TransitionTable {
        TransitionTable::from_automaton(&self.dfa)
    }
}

/// regex -> postfix -> NFA -> DFA, with both automata canonically renamed.
pub fn compile(regex: &str, options: &Options) -> Result<Compilation> {
    options.validate()?;
    let postfix = postfix::compile(regex)?;
    let mut nfa = nfa::from_postfix(&format!("{}_nfa", options.name), &postfix)?;
    rename::rename_states(&mut nfa, &options.nfa_prefix)?;
    let mut dfa = dfa::determinize(&nfa, options.name.clone())?;
    rename::rename_states(&mut dfa, &options.dfa_prefix)?;
    log::info!(
        "compiled {:?}: {} nfa states, {} dfa states",
        regex,
        nfa.state_count(),
        dfa.state_count()
    );
    Ok(Compilation { postfix, nfa, dfa })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_options() {
        let options = Options {
            dfa_prefix: "9q".to_string(),
            ..Options::default()
        };
        assert!(matches!(
            compile("a", &options),
            Err(Error::InvalidOption {
                option: "dfa_prefix",
                ..
            })
        ));

        let options = Options {
            name: "../up".to_string(),
            ..Options::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOption { option: "name", .. })
        ));
    }

    #[test]
    fn test_compile_names_everything() {
        let compiled = compile("(a|b)*abb", &Options::default()).unwrap();
        assert_eq!(compiled.postfix.to_string(), "a b | * a . b . b .");
        assert_eq!(compiled.dfa.name(), "automaton");
        assert_eq!(compiled.nfa.name(), "automaton_nfa");
        assert!(compiled.nfa.states().iter().all(|s| s.name().starts_with('e')));
        let names: Vec<&str> = compiled.dfa.states().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["q0", "q1", "q2", "qf"]);
    }

    #[test]
    fn test_compile_is_reproducible() {
        let first = compile("(ab|b)*a?c+", &Options::default()).unwrap();
        let second = compile("(ab|b)*a?c+", &Options::default()).unwrap();
        assert_eq!(first.nfa, second.nfa);
        assert_eq!(first.dfa, second.dfa);
        assert_eq!(first.table().to_string(), second.table().to_string());
    }

    #[test]
    fn test_literal_epsilon_is_not_epsilon() {
        let compiled = compile("\\ε", &Options::default()).unwrap();
        assert_eq!(compiled.dfa.alphabet(), &['ε']);
        assert!(compiled.dfa.accepts("ε"));
        assert!(!compiled.dfa.accepts(""));
        assert!(compiled.dfa.to_string().contains("-> q0: {\\ε => qf}"));
        assert!(compiled.table().grid().lines().nth(1).unwrap().contains("\\ε"));
    }

    #[test]
    fn test_parse_errors_surface() {
        assert!(matches!(
            compile("(a", &Options::default()),
            Err(Error::Parse { .. })
        ));
    }
}
