use crate::{
    automaton::{Automaton, AutomatonKind, State, StateId, Symbol, EPSILON},
    error::{Error, Result},
    postfix::{Postfix, Token},
};

/// Entry and exit of a partially built automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub entry: StateId,
    pub exit: StateId,
}

/// Thompson construction over a postfix token stream.
#[derive(Debug)]
pub struct Builder {
    nfa: Automaton,
    fragments: Vec<Fragment>,
    counter: usize,
}

impl Builder {
    pub fn new(name: impl Into<String>, alphabet: &[char]) -> Builder {
        let mut nfa = Automaton::new(name, AutomatonKind::Nfa);
        for &c in alphabet {
            nfa.add_symbol(c);
        }
        Builder {
            nfa,
            fragments: vec![],
            counter: 0,
        }
    }

    fn new_state(&mut self) -> StateId {
        let id = self.nfa.add_state(State::new(format!("n{}", self.counter)));
        self.counter += 1;
        id
    }

    fn pop(&mut self) -> Result<Fragment> {
        self.fragments.pop().ok_or(Error::Construction { fragments: 0 })
    }

    fn link(&mut self, from: StateId, symbol: Symbol, to: StateId) -> Result<()> {
        self.nfa.add_transition(from, symbol, &[to])
    }

    fn push(&mut self, entry: StateId, exit: StateId) {
        self.fragments.push(Fragment { entry, exit });
    }

    pub fn symbol(&mut self, symbol: Symbol) -> Result<()> {
        if let Some(c) = symbol {
            self.nfa.add_symbol(c);
        }
        let entry = self.new_state();
        let exit = self.new_state();
        self.link(entry, symbol, exit)?;
        self.push(entry, exit);
        Ok(())
    }

    pub fn concatenate(&mut self) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.link(left.exit, EPSILON, right.entry)?;
        self.push(left.entry, right.exit);
        Ok(())
    }

    pub fn union(&mut self) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let entry = self.new_state();
        let exit = self.new_state();
        self.link(entry, EPSILON, left.entry)?;
        self.link(entry, EPSILON, right.entry)?;
        self.link(left.exit, EPSILON, exit)?;
        self.link(right.exit, EPSILON, exit)?;
        self.push(entry, exit);
        Ok(())
    }

    pub fn zero_or_more(&mut self) -> Result<()> {
        self.repeat(true)
    }

    pub fn one_or_more(&mut self) -> Result<()> {
        self.repeat(false)
    }

    fn repeat(&mut self, skippable: bool) -> Result<()> {
        let inner = self.pop()?;
        let entry = self.new_state();
        let exit = self.new_state();
        self.link(entry, EPSILON, inner.entry)?;
        if skippable {
            self.link(entry, EPSILON, exit)?;
        }
        self.link(inner.exit, EPSILON, inner.entry)?;
        self.link(inner.exit, EPSILON, exit)?;
        self.push(entry, exit);
        Ok(())
    }

    /// Union of the fragment on top of the stack with the empty fragment.
    pub fn zero_or_one(&mut self) -> Result<()> {
        let inner = self.pop()?;
        let entry = self.new_state();
        let exit = self.new_state();
        self.link(entry, EPSILON, inner.entry)?;
        self.link(entry, EPSILON, exit)?;
        self.link(inner.exit, EPSILON, exit)?;
        self.push(entry, exit);
        Ok(())
    }

    pub fn apply(&mut self, token: Token) -> Result<()> {
        match token {
            Token::Symbol(c) => self.symbol(Some(c)),
            Token::Epsilon => self.symbol(EPSILON),
            Token::Concat => self.concatenate(),
            Token::Union => self.union(),
            Token::Star => self.zero_or_more(),
            Token::Plus => self.one_or_more(),
            Token::Optional => self.zero_or_one(),
            Token::LeftParen | Token::RightParen => Err(Error::Construction {
                fragments: self.fragments.len(),
            }),
        }
    }

    /// Marks the single remaining fragment as the whole automaton.
    pub fn build(mut self) -> Result<Automaton> {
        if self.fragments.len() != 1 {
            return Err(Error::Construction {
                fragments: self.fragments.len(),
            });
        }
        let Fragment { entry, exit } = self.fragments[0];
        self.nfa.set_initial(entry)?;
        self.nfa.set_accepting(exit, true)?;
        Ok(self.nfa)
    }
}

/// Builds the NFA for a compiled regex.
pub fn from_postfix(name: &str, postfix: &Postfix) -> Result<Automaton> {
    let mut builder = Builder::new(name, &postfix.alphabet);
    for &token in &postfix.tokens {
        builder.apply(token)?;
    }
    let nfa = builder.build()?;
    log::debug!(
        "nfa `{}`: {} states over {} symbols",
        nfa.name(),
        nfa.state_count(),
        nfa.alphabet().len()
    );
    Ok(nfa)
}

#[cfg(test)]
fn nfa_of(expr: &str) -> Automaton {
    from_postfix("test", &crate::postfix::compile(expr).unwrap()).unwrap()
}

#[test]
fn test_single_symbol() {
    let nfa = nfa_of("a");
    assert_eq!(nfa.state_count(), 2);
    assert_eq!(nfa.initial_state(), Some(0));
    assert_eq!(nfa.accepting_states(), vec![1]);
    assert_eq!(nfa.state(0).targets(Some('a')), &[1]);
    assert!(nfa.accepts("a"));
    assert!(!nfa.accepts(""));
    assert!(!nfa.accepts("aa"));
}

#[test]
fn test_thompson_shapes() {
    // two literals plus one epsilon link
    let concat = nfa_of("ab");
    assert_eq!(concat.state_count(), 4);
    assert_eq!(concat.state(1).targets(EPSILON), &[2]);

    let union = nfa_of("a|b");
    assert_eq!(union.state_count(), 6);
    let entry = union.initial_state().unwrap();
    assert_eq!(union.state(entry).targets(EPSILON), &[0, 2]);

    let star = nfa_of("a*");
    let entry = star.initial_state().unwrap();
    let exit = star.accepting_states()[0];
    assert_eq!(star.state(entry).targets(EPSILON), &[0, exit]);
    assert_eq!(star.state(1).targets(EPSILON), &[0, exit]);

    let plus = nfa_of("a+");
    let entry = plus.initial_state().unwrap();
    assert_eq!(plus.state(entry).targets(EPSILON), &[0]);
}

#[test]
fn test_operators_accept_expected_words() {
    let plus = nfa_of("a+");
    assert!(!plus.accepts(""));
    assert!(plus.accepts("a"));
    assert!(plus.accepts("aaa"));

    let optional = nfa_of("ab?");
    assert!(optional.accepts("a"));
    assert!(optional.accepts("ab"));
    assert!(!optional.accepts("abb"));

    let epsilon = nfa_of("ε");
    assert!(epsilon.accepts(""));
    assert!(epsilon.alphabet().is_empty());
}

#[test]
fn test_malformed_postfix_is_a_construction_error() {
    let two_operands = Postfix {
        tokens: vec![Token::Symbol('a'), Token::Symbol('b')],
        alphabet: vec!['a', 'b'],
    };
    assert!(matches!(
        from_postfix("bad", &two_operands),
        Err(Error::Construction { fragments: 2 })
    ));

    let dangling = Postfix {
        tokens: vec![Token::Symbol('a'), Token::Union],
        alphabet: vec!['a'],
    };
    assert!(matches!(
        from_postfix("bad", &dangling),
        Err(Error::Construction { .. })
    ));

    let empty = Postfix {
        tokens: vec![],
        alphabet: vec![],
    };
    assert!(matches!(
        from_postfix("bad", &empty),
        Err(Error::Construction { fragments: 0 })
    ));
}
