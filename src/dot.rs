use graphviz_rust::{
    cmd::{CommandArg, Format},
    exec, parse,
    printer::PrinterContext,
};
use itertools::Itertools;

use crate::{
    automaton::{symbol_label, Automaton},
    error::{Error, Result},
};

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Graphviz source for `automaton`. Transitions sharing endpoints are drawn as
/// one edge with a comma separated label.
pub fn to_dot(automaton: &Automaton) -> String {
    let mut dot = String::new();
    dot.push_str("digraph {\n");
    dot.push_str("graph [rankdir=LR]\n");
    for state in automaton.states() {
        let shape = if state.is_accepting() {
            "doublecircle"
        } else {
            "circle"
        };
        dot.push_str(&format!("{} [shape={}]\n", quote(state.name()), shape));
    }
    for state in automaton.states() {
        let edges = state
            .transitions()
            .iter()
            .flat_map(|(&symbol, targets)| targets.iter().map(move |&to| (to, symbol)))
            .into_group_map();
        for (to, symbols) in edges.into_iter().sorted_by_key(|(to, _)| *to) {
            let label = symbols.into_iter().map(symbol_label).join(",");
            dot.push_str(&format!(
                "{} -> {} [label={}]\n",
                quote(state.name()),
                quote(automaton.state(to).name()),
                quote(&label)
            ));
        }
    }
    if let Some(initial) = automaton.initial_state() {
        dot.push_str("__start [shape=point]\n");
        dot.push_str(&format!(
            "__start -> {}\n",
            quote(automaton.state(initial).name())
        ));
    }
    dot.push_str("}\n");
    dot
}

/// Writes `{base_name}.dot` and renders it to `{base_name}.png`. Needs the
/// `dot` executable on the path.
pub fn show_dot(automaton: &Automaton, base_name: &str) -> Result<()> {
    let dot = to_dot(automaton);
    std::fs::write(format!("{}.dot", base_name), &dot)?;
    let graph = parse(&dot).map_err(|e| Error::invalid(automaton.name(), e))?;
    exec(
        graph,
        &mut PrinterContext::default(),
        vec![
            CommandArg::Format(Format::Png),
            CommandArg::Output(format!("{}.png", base_name)),
        ],
    )?;
    log::info!("rendered `{}` to {}.png", automaton.name(), base_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compile, Options};

    #[test]
    fn test_dot_parses() {
        let compiled = compile("(a|b)*abb", &Options::default()).unwrap();
        for automaton in [&compiled.nfa, &compiled.dfa] {
            let dot = to_dot(automaton);
            assert!(parse(&dot).is_ok(), "{}", dot);
        }
    }

    #[test]
    fn test_dot_content() {
        let compiled = compile("ab|a", &Options::default()).unwrap();
        let dot = to_dot(&compiled.dfa);
        assert!(dot.contains("\"qf0\" [shape=doublecircle]"));
        assert!(dot.contains("\"q0\" [shape=circle]"));
        assert!(dot.contains("\"q0\" -> \"qf0\" [label=\"a\"]"));
        assert!(dot.contains("__start -> \"q0\""));
    }

    #[test]
    fn test_parallel_edges_share_a_label() {
        let compiled = compile("(a|b)*", &Options::default()).unwrap();
        let dot = to_dot(&compiled.dfa);
        assert!(dot.contains("\"q0\" -> \"q0\" [label=\"a,b\"]"));
    }
}
