pub mod automaton;
pub mod dfa;
pub mod dot;
pub mod error;
pub mod nfa;
pub mod pipeline;
pub mod postfix;
pub mod rename;
pub mod store;
pub mod table;

use wasm_bindgen::prelude::*;

/// Compiles `regex` with the default options and returns its table text.
#[wasm_bindgen]
pub fn regex_to_table(regex: &str) -> Result<String, JsValue> {
    pipeline::compile(regex, &pipeline::Options::default())
        .map(|compiled| compiled.table().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[test]
fn test_regex_to_table() {
    let text = regex_to_table("ab").unwrap();
    assert!(text.starts_with("automaton \"automaton\" dfa\n"));
    assert!(text.contains("state \"q0\" initial\n  'a' -> \"q1\"\n"));
    assert!(text.ends_with("end\n"));
}
