use regex_dfa_table::{
    error::Result,
    pipeline::{self, Options},
    store::{FileStore, TableStore},
};

const USAGE: &str = "usage: regex-dfa-table [REGEX [NAME]] | load NAME";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// `regex` is read from stdin when missing.
    Compile {
        regex: Option<String>,
        name: Option<String>,
    },
    Load(String),
}

fn parse_args(args: &[String]) -> Option<Command> {
    match args {
        [cmd, name] if cmd == "load" => Some(Command::Load(name.clone())),
        [regex, name] => Some(Command::Compile {
            regex: Some(regex.clone()),
            name: Some(name.clone()),
        }),
        [regex] => Some(Command::Compile {
            regex: Some(regex.clone()),
            name: None,
        }),
        [] => Some(Command::Compile {
            regex: None,
            name: None,
        }),
        _ => None,
    }
}

fn read_regex() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn compile_and_store(regex: &str, options: &Options) -> Result<()> {
    let compiled = pipeline::compile(regex, options)?;
    println!("postfix: {}", compiled.postfix);
    println!("{}", compiled.nfa);
    println!("{}", compiled.dfa);
    let table = compiled.table();
    println!("{}", table.grid());

    let mut store = FileStore::new(".");
    store.write(&options.name, &table)?;
    log::info!("saved {}", store.path(&options.name).display());
    Ok(())
}

fn load(name: &str) -> Result<()> {
    let store = FileStore::new(".");
    let table = store.read(name)?;
    let automaton = table.to_automaton()?;
    println!("{}", automaton);
    println!("{}", table.grid());
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Load(name) => load(&name),
        Command::Compile { regex, name } => {
            let regex = match regex {
                Some(regex) => regex,
                None => read_regex()?,
            };
            let mut options = Options::default();
            if let Some(name) = name {
                options.name = name;
            }
            compile_and_store(&regex, &options)
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    if let Err(e) = run(command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[test]
fn test_parse_args() {
    let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert_eq!(
        parse_args(&args(&[])),
        Some(Command::Compile {
            regex: None,
            name: None
        })
    );
    assert_eq!(
        parse_args(&args(&["a|b", "ab"])),
        Some(Command::Compile {
            regex: Some("a|b".to_string()),
            name: Some("ab".to_string())
        })
    );
    assert_eq!(
        parse_args(&args(&["load", "ab"])),
        Some(Command::Load("ab".to_string()))
    );
    assert_eq!(parse_args(&args(&["a", "b", "c"])), None);
}
