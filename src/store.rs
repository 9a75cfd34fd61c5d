use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Read, Write},
    path::PathBuf,
};

use crate::{
    error::{Error, Result},
    table::TransitionTable,
};

/// Somewhere transition tables can be kept under a key.
pub trait TableStore {
    fn write(&mut self, key: &str, table: &TransitionTable) -> Result<()>;

    /// Fails with `NotFound` when nothing usable is stored under `key`.
    fn read(&self, key: &str) -> Result<TransitionTable>;
}

fn parse_stored(key: &str, text: &str) -> Result<TransitionTable> {
    TransitionTable::parse(text).map_err(|e| match e {
        Error::NotFound { reason, .. } => Error::NotFound {
            key: key.to_string(),
            reason,
        },
        e => e,
    })
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(Error::InvalidOption {
            option: "key",
            value: key.to_string(),
        });
    }
    Ok(())
}

/// One `<key>.dat` file per table inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> FileStore {
        FileStore { dir: dir.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.dat", key))
    }
}

impl TableStore for FileStore {
    fn write(&mut self, key: &str, table: &TransitionTable) -> Result<()> {
        check_key(key)?;
        let path = self.path(key);
        let mut writer = BufWriter::new(File::create(&path)?);
        write!(writer, "{}", table)?;
        writer.flush()?;
        log::debug!("wrote {} rows to {}", table.rows.len(), path.display());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<TransitionTable> {
        check_key(key)?;
        let path = self.path(key);
        let mut text = String::new();
        File::open(&path)
            .and_then(|mut file| file.read_to_string(&mut text))
            .map_err(|e| Error::NotFound {
                key: key.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
        log::debug!("read {} bytes from {}", text.len(), path.display());
        parse_stored(key, &text)
    }
}

/// Keeps the encoded text in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Stores raw text, bypassing encoding.
    pub fn insert_raw(&mut self, key: &str, text: impl Into<String>) {
        self.tables.insert(key.to_string(), text.into());
    }
}

impl TableStore for MemoryStore {
    fn write(&mut self, key: &str, table: &TransitionTable) -> Result<()> {
        check_key(key)?;
        self.tables.insert(key.to_string(), table.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<TransitionTable> {
        check_key(key)?;
        let text = self.tables.get(key).ok_or_else(|| Error::NotFound {
            key: key.to_string(),
            reason: "no such key".to_string(),
        })?;
        parse_stored(key, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compile, Options};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "regex-dfa-table-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn check_round_trip(store: &mut impl TableStore) {
        let compiled = compile("(a|b)*abb", &Options::default()).unwrap();
        let table = compiled.table();
        store.write("abb", &table).unwrap();
        let back = store.read("abb").unwrap();
        assert_eq!(back, table);
        let dfa = back.to_automaton().unwrap();
        for word in crate::dfa::words(&['a', 'b'], 5) {
            assert_eq!(dfa.accepts(&word), compiled.dfa.accepts(&word), "{:?}", word);
        }
    }

    #[test]
    fn test_memory_round_trip() {
        check_round_trip(&mut MemoryStore::new());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = scratch_dir("round-trip");
        let mut store = FileStore::new(&dir);
        check_round_trip(&mut store);
        assert!(store.path("abb").exists());
        assert_eq!(store.path("abb").extension().unwrap(), "dat");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_key() {
        let dir = scratch_dir("missing");
        let store = FileStore::new(&dir);
        match store.read("nothing") {
            Err(Error::NotFound { key, .. }) => assert_eq!(key, "nothing"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            MemoryStore::new().read("nothing"),
            Err(Error::NotFound { .. })
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_corrupt_entry() {
        let mut store = MemoryStore::new();
        store.insert_raw("bad", "automaton \"other\" dfa\nalphabet\nstate");
        match store.read("bad") {
            Err(Error::NotFound { key, .. }) => assert_eq!(key, "bad"),
            other => panic!("unexpected {:?}", other),
        }

        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("junk.dat"), "not a table").unwrap();
        assert!(matches!(
            FileStore::new(&dir).read("junk"),
            Err(Error::NotFound { .. })
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let mut store = MemoryStore::new();
        let table = compile("a", &Options::default()).unwrap().table();
        for key in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.write(key, &table),
                Err(Error::InvalidOption { option: "key", .. })
            ));
        }
    }
}
