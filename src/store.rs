//! Script and program files.
//! Layout under the data directory:
//!   scripts/<name>.json   : a `Script` (JSON array of actions)
//!   programs/<name>.json  : a `Program` (ordered script names with iteration counts)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::action::Script;
use crate::error::{MacroError, MacroResult};

const SCRIPTS_DIR: &str = "scripts";
const PROGRAMS_DIR: &str = "programs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStep {
    pub script: String,
    pub iterations: u32,
}

impl std::str::FromStr for ProgramStep {
    type Err = MacroError;

    /// Parses "name" or "name:iterations".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (script, iterations) = match s.rsplit_once(':') {
            Some((name, count)) => {
                let iterations = count.trim().parse::<u32>().map_err(|_| {
                    MacroError::invalid_action(format!("invalid iteration count in '{}'", s))
                })?;
                (name.trim(), iterations)
            }
            None => (s.trim(), 1),
        };
        if script.is_empty() {
            return Err(MacroError::invalid_action(format!("missing script name in '{}'", s)));
        }
        Ok(ProgramStep {
            script: with_json_suffix(script),
            iterations,
        })
    }
}

/// Scripts run in order, each `iterations` times. `reset_script` is replayed
/// before a script iteration restarts after a failed color match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub steps: Vec<ProgramStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_script: Option<String>,
}

pub struct ScriptStore {
    root: PathBuf,
}

pub fn with_json_suffix(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{}.json", name)
    }
}

fn list_json(dir: &Path) -> MacroResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| MacroError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MacroError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, kind: &'static str) -> MacroResult<T> {
    if !path.is_file() {
        return Err(MacroError::NotFound {
            kind,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| MacroError::json(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> MacroResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| MacroError::json(path, e))?;
    fs::write(path, json).map_err(|e| MacroError::io(path, e))
}

fn remove(path: &Path, kind: &'static str, name: &str) -> MacroResult<()> {
    if !path.is_file() {
        return Err(MacroError::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    fs::remove_file(path).map_err(|e| MacroError::io(path, e))
}

impl ScriptStore {
    /// Opens the store, creating `scripts/` and `programs/` if needed.
    pub fn open(root: impl Into<PathBuf>) -> MacroResult<Self> {
        let root = root.into();
        for dir in [SCRIPTS_DIR, PROGRAMS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| MacroError::io(&path, e))?;
        }
        Ok(Self { root })
    }

    fn script_path(&self, name: &str) -> PathBuf {
        self.root.join(SCRIPTS_DIR).join(with_json_suffix(name))
    }

    fn program_path(&self, name: &str) -> PathBuf {
        self.root.join(PROGRAMS_DIR).join(with_json_suffix(name))
    }

    pub fn list_scripts(&self) -> MacroResult<Vec<String>> {
        list_json(&self.root.join(SCRIPTS_DIR))
    }

    pub fn list_programs(&self) -> MacroResult<Vec<String>> {
        list_json(&self.root.join(PROGRAMS_DIR))
    }

    pub fn script_exists(&self, name: &str) -> bool {
        self.script_path(name).is_file()
    }

    pub fn load_script(&self, name: &str) -> MacroResult<Script> {
        let script: Script = read_json(&self.script_path(name), "script")?;
        script.validate()?;
        Ok(script)
    }

    pub fn save_script(&self, name: &str, script: &Script) -> MacroResult<PathBuf> {
        script.validate()?;
        let path = self.script_path(name);
        write_json(&path, script)?;
        tracing::debug!(path = %path.display(), actions = script.len(), "saved script");
        Ok(path)
    }

    pub fn delete_script(&self, name: &str) -> MacroResult<()> {
        remove(&self.script_path(name), "script", name)
    }

    pub fn load_program(&self, name: &str) -> MacroResult<Program> {
        read_json(&self.program_path(name), "program")
    }

    pub fn save_program(&self, name: &str, program: &Program) -> MacroResult<PathBuf> {
        if let Some(step) = program.steps.iter().find(|s| s.iterations == 0) {
            return Err(MacroError::invalid_action(format!(
                "program step '{}' has zero iterations",
                step.script
            )));
        }
        let path = self.program_path(name);
        write_json(&path, program)?;
        Ok(path)
    }

    pub fn delete_program(&self, name: &str) -> MacroResult<()> {
        remove(&self.program_path(name), "program", name)
    }

    /// Expected playback time in seconds, before jitter. Unloadable scripts count as zero.
    pub fn estimated_duration(&self, program: &Program, time_scale: f64) -> f64 {
        program
            .steps
            .iter()
            .filter_map(|step| match self.load_script(&step.script) {
                Ok(script) => Some(script.total_delay() * step.iterations as f64),
                Err(e) => {
                    tracing::debug!(script = %step.script, error = %e, "skipping script in duration estimate");
                    None
                }
            })
            .sum::<f64>()
            * time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, KeyboardAction};
    use crate::keys::KeyCode;
    use tempfile::TempDir;

    fn two_second_script() -> Script {
        Script::new(vec![
            Action::Keyboard(KeyboardAction {
                delay: 0.5,
                key: KeyCode::Char('a'),
                jitter: None,
            }),
            Action::Keyboard(KeyboardAction {
                delay: 1.5,
                key: KeyCode::Enter,
                jitter: None,
            }),
        ])
    }

    #[test]
    fn test_open_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        assert!(dir.path().join("scripts").is_dir());
        assert!(dir.path().join("programs").is_dir());
        assert!(store.list_scripts().unwrap().is_empty());
    }

    #[test]
    fn test_save_list_load_delete_script() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        store.save_script("zeta", &two_second_script()).unwrap();
        store.save_script("alpha.json", &Script::default()).unwrap();
        fs::write(dir.path().join("scripts").join("notes.txt"), "x").unwrap();

        assert_eq!(store.list_scripts().unwrap(), vec!["alpha.json", "zeta.json"]);
        assert!(store.script_exists("zeta"));
        assert_eq!(store.load_script("zeta.json").unwrap(), two_second_script());

        store.delete_script("zeta").unwrap();
        assert!(!store.script_exists("zeta"));
        assert!(matches!(
            store.delete_script("zeta"),
            Err(MacroError::NotFound { kind: "script", .. })
        ));
    }

    #[test]
    fn test_load_missing_script_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_script("ghost"),
            Err(MacroError::NotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_script_is_json_error() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("scripts").join("bad.json"), "{not json").unwrap();
        assert!(matches!(store.load_script("bad"), Err(MacroError::Json { .. })));
    }

    #[test]
    fn test_program_round_trip_and_zero_iterations() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        let program = Program {
            steps: vec!["login:1".parse().unwrap(), "farm:3".parse().unwrap()],
            reset_script: Some("reset.json".into()),
        };
        store.save_program("daily", &program).unwrap();
        assert_eq!(store.list_programs().unwrap(), vec!["daily.json"]);
        assert_eq!(store.load_program("daily").unwrap(), program);

        let bad = Program {
            steps: vec![ProgramStep {
                script: "x.json".into(),
                iterations: 0,
            }],
            reset_script: None,
        };
        assert!(store.save_program("bad", &bad).is_err());
    }

    #[test]
    fn test_program_step_parse() {
        let step: ProgramStep = "farm:4".parse().unwrap();
        assert_eq!(step.script, "farm.json");
        assert_eq!(step.iterations, 4);
        let step: ProgramStep = "login.json".parse().unwrap();
        assert_eq!(step.iterations, 1);
        assert!("farm:x".parse::<ProgramStep>().is_err());
        assert!(":2".parse::<ProgramStep>().is_err());
    }

    #[test]
    fn test_estimated_duration_skips_missing_scripts() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        store.save_script("two", &two_second_script()).unwrap();
        let program = Program {
            steps: vec!["two:3".parse().unwrap(), "missing:10".parse().unwrap()],
            reset_script: None,
        };
        let secs = store.estimated_duration(&program, 0.5);
        assert!((secs - 3.0).abs() < 1e-9);
    }
}
