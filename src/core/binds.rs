//! Key binding table
//!
//! Each known key has a name and one action per bind mode. Actions run on
//! key down; an action can leave a one-shot "release action" that fires when
//! the same key comes back up.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

use crate::script::{escape_string, validate_block, ScriptRuntime, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Default,
    Spectator,
    Editing,
}

impl BindMode {
    pub const ALL: [BindMode; 3] = [BindMode::Default, BindMode::Spectator, BindMode::Editing];

    fn index(self) -> usize {
        match self {
            BindMode::Default => 0,
            BindMode::Spectator => 1,
            BindMode::Editing => 2,
        }
    }

    /// Script command that sets a binding in this mode
    pub fn command(self) -> &'static str {
        match self {
            BindMode::Default => "bind",
            BindMode::Spectator => "specbind",
            BindMode::Editing => "editbind",
        }
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        BindMode::ALL.into_iter().find(|m| m.command() == cmd)
    }
}

/// Game state that picks which binding a key press runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameMode {
    pub main_menu: bool,
    pub editing: bool,
    pub spectator: bool,
}

impl GameMode {
    pub fn bind_mode(&self) -> BindMode {
        if self.main_menu {
            BindMode::Default
        } else if self.editing {
            BindMode::Editing
        } else if self.spectator {
            BindMode::Spectator
        } else {
            BindMode::Default
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KeyBinding {
    pub code: i32,
    pub name: String,
    actions: [String; 3],
    pub pressed: bool,
}

impl KeyBinding {
    pub fn action(&self, mode: BindMode) -> &str {
        &self.actions[mode.index()]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReleaseAction {
    Script(String),
    Command { name: String, args: Vec<Value> },
}

#[derive(Debug)]
struct PendingRelease {
    key: i32,
    action: ReleaseAction,
}

#[derive(Debug, Error, PartialEq)]
pub enum BindError {
    #[error("unknown key \"{0}\"")]
    UnknownKey(String),
    #[error("cannot override {cmd} \"{key}\"")]
    Locked { cmd: &'static str, key: String },
    #[error("cannot override keymap {0}")]
    LockedKeymap(i32),
    #[error("no key is held")]
    NoKeyHeld,
    #[error("release commands take at most 3 arguments, got {0}")]
    TooManyArgs(usize),
}

#[derive(Default)]
struct ReleaseState {
    /// Key whose action is running right now
    pressed: Option<(i32, String)>,
    pending: Vec<PendingRelease>,
}

/// Shared access to the release-action list, for script commands that run
/// while a binding is executing
#[derive(Clone, Default)]
pub struct ReleaseHandle {
    inner: Rc<RefCell<ReleaseState>>,
}

impl ReleaseHandle {
    /// Queue `action` for the release of the key being processed; returns
    /// that key's name
    pub fn add_action(&self, action: &str) -> Result<String, BindError> {
        self.add(ReleaseAction::Script(action.to_string()))
    }

    pub fn add_command(&self, name: &str, args: Vec<Value>) -> Result<String, BindError> {
        if args.len() > 3 {
            return Err(BindError::TooManyArgs(args.len()));
        }
        self.add(ReleaseAction::Command {
            name: name.to_string(),
            args,
        })
    }

    fn add(&self, action: ReleaseAction) -> Result<String, BindError> {
        let mut state = self.inner.borrow_mut();
        let (key, name) = state.pressed.clone().ok_or(BindError::NoKeyHeld)?;
        state.pending.push(PendingRelease { key, action });
        Ok(name)
    }
}

#[derive(Default)]
pub struct KeyBindingTable {
    keys: HashMap<i32, KeyBinding>,
    release: ReleaseHandle,
    /// While set, binding and keymap changes are refused
    locked: bool,
}

impl KeyBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keymap(keymap: impl IntoIterator<Item = (i32, String)>) -> Self {
        let mut table = Self::new();
        for (code, name) in keymap {
            // Fresh table is never locked
            let _ = table.keymap(code, &name);
        }
        table
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn release_handle(&self) -> ReleaseHandle {
        self.release.clone()
    }

    /// Register or rename a key
    pub fn keymap(&mut self, code: i32, name: &str) -> Result<(), BindError> {
        if self.locked {
            return Err(BindError::LockedKeymap(code));
        }
        let key = self.keys.entry(code).or_default();
        key.code = code;
        key.name = name.to_string();
        Ok(())
    }

    pub fn key(&self, code: i32) -> Option<&KeyBinding> {
        self.keys.get(&code)
    }

    pub fn key_name(&self, code: i32) -> Option<&str> {
        self.keys.get(&code).map(|k| k.name.as_str())
    }

    /// Look a key up by name, ignoring case
    pub fn find_key(&self, name: &str) -> Option<&KeyBinding> {
        self.keys.values().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    fn find_key_mut(&mut self, name: &str) -> Option<&mut KeyBinding> {
        self.keys.values_mut().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    pub fn is_pressed(&self, code: i32) -> bool {
        self.keys.get(&code).is_some_and(|k| k.pressed)
    }

    /// Set the action for `name` in `mode`. Surrounding whitespace is trimmed.
    pub fn bind(&mut self, name: &str, action: &str, mode: BindMode) -> Result<(), BindError> {
        if self.locked {
            return Err(BindError::Locked {
                cmd: mode.command(),
                key: name.to_string(),
            });
        }
        let key = self
            .find_key_mut(name)
            .ok_or_else(|| BindError::UnknownKey(name.to_string()))?;
        key.actions[mode.index()] = action.trim().to_string();
        tracing::debug!("{} {} -> {:?}", mode.command(), key.name, key.actions[mode.index()]);
        Ok(())
    }

    /// Action bound to `name` in `mode`, empty if none
    pub fn get_bind(&self, name: &str, mode: BindMode) -> String {
        self.find_key(name)
            .map(|k| k.action(mode).to_string())
            .unwrap_or_default()
    }

    /// Names of every key bound to exactly `action` in `mode`, space separated
    pub fn search_binds(&self, action: &str, mode: BindMode) -> String {
        let mut names: Vec<&str> = self
            .keys
            .values()
            .filter(|k| k.action(mode) == action)
            .map(|k| k.name.as_str())
            .collect();
        names.sort_unstable();
        names.join(" ")
    }

    pub fn clear_binds(&mut self, mode: BindMode) {
        for key in self.keys.values_mut() {
            key.actions[mode.index()].clear();
        }
    }

    pub fn clear_all_binds(&mut self) {
        for mode in BindMode::ALL {
            self.clear_binds(mode);
        }
    }

    /// Drop every key (and with them, every binding)
    pub fn clear(&mut self) {
        self.keys.clear();
        self.release.inner.borrow_mut().pending.clear();
    }

    /// Queue a release action for the key being processed
    pub fn add_release_action(&self, action: &str) -> Result<String, BindError> {
        self.release.add_action(action)
    }

    pub fn pending_releases(&self) -> usize {
        self.release.inner.borrow().pending.len()
    }

    /// Run a key transition through the table.
    ///
    /// Pending release actions for the key fire on release and are dropped
    /// either way. On press the mode's action runs, falling back to the
    /// default action when the mode has none. Returns the action run.
    pub fn exec_bind(
        &mut self,
        code: i32,
        down: bool,
        mode: GameMode,
        rt: &mut dyn ScriptRuntime,
    ) -> Option<String> {
        let (name, action) = {
            let key = self.keys.get(&code)?;
            let action = match key.action(mode.bind_mode()) {
                "" => key.action(BindMode::Default),
                a => a,
            };
            (key.name.clone(), action.to_string())
        };

        let fired: Vec<ReleaseAction> = {
            let mut state = self.release.inner.borrow_mut();
            let (mine, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut state.pending).into_iter().partition(|p| p.key == code);
            state.pending = rest;
            mine.into_iter().map(|p| p.action).collect()
        };
        if !down {
            for action in fired {
                match action {
                    ReleaseAction::Script(s) => {
                        rt.execute_str(&s);
                    }
                    ReleaseAction::Command { name, args } => {
                        rt.execute_command(&name, &args);
                    }
                }
            }
        }

        let ran = if down {
            self.release.inner.borrow_mut().pressed = Some((code, name));
            rt.execute_str(&action);
            self.release.inner.borrow_mut().pressed = None;
            Some(action)
        } else {
            None
        };

        if let Some(key) = self.keys.get_mut(&code) {
            key.pressed = down;
        }
        ran
    }

    /// Persisted `bind`/`specbind`/`editbind` lines, mode by mode, keys sorted
    /// by name
    pub fn write_binds(&self) -> String {
        let mut keys: Vec<&KeyBinding> = self.keys.values().collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        let mut out = String::new();
        for mode in BindMode::ALL {
            for key in &keys {
                let action = key.action(mode);
                if action.is_empty() {
                    continue;
                }
                let action = if validate_block(action) {
                    format!("[{}]", action)
                } else {
                    escape_string(action)
                };
                out.push_str(&format!("{} {} {}\n", mode.command(), escape_string(&key.name), action));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys;
    use crate::script::NativeRuntime;

    fn table() -> KeyBindingTable {
        KeyBindingTable::with_keymap(keys::default_keymap())
    }

    #[test]
    fn test_default_mode_runs_default_action() {
        let mut binds = table();
        let mut rt = NativeRuntime::new();
        binds.bind("G", "say hello", BindMode::Default).unwrap();
        binds.bind("G", "say spectating", BindMode::Spectator).unwrap();
        binds.bind("G", "say editing", BindMode::Editing).unwrap();

        let g = 'g' as i32;
        let ran = binds.exec_bind(g, true, GameMode::default(), &mut rt);
        assert_eq!(ran.as_deref(), Some("say hello"));
        assert!(binds.is_pressed(g));
        binds.exec_bind(g, false, GameMode::default(), &mut rt);
        assert!(!binds.is_pressed(g));

        assert_eq!(rt.executed, vec!["say hello"]);
    }

    #[test]
    fn test_mode_selection_and_fallback() {
        let mut binds = table();
        let mut rt = NativeRuntime::new();
        binds.bind("E", "edittoggle", BindMode::Default).unwrap();
        binds.bind("E", "spawn", BindMode::Spectator).unwrap();
        let e = 'e' as i32;

        let spec = GameMode {
            spectator: true,
            ..Default::default()
        };
        assert_eq!(binds.exec_bind(e, true, spec, &mut rt).as_deref(), Some("spawn"));

        // Editing has no action of its own
        let editing = GameMode {
            editing: true,
            spectator: true,
            ..Default::default()
        };
        assert_eq!(binds.exec_bind(e, true, editing, &mut rt).as_deref(), Some("edittoggle"));

        // Main menu overrides everything
        let menu = GameMode {
            main_menu: true,
            spectator: true,
            ..Default::default()
        };
        assert_eq!(binds.exec_bind(e, true, menu, &mut rt).as_deref(), Some("edittoggle"));
    }

    #[test]
    fn test_bind_trims_and_finds_case_insensitive() {
        let mut binds = table();
        binds.bind("space", "   jump  ", BindMode::Default).unwrap();
        assert_eq!(binds.get_bind("SPACE", BindMode::Default), "jump");
        assert_eq!(binds.get_bind("nope", BindMode::Default), "");
    }

    #[test]
    fn test_unknown_key_and_locked() {
        let mut binds = table();
        assert_eq!(
            binds.bind("NOTAKEY", "x", BindMode::Default),
            Err(BindError::UnknownKey("NOTAKEY".into()))
        );
        binds.set_locked(true);
        assert!(matches!(
            binds.bind("G", "x", BindMode::Editing),
            Err(BindError::Locked { cmd: "editbind", .. })
        ));
        assert_eq!(binds.keymap(5, "FIVE"), Err(BindError::LockedKeymap(5)));
    }

    #[test]
    fn test_search_and_clear() {
        let mut binds = table();
        binds.bind("W", "forward", BindMode::Default).unwrap();
        binds.bind("UP", "forward", BindMode::Default).unwrap();
        binds.bind("W", "camforward", BindMode::Editing).unwrap();
        assert_eq!(binds.search_binds("forward", BindMode::Default), "UP W");

        binds.clear_binds(BindMode::Default);
        assert_eq!(binds.search_binds("forward", BindMode::Default), "");
        assert_eq!(binds.get_bind("W", BindMode::Editing), "camforward");

        binds.clear_all_binds();
        assert_eq!(binds.get_bind("W", BindMode::Editing), "");
    }

    #[test]
    fn test_release_action_fires_once_on_release() {
        let mut binds = table();
        let handle = binds.release_handle();
        let mut rt = NativeRuntime::new();
        rt.register("attack", move |_| {
            handle.add_action("stopattack").ok();
            handle
                .add_command("setzoom", vec![Value::Int(0)])
                .ok();
            Value::Null
        });
        binds.bind("MOUSELEFT", "attack", BindMode::Default).unwrap();

        binds.exec_bind(keys::MOUSE_LEFT, true, GameMode::default(), &mut rt);
        assert_eq!(binds.pending_releases(), 2);

        binds.exec_bind(keys::MOUSE_LEFT, false, GameMode::default(), &mut rt);
        assert_eq!(binds.pending_releases(), 0);
        assert_eq!(rt.executed, vec!["attack", "stopattack", "setzoom 0"]);

        // Nothing left to fire on the next release
        binds.exec_bind(keys::MOUSE_LEFT, false, GameMode::default(), &mut rt);
        assert_eq!(rt.executed.len(), 3);
    }

    #[test]
    fn test_release_action_needs_held_key() {
        let binds = table();
        assert_eq!(binds.add_release_action("x"), Err(BindError::NoKeyHeld));
        let handle = binds.release_handle();
        assert_eq!(
            handle.add_command("x", vec![Value::Null; 4]),
            Err(BindError::TooManyArgs(4))
        );
    }

    #[test]
    fn test_write_binds() {
        let mut binds = table();
        binds.bind("G", "say hello", BindMode::Default).unwrap();
        binds.bind("H", "echo ]", BindMode::Default).unwrap();
        binds.bind("G", "spawn", BindMode::Spectator).unwrap();
        assert_eq!(
            binds.write_binds(),
            "bind \"G\" [say hello]\nbind \"H\" \"echo ]\"\nspecbind \"G\" [spawn]\n"
        );
    }
}
