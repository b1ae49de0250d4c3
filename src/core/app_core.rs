use crate::config::{self, Config, VarSpec};
use crate::console::buffer::{ConsoleBuffer, ConsoleType, ConsoleView};
use crate::console::command_line::{CommandLine, LineKey};
use crate::core::binds::{BindError, BindMode, GameMode, KeyBindingTable, ReleaseHandle};
use crate::core::completion::TextCompletionIndex;
use crate::core::keys;
use crate::script::{Code, NativeRuntime, ScriptRuntime, Value};
use crate::ui::draw::DrawSurface;
use crate::ui::{Interface, InterfaceSettings};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;

/// Requests made by script commands, applied once the script returns
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    ShowUi(String),
    HideUi(String),
    ToggleUi(String),
    HoldUi(String, bool),
    HideTopUi,
    HideAllUi,
    Bind {
        mode: BindMode,
        key: String,
        action: String,
    },
    /// `None` clears every mode
    ClearBinds(Option<BindMode>),
    Keymap {
        code: i32,
        name: String,
    },
    Complete {
        command: String,
        dir: String,
        ext: String,
    },
    ListComplete {
        command: String,
        list: String,
    },
    ConSkip(i32),
    MiniConSkip(i32),
    ClearConsole,
    Echo(String),
    Error(String),
    InputCommand {
        init: String,
        action: Option<String>,
        prompt: Option<String>,
        flags: Option<String>,
    },
    History(usize),
    WriteBinds,
    Quit,
}

/// Script misuse reported on the console
#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("unknown window \"{0}\"")]
    UnknownWindow(String),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("cannot save bindings: {0}")]
    Save(String),
}

type CommandQueue = Rc<RefCell<VecDeque<AppCommand>>>;

/// Upper bound on commands applied after one script run
const MAX_DRAIN: usize = 10_000;

/// Core application state (frontend-agnostic)
///
/// AppCore owns the script runtime, the widget interface, the console, the
/// command line with its history, the key binding table and the completion
/// index. Frontends feed it events through the input router and draw it
/// with [`AppCore::render`].
pub struct AppCore {
    pub config: Config,
    pub rt: NativeRuntime,
    pub ui: Interface,
    pub console: ConsoleBuffer,
    pub command_line: CommandLine,
    pub binds: KeyBindingTable,
    pub completion: TextCompletionIndex,
    pub game_mode: GameMode,

    /// Application running flag
    pub running: bool,

    /// Frame clock in milliseconds
    now: u64,

    /// Either control key is down
    ctrl: bool,

    queue: CommandQueue,

    /// Names of the shown windows, readable from script commands
    shown: Rc<RefCell<Vec<String>>>,
}

impl AppCore {
    pub fn new(config: Config) -> Self {
        let queue: CommandQueue = Rc::default();
        let shown: Rc<RefCell<Vec<String>>> = Rc::default();
        let binds = KeyBindingTable::with_keymap(keys::default_keymap());
        let mut rt = NativeRuntime::new();
        register_commands(&mut rt, &queue, &shown, binds.release_handle());

        let mut core = Self {
            ui: Interface::new(InterfaceSettings::default()),
            console: ConsoleBuffer::new(config.console.maxcon as usize),
            command_line: CommandLine::new(config.history.maxhistory as usize),
            binds,
            completion: TextCompletionIndex::new(),
            game_mode: GameMode::default(),
            running: true,
            now: 0,
            ctrl: false,
            rt,
            queue,
            shown,
            config,
        };
        core.define_vars();
        core.apply_config();
        core
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Run script text, then apply what it asked for
    pub fn run_script(&mut self, source: &str) -> Value {
        let result = self.rt.execute_str(source);
        self.drain_commands();
        result
    }

    /// Register a window whose contents are built by native code
    pub fn new_ui(&mut self, name: &str, contents: Code, onshow: Code, onhide: Code) {
        self.ui.new_ui(&mut self.rt, name, contents, onshow, onhide);
        self.drain_commands();
    }

    /// Queue a console line
    pub fn echo(&mut self, kind: ConsoleType, text: &str) {
        self.console.append(kind, text, self.now);
    }

    /// Advance the frame clock and rebuild every shown window
    pub fn update(&mut self, now: u64) {
        self.now = now;
        self.ui.update(&mut self.rt, now);
        self.drain_commands();
    }

    pub fn render(&mut self, surface: &mut dyn DrawSurface) {
        let view = self.console_view();
        self.ui.render(surface, Some((&self.console, view)));
    }

    /// View parameters of the main console
    pub fn console_view(&self) -> ConsoleView {
        ConsoleView {
            skip: self.console.skip,
            fade_secs: self.config.console.confade as u32,
            filter: ConsoleType::from_bits_truncate(self.config.console.confilter as u32),
        }
    }

    /// View parameters of the mini console
    pub fn mini_console_view(&self) -> ConsoleView {
        ConsoleView {
            skip: self.console.mini_skip,
            fade_secs: self.config.console.miniconfade as u32,
            filter: ConsoleType::from_bits_truncate(self.config.console.miniconfilter as u32),
        }
    }

    /// Key or mouse button transition.
    ///
    /// A key whose binding is already held goes straight to the binding so
    /// its release actions fire. Otherwise the UI gets the first look, then
    /// the command line, then the binding table. Returns true when
    /// something consumed the key.
    pub fn process_key(&mut self, code: i32, down: bool) -> bool {
        if keys::is_ctrl(code) {
            self.ctrl = down;
        }

        let handled = if self.binds.is_pressed(code) {
            self.exec_bind(code, down)
        } else if self.ui_key(code, down) {
            true
        } else {
            match self.command_line.key(code, down, self.ctrl, &mut self.completion, &self.rt) {
                LineKey::Ignored => self.exec_bind(code, down),
                LineKey::Handled | LineKey::Closed => true,
                LineKey::Submit(entry) => {
                    if let Some(entry) = entry {
                        entry.run(&mut self.rt, &mut self.console, self.now);
                    }
                    true
                }
            }
        };
        self.drain_commands();
        handled
    }

    fn ui_key(&mut self, code: i32, down: bool) -> bool {
        let binds = &self.binds;
        let key_name = |c: i32| binds.key_name(c).map(str::to_string);
        self.ui.key_press(&mut self.rt, code, down, &key_name)
    }

    fn exec_bind(&mut self, code: i32, down: bool) -> bool {
        self.binds
            .exec_bind(code, down, self.game_mode, &mut self.rt)
            .is_some()
    }

    /// Typed text: the focused editor first, then an open command line
    pub fn text_input(&mut self, text: &str) -> bool {
        if self.ui.text_input(text) {
            return true;
        }
        if self.command_line.is_open() {
            return self.command_line.insert(text, &mut self.completion);
        }
        false
    }

    pub fn move_cursor(&mut self, dx: f32, dy: f32) -> bool {
        self.ui.move_cursor(dx, dy)
    }

    /// Apply queued script requests until the queue stays empty
    pub fn drain_commands(&mut self) {
        let mut applied = 0;
        while let Some(cmd) = self.next_command() {
            applied += 1;
            if applied > MAX_DRAIN {
                tracing::error!("Script command loop, dropping {} queued commands", self.queue.borrow().len());
                self.queue.borrow_mut().clear();
                break;
            }
            self.apply(cmd);
        }
        self.pull_vars();
        self.refresh_shown();
    }

    fn next_command(&self) -> Option<AppCommand> {
        self.queue.borrow_mut().pop_front()
    }

    fn apply(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::ShowUi(name) => {
                if !self.ui.show(&mut self.rt, &name) {
                    self.report(ConsoleError::UnknownWindow(name));
                }
            }
            AppCommand::HideUi(name) => {
                self.ui.hide(&mut self.rt, &name);
            }
            AppCommand::ToggleUi(name) => {
                if self.ui.window(&name).is_none() {
                    self.report(ConsoleError::UnknownWindow(name));
                } else {
                    self.ui.toggle(&mut self.rt, &name);
                }
            }
            AppCommand::HoldUi(name, on) => self.ui.hold(&mut self.rt, &name, on),
            AppCommand::HideTopUi => {
                self.ui.hide_top(&mut self.rt);
            }
            AppCommand::HideAllUi => {
                self.ui.hide_all(&mut self.rt);
            }
            AppCommand::Bind { mode, key, action } => {
                if let Err(e) = self.binds.bind(&key, &action, mode) {
                    self.report(ConsoleError::from(e));
                }
            }
            AppCommand::ClearBinds(Some(mode)) => self.binds.clear_binds(mode),
            AppCommand::ClearBinds(None) => self.binds.clear_all_binds(),
            AppCommand::Keymap { code, name } => {
                if let Err(e) = self.binds.keymap(code, &name) {
                    self.report(ConsoleError::from(e));
                }
            }
            AppCommand::Complete { command, dir, ext } => {
                self.completion.add_complete(&command, &dir, &ext)
            }
            AppCommand::ListComplete { command, list } => {
                self.completion.add_list_complete(&command, &list)
            }
            AppCommand::ConSkip(n) => {
                let filter = ConsoleType::from_bits_truncate(self.config.console.fullconfilter as u32);
                self.console.scroll(n, filter);
            }
            AppCommand::MiniConSkip(n) => {
                let filter = ConsoleType::from_bits_truncate(self.config.console.miniconfilter as u32);
                self.console.scroll_mini(n, filter);
            }
            AppCommand::ClearConsole => self.console.clear(),
            AppCommand::Echo(text) => self.console.append(ConsoleType::ECHO, &text, self.now),
            AppCommand::Error(text) => self.report(text),
            AppCommand::InputCommand {
                init,
                action,
                prompt,
                flags,
            } => self.command_line.input_command(
                Some(&init),
                action.as_deref(),
                prompt.as_deref(),
                flags.as_deref(),
                self.now,
            ),
            AppCommand::History(n) => {
                self.command_line
                    .history
                    .rerun(n, &mut self.rt, &mut self.console, self.now)
            }
            AppCommand::WriteBinds => {
                let result = config::Config::binds_path()
                    .and_then(|path| config::save_binds(&path, &self.binds, &self.completion));
                if let Err(e) = result {
                    self.report(ConsoleError::Save(format!("{:#}", e)));
                }
            }
            AppCommand::Quit => self.running = false,
        }
    }

    /// Script misuse shows up as an error line
    fn report(&mut self, error: impl std::fmt::Display) {
        self.console.append(ConsoleType::ERROR, &error.to_string(), self.now);
    }

    fn refresh_shown(&self) {
        let mut shown = self.shown.borrow_mut();
        shown.clear();
        shown.extend(self.ui.shown().map(str::to_string));
    }

    /// Expose the config as bounded script variables
    fn define_vars(&mut self) {
        for (spec, value) in int_vars(&mut self.config) {
            let v = Value::Int(*value as i32);
            self.rt
                .define_var(short_name(&spec), v, Some((spec.min as f32, spec.max as f32)));
        }
        let spec = config::SENSITIVITY;
        self.rt.define_var(
            short_name(&spec),
            Value::Float(self.config.ui.sensitivity as f32),
            Some((spec.min as f32, spec.max as f32)),
        );
    }

    /// Copy script-side variable changes back into the config
    fn pull_vars(&mut self) {
        let mut changed = false;
        for (spec, value) in int_vars(&mut self.config) {
            if let Some(v) = self.rt.get_var(short_name(&spec)) {
                let v = v.as_int() as i64;
                if v != *value {
                    *value = v;
                    changed = true;
                }
            }
        }
        let spec = config::SENSITIVITY;
        if let Some(v) = self.rt.get_var(short_name(&spec)) {
            let v = v.as_float() as f64;
            if (v - self.config.ui.sensitivity).abs() > f64::EPSILON {
                self.config.ui.sensitivity = v;
                changed = true;
            }
        }
        if changed {
            self.apply_config();
        }
    }

    /// Change `ui.textrows` from the host, keeping the script variable in step
    pub fn set_text_rows(&mut self, rows: i64) {
        let rows = config::TEXTROWS.clamp(rows);
        if rows == self.config.ui.textrows {
            return;
        }
        self.config.ui.textrows = rows;
        self.rt.set_var(short_name(&config::TEXTROWS), Value::Int(rows as i32));
        self.apply_config();
    }

    /// Push config values into the parts that use them
    pub fn apply_config(&mut self) {
        let c = &self.config;
        self.console.set_capacity(c.console.maxcon as usize);
        self.command_line
            .history
            .set_max_history(c.history.maxhistory as usize);
        self.ui.settings = InterfaceSettings {
            text_rows: c.ui.textrows as u32,
            scroll_step_ms: c.ui.scrollsteptime as u32,
            slider_step_ms: c.ui.slidersteptime as u32,
            sensitivity: c.ui.sensitivity as f32,
        };
    }
}

fn short_name<T>(spec: &VarSpec<T>) -> &'static str {
    spec.name.rsplit('.').next().unwrap_or(spec.name)
}

fn int_vars(config: &mut Config) -> [(VarSpec<i64>, &mut i64); 13] {
    let Config { console, history, ui } = config;
    [
        (config::MAXCON, &mut console.maxcon),
        (config::CONSIZE, &mut console.consize),
        (config::MINICONSIZE, &mut console.miniconsize),
        (config::MINICONWIDTH, &mut console.miniconwidth),
        (config::CONFADE, &mut console.confade),
        (config::MINICONFADE, &mut console.miniconfade),
        (config::CONFILTER, &mut console.confilter),
        (config::FULLCONFILTER, &mut console.fullconfilter),
        (config::MINICONFILTER, &mut console.miniconfilter),
        (config::MAXHISTORY, &mut history.maxhistory),
        (config::SCROLLSTEPTIME, &mut ui.scrollsteptime),
        (config::SLIDERSTEPTIME, &mut ui.slidersteptime),
        (config::TEXTROWS, &mut ui.textrows),
    ]
}

fn arg_str(args: &[Value], i: usize) -> String {
    args.get(i).map(|v| v.to_string()).unwrap_or_default()
}

fn arg_opt(args: &[Value], i: usize) -> Option<String> {
    args.get(i).map(|v| v.to_string()).filter(|s| !s.is_empty())
}

fn arg_int(args: &[Value], i: usize) -> i32 {
    args.get(i).map(Value::as_int).unwrap_or(0)
}

/// Script commands. Anything that touches app state is queued.
fn register_commands(
    rt: &mut NativeRuntime,
    queue: &CommandQueue,
    shown: &Rc<RefCell<Vec<String>>>,
    release: ReleaseHandle,
) {
    let push = |rt: &mut NativeRuntime, name: &str, f: fn(&[Value]) -> AppCommand| {
        let q = queue.clone();
        rt.register(name, move |args| {
            q.borrow_mut().push_back(f(args));
            Value::Null
        });
    };

    push(rt, "showui", |a| AppCommand::ShowUi(arg_str(a, 0)));
    push(rt, "hideui", |a| AppCommand::HideUi(arg_str(a, 0)));
    push(rt, "toggleui", |a| AppCommand::ToggleUi(arg_str(a, 0)));
    push(rt, "holdui", |a| AppCommand::HoldUi(arg_str(a, 0), arg_int(a, 1) != 0));
    push(rt, "hidetopui", |_| AppCommand::HideTopUi);
    push(rt, "hideallui", |_| AppCommand::HideAllUi);
    for mode in BindMode::ALL {
        let q = queue.clone();
        rt.register(mode.command(), move |args| {
            q.borrow_mut().push_back(AppCommand::Bind {
                mode,
                key: arg_str(args, 0),
                action: arg_str(args, 1),
            });
            Value::Null
        });
    }
    push(rt, "clearbinds", |a| {
        AppCommand::ClearBinds(a.first().and_then(|m| BindMode::from_command(&m.to_string())))
    });
    push(rt, "keymap", |a| AppCommand::Keymap {
        code: arg_int(a, 0),
        name: arg_str(a, 1),
    });
    push(rt, "complete", |a| AppCommand::Complete {
        command: arg_str(a, 0),
        dir: arg_str(a, 1),
        ext: arg_str(a, 2),
    });
    push(rt, "listcomplete", |a| AppCommand::ListComplete {
        command: arg_str(a, 0),
        list: arg_str(a, 1),
    });
    push(rt, "conskip", |a| AppCommand::ConSkip(arg_int(a, 0)));
    push(rt, "miniconskip", |a| AppCommand::MiniConSkip(arg_int(a, 0)));
    push(rt, "clearconsole", |_| AppCommand::ClearConsole);
    push(rt, "echo", |a| {
        AppCommand::Echo(a.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "))
    });
    push(rt, "inputcommand", |a| AppCommand::InputCommand {
        init: arg_str(a, 0),
        action: arg_opt(a, 1),
        prompt: arg_opt(a, 2),
        flags: a.get(3).map(|v| v.to_string()),
    });
    push(rt, "saycommand", |a| AppCommand::InputCommand {
        init: a.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "),
        action: None,
        prompt: None,
        flags: None,
    });
    push(rt, "history", |a| AppCommand::History(arg_int(a, 0).max(0) as usize));
    push(rt, "writebinds", |_| AppCommand::WriteBinds);
    push(rt, "quit", |_| AppCommand::Quit);

    let names = shown.clone();
    rt.register("uivisible", move |args| {
        let name = arg_str(args, 0);
        Value::from(names.borrow().iter().any(|n| *n == name))
    });

    let q = queue.clone();
    let handle = release.clone();
    rt.register("onrelease", move |args| match handle.add_action(&arg_str(args, 0)) {
        Ok(key) => Value::Str(key),
        Err(e) => {
            q.borrow_mut().push_back(AppCommand::Error(e.to_string()));
            Value::Null
        }
    });

    let q = queue.clone();
    rt.register("onreleasecmd", move |args| {
        let Some((name, rest)) = args.split_first() else {
            return Value::Null;
        };
        match release.add_command(&name.to_string(), rest.to_vec()) {
            Ok(key) => Value::Str(key),
            Err(e) => {
                q.borrow_mut().push_back(AppCommand::Error(e.to_string()));
                Value::Null
            }
        }
    });
}
