//! Demo window set
//!
//! A small interface built with the native runtime: a main window with
//! buttons, a text field and the console, and an options window with a
//! slider and a scrolling list. The terminal preview and the headless runner
//! both start from it.

use crate::core::AppCore;
use crate::script::{Code, ScriptRuntime, Value};
use crate::ui::{StateFlags, UiBuilder};

const PANEL: u32 = 0x202830;
const BUTTON: u32 = 0x3A4A5A;
const BUTTON_HOVER: u32 = 0x5A7A9A;
const TRACK: u32 = 0x404040;
const KNOB: u32 = 0xC0C0C0;

/// Bindings and completions the demo starts with
const SETUP: &str = "\
bind RETURN [saycommand]
bind F1 [toggleui options]
bind F10 [quit]
bind ESCAPE [hidetopui]
listcomplete showui [main options]
listcomplete hideui [main options]
miniconfilter 63
echo [F1 options, F10 quit, Enter opens the command line]";

/// Register the demo windows and show the main one
pub fn install(core: &mut AppCore) {
    core.rt.define_var("volume", Value::Int(5), Some((0.0, 10.0)));
    core.rt.define_var("playername", Value::from("unnamed"), None);

    core.new_ui("main", Code::build(main_window), Code::Exit, Code::Exit);
    core.new_ui(
        "options",
        Code::build(options_window),
        Code::source("echo [options opened]"),
        Code::source("echo [options closed]"),
    );
    core.run_script(SETUP);
    core.run_script("showui main");
}

fn label(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>, text: impl Into<Value>) {
    b.text(rt, &text.into(), 1.0, &Code::Exit);
}

/// Clickable label that runs `action` on release
fn button(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>, text: &'static str, action: &'static str) {
    if b.next_state(StateFlags::RELEASE) {
        rt.execute_str(action);
    }
    let hovered = b.next_state(StateFlags::HOVER);
    let color = if hovered { BUTTON_HOVER } else { BUTTON };
    b.target(
        rt,
        0.0,
        0.0,
        &Code::build(move |rt, b| {
            b.color(
                rt,
                color,
                0.0,
                0.0,
                &Code::build(move |rt, b| {
                    label(rt, b, text);
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
}

fn main_window(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>) -> Value {
    b.color(
        rt,
        PANEL,
        0.0,
        0.0,
        &Code::build(|rt, b| {
            b.vlist(
                rt,
                0.01,
                &Code::build(|rt, b| {
                    label(rt, b, "cubeui");
                    b.hlist(
                        rt,
                        0.02,
                        &Code::build(|rt, b| {
                            button(rt, b, "Options", "toggleui options");
                            button(rt, b, "Quit", "quit");
                            Value::Null
                        }),
                    );
                    b.hlist(
                        rt,
                        0.02,
                        &Code::build(|rt, b| {
                            label(rt, b, "Name:");
                            b.field(rt, "playername", 16, &Code::source("echo [name set]"), 1.0, None, &Code::Exit);
                            Value::Null
                        }),
                    );
                    b.console(rt, 0.9, 0.25, &Code::Exit);
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
    Value::Null
}

fn options_window(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>) -> Value {
    b.esc_hide(Some(true));
    b.color(
        rt,
        PANEL,
        0.0,
        0.0,
        &Code::build(|rt, b| {
            b.vlist(
                rt,
                0.01,
                &Code::build(|rt, b| {
                    let volume = rt.get_var("volume").unwrap_or_default();
                    label(rt, b, format!("Volume: {}", volume));
                    b.hlist(rt, 0.0, &Code::build(volume_slider));
                    b.hlist(rt, 0.0, &Code::build(scroll_list));
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
    Value::Null
}

fn volume_slider(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>) -> Value {
    b.slider_arrow(
        rt,
        -1.0,
        &Code::build(|rt, b| {
            b.target(rt, 0.0, 0.0, &Code::build(|rt, b| {
                label(rt, b, "<");
                Value::Null
            }));
            Value::Null
        }),
    );
    b.hslider(
        rt,
        "volume",
        0.0,
        10.0,
        1.0,
        &Code::Exit,
        &Code::build(|rt, b| {
            b.color(rt, TRACK, 0.3, 1.0 / 24.0, &Code::Exit);
            b.slider_button(
                rt,
                &Code::build(|rt, b| {
                    b.color(rt, KNOB, 0.02, 1.0 / 24.0, &Code::Exit);
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
    b.slider_arrow(
        rt,
        1.0,
        &Code::build(|rt, b| {
            b.target(rt, 0.0, 0.0, &Code::build(|rt, b| {
                label(rt, b, ">");
                Value::Null
            }));
            Value::Null
        }),
    );
    Value::Null
}

fn scroll_list(rt: &mut dyn ScriptRuntime, b: &mut UiBuilder<'_>) -> Value {
    b.scroll(
        rt,
        0.4,
        0.2,
        &Code::build(|rt, b| {
            b.vlist(
                rt,
                0.0,
                &Code::build(|rt, b| {
                    for i in 1..=20 {
                        label(rt, b, format!("Entry {}", i));
                    }
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
    b.vscrollbar(
        rt,
        &Code::build(|rt, b| {
            b.color(rt, TRACK, 0.02, 0.2, &Code::Exit);
            b.scroll_button(
                rt,
                &Code::build(|rt, b| {
                    b.color(rt, KNOB, 0.02, 0.03, &Code::Exit);
                    Value::Null
                }),
            );
            Value::Null
        }),
    );
    b.scroll_arrow(rt, 3.0, &Code::Exit);
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ui::draw::{DrawCommand, DrawList};

    fn demo() -> AppCore {
        let mut core = AppCore::new(Config::default());
        core.ui.set_hud_size(160, 120);
        install(&mut core);
        core.update(0);
        core
    }

    #[test]
    fn test_install_shows_main_and_binds_keys() {
        let core = demo();
        assert!(core.ui.visible("main"));
        assert!(!core.ui.visible("options"));
        assert!(!core.binds.get_bind("F1", crate::core::binds::BindMode::Default).is_empty());
        assert!(core.console.iter().any(|l| l.text.contains("F1 options")));
    }

    #[test]
    fn test_f1_toggles_options_and_runs_hooks() {
        let mut core = demo();
        core.process_key(crate::core::keys::F1, true);
        core.process_key(crate::core::keys::F1, false);
        assert!(core.ui.visible("options"));
        assert!(core.console.iter().any(|l| l.text == "options opened"));
    }

    #[test]
    fn test_render_draws_labels() {
        let mut core = demo();
        core.update(16);
        let mut list = DrawList::default();
        core.render(&mut list);
        assert!(list.texts().any(|t| t == "cubeui"));
        assert!(list.commands.iter().any(|c| matches!(c, DrawCommand::Fill { .. })));
    }
}
