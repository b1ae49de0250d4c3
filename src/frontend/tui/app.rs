use crate::console::buffer::ConsoleType;
use crate::core::AppCore;
use crate::frontend::tui::input::convert_event;
use crate::frontend::tui::surface::CellSurface;
use crate::frontend::{Frontend, FrontendEvent};
use crate::ui::MonoMetrics;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

/// Terminal preview using ratatui
///
/// The widget interface fills the top of the terminal. The mini console
/// and the command line sit below it.
pub struct TuiFrontend {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    poll_timeout: Duration,
    /// Size of the interface area in cells, for pointer normalization
    ui_size: (u16, u16),
}

impl TuiFrontend {
    /// Enter raw mode and the alternate screen with mouse capture
    pub fn new() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("Failed to setup terminal")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor()?;
        let size = terminal.size().unwrap_or_default();

        Ok(Self {
            terminal,
            poll_timeout: Duration::from_millis(16), // ~60 FPS
            ui_size: (size.width, size.height),
        })
    }
}

fn line_style(kind: ConsoleType) -> Style {
    let color = if kind.contains(ConsoleType::ERROR) {
        Color::Red
    } else if kind.contains(ConsoleType::WARN) {
        Color::Yellow
    } else if kind.contains(ConsoleType::ECHO) {
        Color::Cyan
    } else if kind.contains(ConsoleType::DEBUG) {
        Color::DarkGray
    } else {
        Color::White
    };
    Style::default().fg(color)
}

fn render_mini_console(f: &mut Frame, area: Rect, core: &AppCore) {
    if area.height == 0 {
        return;
    }
    let view = core.mini_console_view();
    let visible = core.console.visible_lines(
        &view,
        area.width as f32,
        area.height as f32,
        &MonoMetrics::default(),
        core.now(),
    );
    let lines: Vec<Line> = visible
        .lines
        .iter()
        .map(|l| Line::from(Span::styled(l.text.as_str(), line_style(l.kind))))
        .collect();
    // Newest line on the bottom row
    let pad = (area.height as usize).saturating_sub(lines.len());
    let mut padded = vec![Line::default(); pad];
    padded.extend(lines);
    f.render_widget(Paragraph::new(padded), area);
}

fn render_command_line(f: &mut Frame, area: Rect, core: &AppCore) {
    let line = &core.command_line;
    if !line.is_open() {
        let hint = Span::styled("Enter: command line", Style::default().fg(Color::DarkGray));
        f.render_widget(Paragraph::new(Line::from(hint)), area);
        return;
    }

    let mut spans = vec![Span::styled(
        format!("{} ", line.prompt()),
        Style::default().fg(Color::Green),
    )];
    let chars: Vec<char> = line.text().chars().collect();
    let pos = line.cursor().unwrap_or(chars.len()).min(chars.len());
    let cursor_style = Style::default().fg(Color::Black).bg(Color::White);
    spans.push(Span::raw(chars[..pos].iter().collect::<String>()));
    match chars.get(pos) {
        Some(c) => {
            spans.push(Span::styled(c.to_string(), cursor_style));
            spans.push(Span::raw(chars[pos + 1..].iter().collect::<String>()));
        }
        None => spans.push(Span::styled(" ", cursor_style.add_modifier(Modifier::SLOW_BLINK))),
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

impl Frontend for TuiFrontend {
    fn poll_events(&mut self) -> Result<Vec<FrontendEvent>> {
        let mut events = Vec::new();
        while event::poll(self.poll_timeout).context("Failed to poll terminal events")? {
            let ev = event::read().context("Failed to read terminal event")?;
            events.extend(convert_event(ev, self.ui_size));
        }
        Ok(events)
    }

    fn render(&mut self, core: &mut AppCore) -> Result<()> {
        let mut ui_size = self.ui_size;
        self.terminal
            .draw(|f| {
                let area = f.area();
                let mini_rows = core
                    .config
                    .console
                    .miniconsize
                    .clamp(0, area.height.saturating_sub(2) as i64) as u16;
                let [ui_area, mini_area, line_area] = Layout::vertical([
                    Constraint::Min(1),
                    Constraint::Length(mini_rows),
                    Constraint::Length(1),
                ])
                .areas(area);

                // One text line per terminal row
                core.ui.set_hud_size(ui_area.width as i32, ui_area.height as i32);
                core.set_text_rows(ui_area.height.max(1) as i64);
                ui_size = (ui_area.width, ui_area.height);

                let mut surface = CellSurface::new(f.buffer_mut(), ui_area);
                core.render(&mut surface);
                render_mini_console(f, mini_area, core);
                render_command_line(f, line_area, core);
            })
            .context("Failed to draw frame")?;
        self.ui_size = ui_size;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        let size = self.terminal.size().unwrap_or_default();
        (size.width, size.height)
    }
}

impl Drop for TuiFrontend {
    fn drop(&mut self) {
        // Ensure terminal is restored even if cleanup() wasn't called
        let _ = self.cleanup();
    }
}
