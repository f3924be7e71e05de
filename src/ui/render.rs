use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::io::dev::DeviceInfo;
use crate::progress::dev::{StatusSnapshot, PROGRESS_FULL};

use super::dispatch::CTRL_C;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Selected,
    Alert,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub style: LineStyle,
}

impl Line {
    pub fn plain(text: impl Into<String>) -> Self {
        Self{ text: text.into(), style: LineStyle::Plain }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self{ text: text.into(), style: LineStyle::Alert }
    }
}

pub const TABLE_WIDTH: usize = 123;

fn clip(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

pub fn progress_bar(progress: u8) -> String {
    let fill = progress.min(PROGRESS_FULL) as usize;
    format!("[{}{}]", "#".repeat(fill), " ".repeat(PROGRESS_FULL as usize - fill))
}

pub fn header() -> [String; 2] {
    [
        format!("{:^5}{:^30}{:^20}{:^6}    {}{:^24}{}",
            "#", "Model", "Serial", "Size", "Mode  Loop", "Progress", "  Speed   Slow   Error"),
        "-".repeat(TABLE_WIDTH),
    ]
}

/// `number` is the 1-based key that selects the device
pub fn device_row(number: usize, info: &DeviceInfo, s: &StatusSnapshot) -> String {
    format!("{:^5}{:<30}{:<20}{:>5} Gb {:^7}{:^5}{:<22}{:>2}{:^7}{:^7}{:^7}",
        number,
        clip(&info.model, 30),
        clip(&info.serial, 20),
        info.capacity_gb(),
        s.mode.label(),
        s.loops,
        progress_bar(s.progress),
        s.busy.glyph(),
        s.speed,
        s.slow,
        s.error,
    )
}

pub fn prompt(selected: bool, quit_enabled: bool) -> String {
    if !selected {
        return format!("Select disk : _{}", " ".repeat(100));
    }
    let quit = if quit_enabled { "    Q-Quit" } else { "          " };
    format!("Select action :   I-Info   V-Verify   E-Erase   R-Short   L-Long   S-Stop{}", quit)
}

/// Whole dashboard: header, one row per device, prompt.
pub fn dashboard(rows: &[(&DeviceInfo, StatusSnapshot)], selected: Option<usize>, quit_enabled: bool) -> Vec<Line> {
    let mut lines: Vec<Line> = header().iter().map(|h| Line::plain(h.as_str())).collect();
    for (i, (info, snap)) in rows.iter().enumerate() {
        lines.push(Line::plain(""));
        let style = if selected == Some(i) { LineStyle::Selected } else { LineStyle::Plain };
        lines.push(Line{ text: device_row(i + 1, info, snap), style });
    }
    lines.push(Line::plain(""));
    lines.push(Line::plain(prompt(selected.is_some(), quit_enabled)));
    lines
}

/// Raw mode on the alternate screen for the lifetime of the value.
pub struct TerminalSession {
    stdout: Stdout,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        Ok(Self{ stdout })
    }

    /// Wait up to `timeout` for one key press.
    pub fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(key_char(event::read()?))
    }

    /// Block until any key is pressed.
    pub fn wait_key(&mut self) -> io::Result<()> {
        loop {
            if let Event::Key(KeyEvent{ kind: KeyEventKind::Press, .. }) = event::read()? {
                return Ok(());
            }
        }
    }

    pub fn clear(&mut self) -> io::Result<()> {
        execute!(self.stdout, ResetColor, Clear(ClearType::All), MoveTo(0, 0))
    }

    /// Overwrite the screen from the top, line by line.
    pub fn draw(&mut self, lines: &[Line]) -> io::Result<()> {
        for (row, line) in lines.iter().enumerate() {
            queue!(self.stdout, MoveTo(0, row as u16))?;
            match line.style {
                LineStyle::Plain => queue!(self.stdout, ResetColor)?,
                LineStyle::Selected => queue!(
                    self.stdout,
                    SetForegroundColor(Color::Black),
                    SetBackgroundColor(Color::White)
                )?,
                LineStyle::Alert => queue!(self.stdout, SetForegroundColor(Color::Red))?,
            }
            queue!(self.stdout, Print(&line.text), ResetColor, Clear(ClearType::UntilNewLine))?;
        }
        queue!(self.stdout, Clear(ClearType::FromCursorDown))?;
        self.stdout.flush()
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(
            self.stdout,
            SetAttribute(Attribute::Reset),
            LeaveAlternateScreen,
            Show,
            MoveTo(0, 0)
        );
        let _ = terminal::disable_raw_mode();
    }
}

fn key_char(ev: Event) -> Option<char> {
    match ev {
        Event::Key(KeyEvent{ code: KeyCode::Char(c), modifiers, kind: KeyEventKind::Press, .. }) => {
            if modifiers.contains(KeyModifiers::CONTROL) {
                if c == 'c' { Some(CTRL_C) } else { None }
            } else {
                Some(c)
            }
        }
        _ => None,
    }
}
