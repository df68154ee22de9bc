use std::io::{self, BufRead, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use cogex_core::Trial;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{self, Attribute, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};

/// What a keystroke means to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Quit,
}

/// Raw-mode terminal used as both presentation surface and input binding.
///
/// Raw mode is left again on drop.
pub struct Screen {
    out: Stdout,
    raw: bool,
}

impl Screen {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            raw: false,
        }
    }

    pub fn enter_raw(&mut self) -> Result<()> {
        if !self.raw {
            terminal::enable_raw_mode().context("enable raw mode")?;
            execute!(self.out, cursor::Hide)?;
            self.raw = true;
        }
        Ok(())
    }

    pub fn leave_raw(&mut self) -> Result<()> {
        if self.raw {
            execute!(self.out, cursor::Show)?;
            terminal::disable_raw_mode().context("disable raw mode")?;
            self.raw = false;
        }
        Ok(())
    }

    /// Line prompt in cooked mode. `None` on end of input.
    pub fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        self.leave_raw()?;
        print!("{label}");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub fn message(&mut self, lines: &[&str]) -> Result<()> {
        self.clear()?;
        for line in lines {
            queue!(self.out, Print(line), Print("\r\n"))?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn show_trial(&mut self, trial: Trial, number: usize, limit: usize) -> Result<()> {
        self.clear()?;
        let [r, g, b] = trial.color.rgb();
        queue!(
            self.out,
            Print(format!("Trial {number} of {limit}\r\n\r\n\r\n")),
            SetForegroundColor(style::Color::Rgb { r, g, b }),
            SetAttribute(Attribute::Bold),
            Print(format!("          {}\r\n\r\n\r\n", trial.digit)),
            SetAttribute(Attribute::Reset),
            style::ResetColor,
            Print("Just type the number you see - no need to press Enter!\r\n"),
        )?;
        self.out.flush()?;
        Ok(())
    }

    /// Drops keystrokes that arrived before the current stimulus was drawn.
    pub fn discard_pending_input(&mut self) -> Result<usize> {
        let mut dropped = 0;
        while event::poll(Duration::ZERO)? {
            event::read()?;
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Blocks until the next key press.
    pub fn next_key(&mut self) -> Result<Key> {
        loop {
            if let Event::Key(key) = event::read().context("read terminal event")? {
                if let Some(key) = map_key(key) {
                    return Ok(key);
                }
            }
        }
    }

    fn clear(&mut self) -> Result<()> {
        queue!(
            self.out,
            terminal::Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.leave_raw();
    }
}

fn map_key(key: KeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Esc => Some(Key::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Quit),
        KeyCode::Char(' ') => Some(Key::Space),
        KeyCode::Char(c) => Some(Key::Char(c)),
        _ => None,
    }
}
