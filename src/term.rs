use std::env;
use std::io::{self, IsTerminal, Write};

use crossterm::cursor::MoveUp;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;

/// How the status display drives the output stream. Computed once at startup
/// and passed in explicitly, so tests can inject either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Stdout is a real terminal: redraw frames in place with cursor
    /// repositioning and line erasure.
    Ansi,
    /// Piped or redirected output: carriage-return overwrite, which
    /// collapses to append-only on non-supporting sinks.
    Plain,
}

impl TerminalMode {
    /// Env toggles win over auto-detection: QTOP_FORCE_ANSI passes escape
    /// sequences through even to a pipe, QTOP_NO_ANSI strips them even on a
    /// terminal.
    pub fn detect() -> Self {
        if env::var_os("QTOP_FORCE_ANSI").is_some() {
            return TerminalMode::Ansi;
        }
        if env::var_os("QTOP_NO_ANSI").is_some() {
            return TerminalMode::Plain;
        }
        if io::stdout().is_terminal() {
            TerminalMode::Ansi
        } else {
            TerminalMode::Plain
        }
    }
}

/// Writes one redrawable region of status lines, tracking how many lines the
/// current frame has emitted so the next frame can draw over them.
pub struct LineWriter<W: Write> {
    out: W,
    mode: TerminalMode,
    lines: u16,
}

impl<W: Write> LineWriter<W> {
    pub fn new(out: W, mode: TerminalMode) -> Self {
        LineWriter {
            out,
            mode,
            lines: 0,
        }
    }

    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    /// Write one line of the current frame, erasing whatever the previous
    /// frame left on it.
    pub fn reprint_line(&mut self, text: &str) -> io::Result<()> {
        match self.mode {
            TerminalMode::Ansi => {
                queue!(self.out, Clear(ClearType::CurrentLine), Print(text), Print('\n'))?;
            }
            TerminalMode::Plain => {
                write!(self.out, "\r{text}")?;
            }
        }
        self.out.flush()?;
        self.lines = self.lines.saturating_add(1);
        Ok(())
    }

    /// Move back to the top of the previous frame so the next one overwrites
    /// it. No-op before the first frame.
    pub fn reposition_cursor(&mut self) -> io::Result<()> {
        if self.lines > 0 {
            match self.mode {
                TerminalMode::Ansi => queue!(self.out, MoveUp(self.lines))?,
                TerminalMode::Plain => write!(self.out, "\r")?,
            }
            self.out.flush()?;
            self.lines = 0;
        }
        Ok(())
    }

    /// Erase the last frame entirely, leaving the terminal clean. Runs once
    /// when the monitor loop exits, whatever the exit path.
    pub fn reset_screen(&mut self) -> io::Result<()> {
        if self.lines > 0 {
            match self.mode {
                TerminalMode::Ansi => {
                    queue!(self.out, MoveUp(self.lines), Clear(ClearType::FromCursorDown))?;
                }
                TerminalMode::Plain => write!(self.out, "\r")?,
            }
            self.out.flush()?;
            self.lines = 0;
        }
        Ok(())
    }

    /// Plain line output with no redraw bookkeeping, for the final summary.
    pub fn print_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}
