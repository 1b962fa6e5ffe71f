//! Colored diagnostic output for packaging runs.
//!
//! Every message goes to stderr so that stdout stays free for the list of
//! produced bundle paths. `quiet` silences everything except errors.

use std::io::{self, Write};
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Success,
    Warn,
    Error,
    Verbose,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "ℹ",
            Level::Success => "✓",
            Level::Warn => "WARNING:",
            Level::Error => "✗",
            Level::Verbose => "→",
        }
    }

    fn color(self) -> Color {
        match self {
            Level::Info => Color::Cyan,
            Level::Success => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
            Level::Verbose => Color::Blue,
        }
    }

    /// Whether the message text takes the tag's color too.
    fn tints_message(self) -> bool {
        matches!(self, Level::Warn | Level::Error)
    }
}

/// Writes tagged, colored messages to stderr.
#[derive(Debug)]
pub struct OutputManager {
    stderr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl OutputManager {
    /// `verbose` enables [`verbose`](Self::verbose) messages; `quiet` wins
    /// over it.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            stderr: BufferWriter::stderr(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    /// Progress message.
    pub fn info(&self, message: &str) -> io::Result<()> {
        self.tagged(Level::Info, message)
    }

    /// Completion message.
    pub fn success(&self, message: &str) -> io::Result<()> {
        self.tagged(Level::Success, message)
    }

    /// Non-fatal problem the user should know about.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        self.tagged(Level::Warn, message)
    }

    /// Fatal error; shown even when quiet. Falls back to `eprintln!` if the
    /// colored write fails.
    pub fn error(&self, message: &str) {
        if self.tagged(Level::Error, message).is_err() {
            eprintln!("{} {}", Level::Error.tag(), message);
        }
    }

    /// Detail shown only in verbose mode.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.tagged(Level::Verbose, message)
    }

    /// Sub-item under the previous message.
    pub fn indent(&self, message: &str) -> io::Result<()> {
        self.plain(&format!("    {message}"))
    }

    /// Untagged line.
    pub fn println(&self, message: &str) -> io::Result<()> {
        self.plain(message)
    }

    /// Whether verbose messages are shown
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Whether quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn suppressed(&self, level: Level) -> bool {
        self.quiet && level != Level::Error
    }

    fn tagged(&self, level: Level, message: &str) -> io::Result<()> {
        if self.suppressed(level) {
            return Ok(());
        }
        let mut buffer = self.stderr.buffer();
        write_tagged(&mut buffer, level, message)?;
        self.stderr.print(&buffer)
    }

    fn plain(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.stderr.buffer();
        writeln!(buffer, "{message}")?;
        self.stderr.print(&buffer)
    }
}

fn write_tagged(buffer: &mut Buffer, level: Level, message: &str) -> io::Result<()> {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(level.color()));
    buffer.set_color(spec.clone().set_bold(level != Level::Info && level != Level::Verbose))?;
    write!(buffer, "{}", level.tag())?;
    buffer.reset()?;
    if level.tints_message() {
        buffer.set_color(&spec)?;
    }
    writeln!(buffer, " {message}")?;
    buffer.reset()
}
