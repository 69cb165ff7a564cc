//! Human-readable progress lines.

use std::io::{self, Write};

const ACTION: &str = "►";
const SUCCESS: &str = "✔";

/// Writes `►`/`✔` prefixed status lines.
#[derive(Debug)]
pub struct Printer<W> {
    out: W,
}

impl Printer<io::Stdout> {
    /// Printer writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> Printer<W> {
    /// Wrap an arbitrary writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// An operation is starting.
    pub fn action(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        self.line(ACTION, message.as_ref())
    }

    /// A step finished successfully.
    pub fn success(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        self.line(SUCCESS, message.as_ref())
    }

    /// An unprefixed line, used for machine-readable output.
    pub fn plain(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.out, "{}", message.as_ref())?;
        self.out.flush()
    }

    /// Consume the printer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, symbol: &str, message: &str) -> io::Result<()> {
        writeln!(self.out, "{symbol} {message}")?;
        self.out.flush()
    }
}
