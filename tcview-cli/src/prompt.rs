//! Line-oriented terminal I/O behind a trait so menus can be scripted.

use std::io::{self, BufRead, Write};

use anyhow::Result;

/// Something that can show text and read answers.
pub trait Prompter {
    /// Print one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the output stream is closed.
    fn say(&mut self, line: &str) -> Result<()>;

    /// Print `question` without a newline and read one trimmed line.
    ///
    /// Returns `None` once input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    fn ask(&mut self, question: &str) -> Result<Option<String>>;

    /// Ask a `(y/N)` question; anything but `y` is a no.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self
            .ask(question)?
            .is_some_and(|a| a.eq_ignore_ascii_case("y")))
    }
}

/// Stdin/stdout prompter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

impl Prompter for Terminal {
    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(io::stdout().lock(), "{line}")?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut out = io::stdout().lock();
        write!(out, "{question}")?;
        out.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }
}
