use std::io::{self, BufRead, Stdout, StdinLock, Write};

/// Asks whether an existing destination may be overwritten
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Line-based yes/no prompt. Only an answer starting with `y` or `Y` counts
/// as yes; an empty line, end of input or a read error is a no.
pub struct TerminalConfirm<R, W> {
    input: R,
    output: W,
}

impl TerminalConfirm<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} (Y/N)? ")?;
        self.output.flush()?;

        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            match line.trim_start().chars().next() {
                Some('y' | 'Y') => return Ok(true),
                Some('n' | 'N') | None => return Ok(false),
                // anything else: ask again
                Some(_) => {
                    write!(self.output, "(Y/N)? ")?;
                    self.output.flush()?;
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        self.ask(question).unwrap_or(false)
    }
}
