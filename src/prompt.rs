//! Operator confirmations for destructive steps.

use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Ask,
}

pub struct Confirmer {
    interactive: bool,
    auto_yes: bool,
}

impl Confirmer {
    pub fn new(auto_yes: bool) -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
            auto_yes,
        }
    }

    #[cfg(test)]
    pub fn with_terminal(interactive: bool, auto_yes: bool) -> Self {
        Self {
            interactive,
            auto_yes,
        }
    }

    /// Decide without reading input where possible
    pub fn answer(&self) -> Answer {
        if self.auto_yes {
            Answer::Yes
        } else if !self.interactive {
            Answer::No
        } else {
            Answer::Ask
        }
    }

    /// Ask a yes/no question; anything but y/yes declines
    pub fn confirm(&self, question: &str) -> bool {
        match self.answer() {
            Answer::Yes => true,
            Answer::No => {
                eprintln!("{} declined: not a terminal (use --yes)", question);
                false
            }
            Answer::Ask => {
                print!("{} [y/N]: ", question);
                io::stdout().flush().ok();
                read_yes(io::stdin().lock())
            }
        }
    }
}

fn read_yes(mut input: impl BufRead) -> bool {
    let mut line = String::new();
    if input.read_line(&mut line).is_ok() {
        let line = line.trim().to_lowercase();
        line == "y" || line == "yes"
    } else {
        false
    }
}
