// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interactive input
//!
//! Stages never read the terminal directly; they go through a [`Prompter`]
//! so the interactive flow can be driven from a script.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use console::{style, Term};
use tracing::debug;

use crate::error::{BootstrapError, Result};

/// Source of user answers
pub trait Prompter: Send {
    /// Show `prompt` and read one line
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Show `prompt` and read one line without echo
    fn secret(&mut self, prompt: &str) -> Result<String>;

    /// Print a line of guidance
    fn say(&mut self, message: &str);
}

/// Ask for a value; an empty answer falls back to `default`
pub fn ask(prompter: &mut dyn Prompter, prompt: &str, default: Option<&str>) -> Result<String> {
    let label = match default {
        Some(default) => format!("{} [{}]: ", prompt, default),
        None => format!("{}: ", prompt),
    };

    let answer = prompter.input(&label)?;
    let answer = answer.trim();
    match default {
        Some(default) if answer.is_empty() => Ok(default.to_string()),
        _ => Ok(answer.to_string()),
    }
}

/// A `[y/N]` question; only an explicit `y` counts as yes
pub fn confirm(prompter: &mut dyn Prompter, prompt: &str) -> Result<bool> {
    let answer = prompter.input(prompt)?;
    Ok(answer.trim().to_lowercase() == "y")
}

/// Prompter backed by the controlling terminal
///
/// When stdin is not a terminal, lines are read from stdin and end of input
/// is reported as an error instead of an endless stream of empty answers.
pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub fn new() -> Self {
        Self::with_term(Term::stdout())
    }

    pub fn with_term(term: Term) -> Self {
        Self { term }
    }

    fn show(&self, prompt: &str) {
        if let Err(e) = self.term.write_str(prompt).and_then(|_| io::stdout().flush()) {
            debug!(error = %e, "Failed to write prompt");
        }
    }

    fn read_piped_line() -> Result<String> {
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(BootstrapError::Prompt)?;
        if read == 0 {
            return Err(BootstrapError::Prompt(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of input",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Default for TermPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TermPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        self.show(prompt);
        if self.term.features().is_attended() {
            self.term.read_line().map_err(BootstrapError::Prompt)
        } else {
            Self::read_piped_line()
        }
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        self.show(prompt);
        if self.term.features().is_attended() {
            self.term.read_secure_line().map_err(BootstrapError::Prompt)
        } else {
            Self::read_piped_line()
        }
    }

    fn say(&mut self, message: &str) {
        if let Err(e) = self.term.write_line(&format!("{}", style(message).yellow())) {
            debug!(error = %e, "Failed to write message");
        }
    }
}

/// Prompter that replays canned answers and keeps a transcript
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    messages: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Every prompt shown so far, in order
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Every guidance line printed so far, in order
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            BootstrapError::Prompt(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for '{}'", prompt),
            ))
        })
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt)
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt)
    }

    fn say(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_trims_answer() {
        let mut prompter = ScriptedPrompter::new(["  kea \n"]);
        let answer = ask(&mut prompter, "Username", None).unwrap();
        assert_eq!(answer, "kea");
        assert_eq!(prompter.prompts(), ["Username: "]);
    }

    #[test]
    fn test_ask_uses_default_for_empty_answer() {
        let mut prompter = ScriptedPrompter::new(["   "]);
        let answer = ask(&mut prompter, "Domain", Some("example.com")).unwrap();
        assert_eq!(answer, "example.com");
        assert_eq!(prompter.prompts(), ["Domain [example.com]: "]);
    }

    #[test]
    fn test_confirm_only_accepts_y() {
        for (answer, expected) in [
            ("y", true),
            ("Y", true),
            (" y ", true),
            ("yes", false),
            ("", false),
            ("n", false),
        ] {
            let mut prompter = ScriptedPrompter::new([answer]);
            assert_eq!(confirm(&mut prompter, "Continue? [y/N]: ").unwrap(), expected, "{answer:?}");
        }
    }

    #[test]
    fn test_term_write_failure_is_not_fatal() {
        // A read-only handle rejects every write
        let read = std::fs::File::open("/dev/null").unwrap();
        let write = std::fs::File::open("/dev/null").unwrap();
        let mut prompter = TermPrompter::with_term(Term::read_write_pair(read, write));

        prompter.say("Please enter your current sudo password now");
        prompter.show("Username: ");
    }

    #[test]
    fn test_scripted_prompter_runs_out() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = prompter.input("Anything: ").unwrap_err();
        assert!(matches!(err, BootstrapError::Prompt(_)));
    }
}
