use std::io::{self, BufRead, Write};
use std::path::PathBuf;

// Seam for the optional pre-run console interaction. The default declines
// everything, so pipelines run unattended and tests need no terminal.
pub trait Prompter {
    fn confirm(&self, prompt: &str) -> bool;
    fn choose_path(&self, prompt: &str) -> Option<PathBuf>;
}

pub struct NoopPrompter;

impl Prompter for NoopPrompter {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }

    fn choose_path(&self, _prompt: &str) -> Option<PathBuf> {
        None
    }
}

pub struct StdinPrompter;

impl StdinPrompter {
    // EOF, a closed stdin, or any read error all count as "no answer".
    fn read_line(prompt: &str) -> Option<String> {
        print!("{} ", prompt);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        let bytes = io::stdin().lock().read_line(&mut line).ok()?;
        if bytes == 0 {
            return None;
        }
        Some(line.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&self, prompt: &str) -> bool {
        match Self::read_line(&format!("{} [y/N]", prompt)) {
            Some(answer) => {
                answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
            }
            None => false,
        }
    }

    fn choose_path(&self, prompt: &str) -> Option<PathBuf> {
        let answer = Self::read_line(&format!("{} (blank to skip):", prompt))?;
        if answer.is_empty() {
            return None;
        }
        Some(PathBuf::from(answer))
    }
}
