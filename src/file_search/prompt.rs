use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// What the user typed, or that they backed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Line(String),
    Cancelled,
}

/// Synchronous question/answer channel to the user.
pub trait UserPrompt: Send + Sync {
    fn ask_line(&self, message: &str) -> Answer;

    /// `None` when the user cancelled. Empty input takes `default`.
    fn confirm(&self, message: &str, default: bool) -> Option<bool> {
        loop {
            match self.ask_line(&format!("{} [{}]", message, if default { "Y/n" } else { "y/N" })) {
                Answer::Cancelled => return None,
                Answer::Line(line) => match line.trim().to_ascii_uppercase().as_str() {
                    "" => return Some(default),
                    "Y" | "YES" => return Some(true),
                    "N" | "NO" => return Some(false),
                    other => log::warn!("Unrecognised answer '{}', expected Y or N", other),
                },
            }
        }
    }
}

/// Reads answers from stdin. `ESC` (or end of input) cancels.
pub struct ConsolePrompt;

impl UserPrompt for ConsolePrompt {
    fn ask_line(&self, message: &str) -> Answer {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "{} ", message);
        let _ = stdout.flush();
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => Answer::Cancelled,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.trim().eq_ignore_ascii_case("esc") || trimmed.contains('\u{1b}') {
                    Answer::Cancelled
                } else {
                    Answer::Line(trimmed.to_string())
                }
            }
        }
    }
}

/// Replays queued answers; cancels once the queue runs dry.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I: IntoIterator<Item = Answer>>(answers: I) -> Self {
        ScriptedPrompt {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for a run of yes/no answers.
    pub fn confirmations<I: IntoIterator<Item = bool>>(answers: I) -> Self {
        Self::new(
            answers
                .into_iter()
                .map(|yes| Answer::Line(if yes { "y" } else { "n" }.to_string())),
        )
    }

    /// Every question asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl UserPrompt for ScriptedPrompt {
    fn ask_line(&self, message: &str) -> Answer {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(Answer::Cancelled)
    }
}

/// Answers every confirmation the same way without asking.
pub struct AutoConfirm(pub bool);

impl UserPrompt for AutoConfirm {
    fn ask_line(&self, _message: &str) -> Answer {
        Answer::Cancelled
    }

    fn confirm(&self, message: &str, _default: bool) -> Option<bool> {
        log::debug!("Auto-answering '{}' with {}", message, self.0);
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_parses_answers_and_defaults() {
        let prompt = ScriptedPrompt::new([
            Answer::Line("".into()),
            Answer::Line("maybe".into()),
            Answer::Line("n".into()),
            Answer::Cancelled,
        ]);
        assert_eq!(prompt.confirm("first?", true), Some(true));
        // "maybe" is rejected and the question repeats
        assert_eq!(prompt.confirm("second?", true), Some(false));
        assert_eq!(prompt.confirm("third?", true), None);
        assert_eq!(prompt.questions().len(), 4);
    }

    #[test]
    fn exhausted_script_cancels() {
        let prompt = ScriptedPrompt::default();
        assert_eq!(prompt.ask_line("anything?"), Answer::Cancelled);
    }
}
