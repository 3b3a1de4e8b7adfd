//! Interactive install directory prompt.

use std::path::{Path, PathBuf};

use console::Term;
use dialoguer::Input;
use lsolauncher::component::Component;
use lsolauncher::orchestrator::DirectoryPrompt;

/// Asks on the terminal. Without a terminal every prompt is cancelled.
pub struct ConsolePrompt;

impl DirectoryPrompt for ConsolePrompt {
    fn choose_directory(&self, component: &Component, suggested: Option<&Path>) -> Option<PathBuf> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let mut input = Input::<String>::new()
            .with_prompt(format!(
                "Install {} into (empty to cancel)",
                component.name()
            ))
            .allow_empty(true);
        if let Some(path) = suggested {
            input = input.with_initial_text(path.display().to_string());
        }

        let answer = input.interact_text_on(&term).ok()?;
        parse_answer(&answer)
    }
}

fn parse_answer(answer: &str) -> Option<PathBuf> {
    let answer = answer.trim().trim_matches('"');
    if answer.is_empty() {
        None
    } else {
        Some(PathBuf::from(answer))
    }
}
