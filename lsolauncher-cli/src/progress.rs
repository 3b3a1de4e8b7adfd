//! Progress bars for install events.

use std::collections::HashMap;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lsolauncher::orchestrator::InstallEvent;
use tokio::sync::broadcast::{self, error::RecvError};

/// One bar per component being installed.
pub struct ProgressDisplay {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    style: ProgressStyle,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:>12.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            style,
        }
    }

    /// Render events until the channel closes.
    pub async fn follow(mut self, mut events: broadcast::Receiver<InstallEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.apply(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }

    fn apply(&mut self, event: &InstallEvent) {
        let bar = self.bar(event.component());
        match event {
            InstallEvent::Progress {
                stage,
                percent,
                message,
                ..
            } => {
                bar.set_position(percent.clamp(0.0, 100.0) as u64);
                bar.set_message(format!("{}: {}", stage, message));
            }
            InstallEvent::Done { path, .. } => {
                bar.set_position(100);
                let message = match path {
                    Some(path) => format!("{} {}", style("installed").green(), path.display()),
                    None => style("installed").green().to_string(),
                };
                bar.finish_with_message(message);
            }
            InstallEvent::Failed { class, message, .. } => {
                bar.abandon_with_message(format!("{} {}", style(class).red(), message));
            }
        }
    }

    fn bar(&mut self, component: &str) -> ProgressBar {
        if let Some(bar) = self.bars.get(component) {
            return bar.clone();
        }
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(self.style.clone());
        bar.set_prefix(component.to_string());
        self.bars.insert(component.to_string(), bar.clone());
        bar
    }
}
