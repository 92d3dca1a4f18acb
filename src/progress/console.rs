use std::io::Write;
use std::sync::Mutex;

use super::{ProgressListener, StepKind};

/// Prints progress events to a writer (stderr for the CLI).
pub struct ConsoleProgress {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleProgress {
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn print(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            // Progress output is best effort.
            let _ = writeln!(out, "{}", line);
        }
    }
}

impl ProgressListener for ConsoleProgress {
    fn started(&self, name: &str) {
        self.print(&format!("==> {}", name));
    }

    fn step_started(&self, step: &str, kind: StepKind) {
        let verb = match kind {
            StepKind::Download => "Downloading",
            StepKind::Install => "Installing",
            StepKind::Uninstall => "Uninstalling",
            StepKind::Refresh => "Refreshing",
            StepKind::Add => "Adding",
            StepKind::Initialize => "Loading",
        };
        self.print(&format!("  {} {}", verb, step));
    }

    fn step_progress(&self, _completed: u64, _total: u64) {}

    fn detail(&self, detail: &str) {
        self.print(&format!("    {}", detail));
    }

    fn error(&self, error: &str) {
        self.print(&format!("  error: {}", error));
    }

    fn finished(&self, summary: Option<&str>) {
        if let Some(summary) = summary {
            self.print(summary);
        }
    }
}
