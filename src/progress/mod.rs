//! Observer interfaces for user-facing progress and state changes.
//!
//! Listeners are registered on a [`Listeners`] registry owned by the
//! installer. Events are dispatched synchronously in subscription order.

mod console;

use std::sync::Arc;

pub use console::ConsoleProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Download,
    Install,
    Uninstall,
    Refresh,
    Add,
    Initialize,
}

/// Receives progress of long running operations.
pub trait ProgressListener: Send + Sync {
    fn started(&self, name: &str);
    fn step_started(&self, step: &str, kind: StepKind);
    fn step_progress(&self, completed: u64, total: u64);
    fn detail(&self, detail: &str);
    fn error(&self, error: &str);
    fn finished(&self, summary: Option<&str>);
}

/// Notified after installations or sources changed.
#[cfg_attr(test, mockall::automock)]
pub trait ChangeListener: Send + Sync {
    fn changed(&self);
}

/// Returned by [`Listeners::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub struct Listeners<L: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerHandle, Arc<L>)>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<L: ?Sized> Listeners<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<L>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push((handle, listener));
        handle
    }

    /// Returns false if the handle was not subscribed.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != before
    }

    pub fn fire(&self, action: impl Fn(&L)) {
        for (_, listener) in &self.entries {
            action(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ProgressListeners = Listeners<dyn ProgressListener>;
pub type ChangeListeners = Listeners<dyn ChangeListener>;

impl Listeners<dyn ProgressListener> {
    pub fn started(&self, name: &str) {
        self.fire(|l| l.started(name));
    }

    pub fn step_started(&self, step: &str, kind: StepKind) {
        self.fire(|l| l.step_started(step, kind));
    }

    pub fn step_progress(&self, completed: u64, total: u64) {
        self.fire(|l| l.step_progress(completed, total));
    }

    pub fn detail(&self, detail: &str) {
        self.fire(|l| l.detail(detail));
    }

    pub fn error(&self, error: &str) {
        self.fire(|l| l.error(error));
    }

    pub fn finished(&self, summary: Option<&str>) {
        self.fire(|l| l.finished(summary));
    }
}

impl Listeners<dyn ChangeListener> {
    pub fn changed(&self) {
        self.fire(|l| l.changed());
    }
}

/// Human readable size, e.g. `1.5 MiB`.
pub fn format_byte_count(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes > GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes > MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes > KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
