use std::sync::{Arc, Mutex, PoisonError};

use cascade_core::{Action, FireArgs};

/// Ordered log shared between test actions.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writes `fire:<name>` / `stop:<name>` to its journal and keeps the
/// arguments it was fired with.
pub struct RecordingAction {
    name: String,
    journal: Journal,
    fired_with: Mutex<Vec<FireArgs>>,
}

impl RecordingAction {
    pub fn new(name: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            journal: journal.clone(),
            fired_with: Mutex::new(Vec::new()),
        })
    }

    /// Arguments of every `fire` call, oldest first.
    pub fn fired_with(&self) -> Vec<FireArgs> {
        self.fired_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&self, args: &FireArgs) -> anyhow::Result<()> {
        self.journal.record(format!("fire:{}", self.name));
        self.fired_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.clone());
        Ok(())
    }

    fn stop(&self, _args: &FireArgs) -> anyhow::Result<()> {
        self.journal.record(format!("stop:{}", self.name));
        Ok(())
    }
}

/// Which half of [`FailingAction`] returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Fire,
    Stop,
}

/// Records `fail:<name>` and errors on the chosen operation; the other one
/// behaves like a [`RecordingAction`].
pub struct FailingAction {
    name: String,
    journal: Journal,
    on: FailOn,
}

impl FailingAction {
    pub fn new(name: impl Into<String>, on: FailOn, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            journal: journal.clone(),
            on,
        })
    }

    fn invoke(&self, op: FailOn) -> anyhow::Result<()> {
        if op == self.on {
            self.journal.record(format!("fail:{}", self.name));
            anyhow::bail!("{} refused to {:?}", self.name, op);
        }
        let verb = match op {
            FailOn::Fire => "fire",
            FailOn::Stop => "stop",
        };
        self.journal.record(format!("{verb}:{}", self.name));
        Ok(())
    }
}

impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&self, _args: &FireArgs) -> anyhow::Result<()> {
        self.invoke(FailOn::Fire)
    }

    fn stop(&self, _args: &FireArgs) -> anyhow::Result<()> {
        self.invoke(FailOn::Stop)
    }
}
