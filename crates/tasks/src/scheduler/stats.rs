use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// How a task's execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,

    /// The task panicked, carrying the rendered panic payload.
    Panicked(String),

    /// The run was cancelled before the task started, its body never ran.
    Cancelled,
}

/// `TaskResult` is published exactly once per task by the worker that
/// executed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// Submission index of the task, starting at 0.
    pub id: usize,

    /// Wall-clock time spent inside the task body.
    pub duration: Duration,

    pub outcome: TaskOutcome,
}

impl TaskResult {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome == TaskOutcome::Completed
    }
}

/// `RunStats` aggregates the results of a run keyed by submission index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    results: BTreeMap<usize, TaskResult>,
    elapsed: Duration,
}

impl RunStats {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, result: TaskResult) {
        let previous = self.results.insert(result.id, result);
        debug_assert!(previous.is_none(), "a task reported its result twice");
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&TaskResult> {
        self.results.get(&id)
    }

    /// iter walks the results in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.values()
    }

    /// durations maps every task index to the time its body took.
    #[must_use]
    pub fn durations(&self) -> HashMap<usize, Duration> {
        self.results
            .iter()
            .map(|(id, result)| (*id, result.duration))
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.iter().filter(|result| !result.is_completed())
    }

    /// elapsed is the wall-clock time of the whole run.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// total_busy sums the time spent in task bodies, for a parallel run
    /// this exceeds [`RunStats::elapsed`].
    #[must_use]
    pub fn total_busy(&self) -> Duration {
        self.iter().map(|result| result.duration).sum()
    }
}

impl<'a> IntoIterator for &'a RunStats {
    type Item = &'a TaskResult;
    type IntoIter = std::collections::btree_map::Values<'a, usize, TaskResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.values()
    }
}
