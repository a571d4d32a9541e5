/*!
 * Progress events published while a job runs.
 *
 * Events go to an unbounded channel so a slow consumer (a terminal
 * progress bar, a websocket relay) never stalls translation. A job without
 * a consumer simply drops them.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::unit::{JobStatus, TranslationUnit, UnitError, UnitStatus};

/// Resolution progress of a job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Resolved share of the job, 0 to 100
    pub percent: f64,
    /// Units resolved so far, completed or failed
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            completed as f64 * 100.0 / total as f64
        };
        Self {
            percent,
            completed,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    JobStarted {
        job_id: Uuid,
        progress: Progress,
    },
    BatchStarted {
        index: usize,
        size: usize,
    },
    UnitCompleted {
        unit_id: String,
        progress: Progress,
    },
    UnitFailed {
        unit_id: String,
        error: UnitError,
        progress: Progress,
    },
    BatchFinished {
        index: usize,
        completed: usize,
        failed: usize,
    },
    JobFinished {
        job_id: Uuid,
        status: JobStatus,
        progress: Progress,
    },
}

/// Publishes the progress events of one job
#[derive(Debug)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<ProgressEvent>>,
    total: usize,
    resolved: AtomicUsize,
    /// Duplicate unit ids that share the outcome of a representative
    followers: HashMap<String, Vec<String>>,
}

impl ProgressReporter {
    pub fn new(sender: Option<UnboundedSender<ProgressEvent>>, total: usize) -> Self {
        Self {
            sender,
            total,
            resolved: AtomicUsize::new(0),
            followers: HashMap::new(),
        }
    }

    /// Reporter that publishes nothing
    pub fn silent(total: usize) -> Self {
        Self::new(None, total)
    }

    /// Units whose outcome is copied from the keyed representative
    pub fn with_followers(mut self, followers: HashMap<String, Vec<String>>) -> Self {
        self.followers = followers;
        self
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.resolved.load(Ordering::SeqCst), self.total)
    }

    /// Report units resolved before any provider call (cache hits, blanks)
    pub fn resolved_upfront<S: AsRef<str>>(&self, unit_ids: &[S]) {
        for unit_id in unit_ids {
            let completed = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
            self.emit(ProgressEvent::UnitCompleted {
                unit_id: unit_id.as_ref().to_string(),
                progress: Progress::new(completed, self.total),
            });
        }
    }

    pub fn job_started(&self, job_id: Uuid) {
        self.emit(ProgressEvent::JobStarted {
            job_id,
            progress: self.progress(),
        });
    }

    pub fn batch_started(&self, index: usize, size: usize) {
        self.emit(ProgressEvent::BatchStarted { index, size });
    }

    /// Publish the terminal state of a unit and of its followers
    pub fn unit_resolved(&self, unit: &TranslationUnit) {
        let followers = self.followers.get(&unit.id).map(Vec::as_slice).unwrap_or_default();
        for unit_id in std::iter::once(&unit.id).chain(followers) {
            let completed = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
            let progress = Progress::new(completed, self.total);

            match (&unit.status, &unit.last_error) {
                (UnitStatus::Completed, _) => self.emit(ProgressEvent::UnitCompleted {
                    unit_id: unit_id.clone(),
                    progress,
                }),
                (UnitStatus::Failed, Some(error)) => self.emit(ProgressEvent::UnitFailed {
                    unit_id: unit_id.clone(),
                    error: error.clone(),
                    progress,
                }),
                (status, _) => trace!("Unit {} reported while {:?}", unit_id, status),
            }
        }
    }

    pub fn batch_finished(&self, index: usize, units: &[TranslationUnit]) {
        self.emit(ProgressEvent::BatchFinished {
            index,
            completed: units.iter().filter(|u| u.is_completed()).count(),
            failed: units.iter().filter(|u| u.is_failed()).count(),
        });
    }

    pub fn job_finished(&self, job_id: Uuid, status: JobStatus) {
        self.emit(ProgressEvent::JobFinished {
            job_id,
            status,
            progress: self.progress(),
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is watching any more
            let _ = sender.send(event);
        }
    }
}
