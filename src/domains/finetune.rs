//! Fine-tuning domain — long-running jobs reporting progress and logs.

use crate::domains::{Domain, FoldState};
use crate::protocol::{FineTuneEvent, JobSnapshot, JobStatus};

/// Step label a job carries once it completes, whatever the last reported
/// step was.
pub const JOB_DONE_STEP: &str = "Complete";

/// Marker for the fine-tuning domain.
#[derive(Debug, Clone, Copy)]
pub struct FineTune;

impl Domain for FineTune {
    type Event = FineTuneEvent;
    type Pending = JobSnapshot;
    type Record = JobSnapshot;

    fn route(socket_base_url: &str, target_id: &str) -> String {
        format!("{socket_base_url}/api/v1/ws/finetuning/{target_id}")
    }

    fn fold(state: &mut FoldState<Self>, event: &FineTuneEvent) {
        match event {
            FineTuneEvent::Started { job_id, data } => {
                // A start for a job this connection already saw finish is
                // stale; terminal states never revert to running.
                let already_terminal = state.completed.iter().any(|job| job.job_id == *job_id);
                if state.pending.is_none() && !already_terminal {
                    state.pending = Some(JobSnapshot {
                        job_id: job_id.clone(),
                        status: JobStatus::Running,
                        progress_pct: 0.0,
                        current_step: String::new(),
                        logs: Vec::new(),
                        error: None,
                        output_model: None,
                        duration_s: None,
                        total_steps: data.total_steps,
                    });
                }
            }
            FineTuneEvent::Progress { data, .. } => {
                if let Some(job) = state.pending.as_mut() {
                    // Progress never moves backwards.
                    if data.progress_pct > job.progress_pct {
                        job.progress_pct = data.progress_pct;
                    }
                    job.current_step = data.current_step.clone();
                }
            }
            FineTuneEvent::Log { data, .. } => {
                if let Some(job) = state.pending.as_mut() {
                    job.logs.push(data.line.clone());
                }
            }
            FineTuneEvent::Completed { data, .. } => {
                if let Some(mut job) = state.pending.take() {
                    job.status = JobStatus::Completed;
                    job.progress_pct = 100.0;
                    job.current_step = JOB_DONE_STEP.to_string();
                    job.output_model = data.output_model.clone();
                    job.duration_s = data.duration_s;
                    state.completed.push(job);
                }
            }
            FineTuneEvent::Failed { data, .. } => {
                if let Some(mut job) = state.pending.take() {
                    job.status = JobStatus::Failed;
                    job.error = Some(data.message.clone());
                    state.completed.push(job);
                }
                state.error = Some(data.message.clone());
            }
            FineTuneEvent::Cancelled { .. } => {
                if let Some(mut job) = state.pending.take() {
                    job.status = JobStatus::Cancelled;
                    state.completed.push(job);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{CompletedData, ErrorData, LogData, ProgressData, StartedData};

    fn started() -> FineTuneEvent {
        FineTuneEvent::Started {
            job_id: "job-1".into(),
            data: StartedData {
                total_steps: Some(10),
            },
        }
    }

    fn progress(pct: f32, step: &str) -> FineTuneEvent {
        FineTuneEvent::Progress {
            job_id: "job-1".into(),
            data: ProgressData {
                progress_pct: pct,
                current_step: step.into(),
            },
        }
    }

    fn log_line(line: &str) -> FineTuneEvent {
        FineTuneEvent::Log {
            job_id: "job-1".into(),
            data: LogData { line: line.into() },
        }
    }

    fn completed() -> FineTuneEvent {
        FineTuneEvent::Completed {
            job_id: "job-1".into(),
            data: CompletedData {
                output_model: Some("m:latest".into()),
                duration_s: Some(120),
            },
        }
    }

    #[test]
    fn completion_forces_progress_and_step() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&progress(45.0, "Training epoch 2"));
        state.apply(&completed());

        assert!(state.pending.is_none());
        let job = &state.completed[0];
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress_pct, 100.0);
        assert_eq!(job.current_step, JOB_DONE_STEP);
        assert_eq!(job.output_model.as_deref(), Some("m:latest"));
        assert_eq!(job.duration_s, Some(120));
    }

    #[test]
    fn progress_is_monotonic() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&progress(45.0, "Training epoch 2"));
        state.apply(&progress(30.0, "Training epoch 2 (retry)"));

        let job = state.pending.as_ref().unwrap();
        assert_eq!(job.progress_pct, 45.0);
        // The step text still follows the latest event.
        assert_eq!(job.current_step, "Training epoch 2 (retry)");
    }

    #[test]
    fn logs_are_append_only() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&log_line("loading dataset"));
        state.apply(&log_line("epoch 1/3"));
        state.apply(&log_line("epoch 2/3"));

        let job = state.pending.as_ref().unwrap();
        assert_eq!(
            job.logs,
            vec!["loading dataset", "epoch 1/3", "epoch 2/3"]
        );
    }

    #[test]
    fn failure_records_error_and_finalizes() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&FineTuneEvent::Failed {
            job_id: "job-1".into(),
            data: ErrorData {
                message: "out of GPU memory".into(),
            },
        });

        assert!(state.pending.is_none());
        let job = &state.completed[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("out of GPU memory"));
        assert_eq!(state.error.as_deref(), Some("out of GPU memory"));
    }

    #[test]
    fn cancellation_is_terminal() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&FineTuneEvent::Cancelled {
            job_id: "job-1".into(),
        });

        assert_eq!(state.completed[0].status, JobStatus::Cancelled);
        assert!(state.pending.is_none());

        // A stale progress event after the terminal state is a no-op.
        state.apply(&progress(99.0, "zombie"));
        assert!(state.pending.is_none());
    }

    #[test]
    fn terminal_job_does_not_restart() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&started());
        state.apply(&completed());
        state.apply(&started());

        assert!(state.pending.is_none());
        assert_eq!(state.completed.len(), 1);
    }

    #[test]
    fn events_before_start_are_no_ops() {
        let mut state = FoldState::<FineTune>::default();
        state.apply(&progress(10.0, "warmup"));
        state.apply(&log_line("orphan"));

        assert!(state.pending.is_none());
        assert!(state.completed.is_empty());
    }
}
