//! Waiting for submitted jobs to finish

use super::{Context, remote_error, resource_label};
use declarative::{Diagnostic, Diagnostics};
use galaxykit::backend::Accessor;
use galaxykit::{Job, JobState};
use std::collections::BTreeSet;

/// Result of [`wait_for_jobs`]
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Latest known copy of every tracked job, in submission order
    pub jobs: Vec<Job>,
    /// The wait ended because the caller cancelled
    pub cancelled: bool,
    pub diagnostics: Diagnostics,
}

impl PollOutcome {
    /// Jobs that ended in a failure state
    pub fn failed(&self) -> impl Iterator<Item = &Job> {
        self.jobs
            .iter()
            .filter(|job| job.job_state().is_some_and(|s| s.is_failure()))
    }
}

/// Re-fetch `jobs` every `ctx.poll_interval` until all of them are terminal.
///
/// A job that disappears is reported and stops being tracked; other fetch
/// errors are logged and retried on the next round. States this client does
/// not know keep the job tracked. Terminal jobs are never fetched again.
///
/// On cancellation the loop stops immediately and no failure classification
/// happens. Otherwise every job that ended in a failure state gets an error
/// diagnostic naming it.
pub fn wait_for_jobs<A>(accessor: &A, jobs: Vec<Job>, ctx: &Context) -> PollOutcome
where
    A: Accessor<Job> + ?Sized,
{
    let mut outcome = PollOutcome {
        jobs,
        ..PollOutcome::default()
    };
    let mut lost: BTreeSet<String> = BTreeSet::new();
    let mut unknown: BTreeSet<(String, String)> = BTreeSet::new();

    loop {
        let pending = outcome
            .jobs
            .iter()
            .filter(|job| !settled(job, &lost))
            .count();
        if pending == 0 {
            break;
        }
        log::info!("Waiting for {pending} of {} jobs", outcome.jobs.len());

        if ctx.cancel.wait(ctx.poll_interval) {
            log::info!("Stopped waiting for jobs: cancelled");
            outcome.cancelled = true;
            outcome.diagnostics.push(Diagnostic::warning(
                "stopped waiting for jobs to complete: cancelled",
            ));
            return outcome;
        }

        for job in &mut outcome.jobs {
            if settled(job, &lost) {
                continue;
            }
            match accessor.get(&job.id) {
                Ok(fresh) => {
                    if fresh.job_state().is_none()
                        && unknown.insert((fresh.id.clone(), fresh.state.clone()))
                    {
                        log::warn!("job {} reports unknown state {:?}", fresh.id, fresh.state);
                    }
                    *job = fresh;
                }
                Err(e) if e.is_not_found() => {
                    outcome
                        .diagnostics
                        .push(remote_error(&e).for_resource(resource_label("job", &job.id)));
                    lost.insert(job.id.clone());
                }
                Err(e) => {
                    log::warn!("polling job {} failed, retrying: {e}", job.id);
                }
            }
        }
    }

    let failed = outcome
        .jobs
        .iter()
        .filter(|job| job.job_state().is_some_and(|s| s.is_failure()));
    for job in failed {
        let mut diag = Diagnostic::error(format!("job {} failed with state {}", job.id, job.state))
            .for_resource(resource_label("job", &job.id))
            .at("state");
        if let Some(code) = job.exit_code {
            diag = diag.with_detail(format!("exit code {code}"));
        }
        outcome.diagnostics.push(diag);
    }
    outcome
}

fn settled(job: &Job, lost: &BTreeSet<String>) -> bool {
    lost.contains(&job.id) || job.job_state().is_some_and(|s: JobState| s.is_terminal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use galaxykit::Error;
    use galaxykit::backend::MockAccessor;
    use std::time::Duration;

    fn job(id: &str, state: &str) -> Job {
        Job {
            id: id.into(),
            state: state.into(),
            ..Job::default()
        }
    }

    fn fast() -> Context {
        Context::new(CancelToken::new(), Duration::from_millis(1))
    }

    #[test]
    fn test_waits_until_all_terminal_and_names_failed_job() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        // t0: [ok, running, running], t1: [ok, ok, error]
        jobs.script_get("j1", vec![Ok(job("j1", "ok"))]);
        jobs.script_get("j2", vec![Ok(job("j2", "running")), Ok(job("j2", "ok"))]);
        jobs.script_get(
            "j3",
            vec![Ok(job("j3", "running")), Ok(job("j3", "error"))],
        );

        let submitted = vec![job("j1", "ok"), job("j2", "running"), job("j3", "running")];
        let outcome = wait_for_jobs(&jobs, submitted, &fast());

        assert!(!outcome.cancelled);
        let states: Vec<_> = outcome.jobs.iter().map(|j| j.state.as_str()).collect();
        assert_eq!(states, vec!["ok", "ok", "error"]);
        // Second round reached the t1 states
        assert_eq!(jobs.get_count("j2"), 2);
        assert_eq!(jobs.get_count("j3"), 2);

        let errors: Vec<_> = outcome.diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].resource.as_deref(), Some("job j3"));
        assert!(errors[0].summary.contains("j3"));
    }

    #[test]
    fn test_terminal_jobs_are_not_refetched() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        jobs.script_get("j1", vec![Ok(job("j1", "queued")), Ok(job("j1", "ok"))]);
        jobs.script_get("j2", vec![Ok(job("j2", "paused"))]);

        let outcome = wait_for_jobs(&jobs, vec![job("j1", "new"), job("j2", "new")], &fast());
        assert_eq!(jobs.get_count("j2"), 1);
        assert_eq!(jobs.get_count("j1"), 2);
        // paused is a failure state
        assert_eq!(outcome.failed().count(), 1);
    }

    #[test]
    fn test_already_terminal_returns_without_fetching() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        let outcome = wait_for_jobs(&jobs, vec![job("j1", "ok")], &fast());
        assert!(outcome.diagnostics.is_empty());
        assert!(jobs.calls().is_empty());
    }

    #[test]
    fn test_transient_errors_keep_polling() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        jobs.script_get(
            "j1",
            vec![
                Err(Error::Http {
                    message: "connection reset".into(),
                    status: None,
                }),
                Ok(job("j1", "ok")),
            ],
        );
        let outcome = wait_for_jobs(&jobs, vec![job("j1", "queued")], &fast());
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.jobs[0].state, "ok");
    }

    #[test]
    fn test_vanished_job_is_reported_once() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        let outcome = wait_for_jobs(&jobs, vec![job("gone", "queued")], &fast());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(jobs.get_count("gone"), 1);
    }

    #[test]
    fn test_cancel_stops_without_failure_classification() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        jobs.script_get("j1", vec![Ok(job("j1", "error"))]);
        let ctx = fast();
        ctx.cancel.cancel();

        let outcome = wait_for_jobs(&jobs, vec![job("j1", "running")], &ctx);
        assert!(outcome.cancelled);
        assert!(!outcome.diagnostics.has_error());
        assert_eq!(outcome.diagnostics.warnings().count(), 1);
        assert_eq!(jobs.get_count("j1"), 0);
    }

    #[test]
    fn test_unknown_state_keeps_job_tracked() {
        let jobs: MockAccessor<Job, ()> = MockAccessor::new();
        jobs.script_get(
            "j1",
            vec![Ok(job("j1", "stopping")), Ok(job("j1", "deleted"))],
        );
        let outcome = wait_for_jobs(&jobs, vec![job("j1", "running")], &fast());
        assert_eq!(jobs.get_count("j1"), 2);
        assert_eq!(outcome.jobs[0].state, "deleted");
    }
}
