//! The text log backend driven through the facade

use jobacct::config::AccountingConfig;
use jobacct::job::{JobRecord, JobState, LocalJob, StepRecord};
use jobacct::JobAcct;
use tempfile::TempDir;

fn log_facade() -> JobAcct {
    JobAcct::from_config(AccountingConfig::for_backend("log"))
}

#[test]
fn test_job_lifecycle_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("jobacct.log");
    let acct = log_facade();

    acct.init_backend(Some(&log_path)).unwrap();

    let mut job = JobRecord::new(1001, "render")
        .with_owner(500, 50)
        .with_nodes("node01", 4)
        .with_partition("batch");
    job.state = JobState::Running;
    job.start_time = Some(job.submit_time);
    acct.job_start(&job).unwrap();

    for step_id in 0..3 {
        let step = StepRecord::new(&job, step_id, 4);
        acct.step_start(&step).unwrap();
        acct.step_complete(&step).unwrap();
    }

    job.state = JobState::Suspended;
    acct.suspend(&job).unwrap();

    job.state = JobState::Complete;
    job.end_time = job.start_time;
    acct.job_complete(&job).unwrap();
    acct.fini_backend().unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 9);
    assert!(lines[0].starts_with("1001 batch "));
    assert!(lines[0].contains(" JOB_START 500 50 "));
    assert_eq!(content.matches(" JOB_STEP ").count(), 3);
    assert_eq!(content.matches(" JOB_STEP_COMPLETE ").count(), 3);
    assert!(lines[7].contains(" JOB_SUSPEND 500 50 SUSPENDED"));
    assert!(lines[8].contains(" JOB_TERMINATED 500 50 0 COMPLETED 0"));
}

#[test]
fn test_log_appends_across_contexts() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("jobacct.log");
    let acct = log_facade();

    for job_id in [1, 2] {
        acct.init_backend(Some(&log_path)).unwrap();
        acct.job_start(&JobRecord::new(job_id, "append")).unwrap();
        acct.fini_backend().unwrap();
    }

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len() as usize, content.len());
}

#[test]
fn test_polling_lifecycle() {
    let acct = log_facade();

    acct.start_poll(0).unwrap();
    acct.start_poll(1).unwrap();
    acct.suspend_poll();
    acct.start_poll(1).unwrap();
    acct.end_poll(&LocalJob::new(5, 0, 0)).unwrap();
    acct.fini_backend().unwrap();
}

#[test]
fn test_unwritable_log_is_backend_error() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let acct = log_facade();
    let err = acct
        .init_backend(Some(&blocker.join("jobacct.log")))
        .unwrap_err();
    assert!(matches!(err, jobacct::AcctError::Backend { .. }));
    // The context itself was bound; only the backend call failed.
    assert!(acct.is_ready());
}
