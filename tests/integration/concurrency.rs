//! Concurrent use of one facade

use super::test_utils::{test_facade, CallLog};
use jobacct::config::AccountingConfig;
use jobacct::contract::Operation;
use jobacct::job::JobRecord;
use jobacct::record::{DataType, FieldValue};
use jobacct::JobAcct;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 16;

#[test]
fn test_concurrent_init_builds_one_context() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let calls = Arc::new(CallLog::default());
    let acct = Arc::new(test_facade(Arc::clone(&calls), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let acct = Arc::clone(&acct);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut record = acct.alloc().unwrap();
                acct.set_info(&mut record, DataType::MaxRss, FieldValue::U32(i as u32))
                    .unwrap();
                acct.get_info(&record, DataType::MaxRss).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), FieldValue::U32(i as u32));
    }

    assert_eq!(acct.contexts_created(), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(calls.count(Operation::Alloc), THREADS);
}

#[test]
fn test_concurrent_notifications_and_finalize() {
    let acct = Arc::new(JobAcct::from_config(AccountingConfig::for_backend("none")));
    acct.init_backend(None).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let acct = Arc::clone(&acct);
            thread::spawn(move || {
                let job = JobRecord::new(i as u32, "parallel");
                for _ in 0..50 {
                    acct.job_start(&job).unwrap();
                    acct.job_complete(&job).unwrap();
                }
                if i == 0 {
                    acct.fini_backend().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(acct.contexts_created() >= 1);
}
