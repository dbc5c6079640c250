//! Binding backends against the operation contract

use super::test_utils::{registry_with_test_backend, CallLog, TEST_PLUGIN_TYPE};
use jobacct::config::AccountingConfig;
use jobacct::contract::{Operation, OPERATION_COUNT};
use jobacct::record::{DataType, JobAcctInfo};
use jobacct::{AcctError, ContextState, JobAcct};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn facade_with<F>(configure: F) -> (JobAcct, Arc<CallLog>)
where
    F: Fn(&mut super::test_utils::TestBackend) + Send + Sync + 'static,
{
    let calls = Arc::new(CallLog::default());
    let registry = registry_with_test_backend(Arc::clone(&calls), configure);
    let acct = JobAcct::new(
        Arc::new(AccountingConfig::for_backend(TEST_PLUGIN_TYPE)),
        registry,
    );
    (acct, calls)
}

#[test]
fn test_partial_backend_is_unresolved_and_retried() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let (acct, calls) = facade_with(move |backend| {
        counter.fetch_add(1, Ordering::SeqCst);
        backend.missing = vec![Operation::SuspendPoll];
    });

    let err = acct.init_backend(None).unwrap_err();
    match err {
        AcctError::InitFailed(inner) => match *inner {
            AcctError::Unresolved {
                ref plugin_type,
                resolved,
                required,
                ref missing,
            } => {
                assert_eq!(plugin_type, TEST_PLUGIN_TYPE);
                assert_eq!(resolved, OPERATION_COUNT - 1);
                assert_eq!(required, OPERATION_COUNT);
                assert_eq!(missing, &vec!["jobacct_p_suspendpoll".to_string()]);
                assert!(inner.is_resolution());
            }
            other => panic!("unexpected inner error: {}", other),
        },
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(acct.state(), ContextState::Uninitialized);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    // No half-built context survives: the next call tries again from scratch.
    let record = JobAcctInfo::default();
    let err = acct.get_info(&record, DataType::MaxRss).unwrap_err();
    assert!(matches!(
        err,
        AcctError::NoContext {
            operation: Operation::GetInfo
        }
    ));
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(acct.contexts_created(), 0);
    assert_eq!(calls.total(), 0);
}

#[test]
fn test_each_missing_operation_is_fatal() {
    for op in Operation::ALL {
        let (acct, _calls) = facade_with(move |backend| backend.missing = vec![op]);
        assert!(acct.alloc().unwrap_err().is_no_context(), "{} missing", op);
        assert!(acct.active_plugin_type().is_none());
    }
}

#[test]
fn test_contract_version_mismatch() {
    let (acct, _calls) = facade_with(|backend| backend.version = 2);
    match acct.start_poll(10).unwrap_err() {
        AcctError::InitFailed(inner) => assert!(matches!(
            *inner,
            AcctError::ContractMismatch {
                expected: 1,
                found: 2,
                ..
            }
        )),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_complete_backend_binds_and_dispatches() {
    let (acct, calls) = facade_with(|_| {});
    acct.init_backend(None).unwrap();
    assert_eq!(acct.active_plugin_type().as_deref(), Some(TEST_PLUGIN_TYPE));
    assert_eq!(calls.count(Operation::InitBackend), 1);

    let mut record = acct.alloc().unwrap();
    acct.init_struct(&mut record).unwrap();
    acct.free(record).unwrap();
    assert_eq!(calls.count(Operation::Alloc), 1);
    assert_eq!(calls.count(Operation::InitStruct), 1);
    assert_eq!(calls.count(Operation::Free), 1);
}
