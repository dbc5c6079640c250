//! Serialize then deserialize yields an equal record

use jobacct::config::AccountingConfig;
use jobacct::pack::PackBuffer;
use jobacct::record::{JobAcctInfo, Rusage, TaskId};
use jobacct::JobAcct;
use proptest::prelude::*;

fn task_id() -> impl Strategy<Value = TaskId> {
    (any::<u16>(), any::<u32>()).prop_map(|(task, node)| TaskId::new(task, node))
}

fn record_strategy() -> impl Strategy<Value = JobAcctInfo> {
    (
        (any::<u64>(), any::<u64>()),
        (any::<u32>(), task_id(), any::<u64>()),
        (any::<u32>(), task_id(), any::<u64>()),
        (any::<u32>(), task_id(), any::<u64>()),
        (any::<u32>(), task_id(), any::<u64>()),
    )
        .prop_map(|((user, sys), vsize, rss, pages, cpu)| JobAcctInfo {
            rusage: Rusage {
                user_cpu_us: user,
                sys_cpu_us: sys,
            },
            max_vsize: vsize.0,
            max_vsize_id: vsize.1,
            tot_vsize: vsize.2,
            max_rss: rss.0,
            max_rss_id: rss.1,
            tot_rss: rss.2,
            max_pages: pages.0,
            max_pages_id: pages.1,
            tot_pages: pages.2,
            min_cpu: cpu.0,
            min_cpu_id: cpu.1,
            tot_cpu: cpu.2,
        })
}

#[test]
fn test_pack_unpack_equality_property() {
    let acct = JobAcct::from_config(AccountingConfig::for_backend("none"));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(record_strategy(), 1..6), |records| {
            let mut buffer = PackBuffer::new();
            for record in &records {
                acct.pack(record, &mut buffer).unwrap();
            }

            let mut received = PackBuffer::from_bytes(buffer.into_bytes());
            for record in &records {
                let copy = acct.unpack(&mut received).unwrap();
                prop_assert_eq!(&copy, record);
            }
            prop_assert_eq!(received.remaining(), 0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_truncated_buffer_never_yields_a_record() {
    let acct = JobAcct::from_config(AccountingConfig::for_backend("none"));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(record_strategy(), any::<prop::sample::Index>()), |(record, cut)| {
            let bytes = acct.pack_to_vec(&record).unwrap();
            let keep = cut.index(bytes.len());
            let mut truncated = PackBuffer::from_bytes(bytes[..keep].to_vec());
            prop_assert!(acct.unpack(&mut truncated).is_err());
            prop_assert_eq!(truncated.remaining(), keep);
            Ok(())
        })
        .unwrap();
}
