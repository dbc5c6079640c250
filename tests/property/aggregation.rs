//! Aggregation invariants through the facade

use jobacct::config::AccountingConfig;
use jobacct::record::{JobAcctInfo, TaskId};
use jobacct::JobAcct;
use proptest::prelude::*;

type Sample = (u16, u32, u32, u32, u32, u32);

fn sample_strategy() -> impl Strategy<Value = Sample> {
    (any::<u16>(), any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>(), 0u32..u32::MAX)
}

fn record_from(samples: &[Sample]) -> JobAcctInfo {
    let mut record = JobAcctInfo::default();
    for (task, node, rss, vsize, pages, cpu) in samples {
        record.record_sample(TaskId::new(*task, *node), *rss, *vsize, *pages, *cpu);
    }
    record
}

/// Maxima never shrink, minima never grow, totals add up
#[test]
fn test_aggregate_extremes_property() {
    let acct = JobAcct::from_config(AccountingConfig::for_backend("log"));
    acct.initialize().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(sample_strategy(), 0..8),
                prop::collection::vec(sample_strategy(), 0..8),
            ),
            |(left, right)| {
                let a = record_from(&left);
                let b = record_from(&right);

                let mut merged = a.clone();
                acct.aggregate(&mut merged, &b);

                prop_assert_eq!(merged.max_rss, a.max_rss.max(b.max_rss));
                prop_assert_eq!(merged.max_vsize, a.max_vsize.max(b.max_vsize));
                prop_assert_eq!(merged.max_pages, a.max_pages.max(b.max_pages));
                prop_assert_eq!(merged.min_cpu, a.min_cpu.min(b.min_cpu));
                prop_assert_eq!(merged.tot_rss, a.tot_rss.saturating_add(b.tot_rss));
                prop_assert_eq!(merged.tot_cpu, a.tot_cpu.saturating_add(b.tot_cpu));
                Ok(())
            },
        )
        .unwrap();
}

/// Aggregating per-sample records equals sampling into one record
#[test]
fn test_aggregate_matches_direct_sampling_property() {
    let acct = JobAcct::from_config(AccountingConfig::for_backend("log"));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(sample_strategy(), 1..16), |samples| {
            let direct = record_from(&samples);

            let mut merged = acct.alloc().unwrap();
            for sample in &samples {
                let single = record_from(std::slice::from_ref(sample));
                acct.aggregate(&mut merged, &single);
            }

            prop_assert_eq!(merged, direct);
            Ok(())
        })
        .unwrap();
}

/// Aggregating an empty record changes nothing
#[test]
fn test_aggregate_identity_property() {
    let acct = JobAcct::from_config(AccountingConfig::for_backend("log"));
    acct.initialize().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(sample_strategy(), 0..8), |samples| {
            let original = record_from(&samples);
            let mut merged = original.clone();
            acct.aggregate(&mut merged, &JobAcctInfo::default());
            prop_assert_eq!(merged, original);
            Ok(())
        })
        .unwrap();
}
