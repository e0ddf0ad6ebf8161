//! The reporting path under a real tracing subscriber: log emission must
//! never disturb the call's outcome or the report-once guarantee.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use statwrap::testing::TestHub;
use statwrap::{instrument_with, Options, OwnerKind};

fn init_subscriber() {
    // First caller wins; later tests reuse the installed subscriber.
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

#[test]
fn reporting_under_a_subscriber_preserves_outcomes() -> Result<()> {
    init_subscriber();

    let env = TestHub::new();
    let load = instrument_with(
        Arc::clone(&env.hub),
        "logging_outcomes::Loader",
        OwnerKind::Instance,
        "load",
        Options::new().with_key("logging.outcomes"),
        |flag: bool| {
            if flag {
                Ok(99)
            } else {
                Err(io::Error::other("backend down"))
            }
        },
    );

    assert_eq!(load.call(true).expect("delegate succeeds"), 99);

    let fault = load.call(false).expect_err("delegate fails on false");
    assert_eq!(fault.message(), "backend down");
    assert!(fault.is_reported());
    assert_eq!(env.tracker.registrations(), 1);

    // Logging happened on the side; stats still paired per call.
    assert_eq!(env.stats.counts("logging.outcomes.count").len(), 2);
    assert_eq!(env.stats.timings("logging.outcomes.timing").len(), 2);
    assert_eq!(env.stats.counts("logging.outcomes.success.count").len(), 1);
    Ok(())
}

#[test]
fn repeat_failures_register_once_per_fault_instance() -> Result<()> {
    init_subscriber();

    let env = TestHub::new();
    let fail = instrument_with(
        Arc::clone(&env.hub),
        "logging_repeat::Flaky",
        OwnerKind::Instance,
        "poke",
        Options::<()>::new(),
        |_: ()| Err::<(), _>(io::Error::other("still broken")),
    );

    // Distinct calls produce distinct faults; each gets its own report.
    fail.call(()).expect_err("delegate always fails");
    fail.call(()).expect_err("delegate always fails");
    assert_eq!(env.tracker.registrations(), 2);
    Ok(())
}
