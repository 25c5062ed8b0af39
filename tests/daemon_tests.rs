//! Daemon tests through the public facade
//!
//! A host process opens a file log, runs startup recovery, and leaves the
//! daemon to resolve whatever is still in doubt.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem::testing::ScriptedResource;
use tandem::{
    DefaultXidFactory, FileTransactionLog, ReadinessGate, RecoveryConfig, RecoveryDaemon,
    StaticResourceResolver, TransactionArchive, TransactionLogger, TransactionRecovery,
    TransactionRepository, TransactionServices, TransactionStatus, TransactionStrategyType, Vote,
    XaError, XaResourceArchive, XaResourceDescriptor, XidFactory,
};
use tempfile::TempDir;

fn prepared_coordinator(resource: &str) -> TransactionArchive {
    let xid = DefaultXidFactory.generate_global_xid();
    let mut archive = TransactionArchive::new(xid.clone(), true, TransactionStatus::Prepared);
    archive.strategy = TransactionStrategyType::Simple;
    archive.native_resources.push(
        XaResourceArchive::new(
            XaResourceDescriptor::native(resource),
            DefaultXidFactory.create_branch_xid(&xid),
        )
        .with_vote(Vote::Commit),
    );
    archive
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_daemon_resolves_after_resource_recovers() {
    let temp = TempDir::new().unwrap();
    let archive = prepared_coordinator("ledger");
    let log = Arc::new(FileTransactionLog::open(temp.path()).unwrap());
    log.create_transaction(&archive).unwrap();

    let ledger = Arc::new(ScriptedResource::new("ledger"));
    ledger.add_in_doubt(archive.native_resources[0].xid.clone());
    ledger.push_commit_result(Err(XaError::Unavailable("failover".to_string())));
    let resources = Arc::new(StaticResourceResolver::new());
    resources.register_native("ledger", ledger.clone());

    let gate = Arc::new(ReadinessGate::new());
    let repository = Arc::new(TransactionRepository::new());
    let recovery = Arc::new(TransactionRecovery::new(
        Arc::new(TransactionServices::new(log.clone(), resources)),
        repository.clone(),
        Arc::new(DefaultXidFactory),
        gate.clone(),
    ));
    assert_eq!(recovery.start_recovery().unwrap().recovered, 1);
    assert!(gate.wait_ready(Duration::from_secs(1)));

    let config = RecoveryConfig {
        sweep_interval_ms: 10,
        sweep_on_start: true,
    };
    let daemon = RecoveryDaemon::start(recovery, &config).unwrap();

    assert!(wait_for(|| repository.error_count() == 0));
    daemon.shutdown();

    // first attempt failed, the retry committed
    assert_eq!(ledger.commit_count(), 2);
    assert_eq!(repository.active_count(), 0);
    assert!(!log.record_path(&archive.xid).exists());
}

#[test]
fn test_dropping_daemon_stops_sweeps() {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(FileTransactionLog::open(temp.path()).unwrap());
    let recovery = Arc::new(TransactionRecovery::new(
        Arc::new(TransactionServices::new(
            log,
            Arc::new(StaticResourceResolver::new()),
        )),
        Arc::new(TransactionRepository::new()),
        Arc::new(DefaultXidFactory),
        Arc::new(ReadinessGate::new()),
    ));

    let config = RecoveryConfig::default();
    let daemon = RecoveryDaemon::start(recovery.clone(), &config).unwrap();
    drop(daemon);

    // the daemon's clone has been released with its thread
    assert_eq!(Arc::strong_count(&recovery), 1);
}
