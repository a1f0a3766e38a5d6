//! Exchange gate concurrency tests
//!
//! Drives the gate directly with in-process exchangers so the number of
//! exchange calls and the commit ordering can be observed exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;

use guardian_client::auth::{
    CodeExchanger, Credential, CredentialStore, ExchangeFailure, ExchangeGate, ExchangeOutcome,
    GateContext, GateState, MemoryCredentialStore,
};
use guardian_client::location::{CodeCleanup, EntryRedirect, MemoryLocation, PageLocation};

/// Exchanger that blocks until released and counts its calls
struct HeldExchanger {
    calls: AtomicUsize,
    release: Semaphore,
    result: Result<Credential, ExchangeFailure>,
}

impl HeldExchanger {
    fn new(result: Result<Credential, ExchangeFailure>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            release: Semaphore::new(0),
            result,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeExchanger for HeldExchanger {
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeFailure> {
        assert_eq!(code, "abc123");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.acquire().await.unwrap().forget();
        self.result.clone()
    }
}

struct Fixture {
    store: Arc<MemoryCredentialStore>,
    location: Arc<MemoryLocation>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryCredentialStore::new()),
            location: Arc::new(
                MemoryLocation::parse("http://localhost:5173/dashboard?code=abc123&auth=success")
                    .unwrap(),
            ),
        }
    }

    fn gate(&self, exchanger: Arc<HeldExchanger>) -> Arc<ExchangeGate> {
        Arc::new(ExchangeGate::armed(
            "abc123".to_string(),
            exchanger,
            GateContext {
                store: self.store.clone(),
                cleanup: Arc::new(CodeCleanup::new(self.location.clone(), "code")),
                redirect: Arc::new(EntryRedirect::new(self.location.clone(), "/")),
                timeout: Duration::from_secs(5),
                failure_redirect_delay: Duration::from_millis(50),
            },
        ))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_first_callers_share_one_exchange() {
    let fixture = Fixture::new();
    let exchanger = HeldExchanger::new(Ok(Credential::new("T1")));
    let gate = fixture.gate(exchanger.clone());
    assert_eq!(gate.state(), GateState::Idle);

    let store = fixture.store.clone();
    let waiters: Vec<_> = (0..50)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let outcome = gate.ready().await;
                // The credential is committed by the time anyone sees Success
                (outcome, store.get())
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(exchanger.calls(), 1);
    assert_eq!(gate.state(), GateState::Exchanging);

    exchanger.release.add_permits(1);

    for result in join_all(waiters).await {
        let (outcome, stored) = result.unwrap();
        assert_eq!(outcome, ExchangeOutcome::Success(Credential::new("T1")));
        assert_eq!(stored, Some(Credential::new("T1")));
    }
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn url_cleanup_happens_once_and_keeps_other_params() {
    let fixture = Fixture::new();
    let exchanger = HeldExchanger::new(Ok(Credential::new("T1")));
    let gate = fixture.gate(exchanger.clone());

    exchanger.release.add_permits(1);
    gate.ready().await;
    gate.ready().await;
    gate.ready().await;

    assert_eq!(
        fixture.location.current().as_str(),
        "http://localhost:5173/dashboard?auth=success"
    );
    assert_eq!(fixture.location.replacements().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_is_terminal_and_shared() {
    let fixture = Fixture::new();
    let exchanger = HeldExchanger::new(Err(ExchangeFailure::Rejected { status: 400 }));
    let gate = fixture.gate(exchanger.clone());

    let first = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.ready().await })
    };
    let second = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.ready().await })
    };

    exchanger.release.add_permits(1);
    let expected = ExchangeOutcome::Failure(ExchangeFailure::Rejected { status: 400 });
    assert_eq!(first.await.unwrap(), expected);
    assert_eq!(second.await.unwrap(), expected);

    // Later callers get the same outcome without a new attempt
    exchanger.release.add_permits(1);
    assert_eq!(gate.ready().await, expected);
    assert_eq!(exchanger.calls(), 1);
    assert!(fixture.store.get().is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fixture.location.current().path(), "/");
}

#[tokio::test]
async fn abandoned_waiters_do_not_restart_exchange() {
    let fixture = Fixture::new();
    let exchanger = HeldExchanger::new(Ok(Credential::new("T1")));
    let gate = fixture.gate(exchanger.clone());

    // Start the exchange, then give up on it
    let abandoned = tokio::time::timeout(Duration::from_millis(50), gate.ready()).await;
    assert!(abandoned.is_err());
    assert_eq!(exchanger.calls(), 1);
    assert_eq!(gate.state(), GateState::Exchanging);

    exchanger.release.add_permits(1);
    assert!(gate.ready().await.is_success());
    assert_eq!(exchanger.calls(), 1);
}
