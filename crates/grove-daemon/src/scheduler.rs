//! Per-kind reconcile workers
//!
//! Each kind gets one worker that sweeps its records on an interval. A record
//! is due when it has never been passed, when its version moved since the
//! last pass, or when its requeue deadline arrived; due records go through
//! the driver one at a time. One worker per kind means no two passes ever
//! run for the same record concurrently, while the six workers run their
//! kinds side by side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grove_controller::kinds::{
    DatabaseReconciler, DatabaseSetReconciler, OrganizationReconciler, RoleReconciler,
    ServerReconciler, UserReconciler,
};
use grove_controller::{
    Driver, PassDisposition, Reconciler, RequeueConfig, ServerResolver, Stores,
};
use grove_store::ResourceStore;
use grove_types::{ObjectKey, Resource};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{interval, Duration, Instant};

/// Outcome of one pass, broadcast to observers.
#[derive(Debug, Clone)]
pub struct PassEvent {
    /// Kind label of the record that was passed.
    pub kind: &'static str,

    /// Which record the pass ran over.
    pub key: ObjectKey,

    /// How the pass ended.
    pub disposition: PassDisposition,
}

/// When a record should next be looked at.
struct Slot {
    seen_version: u64,
    due_at: Option<Instant>,
}

/// Sweeps one kind's records through its driver.
pub struct KindWorker<K: Reconciler> {
    driver: Driver<K>,
    store: Arc<dyn ResourceStore<K::Resource>>,
    sweep_interval: Duration,
    event_tx: broadcast::Sender<PassEvent>,
    schedule: Mutex<HashMap<ObjectKey, Slot>>,
}

impl<K: Reconciler> KindWorker<K> {
    pub fn new(
        reconciler: K,
        store: Arc<dyn ResourceStore<K::Resource>>,
        requeue: RequeueConfig,
        sweep_interval: Duration,
        event_tx: broadcast::Sender<PassEvent>,
    ) -> Self {
        Self {
            driver: Driver::new(reconciler, store.clone(), requeue),
            store,
            sweep_interval,
            event_tx,
            schedule: Mutex::new(HashMap::new()),
        }
    }

    /// Pass every record that is due. Returns how many passes ran.
    pub async fn sweep(&self) -> usize {
        let records = match self.store.list("").await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(
                    kind = K::Resource::KIND,
                    error = %err,
                    "Listing records failed"
                );
                return 0;
            }
        };

        let due = self.collect_due(&records).await;
        let mut ran = 0;

        for key in due {
            let outcome = self.driver.run_pass(&key).await;
            ran += 1;
            self.park(&key, outcome.requeue_after).await;

            let _ = self.event_tx.send(PassEvent {
                kind: K::Resource::KIND,
                key,
                disposition: outcome.disposition,
            });
        }

        if ran > 0 {
            tracing::debug!(kind = K::Resource::KIND, passes = ran, "Sweep complete");
        }

        ran
    }

    /// Keys of records that are new, rewritten, or past their deadline.
    async fn collect_due(&self, records: &[K::Resource]) -> Vec<ObjectKey> {
        let now = Instant::now();
        let mut schedule = self.schedule.lock().await;

        let live: HashSet<ObjectKey> = records.iter().map(|record| record.key()).collect();
        schedule.retain(|key, _| live.contains(key));

        let mut due = Vec::new();
        for record in records {
            let key = record.key();
            let version = record.metadata().resource_version;
            let is_due = match schedule.get(&key) {
                None => true,
                Some(slot) if slot.seen_version != version => true,
                Some(slot) => slot.due_at.is_some_and(|at| at <= now),
            };
            if is_due {
                due.push(key);
            }
        }
        due
    }

    /// Hold the record until its deadline or the next store write. The
    /// version is re-read after the pass so the driver's own writes do not
    /// look like edits on the next sweep.
    async fn park(&self, key: &ObjectKey, requeue_after: Option<Duration>) {
        let stored = match self.store.get(key).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(
                    kind = K::Resource::KIND,
                    %key,
                    error = %err,
                    "Rereading record after pass failed"
                );
                None
            }
        };

        let mut schedule = self.schedule.lock().await;
        match stored {
            Some(record) => {
                schedule.insert(
                    key.clone(),
                    Slot {
                        seen_version: record.metadata().resource_version,
                        due_at: requeue_after.map(|after| Instant::now() + after),
                    },
                );
            }
            None => {
                schedule.remove(key);
            }
        }
    }

    /// Sweep on an interval until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.sweep_interval);
        tracing::debug!(kind = K::Resource::KIND, "Worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(kind = K::Resource::KIND, "Worker stopped");
    }
}

/// One worker per kind, all sweeping concurrently.
pub struct Scheduler {
    servers: Arc<KindWorker<ServerReconciler>>,
    roles: Arc<KindWorker<RoleReconciler>>,
    users: Arc<KindWorker<UserReconciler>>,
    databases: Arc<KindWorker<DatabaseReconciler>>,
    organizations: Arc<KindWorker<OrganizationReconciler>>,
    database_sets: Arc<KindWorker<DatabaseSetReconciler>>,
    event_tx: broadcast::Sender<PassEvent>,
}

impl Scheduler {
    pub fn new(
        stores: Stores,
        resolver: Arc<ServerResolver>,
        requeue: RequeueConfig,
        sweep_interval: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);

        let servers = Arc::new(KindWorker::new(
            ServerReconciler::new(resolver.clone(), stores.clone()),
            stores.servers.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));
        let roles = Arc::new(KindWorker::new(
            RoleReconciler::new(resolver.clone(), stores.clone()),
            stores.roles.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));
        let users = Arc::new(KindWorker::new(
            UserReconciler::new(resolver.clone()),
            stores.users.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));
        let databases = Arc::new(KindWorker::new(
            DatabaseReconciler::new(resolver.clone(), stores.clone()),
            stores.databases.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));
        let organizations = Arc::new(KindWorker::new(
            OrganizationReconciler::new(stores.clone()),
            stores.organizations.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));
        let database_sets = Arc::new(KindWorker::new(
            DatabaseSetReconciler::new(stores.clone()),
            stores.database_sets.clone(),
            requeue,
            sweep_interval,
            event_tx.clone(),
        ));

        Self {
            servers,
            roles,
            users,
            databases,
            organizations,
            database_sets,
            event_tx,
        }
    }

    /// Observe pass outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<PassEvent> {
        self.event_tx.subscribe()
    }

    /// Run every worker until `shutdown` flips.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        tracing::info!("Scheduler started");

        let handles = [
            tokio::spawn(self.servers.clone().run(shutdown.clone())),
            tokio::spawn(self.roles.clone().run(shutdown.clone())),
            tokio::spawn(self.users.clone().run(shutdown.clone())),
            tokio::spawn(self.databases.clone().run(shutdown.clone())),
            tokio::spawn(self.organizations.clone().run(shutdown.clone())),
            tokio::spawn(self.database_sets.clone().run(shutdown)),
        ];

        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use grove_controller::kinds::SERVER_PROTECTION;
    use grove_controller::StaticConnector;
    use grove_remote::{InMemoryAdminApi, InMemoryCredentialStore};
    use grove_store::MemoryStore;
    use grove_types::{SecretRef, Server, ServerSpec};

    const ADMIN_SECRET: &str = "graph-1-admin";

    fn key() -> ObjectKey {
        ObjectKey::new("prod", "graph-1")
    }

    fn graph_server() -> Server {
        Server::new(
            "prod",
            "graph-1",
            ServerSpec {
                url: "http://graph-1.internal:5820".to_string(),
                admin_credentials_ref: SecretRef::new(ADMIN_SECRET),
            },
        )
    }

    fn resolver(stores: &Stores) -> Arc<ServerResolver> {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert("prod", ADMIN_SECRET, "admin", "hunter2");

        let api: Arc<dyn grove_remote::GraphAdminApi> =
            Arc::new(InMemoryAdminApi::with_admin("admin", "hunter2"));
        let connector = Arc::new(StaticConnector::new());
        connector.route("http://graph-1.internal:5820", api);

        Arc::new(ServerResolver::new(
            stores.servers.clone(),
            credentials,
            connector,
        ))
    }

    fn server_worker(
        requeue: RequeueConfig,
    ) -> (
        Arc<MemoryStore>,
        KindWorker<ServerReconciler>,
        broadcast::Receiver<PassEvent>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(store.clone());
        let resolver = resolver(&stores);

        let (event_tx, event_rx) = broadcast::channel(16);
        let worker = KindWorker::new(
            ServerReconciler::new(resolver, stores.clone()),
            stores.servers.clone(),
            requeue,
            Duration::from_secs(10),
            event_tx,
        );
        (store, worker, event_rx)
    }

    #[tokio::test]
    async fn new_records_pass_once_then_park() {
        let (store, worker, mut events) =
            server_worker(RequeueConfig::new(Duration::ZERO, Duration::ZERO));
        store.create(graph_server()).await.unwrap();

        assert_eq!(worker.sweep().await, 1);
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, "Server");
        assert_eq!(event.key, key());
        assert_eq!(event.disposition, PassDisposition::Synced);

        // No requeue configured and nothing was rewritten.
        assert_eq!(worker.sweep().await, 0);
    }

    #[tokio::test]
    async fn store_writes_wake_a_parked_record() {
        let (store, worker, _events) =
            server_worker(RequeueConfig::new(Duration::ZERO, Duration::ZERO));
        store.create(graph_server()).await.unwrap();
        assert_eq!(worker.sweep().await, 1);
        assert_eq!(worker.sweep().await, 0);

        let stored: Server = store.get(&key()).await.unwrap().unwrap();
        store.update(stored).await.unwrap();

        assert_eq!(worker.sweep().await, 1);
    }

    #[tokio::test]
    async fn ready_records_wait_out_the_steady_interval() {
        let (store, worker, _events) =
            server_worker(RequeueConfig::new(Duration::ZERO, Duration::from_secs(3600)));
        store.create(graph_server()).await.unwrap();

        assert_eq!(worker.sweep().await, 1);
        assert_eq!(worker.sweep().await, 0);
    }

    #[tokio::test]
    async fn elapsed_steady_interval_re_syncs() {
        let (store, worker, _events) =
            server_worker(RequeueConfig::new(Duration::ZERO, Duration::from_millis(1)));
        store.create(graph_server()).await.unwrap();

        assert_eq!(worker.sweep().await, 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(worker.sweep().await, 1);
    }

    #[tokio::test]
    async fn deletion_marks_wake_teardown_and_prune_the_slot() {
        let (store, worker, mut events) =
            server_worker(RequeueConfig::new(Duration::ZERO, Duration::ZERO));
        store.create(graph_server()).await.unwrap();
        assert_eq!(worker.sweep().await, 1);
        let _ = events.recv().await;

        ResourceStore::<Server>::delete(&*store, &key()).await.unwrap();

        assert_eq!(worker.sweep().await, 1);
        let event = events.recv().await.unwrap();
        assert_eq!(event.disposition, PassDisposition::Removed);
        assert!(ResourceStore::<Server>::get(&*store, &key())
            .await
            .unwrap()
            .is_none());

        assert_eq!(worker.sweep().await, 0);
    }

    #[tokio::test]
    async fn run_sweeps_until_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(store.clone());
        let resolver = resolver(&stores);
        store.create(graph_server()).await.unwrap();

        let scheduler = Arc::new(Scheduler::new(
            stores,
            resolver,
            RequeueConfig::new(Duration::ZERO, Duration::ZERO),
            Duration::from_millis(5),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let stored: Server = store.get(&key()).await.unwrap().unwrap();
        assert!(stored
            .metadata
            .finalizers
            .iter()
            .any(|marker| marker == SERVER_PROTECTION));
    }
}
