use messaging::{ConsumerError, Delivery, DeliverySource};
use read_model::{Disposition, IngestionPipeline};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Delay between redeliveries while the store is failing
#[derive(Debug)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            current: INITIAL_BACKOFF,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.current = INITIAL_BACKOFF;
    }
}

/// Pulls deliveries off the order stream, runs them through the pipeline,
/// and settles each one according to the outcome.
pub struct IngestionWorker<S> {
    source: S,
    pipeline: Arc<IngestionPipeline>,
    backoff: Backoff,
}

impl<S: DeliverySource> IngestionWorker<S> {
    pub fn new(source: S, pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            source,
            pipeline,
            backoff: Backoff::new(),
        }
    }

    /// Consume until `shutdown` flips to `true`.
    ///
    /// A delivery already being processed is finished and settled first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting order ingestion loop...");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = self.source.next_delivery(POLL_TIMEOUT) => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    if !self.settle(&delivery, &mut shutdown).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(ConsumerError::Closed) => {
                    info!("Order stream closed");
                    break;
                }
                Err(e) => {
                    error!("Error polling order stream: {}", e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!("Order ingestion loop stopped");
    }

    /// Process and settle one delivery. Returns `false` when shutdown
    /// arrived while waiting to retry.
    ///
    /// A failed rewind is retried until it lands: polling past it would let
    /// a later commit cover an offset that was never stored.
    async fn settle(&mut self, delivery: &Delivery, shutdown: &mut watch::Receiver<bool>) -> bool {
        let disposition = match self.pipeline.process(delivery.key(), delivery.payload()).await {
            Ok(_) => Disposition::Acknowledge,
            Err(e) => e.disposition(),
        };

        match disposition {
            Disposition::Acknowledge => {
                self.backoff.reset();
                if let Err(e) = self.source.acknowledge(delivery).await {
                    // The message comes back after a rebalance; reprocessing is idempotent.
                    warn!(
                        partition = delivery.partition,
                        offset = delivery.offset,
                        "Failed to acknowledge order message: {}",
                        e
                    );
                }
                true
            }
            Disposition::Redeliver => {
                while let Err(e) = self.source.redeliver(delivery).await {
                    error!(
                        partition = delivery.partition,
                        offset = delivery.offset,
                        "Failed to rewind for redelivery: {}",
                        e
                    );
                    if !self.pause(shutdown).await {
                        return false;
                    }
                }
                self.pause(shutdown).await
            }
        }
    }

    /// Sleep for the next backoff step, or return `false` on shutdown
    async fn pause(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let delay = self.backoff.next_delay();
        tokio::select! {
            _ = shutdown.changed() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use order_store::InMemoryOrderStore;
    use read_model::OrderCache;
    use rdkafka::error::KafkaError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Channel-backed source; redelivered messages go to the back of the queue
    struct ChannelSource {
        inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
        requeue: mpsc::UnboundedSender<Delivery>,
        acknowledged: Arc<Mutex<Vec<i64>>>,
        redelivered: Arc<Mutex<Vec<i64>>>,
        rewind_fails: Arc<AtomicBool>,
        rewind_attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DeliverySource for ChannelSource {
        async fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, ConsumerError> {
            let mut inbox = self.inbox.lock().await;
            match tokio::time::timeout(timeout, inbox.recv()).await {
                Ok(Some(delivery)) => Ok(Some(delivery)),
                Ok(None) => Err(ConsumerError::Closed),
                Err(_) => Ok(None),
            }
        }

        async fn acknowledge(&self, delivery: &Delivery) -> Result<(), ConsumerError> {
            self.acknowledged.lock().unwrap().push(delivery.offset);
            Ok(())
        }

        async fn redeliver(&self, delivery: &Delivery) -> Result<(), ConsumerError> {
            self.rewind_attempts.fetch_add(1, Ordering::SeqCst);
            if self.rewind_fails.load(Ordering::SeqCst) {
                return Err(KafkaError::Seek("Local: Erroneous state".to_string()).into());
            }
            self.redelivered.lock().unwrap().push(delivery.offset);
            let _ = self.requeue.send(delivery.clone());
            Ok(())
        }
    }

    struct Fixture {
        sender: mpsc::UnboundedSender<Delivery>,
        acknowledged: Arc<Mutex<Vec<i64>>>,
        redelivered: Arc<Mutex<Vec<i64>>>,
        rewind_fails: Arc<AtomicBool>,
        rewind_attempts: Arc<AtomicUsize>,
        store: Arc<InMemoryOrderStore>,
        cache: Arc<OrderCache>,
        shutdown: watch::Sender<bool>,
        worker: tokio::task::JoinHandle<()>,
    }

    fn start() -> Fixture {
        let (sender, inbox) = mpsc::unbounded_channel();
        let acknowledged = Arc::new(Mutex::new(Vec::new()));
        let redelivered = Arc::new(Mutex::new(Vec::new()));
        let rewind_fails = Arc::new(AtomicBool::new(false));
        let rewind_attempts = Arc::new(AtomicUsize::new(0));
        let source = ChannelSource {
            inbox: tokio::sync::Mutex::new(inbox),
            requeue: sender.clone(),
            acknowledged: acknowledged.clone(),
            redelivered: redelivered.clone(),
            rewind_fails: rewind_fails.clone(),
            rewind_attempts: rewind_attempts.clone(),
        };

        let store = Arc::new(InMemoryOrderStore::new());
        let cache = Arc::new(OrderCache::new(store.clone()));
        let pipeline = Arc::new(IngestionPipeline::new(store.clone(), cache.clone()));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(IngestionWorker::new(source, pipeline).run(shutdown_rx));

        Fixture {
            sender,
            acknowledged,
            redelivered,
            rewind_fails,
            rewind_attempts,
            store,
            cache,
            shutdown,
            worker,
        }
    }

    fn delivery(offset: i64, payload: &[u8]) -> Delivery {
        Delivery {
            topic: "orders".to_string(),
            partition: 0,
            offset,
            key: None,
            payload: payload.to_vec(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new();
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[5], Duration::from_millis(3200));
        assert_eq!(delays[6], MAX_BACKOFF);
        assert_eq!(delays[7], MAX_BACKOFF);

        backoff.reset();
        assert_eq!(backoff.next_delay(), INITIAL_BACKOFF);
    }

    #[tokio::test]
    async fn test_valid_and_poison_messages_are_acknowledged() {
        let fixture = start();

        fixture.sender.send(delivery(1, br#"{"OrderUID":"abc123"}"#)).unwrap();
        fixture.sender.send(delivery(2, b"not json")).unwrap();

        let acknowledged = fixture.acknowledged.clone();
        wait_for(|| acknowledged.lock().unwrap().len() == 2).await;

        assert_eq!(*fixture.acknowledged.lock().unwrap(), vec![1, 2]);
        assert!(fixture.redelivered.lock().unwrap().is_empty());
        assert!(fixture.cache.contains("abc123").await);

        fixture.shutdown.send(true).unwrap();
        fixture.worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_store_outage_redelivers_until_recovery() {
        let fixture = start();
        fixture.store.set_available(false);

        fixture.sender.send(delivery(7, br#"{"OrderUID":"abc123"}"#)).unwrap();

        let redelivered = fixture.redelivered.clone();
        wait_for(|| redelivered.lock().unwrap().len() >= 2).await;
        assert!(fixture.acknowledged.lock().unwrap().is_empty());
        assert!(!fixture.cache.contains("abc123").await);

        fixture.store.set_available(true);
        let acknowledged = fixture.acknowledged.clone();
        wait_for(|| acknowledged.lock().unwrap().contains(&7)).await;

        assert!(fixture.cache.contains("abc123").await);
        assert_eq!(fixture.store.len().await, 1);

        fixture.shutdown.send(true).unwrap();
        fixture.worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_rewind_blocks_later_messages() {
        let fixture = start();
        fixture.store.set_available(false);
        fixture.rewind_fails.store(true, Ordering::SeqCst);

        fixture.sender.send(delivery(1, br#"{"OrderUID":"first"}"#)).unwrap();

        let attempts = fixture.rewind_attempts.clone();
        wait_for(|| attempts.load(Ordering::SeqCst) >= 2).await;

        // A later message must not be polled and committed over the unstored one.
        fixture.store.set_available(true);
        fixture.sender.send(delivery(2, br#"{"OrderUID":"second"}"#)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fixture.acknowledged.lock().unwrap().is_empty());
        assert!(!fixture.cache.contains("second").await);

        fixture.rewind_fails.store(false, Ordering::SeqCst);
        let acknowledged = fixture.acknowledged.clone();
        wait_for(|| {
            let acknowledged = acknowledged.lock().unwrap();
            acknowledged.contains(&1) && acknowledged.contains(&2)
        })
        .await;

        assert!(fixture.cache.contains("first").await);
        assert!(fixture.cache.contains("second").await);

        fixture.shutdown.send(true).unwrap();
        fixture.worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_failing_rewind() {
        let fixture = start();
        fixture.store.set_available(false);
        fixture.rewind_fails.store(true, Ordering::SeqCst);

        fixture.sender.send(delivery(1, br#"{"OrderUID":"abc123"}"#)).unwrap();
        let attempts = fixture.rewind_attempts.clone();
        wait_for(|| attempts.load(Ordering::SeqCst) >= 1).await;

        fixture.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), fixture.worker)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert!(fixture.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_worker() {
        let fixture = start();

        fixture.shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), fixture.worker)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
