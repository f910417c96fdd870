//! Bounded pool of reusable node streams for one RPC method.
//!
//! The pool creates streams lazily through its [`NodeDialer`] and never
//! holds more than `stream_number` live at once: a creation slot is
//! reserved under the lock before dialing, so concurrent callers cannot
//! overshoot the bound even while dials are in flight.  Checked-out
//! streams are exclusively owned by their caller until check-in.

use {
    crate::{
        config::ClientConfig,
        error::{ClientError, Result},
        stream::{NodeDialer, PooledStream},
    },
    log::{debug, info, warn},
    std::time::Duration,
    tokio::{sync::Mutex, time::sleep},
};

/// How long an acquirer at capacity waits before re-checking the idle set.
const ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct PoolInner {
    /// Idle streams, reused most-recently-released first.
    idle: Vec<PooledStream>,
    /// Streams currently alive: idle plus checked out plus being dialed.
    live: usize,
    /// Once set, every checkout fails and check-ins shut the stream down.
    closed: bool,
}

/// Bounded, concurrency-safe pool of streams for one method.
#[derive(Debug)]
pub struct StreamPool {
    dialer: NodeDialer,
    stream_number: usize,
    stream_lifetime: Duration,
    max_message_size: usize,
    inner: Mutex<PoolInner>,
}

impl StreamPool {
    /// Create an empty pool; the first stream is dialed on first
    /// [`acquire`](Self::acquire).
    pub fn new(dialer: NodeDialer, config: &ClientConfig) -> Self {
        Self {
            dialer,
            stream_number: config.stream_number,
            stream_lifetime: config.stream_lifetime,
            max_message_size: config.max_message_size,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// The configured maximum envelope size, for callers driving the
    /// session round trip.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Check out a stream for exclusive use.
    ///
    /// Reuses an idle stream when one exists, dials a new one while the
    /// pool is under its bound, and otherwise waits for another caller's
    /// check-in.  Fails once the pool is closed or when the dial fails.
    pub async fn acquire(&self) -> Result<PooledStream> {
        enum Checkout {
            Reuse(PooledStream),
            Dial,
            Full,
        }

        loop {
            let mut aged = Vec::new();
            let checkout = {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return Err(ClientError::PoolClosed);
                }
                // Skim aged streams off the idle set; they are retired
                // here rather than handed out.
                loop {
                    match inner.idle.pop() {
                        Some(stream)
                            if !self.stream_lifetime.is_zero()
                                && stream.age() > self.stream_lifetime =>
                        {
                            inner.live = inner.live.saturating_sub(1);
                            aged.push(stream);
                        }
                        Some(stream) => break Checkout::Reuse(stream),
                        None => {
                            if inner.live < self.stream_number {
                                // Reserve the slot before dialing so
                                // concurrent acquirers cannot exceed the
                                // bound.
                                inner.live = inner.live.saturating_add(1);
                                break Checkout::Dial;
                            }
                            break Checkout::Full;
                        }
                    }
                }
            };

            for mut stream in aged {
                warn!(
                    "{}: retiring idle stream to {} (exceeded lifetime)",
                    self.dialer.method(),
                    stream.peer()
                );
                if let Err(e) = stream.shutdown().await {
                    debug!("{}: error closing retired stream: {}", self.dialer.method(), e);
                }
            }

            match checkout {
                Checkout::Reuse(stream) => {
                    debug!(
                        "{}: reusing stream to {}",
                        self.dialer.method(),
                        stream.peer()
                    );
                    return Ok(stream);
                }
                Checkout::Dial => break,
                Checkout::Full => sleep(ACQUIRE_RETRY_DELAY).await,
            }
        }

        // Dial outside the lock.
        let stream = match self.dialer.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.live = inner.live.saturating_sub(1);
                return Err(e);
            }
        };

        // The pool may have been closed while the dial was in flight.
        let mut inner = self.inner.lock().await;
        if inner.closed {
            inner.live = inner.live.saturating_sub(1);
            drop(inner);
            let mut stream = stream;
            if let Err(e) = stream.shutdown().await {
                warn!("{}: error closing stream after pool close: {}", self.dialer.method(), e);
            }
            return Err(ClientError::PoolClosed);
        }
        Ok(stream)
    }

    /// Check a stream back in.
    ///
    /// `None` is a no-op, so callers on error paths can release
    /// unconditionally.  A stream that outlived `stream_lifetime`, was
    /// poisoned by a transport failure, or belongs to a closed pool is
    /// shut down instead of rejoining the idle set; the next
    /// [`acquire`](Self::acquire) dials a replacement lazily.
    pub async fn release(&self, stream: Option<PooledStream>) {
        let Some(stream) = stream else {
            return;
        };

        let retired = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                inner.live = inner.live.saturating_sub(1);
                Some(("pool closed", stream))
            } else if !self.stream_lifetime.is_zero() && stream.age() > self.stream_lifetime {
                inner.live = inner.live.saturating_sub(1);
                Some(("exceeded lifetime", stream))
            } else if stream.is_poisoned() {
                inner.live = inner.live.saturating_sub(1);
                Some(("poisoned by transport failure", stream))
            } else {
                debug!(
                    "{}: stream to {} returned to pool",
                    self.dialer.method(),
                    stream.peer()
                );
                inner.idle.push(stream);
                None
            }
        };

        if let Some((reason, mut stream)) = retired {
            warn!(
                "{}: retiring stream to {} ({})",
                self.dialer.method(),
                stream.peer(),
                reason
            );
            if let Err(e) = stream.shutdown().await {
                debug!("{}: error closing retired stream: {}", self.dialer.method(), e);
            }
        }
    }

    /// Close the pool.
    ///
    /// Idempotent.  Marks the pool closed so no further checkout
    /// succeeds, then shuts down every idle stream, returning the first
    /// error while still attempting the rest.  Streams currently checked
    /// out are shut down when their holders release them.
    pub async fn close(&self) -> Result<()> {
        let drained = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.live = inner.live.saturating_sub(inner.idle.len());
            std::mem::take(&mut inner.idle)
        };

        info!(
            "{}: closing pool ({} idle stream(s))",
            self.dialer.method(),
            drained.len()
        );
        let mut first_err = None;
        for mut stream in drained {
            if let Err(e) = stream.shutdown().await {
                warn!("{}: error closing stream: {}", self.dialer.method(), e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Number of idle streams (test observability).
    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }

    /// Number of live streams, checked out or idle (test observability).
    pub async fn live_count(&self) -> usize {
        self.inner.lock().await.live
    }

    /// Whether the pool has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::resolver::NodeSelector,
        std::{
            net::SocketAddr,
            sync::{
                atomic::{AtomicUsize, Ordering},
                Arc,
            },
        },
        tokio::net::TcpListener,
    };

    /// A node that accepts connections forever and counts them.
    async fn accepting_node() -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    held.push(stream);
                }
            }
        });
        (addr, count)
    }

    fn pool_for(addr: SocketAddr, stream_number: usize, lifetime: Duration) -> StreamPool {
        let mut config = ClientConfig::dev_default();
        config.node_addrs = vec![addr];
        config.stream_number = stream_number;
        config.stream_lifetime = lifetime;
        let selector = Arc::new(NodeSelector::from_config(&config).unwrap());
        let dialer = NodeDialer::new(selector, config.dial_timeout, "test/method");
        StreamPool::new(dialer, &config)
    }

    #[tokio::test]
    async fn test_lazy_creation_and_reuse() {
        let (addr, dials) = accepting_node().await;
        let pool = pool_for(addr, 3, Duration::ZERO);
        assert_eq!(pool.live_count().await, 0);

        let stream = pool.acquire().await.unwrap();
        assert_eq!(pool.live_count().await, 1);
        pool.release(Some(stream)).await;
        assert_eq!(pool.idle_count().await, 1);

        // The second acquire reuses the idle stream; no new dial.
        let stream = pool.acquire().await.unwrap();
        pool.release(Some(stream)).await;
        assert_eq!(dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_under_concurrency() {
        let (addr, dials) = accepting_node().await;
        let pool = Arc::new(pool_for(addr, 3, Duration::ZERO));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                let stream = pool.acquire().await.unwrap();
                assert!(pool.live_count().await <= 3);
                sleep(Duration::from_millis(2)).await;
                pool.release(Some(stream)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(dials.load(Ordering::SeqCst) <= 3);
        assert!(pool.live_count().await <= 3);
    }

    #[tokio::test]
    async fn test_exclusive_checkout_pool_of_one() {
        let (addr, _) = accepting_node().await;
        let pool = Arc::new(pool_for(addr, 1, Duration::ZERO));
        let holders = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            let holders = holders.clone();
            tasks.push(tokio::spawn(async move {
                let stream = pool.acquire().await.unwrap();
                // No overlap in ownership: the counter never sees 2.
                assert_eq!(holders.fetch_add(1, Ordering::SeqCst), 0);
                sleep(Duration::from_millis(20)).await;
                holders.fetch_sub(1, Ordering::SeqCst);
                pool.release(Some(stream)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_lifetime_eviction() {
        let (addr, dials) = accepting_node().await;
        let pool = pool_for(addr, 3, Duration::from_millis(100));

        let first = pool.acquire().await.unwrap();
        let first_created = first.created_at();
        sleep(Duration::from_millis(150)).await;
        pool.release(Some(first)).await;
        // Aged past its lifetime: retired, not idle.
        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(pool.live_count().await, 0);

        let second = pool.acquire().await.unwrap();
        assert!(second.created_at() > first_created);
        assert_eq!(dials.load(Ordering::SeqCst), 2);
        pool.release(Some(second)).await;
    }

    #[tokio::test]
    async fn test_idle_stream_aged_out_at_acquire() {
        let (addr, dials) = accepting_node().await;
        let pool = pool_for(addr, 3, Duration::from_millis(100));

        // Release while still fresh, then let it age in the idle set.
        let first = pool.acquire().await.unwrap();
        let first_created = first.created_at();
        pool.release(Some(first)).await;
        assert_eq!(pool.idle_count().await, 1);
        sleep(Duration::from_millis(150)).await;

        // The aged idle stream is retired, not handed out.
        let second = pool.acquire().await.unwrap();
        assert!(second.created_at() > first_created);
        assert_eq!(dials.load(Ordering::SeqCst), 2);
        assert_eq!(pool.live_count().await, 1);
        pool.release(Some(second)).await;
    }

    #[tokio::test]
    async fn test_release_none_is_noop() {
        let (addr, _) = accepting_node().await;
        let pool = pool_for(addr, 1, Duration::ZERO);
        pool.release(None).await;
        assert_eq!(pool.idle_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_idempotent_and_drains() {
        let (addr, _) = accepting_node().await;
        let pool = pool_for(addr, 2, Duration::ZERO);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.release(Some(a)).await;
        pool.release(Some(b)).await;
        assert_eq!(pool.idle_count().await, 2);

        pool.close().await.unwrap();
        pool.close().await.unwrap();
        assert_eq!(pool.idle_count().await, 0);
        assert!(matches!(
            pool.acquire().await,
            Err(ClientError::PoolClosed)
        ));
    }

    #[tokio::test]
    async fn test_release_after_close_shuts_stream() {
        let (addr, _) = accepting_node().await;
        let pool = pool_for(addr, 1, Duration::ZERO);

        let stream = pool.acquire().await.unwrap();
        pool.close().await.unwrap();
        pool.release(Some(stream)).await;
        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(pool.live_count().await, 0);
    }

    #[tokio::test]
    async fn test_dial_failure_unreserves_slot() {
        // Nothing listens here; dials are refused.
        let addr: SocketAddr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
            // Listener dropped: the port is free again.
        };
        let pool = pool_for(addr, 1, Duration::ZERO);

        assert!(pool.acquire().await.is_err());
        // The reserved slot was released; live count is back to zero and a
        // later acquire may try again rather than deadlocking.
        assert_eq!(pool.live_count().await, 0);
        assert!(pool.acquire().await.is_err());
    }
}
