//! Persistent node streams and the dialer that creates them.
//!
//! A [`PooledStream`] is one live TCP connection to a node, over which the
//! session layer performs exactly one request/response round trip per
//! checkout.  Frames follow the envelope wire format: a 4-byte
//! little-endian length prefix followed by the bincode payload; the reader
//! validates the prefix against `max_message_size` before reading the
//! body.

use {
    crate::{
        error::{ClientError, Result},
        resolver::NodeSelector,
    },
    log::{debug, warn},
    meridian_client_types::envelope::{self, RequestEnvelope, ResponseEnvelope, WireError},
    std::{
        net::SocketAddr,
        sync::Arc,
        time::{Duration, Instant},
    },
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    },
};

/// One live bidirectional stream to a node, plus its pool bookkeeping.
#[derive(Debug)]
pub struct PooledStream {
    stream: TcpStream,
    peer: SocketAddr,
    created_at: Instant,
    poisoned: bool,
}

impl PooledStream {
    /// Dial `addr`, bounded by `dial_timeout`.
    pub async fn dial(addr: SocketAddr, dial_timeout: Duration) -> Result<Self> {
        let stream = match timeout(dial_timeout, TcpStream::connect(addr)).await {
            Err(_) => {
                return Err(ClientError::DialTimeout {
                    addr,
                    timeout_ms: dial_timeout.as_millis() as u64,
                })
            }
            Ok(connected) => connected?,
        };
        debug!("dialed node stream to {}", addr);
        Ok(Self {
            stream,
            peer: addr,
            created_at: Instant::now(),
            poisoned: false,
        })
    }

    /// The node this stream is connected to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// When this stream was established.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// How long this stream has been alive.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether a transport failure left this stream in an unknown state.
    /// Poisoned streams are retired at check-in instead of being reused.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Write one framed request envelope.
    ///
    /// Any I/O failure poisons the stream: a partial write leaves the
    /// peer's framing out of sync.
    pub async fn send_envelope(
        &mut self,
        envelope: &RequestEnvelope,
        max_message_size: usize,
    ) -> Result<()> {
        let frame = envelope.serialize_framed(max_message_size)?;
        if let Err(e) = self.write_frame(&frame).await {
            self.poisoned = true;
            return Err(e);
        }
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exactly one framed response envelope.
    ///
    /// Failures poison the stream; an oversized frame also does, since the
    /// unread body would desynchronize any later read.
    pub async fn recv_envelope(&mut self, max_message_size: usize) -> Result<ResponseEnvelope> {
        match self.read_response(max_message_size).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    async fn read_response(&mut self, max_message_size: usize) -> Result<ResponseEnvelope> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;

        let len = envelope::read_frame_len(&header);
        if len > max_message_size {
            warn!(
                "node {} sent oversized frame ({} > {})",
                self.peer, len, max_message_size
            );
            return Err(WireError::FrameTooLarge {
                size: len,
                max: max_message_size,
            }
            .into());
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok(ResponseEnvelope::deserialize(&payload)?)
    }

    /// Flush and close the underlying connection.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        debug!("closed node stream to {}", self.peer);
        Ok(())
    }
}

/// Concrete stream factory: picks the next round-robin node and dials it.
///
/// One dialer exists per method pool; `method` is carried for diagnostic
/// logging only.
#[derive(Debug, Clone)]
pub struct NodeDialer {
    selector: Arc<NodeSelector>,
    dial_timeout: Duration,
    method: &'static str,
}

impl NodeDialer {
    /// Create a dialer over the resolved node set.
    pub fn new(selector: Arc<NodeSelector>, dial_timeout: Duration, method: &'static str) -> Self {
        Self {
            selector,
            dial_timeout,
            method,
        }
    }

    /// The method this dialer serves.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Open a fresh stream to the next node in rotation.
    pub async fn connect(&self) -> Result<PooledStream> {
        let addr = self.selector.next();
        debug!("{}: opening stream to {}", self.method, addr);
        PooledStream::dial(addr, self.dial_timeout).await
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        meridian_client_types::envelope::{ResponseEnvelope, SUCCESS_CODE},
        tokio::net::TcpListener,
    };

    const MAX: usize = 1_048_576;

    fn request() -> RequestEnvelope {
        RequestEnvelope {
            namespace: "dev".to_string(),
            auth: None,
            tcert: vec![],
            tcert_signature: String::new(),
            params: vec![1, 2, 3],
        }
    }

    async fn echo_node() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await.unwrap();
            let len = envelope::read_frame_len(&header);
            let mut payload = vec![0u8; len];
            stream.read_exact(&mut payload).await.unwrap();
            let req = RequestEnvelope::deserialize(&payload).unwrap();

            let resp = ResponseEnvelope {
                namespace: req.namespace,
                code: SUCCESS_CODE,
                code_desc: "ok".to_string(),
                result: req.params,
            };
            let frame = resp.serialize_framed(MAX).unwrap();
            stream.write_all(&frame).await.unwrap();
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_round_trip_on_stream() {
        let (addr, server) = echo_node().await;
        let mut stream = PooledStream::dial(addr, Duration::from_secs(1)).await.unwrap();

        let req = request();
        stream.send_envelope(&req, MAX).await.unwrap();
        let resp = stream.recv_envelope(MAX).await.unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.result, req.params);
        assert!(!stream.is_poisoned());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_failure_poisons_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and immediately drop the connection.
            let _ = listener.accept().await;
        });

        let mut stream = PooledStream::dial(addr, Duration::from_secs(1)).await.unwrap();
        let err = stream.recv_envelope(MAX).await.unwrap_err();
        assert!(err.is_system());
        assert!(stream.is_poisoned());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Claim a payload far beyond the limit.
            let bogus = (MAX as u32).saturating_add(1).to_le_bytes();
            stream.write_all(&bogus).await.unwrap();
        });

        let mut stream = PooledStream::dial(addr, Duration::from_secs(1)).await.unwrap();
        let err = stream.recv_envelope(MAX).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Wire(WireError::FrameTooLarge { .. })
        ));
        assert!(stream.is_poisoned());
    }

    #[tokio::test]
    async fn test_dial_timeout() {
        // A listener with a single-slot backlog that never accepts: once
        // the queue is saturated, further connects hang until the dial
        // timeout fires.
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        let mut saw_timeout = false;
        for _ in 0..16 {
            match PooledStream::dial(addr, Duration::from_millis(100)).await {
                Ok(stream) => queued.push(stream),
                Err(e) => {
                    assert!(matches!(e, ClientError::DialTimeout { .. }));
                    saw_timeout = true;
                    break;
                }
            }
        }
        assert!(saw_timeout, "dial never timed out with a saturated backlog");
    }
}
