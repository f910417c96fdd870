//! In-process mock node speaking the envelope wire protocol.
//!
//! Binds a loopback listener, accepts any number of client streams, and
//! answers every request frame according to its configured behavior.
//! Counts connections and requests so tests can assert pool bounds and
//! stream reuse, and records the most recent request envelope so tests
//! can inspect authentication and certificate fields.

use {
    meridian_client_types::{
        envelope::{self, RequestEnvelope, ResponseEnvelope, SUCCESS_CODE},
        transaction::TxReceipt,
    },
    std::{
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    },
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    },
};

const MAX: usize = 1_048_576;

/// How the mock node answers each request.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Success with the given 32-byte transaction hash as the result.
    HashSuccess([u8; 32]),
    /// Success with a serialized receipt as the result.
    ReceiptSuccess(TxReceipt),
    /// A server-reported failure.
    ServerError {
        /// Response code to return.
        code: i32,
        /// Code description to return.
        description: String,
    },
}

/// Handle to a running mock node.
pub struct MockNode {
    /// The loopback address clients should dial.
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<RequestEnvelope>>>,
    handle: JoinHandle<()>,
}

impl MockNode {
    /// Bind a listener and start serving `behavior`.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));
        let last_request = Arc::new(Mutex::new(None));

        let conn_counter = connections.clone();
        let req_counter = requests.clone();
        let last = last_request.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                conn_counter.fetch_add(1, Ordering::SeqCst);
                let behavior = behavior.clone();
                let req_counter = req_counter.clone();
                let last = last.clone();
                tokio::spawn(Self::serve(stream, behavior, req_counter, last));
            }
        });

        Self {
            addr,
            connections,
            requests,
            last_request,
            handle,
        }
    }

    /// Number of streams clients have opened so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of request frames answered so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// The most recently received request envelope.
    pub fn last_request(&self) -> Option<RequestEnvelope> {
        self.last_request.lock().unwrap().clone()
    }

    /// Answer framed requests on one stream until the client hangs up.
    async fn serve(
        mut stream: TcpStream,
        behavior: MockBehavior,
        requests: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<RequestEnvelope>>>,
    ) {
        let mut header = [0u8; 4];
        loop {
            if stream.read_exact(&mut header).await.is_err() {
                break;
            }
            let len = envelope::read_frame_len(&header);
            let mut payload = vec![0u8; len];
            if stream.read_exact(&mut payload).await.is_err() {
                break;
            }
            let Ok(request) = RequestEnvelope::deserialize(&payload) else {
                break;
            };
            requests.fetch_add(1, Ordering::SeqCst);
            let namespace = request.namespace.clone();
            *last.lock().unwrap() = Some(request);

            let response = match &behavior {
                MockBehavior::HashSuccess(hash) => ResponseEnvelope {
                    namespace,
                    code: SUCCESS_CODE,
                    code_desc: "ok".to_string(),
                    result: hash.to_vec(),
                },
                MockBehavior::ReceiptSuccess(receipt) => ResponseEnvelope {
                    namespace,
                    code: SUCCESS_CODE,
                    code_desc: "ok".to_string(),
                    result: receipt.to_result_bytes().unwrap(),
                },
                MockBehavior::ServerError { code, description } => ResponseEnvelope {
                    namespace,
                    code: *code,
                    code_desc: description.clone(),
                    result: vec![0xde, 0xad, 0xbe, 0xef],
                },
            };
            let frame = response.serialize_framed(MAX).unwrap();
            if stream.write_all(&frame).await.is_err() {
                break;
            }
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
