//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use meek_http_helper::config::ListenerConfig;
use meek_http_helper::lifecycle::Shutdown;
use meek_http_helper::net::{ConnectionSettings, HelperServer, Listener};
use meek_http_helper::protocol::frame;
use meek_http_helper::transport::{HttpTransport, TransportError, TransportRequest, TransportResponse};

/// What a [`StubTransport`] does with every request.
#[derive(Clone)]
pub enum StubReply {
    Respond(u16, Vec<u8>),
    Fail(TransportError),
    /// Never completes.
    Hang,
}

/// In-process transport that records what it was asked to send.
pub struct StubTransport {
    reply: StubReply,
    seen: Mutex<Vec<TransportRequest>>,
}

impl StubTransport {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl HttpTransport for StubTransport {
    async fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(request);
        match self.reply.clone() {
            StubReply::Respond(status, body) => Ok(TransportResponse { status, body }),
            StubReply::Fail(err) => Err(err),
            StubReply::Hang => std::future::pending().await,
        }
    }
}

/// A helper running on an ephemeral loopback port.
pub struct RunningHelper {
    pub addr: SocketAddr,
    pub settings: Arc<ArcSwap<ConnectionSettings>>,
    pub shutdown: Shutdown,
}

pub async fn start_helper<T: HttpTransport>(transport: Arc<T>, settings: ConnectionSettings) -> RunningHelper {
    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 64,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = Arc::new(ArcSwap::from_pointee(settings));
    let server = HelperServer::new(listener, transport, settings.clone());

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(rx).await;
    });

    RunningHelper { addr, settings, shutdown }
}

pub fn framed(json: &str) -> Vec<u8> {
    frame::encode(json.as_bytes()).unwrap().to_vec()
}

/// Write `bytes` in one go and collect everything until the helper closes.
pub async fn send_raw(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    read_until_close(&mut stream).await
}

/// Write `bytes` split into the given chunks, pausing between them.
pub async fn send_chunked(addr: SocketAddr, bytes: &[u8], splits: &[usize]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut start = 0;
    for &end in splits.iter().chain(std::iter::once(&bytes.len())) {
        stream.write_all(&bytes[start..end]).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        start = end;
    }
    read_until_close(&mut stream).await
}

pub async fn read_until_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    // A reset counts as a close with whatever arrived so far.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("helper did not close the connection");
    out
}

/// Request line and headers captured by [`start_mock_backend`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Plain-HTTP upstream that answers every request with `response` verbatim.
pub async fn start_mock_backend(response: String) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let response = response.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                    return;
                }

                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((k, v)) = line.split_once(':') {
                        headers.push((k.trim().to_string(), v.trim().to_string()));
                    }
                }

                let length = headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body = vec![0u8; length];
                reader.read_exact(&mut body).await.unwrap();

                let _ = tx.send(CapturedRequest {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                    body,
                });

                let mut socket = reader.into_inner();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

pub fn http_response(status_line: &str, extra_headers: &[&str], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
    for header in extra_headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

/// A SOCKS4a CONNECT request as received on the wire.
#[derive(Debug, Clone)]
pub struct Socks4aConnect {
    pub version: u8,
    pub command: u8,
    pub port: u16,
    pub ip: [u8; 4],
    pub user_id: Vec<u8>,
    pub hostname: String,
}

/// SOCKS4a server that records one CONNECT and rejects it.
pub async fn start_rejecting_socks4a() -> (SocketAddr, mpsc::UnboundedReceiver<Socks4aConnect>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let mut reader = BufReader::new(socket);
            let mut head = [0u8; 8];
            if reader.read_exact(&mut head).await.is_err() {
                continue;
            }
            let mut user_id = Vec::new();
            reader.read_until(0, &mut user_id).await.unwrap();
            user_id.pop();

            let ip = [head[4], head[5], head[6], head[7]];
            let mut hostname = Vec::new();
            if ip[..3] == [0, 0, 0] && ip[3] != 0 {
                reader.read_until(0, &mut hostname).await.unwrap();
                hostname.pop();
            }

            let _ = tx.send(Socks4aConnect {
                version: head[0],
                command: head[1],
                port: u16::from_be_bytes([head[2], head[3]]),
                ip,
                user_id,
                hostname: String::from_utf8_lossy(&hostname).into_owned(),
            });

            let mut socket = reader.into_inner();
            // 0x5B: request rejected or failed.
            let _ = socket.write_all(&[0x00, 0x5B, 0, 0, 0, 0, 0, 0]).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, rx)
}

/// Response with a chunked body and no `Content-Length`.
pub fn chunked_response(status_line: &str, chunks: &[&str]) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n");
    for chunk in chunks {
        out.push_str(&format!("{:x}\r\n{chunk}\r\n", chunk.len()));
    }
    out.push_str("0\r\n\r\n");
    out
}

/// A SOCKS5 CONNECT request as received on the wire.
#[derive(Debug, Clone)]
pub struct Socks5Connect {
    pub methods: Vec<u8>,
    pub command: u8,
    pub address_type: u8,
    pub address: Vec<u8>,
    pub port: u16,
}

impl Socks5Connect {
    pub fn domain(&self) -> Option<String> {
        (self.address_type == 0x03).then(|| String::from_utf8_lossy(&self.address).into_owned())
    }
}

/// SOCKS5 server that accepts the no-auth greeting, records one CONNECT
/// and refuses it.
pub async fn start_rejecting_socks5() -> (SocketAddr, mpsc::UnboundedReceiver<Socks5Connect>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut greeting = [0u8; 2];
            if socket.read_exact(&mut greeting).await.is_err() {
                continue;
            }
            let mut methods = vec![0u8; greeting[1] as usize];
            socket.read_exact(&mut methods).await.unwrap();
            socket.write_all(&[0x05, 0x00]).await.unwrap();

            let mut head = [0u8; 4];
            socket.read_exact(&mut head).await.unwrap();
            let address = match head[3] {
                0x01 => {
                    let mut ip = vec![0u8; 4];
                    socket.read_exact(&mut ip).await.unwrap();
                    ip
                }
                0x04 => {
                    let mut ip = vec![0u8; 16];
                    socket.read_exact(&mut ip).await.unwrap();
                    ip
                }
                _ => {
                    let len = socket.read_u8().await.unwrap();
                    let mut name = vec![0u8; len as usize];
                    socket.read_exact(&mut name).await.unwrap();
                    name
                }
            };
            let port = socket.read_u16().await.unwrap();

            let _ = tx.send(Socks5Connect {
                methods,
                command: head[1],
                address_type: head[3],
                address,
                port,
            });

            // 0x05: connection refused.
            let _ = socket.write_all(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, rx)
}
