//! TCP server accepting line-framed connections.
//!
//! Binds the listening socket, accepts connections and hands each one to
//! its own task running the configured protocol.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{AcceptPolicy, Config, ConnectionOptions, ProtocolType};
use crate::error::ServerError;
use crate::protocols::{head, verbatim};

/// Pause before accepting again after a failed `accept`.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Server instance
pub struct Server {
    listener: TcpListener,
    protocol: ProtocolType,
    accept_errors: AcceptPolicy,
    options: ConnectionOptions,
}

impl Server {
    /// Bind the listening socket.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen.clone(),
                source,
            })?;

        Ok(Server {
            listener,
            protocol: config.protocol,
            accept_errors: config.accept_errors,
            options: config.connection,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until an accept error stops the loop.
    ///
    /// Only returns under `AcceptPolicy::Fatal`.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr()?, protocol = ?self.protocol, "Server listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let protocol = self.protocol;
                    let options = self.options;
                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, protocol, options).await {
                                warn!(error = %e, "Connection error");
                            }
                            debug!("Connection closed");
                        }
                        .instrument(info_span!("conn", peer = %peer)),
                    );
                }
                Err(e) => accept_failed(self.accept_errors, e).await?,
            }
        }
    }
}

/// Apply the accept policy to a failed `accept`.
///
/// Fatal failures are returned for `main` to report. Otherwise the failure
/// is logged and the loop resumes after `ACCEPT_RETRY_DELAY`, so persistent
/// errors such as running out of file descriptors do not spin.
async fn accept_failed(policy: AcceptPolicy, e: io::Error) -> Result<(), ServerError> {
    match policy {
        AcceptPolicy::Fatal => Err(ServerError::Accept(e)),
        AcceptPolicy::Continue => {
            error!(error = %e, "Failed to accept connection, continuing");
            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            Ok(())
        }
    }
}

/// Run the configured protocol on one connection.
///
/// The stream is dropped, and so closed, when this returns.
async fn handle_connection(
    stream: TcpStream,
    protocol: ProtocolType,
    options: ConnectionOptions,
) -> io::Result<()> {
    match protocol {
        ProtocolType::Head => head::handle_connection(stream, options).await,
        ProtocolType::Verbatim => verbatim::handle_connection(stream, options).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    fn test_config(protocol: ProtocolType) -> Config {
        Config {
            listen: "127.0.0.1:0".to_string(),
            protocol,
            accept_errors: AcceptPolicy::Fatal,
            connection: ConnectionOptions {
                read_timeout: Some(Duration::from_secs(5)),
                max_line_length: None,
            },
            workers: None,
            log_level: "info".to_string(),
        }
    }

    async fn start(protocol: ProtocolType) -> SocketAddr {
        let server = Server::bind(&test_config(protocol)).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn read_to_end(stream: &mut TcpStream) -> String {
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(ProtocolType::Head);
        config.listen = taken.local_addr().unwrap().to_string();

        match Server::bind(&config).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, config.listen),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bind should fail"),
        }
    }

    #[tokio::test]
    async fn test_accept_failure_fatal() {
        let e = io::Error::new(io::ErrorKind::Other, "too many open files");
        match accept_failed(AcceptPolicy::Fatal, e).await {
            Err(ServerError::Accept(e)) => assert_eq!(e.to_string(), "too many open files"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_failure_continue_backs_off() {
        let start = tokio::time::Instant::now();
        let e = io::Error::new(io::ErrorKind::Other, "too many open files");

        accept_failed(AcceptPolicy::Continue, e).await.unwrap();
        assert!(start.elapsed() >= ACCEPT_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_head_request() {
        let addr = start(ProtocolType::Head).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"GET /foo HTTP/1.1\nAccept: text/plain\n\n")
            .await
            .unwrap();

        assert_eq!(
            read_to_end(&mut client).await,
            "{\"message\":\"Hello, world.\",\"code\":1,\"data\":{\"Path\":\"/foo\",\"Method\":\"GET\",\"Version\":\"HTTP/1.1\",\"Headers\":{\"Accept\":\"text/plain\"}}}\n"
        );
    }

    #[tokio::test]
    async fn test_head_unsupported_version() {
        let addr = start(ProtocolType::Head).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"GET /foo HTTP/1.0\n\n").await.unwrap();

        assert_eq!(
            read_to_end(&mut client).await,
            "{\"message\":\"failed to parse http query.\",\"code\":400,\"data\":null}\n"
        );
    }

    #[tokio::test]
    async fn test_head_eof_without_request() {
        let addr = start(ProtocolType::Head).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.shutdown().await.unwrap();
        assert_eq!(read_to_end(&mut client).await, "");

        // The server keeps serving other clients.
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\n\n").await.unwrap();
        assert!(read_to_end(&mut client).await.contains("\"code\":1"));
    }

    #[tokio::test]
    async fn test_verbatim_echo() {
        let addr = start(ProtocolType::Verbatim).await;
        let client = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = client.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(b"hello\n").await.unwrap();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"message\":\"received\",\"code\":1,\"data\":\"hello\"}\n");

        line.clear();
        writer.write_all(b"again\n").await.unwrap();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"message\":\"received\",\"code\":1,\"data\":\"again\"}\n");

        // A blank line makes the server close the connection.
        line.clear();
        writer.write_all(b"\n").await.unwrap();
        assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_clients_isolated() {
        let addr = start(ProtocolType::Verbatim).await;

        let mut clients = Vec::new();
        for id in 0..2 {
            clients.push(tokio::spawn(async move {
                let client = TcpStream::connect(addr).await.unwrap();
                let (reader, mut writer) = client.into_split();
                let mut reader = BufReader::new(reader);

                for seq in 0..20 {
                    let msg = format!("client-{id}-{seq}");
                    writer.write_all(format!("{msg}\n").as_bytes()).await.unwrap();

                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    assert_eq!(
                        line,
                        format!("{{\"message\":\"received\",\"code\":1,\"data\":\"{msg}\"}}\n")
                    );
                    tokio::task::yield_now().await;
                }
            }));
        }

        for client in clients {
            client.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_concurrent_head_requests() {
        let addr = start(ProtocolType::Head).await;

        // Open both connections and interleave their partial writes.
        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();

        a.write_all(b"GET /a HTTP/1.1\n").await.unwrap();
        b.write_all(b"PUT /b HTTP/1.1\n").await.unwrap();
        a.write_all(b"X-Client: a\n\n").await.unwrap();
        b.write_all(b"X-Client: b\n\n").await.unwrap();

        let a_resp = read_to_end(&mut a).await;
        let b_resp = read_to_end(&mut b).await;

        assert!(a_resp.contains("\"Path\":\"/a\""));
        assert!(a_resp.contains("\"X-Client\":\"a\""));
        assert!(b_resp.contains("\"Method\":\"PUT\""));
        assert!(b_resp.contains("\"X-Client\":\"b\""));
    }
}
