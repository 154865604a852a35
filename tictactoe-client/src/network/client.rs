//! TLS client for connecting to the game server

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::io::{AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};

use tictactoe::network::connection::BoxedStream;
use tictactoe::network::protocol::{read_frame, write_frame, Message, ProtocolError};
use tictactoe::network::tls::{parse_certs, TlsConfigError};

use crate::config::ClientConfig;

/// Frames waiting to be written to the server.
const OUTGOING_CAPACITY: usize = 32;

/// Frames received but not yet handled by the front end.
const INCOMING_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read CA bundle '{path}': {source}")]
    CaBundle {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid CA bundle: {0}")]
    Certificates(#[from] TlsConfigError),

    #[error("No trusted root certificates available")]
    NoRootCertificates,

    #[error("Invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Disconnected from server")]
    Disconnected,
}

/// Build a connector trusting the configured CA bundle, or the platform
/// roots when none is configured.
pub fn build_connector(config: &ClientConfig) -> Result<TlsConnector, ClientError> {
    let mut roots = RootCertStore::empty();

    match &config.ca_cert {
        Some(path) => {
            let pem = fs::read(path).map_err(|source| ClientError::CaBundle {
                path: path.clone(),
                source,
            })?;
            for cert in parse_certs(&pem)? {
                roots.add(cert)?;
            }
        }
        None => {
            let native = rustls_native_certs::load_native_certs();
            for e in &native.errors {
                warn!("Skipping platform certificate: {}", e);
            }
            let (added, ignored) = roots.add_parsable_certificates(native.certs);
            debug!("Loaded {} platform root certificates ({} ignored)", added, ignored);
        }
    }

    if roots.is_empty() {
        return Err(ClientError::NoRootCertificates);
    }

    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// Handle to a live server connection.
///
/// Messages from the server arrive on the receiver returned by
/// [`GameClient::connect`]; it yields `None` once the server hangs up.
pub struct GameClient {
    outgoing: mpsc::Sender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl GameClient {
    /// Connect, negotiate TLS (unless plaintext) and announce our version.
    pub async fn connect(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<Message>), ClientError> {
        let addr = config.server_addr();
        info!("Connecting to {}...", addr);
        let tcp = TcpStream::connect(&addr).await?;
        tcp.set_nodelay(true)?;

        let stream: BoxedStream = if config.plaintext {
            warn!("TLS disabled, talking plaintext to {}", addr);
            Box::new(tcp)
        } else {
            let connector = build_connector(config)?;
            let server_name = config.server_name().to_string();
            let name = ServerName::try_from(server_name.clone())
                .map_err(|_| ClientError::InvalidServerName(server_name))?;
            Box::new(connector.connect(name, tcp).await?)
        };

        Self::from_stream(stream, &config.version).await
    }

    /// Start the reader and writer tasks on an established stream.
    pub async fn from_stream(
        stream: BoxedStream,
        version: &str,
    ) -> Result<(Self, mpsc::Receiver<Message>), ClientError> {
        let (read_half, mut write_half) = tokio::io::split(stream);
        write_frame(&mut write_half, &Message::version_check(version)).await?;

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CAPACITY);

        let reader = tokio::spawn(read_loop(BufReader::new(read_half), incoming_tx));
        let writer = tokio::spawn(write_loop(write_half, outgoing_rx));

        Ok((
            Self {
                outgoing: outgoing_tx,
                reader,
                writer,
            },
            incoming_rx,
        ))
    }

    pub async fn send(&self, message: Message) -> Result<(), ClientError> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| ClientError::Disconnected)
    }

    pub async fn request_reset(&self) -> Result<(), ClientError> {
        self.send(Message::reset_request()).await
    }

    pub async fn chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(Message::chat(text)).await
    }

    /// Flush pending frames and hang up.
    pub async fn close(self) {
        drop(self.outgoing);
        if let Err(e) = self.writer.await {
            error!("Writer task failed: {}", e);
        }
        self.reader.abort();
    }
}

async fn read_loop(mut reader: BufReader<ReadHalf<BoxedStream>>, incoming: mpsc::Sender<Message>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(message)) => {
                debug!("Received: {:?}", message);
                if incoming.send(message).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("Server closed connection");
                break;
            }
            Err(e) => {
                error!("Read error: {}", e);
                break;
            }
        }
    }
    debug!("Reader task ended");
}

async fn write_loop(mut writer: WriteHalf<BoxedStream>, mut outgoing: mpsc::Receiver<Message>) {
    while let Some(message) = outgoing.recv().await {
        debug!("Sending: {:?}", message);
        if let Err(e) = write_frame(&mut writer, &message).await {
            error!("Failed to send message: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!("Writer task ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tictactoe::network::protocol::MessageType;
    use tictactoe::network::tls::{acceptor_from_pem, Transport};
    use tokio::net::TcpListener;

    async fn recv(rx: &mut mpsc::Receiver<Message>) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plaintext_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let hello = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(hello.kind, MessageType::VersionCheck);
            assert_eq!(hello.version.as_deref(), Some("1.0.0"));
            write_frame(&mut stream, &Message::version_result(true)).await.unwrap();

            let chat = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(chat.content.as_deref(), Some("hi"));
            assert!(read_frame(&mut stream).await.unwrap().is_none());
        });

        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            plaintext: true,
            ..Default::default()
        };
        let (client, mut incoming) = GameClient::connect(&config).await.unwrap();

        let verdict = recv(&mut incoming).await.unwrap();
        assert_eq!(verdict.content.as_deref(), Some("VALID"));

        client.chat("hi").await.unwrap();
        client.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_hangup_ends_incoming() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await.unwrap();
            write_frame(&mut stream, &Message::version_result(false)).await.unwrap();
        });

        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            plaintext: true,
            version: "0.0.1".into(),
            ..Default::default()
        };
        let (client, mut incoming) = GameClient::connect(&config).await.unwrap();
        server.await.unwrap();

        let verdict = recv(&mut incoming).await.unwrap();
        assert_eq!(verdict.content.as_deref(), Some("INVALID"));
        assert!(recv(&mut incoming).await.is_none());

        // Sending after hangup is not an error until the writer notices.
        let _ = client.request_reset().await;
        client.close().await;
    }

    #[tokio::test]
    async fn test_tls_with_ca_bundle() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_pem = certified.cert.pem();
        let key_pem = certified.key_pair.serialize_pem();

        let ca_path = std::env::temp_dir().join(format!("tictactoe-ca-{}.pem", std::process::id()));
        std::fs::write(&ca_path, &cert_pem).unwrap();

        let transport =
            Transport::Tls(acceptor_from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut stream = transport.accept(tcp).await.unwrap();
            let hello = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(hello.kind, MessageType::VersionCheck);
            write_frame(&mut stream, &Message::version_result(true)).await.unwrap();
        });

        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            server_name: Some("localhost".into()),
            ca_cert: Some(ca_path.clone()),
            ..Default::default()
        };
        let (client, mut incoming) = GameClient::connect(&config).await.unwrap();
        let verdict = recv(&mut incoming).await.unwrap();
        assert_eq!(verdict.content.as_deref(), Some("VALID"));

        client.close().await;
        server.await.unwrap();
        let _ = std::fs::remove_file(ca_path);
    }

    #[test]
    fn test_missing_ca_bundle() {
        let config = ClientConfig {
            ca_cert: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..Default::default()
        };
        assert!(matches!(
            build_connector(&config),
            Err(ClientError::CaBundle { .. })
        ));
    }
}
