//! 采集传输
//!
//! TCP: 绑定后只接受一个客户端；Serial: 绑定时即打开设备 (feature = "serial")。

use std::fmt;
use std::net::SocketAddr;

use contracts::{IngestConfig, TransportKind};
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, instrument};

use crate::error::{IngestionError, Result};
use crate::reader::SampleReader;

/// TCP ingestion listener accepting a single producer
#[derive(Debug)]
pub struct TcpIngestListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpIngestListener {
    /// Bind the listener
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| IngestionError::Bind {
                address: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| IngestionError::Bind {
            address: addr.to_string(),
            source,
        })?;
        info!(address = %local_addr, "ingestion listener bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept exactly one client; the listener is closed afterwards
    #[instrument(name = "ingest_accept", skip(self), fields(address = %self.local_addr))]
    pub async fn accept_one(self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|source| IngestionError::Accept {
                address: self.local_addr.to_string(),
                source,
            })?;
        // Nagle only delays small sample lines.
        let _ = stream.set_nodelay(true);
        info!(peer = %peer, "ingestion client connected");
        Ok((stream, peer))
    }
}

/// Boxed byte source produced by [`IngestSource::connect`]
pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;

/// Transport chosen from configuration, bound but not yet connected
pub enum IngestSource {
    /// Bound TCP listener
    Tcp(TcpIngestListener),
    /// Opened serial device
    Serial { path: String, port: BoxedRead },
}

impl fmt::Debug for IngestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(listener) => f.debug_tuple("Tcp").field(listener).finish(),
            Self::Serial { path, .. } => f.debug_struct("Serial").field("path", path).finish_non_exhaustive(),
        }
    }
}

impl IngestSource {
    /// Bind the configured transport.
    ///
    /// TCP binds the listener; serial opens the device. A missing or busy
    /// device fails here, before anything downstream is started.
    pub async fn bind(config: &IngestConfig) -> Result<Self> {
        match config.transport {
            TransportKind::Tcp => Ok(Self::Tcp(TcpIngestListener::bind(&config.bind).await?)),
            TransportKind::Serial => {
                let path = config.serial_path.clone().unwrap_or_default();
                let port = open_serial(&path, config.baud_rate)?;
                Ok(Self::Serial { path, port })
            }
        }
    }

    /// Bound TCP address, if any
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => Some(listener.local_addr()),
            Self::Serial { .. } => None,
        }
    }

    /// Wait for the producer and wrap it in a [`SampleReader`]
    pub async fn connect(self, max_line_bytes: usize) -> Result<SampleReader<BoxedRead>> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept_one().await?;
                Ok(SampleReader::new(Box::new(stream) as BoxedRead, max_line_bytes)
                    .with_source(peer.to_string()))
            }
            Self::Serial { path, port } => Ok(SampleReader::new(port, max_line_bytes).with_source(path)),
        }
    }
}

/// Open a serial device
#[cfg(feature = "serial")]
pub fn open_serial(path: &str, baud_rate: u32) -> Result<BoxedRead> {
    use tokio_serial::SerialPortBuilderExt;

    let port = tokio_serial::new(path, baud_rate)
        .open_native_async()
        .map_err(|e| IngestionError::SerialOpen {
            path: path.to_string(),
            message: e.to_string(),
        })?;
    info!(path, baud_rate, "serial ingestion port opened");
    Ok(Box::new(port))
}

/// Open a serial device
#[cfg(not(feature = "serial"))]
pub fn open_serial(_path: &str, _baud_rate: u32) -> Result<BoxedRead> {
    Err(IngestionError::UnsupportedTransport("serial".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Sample;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_bind_resolves_port() {
        let listener = TcpIngestListener::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_error() {
        let first = TcpIngestListener::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().to_string();
        let err = TcpIngestListener::bind(&addr).await.unwrap_err();
        assert!(matches!(err, IngestionError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_tcp_source_reads_samples() {
        let config = IngestConfig {
            bind: "127.0.0.1:0".into(),
            ..Default::default()
        };
        let source = IngestSource::bind(&config).await.unwrap();
        let addr = source.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"{\"timestamp\":5,\"x\":1,\"y\":2,\"z\":3}\n")
                .await
                .unwrap();
        });

        let mut reader = source.connect(1024).await.unwrap();
        assert_eq!(reader.next_sample().await, Some(Sample::new(5, 1.0, 2.0, 3.0)));
        client.await.unwrap();
        assert_eq!(reader.next_sample().await, None);
    }

    #[tokio::test]
    async fn test_serial_bind_opens_device() {
        let config = IngestConfig {
            transport: TransportKind::Serial,
            serial_path: Some("/dev/does-not-exist-gyro".into()),
            ..Default::default()
        };
        let err = IngestSource::bind(&config).await.unwrap_err();
        assert!(matches!(
            err,
            IngestionError::SerialOpen { .. } | IngestionError::UnsupportedTransport(_)
        ));
    }

    #[tokio::test]
    async fn test_serial_open_missing_device() {
        let err = open_serial("/dev/does-not-exist-gyro", 115_200).err().unwrap();
        assert!(matches!(
            err,
            IngestionError::SerialOpen { .. } | IngestionError::UnsupportedTransport(_)
        ));
    }
}
