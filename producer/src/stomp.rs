//! Minimal STOMP 1.2 client: connect, send with receipts, disconnect.

use crate::Message;
use crate::endpoint::Endpoint;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Frame {
        Frame {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Frame {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Frame {
        self.body = body.into();
        self
    }

    /// Repeated headers resolve to the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn escapes(command: &str) -> bool {
        !matches!(command, "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> Vec<u8> {
        let escapes = Self::escapes(&self.command);
        let mut out = Vec::with_capacity(self.command.len() + self.body.len() + 64);

        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escapes {
                out.extend_from_slice(escape(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Parses a frame without its trailing NUL. Leading heart-beat EOLs are
    /// skipped.
    pub fn decode(raw: &[u8]) -> Result<Frame> {
        let start = raw
            .iter()
            .position(|b| *b != b'\n' && *b != b'\r')
            .unwrap_or(raw.len());
        let (command, mut rest) =
            split_line(&raw[start..]).ok_or_else(|| anyhow!("truncated STOMP frame"))?;
        let command = std::str::from_utf8(command)?.to_owned();
        let escapes = Self::escapes(&command);

        let mut headers = Vec::new();
        loop {
            let (line, tail) =
                split_line(rest).ok_or_else(|| anyhow!("truncated {} frame headers", command))?;
            rest = tail;
            if line.is_empty() {
                break;
            }

            let line = std::str::from_utf8(line)?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| anyhow!("malformed STOMP header: {}", line))?;
            if escapes {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_owned(), value.to_owned()));
            }
        }

        Ok(Frame {
            command,
            headers,
            body: rest.to_vec(),
        })
    }
}

fn split_line(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = buf.iter().position(|b| *b == b'\n')?;
    let line = &buf[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &buf[end + 1..]))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => bail!("invalid escape sequence \\{}", other.unwrap_or(' ')),
        }
    }
    Ok(out)
}

fn broker_error(frame: &Frame) -> anyhow::Error {
    let message = frame.get("message").unwrap_or("no message");
    let details = String::from_utf8_lossy(&frame.body);
    anyhow!("broker error: {} {}", message, details.trim())
}

pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub struct Connection<S> {
    stream: BufReader<S>,
}

/// Opens TCP (and TLS when the endpoint asks for it) and performs the STOMP
/// handshake.
pub async fn connect(
    endpoint: &Endpoint,
    login: &str,
    passcode: &str,
) -> Result<Connection<Box<dyn Transport>>> {
    let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .with_context(|| format!("failed to connect to {}", endpoint))?;

    let stream: Box<dyn Transport> = if endpoint.tls {
        let connector = tokio_native_tls::native_tls::TlsConnector::new()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls = connector
            .connect(&endpoint.host, tcp)
            .await
            .with_context(|| format!("TLS handshake with {} failed", endpoint))?;
        Box::new(tls)
    } else {
        Box::new(tcp)
    };

    Connection::handshake(stream, &endpoint.host, login, passcode).await
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Connection<S> {
    pub async fn handshake(
        stream: S,
        host: &str,
        login: &str,
        passcode: &str,
    ) -> Result<Connection<S>> {
        let mut connection = Connection {
            stream: BufReader::new(stream),
        };

        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("login", login)
            .header("passcode", passcode)
            .header("heart-beat", "0,0");
        connection.write_frame(&connect).await?;

        let reply = connection.read_frame().await?;
        match reply.command.as_str() {
            "CONNECTED" => {
                tracing::info!(
                    version = reply.get("version").unwrap_or("1.0"),
                    server = reply.get("server").unwrap_or_default(),
                    "Connected to broker"
                );
                Ok(connection)
            }
            "ERROR" => Err(broker_error(&reply)),
            other => bail!("unexpected {} frame while connecting", other),
        }
    }

    /// Sends the message and waits for the broker's receipt.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let mut frame = Frame::new("SEND")
            .header("destination", &message.destination)
            .header("receipt", &message.id);
        for (name, value) in &message.headers {
            frame = frame.header(name, value);
        }
        let frame = frame.body(message.body.as_bytes());

        self.write_frame(&frame).await?;
        self.await_receipt(&message.id).await
    }

    pub async fn disconnect(mut self) -> Result<()> {
        let receipt = uuid::Uuid::new_v4().to_string();
        let frame = Frame::new("DISCONNECT").header("receipt", &receipt);

        self.write_frame(&frame).await?;
        self.await_receipt(&receipt).await?;
        self.stream.shutdown().await?;
        tracing::info!("Disconnected from broker");
        Ok(())
    }

    async fn await_receipt(&mut self, receipt: &str) -> Result<()> {
        loop {
            let frame = self.read_frame().await?;
            match frame.command.as_str() {
                "RECEIPT" if frame.get("receipt-id") == Some(receipt) => return Ok(()),
                "ERROR" => return Err(broker_error(&frame)),
                other => tracing::debug!("Ignoring {} frame while waiting for {}", other, receipt),
            }
        }
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.stream.write_all(&frame.encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.stream.read_until(0, &mut buf).await?;
        if buf.pop() != Some(0) {
            bail!("broker closed the connection");
        }
        Frame::decode(&buf)
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> crate::Publisher for Connection<S> {
    async fn publish(&mut self, message: &Message) -> Result<()> {
        self.send(message).await
    }
}
