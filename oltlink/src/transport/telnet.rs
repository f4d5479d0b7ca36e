//! Telnet transport.
//!
//! Many OLTs (ZTE C300/C320 in particular) still ship with Telnet as the
//! only enabled CLI service. This is a minimal RFC 854 client: it refuses
//! every option except the server-side ECHO and SUPPRESS-GO-AHEAD that
//! character-mode shells expect, strips negotiation out of the data stream,
//! and drives the `login:` / `Password:` dialogue.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, trace, warn};
use regex::bytes::Regex;
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use zeroize::Zeroizing;

use super::Transport;
use super::config::SessionConfig;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

static LOGIN_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(login|username|user name)\s*:\s*$").expect("valid login prompt regex")
});

static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)password\s*:\s*$").expect("valid password prompt regex"));

static LOGIN_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(incorrect|invalid (user|password|login)|login fail|authentication fail|denied|bad password|(login|username)\s*:\s*$)",
    )
    .expect("valid login failure regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecodeState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Splits a Telnet byte stream into payload data and negotiation replies.
#[derive(Debug, Default)]
struct IacDecoder {
    state: DecodeState,
}

impl IacDecoder {
    /// Decode `input`, appending payload bytes to `data` and the bytes we must
    /// send back to the server to `replies`. State carries across calls, so a
    /// command split over two TCP segments is handled.
    fn decode(&mut self, mut input: &[u8], data: &mut BytesMut, replies: &mut Vec<u8>) {
        while !input.is_empty() {
            match self.state {
                DecodeState::Data => match memchr::memchr(IAC, input) {
                    Some(pos) => {
                        data.extend_from_slice(&input[..pos]);
                        self.state = DecodeState::Iac;
                        input = &input[pos + 1..];
                    }
                    None => {
                        data.extend_from_slice(input);
                        input = &[];
                    }
                },
                DecodeState::Iac => {
                    let byte = input[0];
                    input = &input[1..];
                    self.state = match byte {
                        IAC => {
                            data.extend_from_slice(&[IAC]);
                            DecodeState::Data
                        }
                        WILL | WONT | DO | DONT => DecodeState::Negotiate(byte),
                        SB => DecodeState::Subnegotiation,
                        _ => DecodeState::Data,
                    };
                }
                DecodeState::Negotiate(verb) => {
                    let option = input[0];
                    input = &input[1..];
                    trace!("telnet negotiation verb={} option={}", verb, option);
                    match verb {
                        WILL if option == OPT_ECHO || option == OPT_SGA => {
                            replies.extend_from_slice(&[IAC, DO, option]);
                        }
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        _ => {}
                    }
                    self.state = DecodeState::Data;
                }
                DecodeState::Subnegotiation => match memchr::memchr(IAC, input) {
                    Some(pos) => {
                        self.state = DecodeState::SubnegotiationIac;
                        input = &input[pos + 1..];
                    }
                    None => input = &[],
                },
                DecodeState::SubnegotiationIac => {
                    self.state = if input[0] == SE {
                        DecodeState::Data
                    } else {
                        DecodeState::Subnegotiation
                    };
                    input = &input[1..];
                }
            }
        }
    }
}

/// Double every IAC byte in outgoing payload.
fn escape_iac(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if memchr::memchr(IAC, data).is_none() {
        return std::borrow::Cow::Borrowed(data);
    }
    let mut escaped = Vec::with_capacity(data.len() + 4);
    for &byte in data {
        escaped.push(byte);
        if byte == IAC {
            escaped.push(IAC);
        }
    }
    std::borrow::Cow::Owned(escaped)
}

/// Telnet transport over a tokio TCP stream.
pub struct TelnetTransport {
    config: SessionConfig,
    stream: Option<TcpStream>,
    decoder: IacDecoder,
    /// Output received during login that the session has not read yet.
    pending: BytesMut,
}

impl TelnetTransport {
    /// Create a transport; nothing is dialed until [`Transport::open`].
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            stream: None,
            decoder: IacDecoder::default(),
            pending: BytesMut::new(),
        }
    }

    /// Read one TCP segment worth of payload, answering negotiation inline.
    async fn read_payload(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>, TransportError> {
        let mut raw = [0u8; 4096];
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            let n = match tokio::time::timeout_at(deadline, stream.read(&mut raw)).await {
                Err(_) => return Ok(None),
                Ok(result) => result?,
            };
            if n == 0 {
                self.stream = None;
                return Err(TransportError::Disconnected);
            }

            let mut data = BytesMut::new();
            let mut replies = Vec::new();
            self.decoder.decode(&raw[..n], &mut data, &mut replies);
            if !replies.is_empty() {
                stream.write_all(&replies).await?;
            }
            if !data.is_empty() {
                return Ok(Some(data.to_vec()));
            }
        }
    }

    async fn read_until(&mut self, pattern: &Regex) -> Result<BytesMut, TransportError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut buffer = BytesMut::new();
        loop {
            match self.read_payload(deadline).await? {
                Some(chunk) => {
                    buffer.extend_from_slice(&chunk);
                    if pattern.is_match(&buffer) {
                        return Ok(buffer);
                    }
                }
                None => return Err(TransportError::Timeout(self.config.timeout)),
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        // May carry the password.
        let payload = Zeroizing::new(format!("{}{}", line, self.config.line_ending));
        self.write(payload.as_bytes()).await
    }

    async fn login(&mut self) -> Result<(), TransportError> {
        self.read_until(&LOGIN_PROMPT).await?;
        let username = self.config.username.clone();
        self.send_line(&username).await?;

        self.read_until(&PASSWORD_PROMPT).await?;
        let password = self.config.password.clone();
        self.send_line(password.expose_secret()).await?;

        // Collect whatever follows the password until the line goes quiet.
        let deadline = Instant::now() + self.config.timeout;
        let idle = self.config.drain_idle.max(Duration::from_millis(500));
        let mut after = BytesMut::new();
        while let Some(chunk) = self.read_payload(Instant::now() + idle).await? {
            after.extend_from_slice(&chunk);
            if Instant::now() >= deadline {
                break;
            }
        }

        if LOGIN_FAILURE.is_match(&after) {
            return Err(TransportError::AuthenticationFailed {
                user: self.config.username.clone(),
            });
        }

        self.pending = after;
        Ok(())
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.close().await;

        debug!("Telnet connecting to {}", self.config.socket_addr());
        let stream = tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.config.timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: self.config.host.clone(),
            port: self.config.port,
            source,
        })?;
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        self.decoder = IacDecoder::default();
        self.pending.clear();

        if let Err(e) = self.login().await {
            self.close().await;
            return Err(e);
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Telnet shutdown of {} failed: {}", self.config.host, e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(&escape_iac(data)).await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.pending.is_empty() {
            return Ok(Some(self.pending.split().to_vec()));
        }
        self.read_payload(Instant::now() + timeout).await
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::transport::Protocol;

    fn decode(decoder: &mut IacDecoder, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = BytesMut::new();
        let mut replies = Vec::new();
        decoder.decode(input, &mut data, &mut replies);
        (data.to_vec(), replies)
    }

    #[test]
    fn test_plain_data_passes_through() {
        let mut decoder = IacDecoder::default();
        let (data, replies) = decode(&mut decoder, b"Username:");
        assert_eq!(data, b"Username:");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_negotiation_is_stripped_and_answered() {
        let mut decoder = IacDecoder::default();
        let input = [
            IAC, WILL, OPT_ECHO, IAC, DO, 24, b'o', b'k', IAC, WILL, 31,
        ];
        let (data, replies) = decode(&mut decoder, &input);
        assert_eq!(data, b"ok");
        assert_eq!(
            replies,
            vec![IAC, DO, OPT_ECHO, IAC, WONT, 24, IAC, DONT, 31]
        );
    }

    #[test]
    fn test_escaped_iac_and_subnegotiation() {
        let mut decoder = IacDecoder::default();
        let input = [b'a', IAC, IAC, IAC, SB, 24, 1, IAC, SE, b'b'];
        let (data, replies) = decode(&mut decoder, &input);
        assert_eq!(data, vec![b'a', IAC, b'b']);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_command_split_across_segments() {
        let mut decoder = IacDecoder::default();
        let (data, replies) = decode(&mut decoder, &[b'x', IAC]);
        assert_eq!(data, b"x");
        assert!(replies.is_empty());

        let (data, replies) = decode(&mut decoder, &[DO, OPT_SGA, b'y']);
        assert_eq!(data, b"y");
        assert_eq!(replies, vec![IAC, WONT, OPT_SGA]);
    }

    #[test]
    fn test_escape_iac() {
        assert_eq!(escape_iac(b"show").as_ref(), b"show");
        assert_eq!(escape_iac(&[1, IAC, 2]).as_ref(), &[1, IAC, IAC, 2]);
    }

    #[test]
    fn test_login_patterns() {
        assert!(LOGIN_PROMPT.is_match(b"\r\nZXAN C300\r\nUsername:"));
        assert!(LOGIN_PROMPT.is_match(b"olt login: "));
        assert!(PASSWORD_PROMPT.is_match(b"Password:"));
        assert!(LOGIN_FAILURE.is_match(b"%Error 20200: Bad password\r\nUsername:"));
        assert!(!LOGIN_FAILURE.is_match(b"\r\nZXAN#"));
    }

    async fn listener() -> (TcpListener, SessionConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = SessionConfig::new("127.0.0.1", "admin", SecretString::from("secret"))
            .with_protocol(Protocol::Telnet)
            .with_port(port)
            .with_timeout(Duration::from_secs(2))
            .with_drain_idle(Duration::from_millis(100));
        (listener, config)
    }

    /// Everything the client sent up to and including the next line feed.
    async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while let Ok(1) = stream.read(&mut byte).await {
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        line
    }

    /// Hold the connection until the client hangs up.
    async fn wait_for_close(mut stream: TcpStream) {
        let mut sink = [0u8; 256];
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    }

    fn serve<F, Fut>(listener: TcpListener, script: F) -> JoinHandle<Vec<Vec<u8>>>
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Vec<Vec<u8>>> + Send + 'static,
    {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(stream).await
        })
    }

    #[tokio::test]
    async fn test_login_hands_prompt_to_session() {
        let (listener, config) = listener().await;
        let server = serve(listener, |mut stream| async move {
            let mut banner = vec![IAC, DO, 24, IAC, WILL, OPT_ECHO];
            banner.extend_from_slice(b"\r\nZXAN C320\r\nUsername:");
            stream.write_all(&banner).await.unwrap();
            let user = read_line(&mut stream).await;

            stream.write_all(b"Password:").await.unwrap();
            let password = read_line(&mut stream).await;

            stream.write_all(b"\r\nWelcome\r\nZXAN#").await.unwrap();
            wait_for_close(stream).await;
            vec![user, password]
        });

        let mut transport = TelnetTransport::new(config);
        assert_ok!(transport.open().await);
        assert!(transport.is_open());

        let first = transport.read(Duration::from_millis(100)).await.unwrap().unwrap();
        let text = String::from_utf8_lossy(&first);
        assert!(text.contains("Welcome"));
        assert!(text.ends_with("ZXAN#"));

        transport.close().await;
        let lines = server.await.unwrap();
        // negotiation replies go out ahead of the username
        assert_eq!(lines[0], [IAC, WONT, 24, IAC, DO, OPT_ECHO, b'a', b'd', b'm', b'i', b'n', b'\n']);
        assert_eq!(lines[1], b"secret\n");
    }

    #[tokio::test]
    async fn test_second_username_prompt_is_auth_failure() {
        let (listener, config) = listener().await;
        let server = serve(listener, |mut stream| async move {
            stream.write_all(b"Username:").await.unwrap();
            read_line(&mut stream).await;
            stream.write_all(b"Password:").await.unwrap();
            read_line(&mut stream).await;
            stream.write_all(b"\r\n\r\nUsername:").await.unwrap();
            wait_for_close(stream).await;
            Vec::new()
        });

        let mut transport = TelnetTransport::new(config);
        let err = assert_err!(transport.open().await);
        assert!(
            matches!(err, TransportError::AuthenticationFailed { ref user } if user == "admin"),
            "{:?}",
            err
        );
        assert!(!transport.is_open());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_login_prompt_times_out() {
        let (listener, config) = listener().await;
        let config = config.with_timeout(Duration::from_millis(300));
        let server = serve(listener, |mut stream| async move {
            stream.write_all(b"\r\nService starting, please wait\r\n").await.unwrap();
            wait_for_close(stream).await;
            Vec::new()
        });

        let mut transport = TelnetTransport::new(config);
        let err = assert_err!(transport.open().await);
        assert!(matches!(err, TransportError::Timeout(_)), "{:?}", err);
        assert!(!transport.is_open());
        server.await.unwrap();
    }
}
