//! Tor control port client
//!
//! Requests a new circuit (and so a new exit IP) through the control port's
//! line protocol:
//!
//! ```text
//! > AUTHENTICATE "password"
//! < 250 OK
//! > SIGNAL NEWNYM
//! < 250 OK
//! ```

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Errors that can occur while talking to Tor
#[derive(Debug, Error)]
pub enum TorError {
    #[error("Tor control connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tor authentication failed: {0}")]
    Authentication(String),

    #[error("Tor command failed: {0}")]
    Command(String),

    #[error("Tor control port closed the connection")]
    ConnectionClosed,

    #[error("Exit IP lookup failed: {0}")]
    IpLookup(#[from] reqwest::Error),
}

/// Something that can switch the crawler to a new outgoing IP
#[async_trait]
pub trait IpRotator: Send + Sync {
    async fn rotate(&self) -> Result<(), TorError>;
}

/// Connection details for the local Tor instance
#[derive(Debug, Clone)]
pub struct TorSettings {
    pub control_host: String,
    pub control_port: u16,
    /// Empty means no password is sent
    pub control_password: String,
    /// HTTP proxy in front of Tor, used for the exit IP lookup
    pub proxy: String,
    pub ip_check_url: String,
    pub connect_timeout: Duration,
    /// How long to wait for each control port reply
    pub reply_timeout: Duration,
}

impl Default for TorSettings {
    fn default() -> Self {
        Self {
            control_host: "127.0.0.1".to_string(),
            control_port: 9051,
            control_password: String::new(),
            proxy: "http://127.0.0.1:8118".to_string(),
            ip_check_url: "https://api.ipify.org".to_string(),
            connect_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(10),
        }
    }
}

/// Rotates the Tor identity over the control port
pub struct TorController {
    settings: TorSettings,
}

impl TorController {
    pub fn new(settings: TorSettings) -> Self {
        Self { settings }
    }

    /// Authenticates and sends `SIGNAL NEWNYM`
    pub async fn new_identity(&self) -> Result<(), TorError> {
        let address = format!("{}:{}", self.settings.control_host, self.settings.control_port);
        let connect = TcpStream::connect(&address);
        let stream = tokio::time::timeout(self.settings.connect_timeout, connect)
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {}", address),
                )
            })??;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let authenticate = if self.settings.control_password.is_empty() {
            "AUTHENTICATE\r\n".to_string()
        } else {
            format!(
                "AUTHENTICATE \"{}\"\r\n",
                self.settings.control_password.replace('"', "\\\"")
            )
        };

        writer.write_all(authenticate.as_bytes()).await?;
        let reply = read_reply(&mut reader, self.settings.reply_timeout).await?;
        check_reply(&reply)?;

        writer.write_all(b"SIGNAL NEWNYM\r\n").await?;
        let reply = read_reply(&mut reader, self.settings.reply_timeout).await?;
        check_reply(&reply)?;

        let _ = writer.shutdown().await;
        Ok(())
    }

    /// Looks up the current exit IP through the HTTP proxy
    pub async fn current_ip(&self) -> Result<String, TorError> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(&self.settings.proxy)?)
            .timeout(Duration::from_secs(30))
            .build()?;

        let ip = client
            .get(&self.settings.ip_check_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(ip.trim().to_string())
    }
}

#[async_trait]
impl IpRotator for TorController {
    async fn rotate(&self) -> Result<(), TorError> {
        self.new_identity().await?;

        match self.current_ip().await {
            Ok(ip) => tracing::info!(ip = %ip, "Tor identity changed"),
            Err(e) => tracing::warn!(error = %e, "Tor identity changed, exit IP unknown"),
        }
        Ok(())
    }
}

async fn read_reply<R>(reader: &mut R, timeout: Duration) -> Result<String, TorError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    let read = tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "waiting for control port reply")
        })??;
    if read == 0 {
        return Err(TorError::ConnectionClosed);
    }
    Ok(line.trim_end().to_string())
}

fn check_reply(reply: &str) -> Result<(), TorError> {
    if reply.starts_with("250") {
        Ok(())
    } else if reply.starts_with("515") {
        Err(TorError::Authentication(reply.to_string()))
    } else {
        Err(TorError::Command(reply.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Serves one control connection, answering each command from `replies`
    async fn fake_control_port(replies: Vec<&'static str>) -> (u16, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);

            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                log.lock().unwrap().push(line.trim_end().to_string());
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        (port, received)
    }

    fn controller(port: u16, password: &str) -> TorController {
        TorController::new(TorSettings {
            control_port: port,
            control_password: password.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_new_identity_success() {
        let (port, received) = fake_control_port(vec!["250 OK\r\n", "250 OK\r\n"]).await;

        controller(port, "").new_identity().await.unwrap();

        assert_eq!(
            *received.lock().unwrap(),
            vec!["AUTHENTICATE".to_string(), "SIGNAL NEWNYM".to_string()]
        );
    }

    #[tokio::test]
    async fn test_password_is_quoted() {
        let (port, received) = fake_control_port(vec!["250 OK\r\n", "250 OK\r\n"]).await;

        controller(port, "secret").new_identity().await.unwrap();

        assert_eq!(received.lock().unwrap()[0], r#"AUTHENTICATE "secret""#);
    }

    #[tokio::test]
    async fn test_authentication_failure() {
        let (port, _) =
            fake_control_port(vec!["515 Authentication failed: Wrong length\r\n"]).await;

        let result = controller(port, "wrong").new_identity().await;

        assert!(matches!(result, Err(TorError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_command_failure() {
        let (port, _) =
            fake_control_port(vec!["250 OK\r\n", "552 Unrecognized signal\r\n"]).await;

        let result = controller(port, "").new_identity().await;

        assert!(matches!(result, Err(TorError::Command(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = controller(port, "").new_identity().await;

        assert!(matches!(result, Err(TorError::Io(_))));
    }

    #[tokio::test]
    async fn test_silent_control_port_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let controller = TorController::new(TorSettings {
            control_port: port,
            reply_timeout: Duration::from_millis(200),
            ..Default::default()
        });

        let result = tokio::time::timeout(Duration::from_secs(3), controller.new_identity())
            .await
            .expect("new_identity should give up on a silent control port");

        match result {
            Err(TorError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_check_reply() {
        assert!(check_reply("250 OK").is_ok());
        assert!(matches!(
            check_reply("515 Bad authentication"),
            Err(TorError::Authentication(_))
        ));
        assert!(matches!(check_reply("451 Resource exhausted"), Err(TorError::Command(_))));
    }
}
