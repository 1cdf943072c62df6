//! HTTP CONNECT tunnelling for the RTM websocket

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::application::errors::BotError;

/// Upper bound on the proxy's response head
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// An HTTP proxy able to tunnel TCP with `CONNECT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProxy {
    host: String,
    port: u16,
    authorization: Option<String>,
}

impl HttpProxy {
    pub fn parse(proxy: &str) -> Result<Self, BotError> {
        let url = Url::parse(proxy)
            .map_err(|e| BotError::Network(format!("Invalid proxy URL {}: {}", proxy, e)))?;
        if url.scheme() != "http" {
            return Err(BotError::Network(format!(
                "Unsupported proxy scheme for the RTM stream: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| BotError::Network(format!("Proxy URL has no host: {}", proxy)))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let authorization = if url.username().is_empty() {
            None
        } else {
            let credentials = format!("{}:{}", url.username(), url.password().unwrap_or(""));
            Some(format!("Basic {}", STANDARD.encode(credentials)))
        };

        Ok(Self { host, port, authorization })
    }

    /// Request head asking the proxy for a tunnel to `host:port`
    pub fn connect_request(&self, host: &str, port: u16) -> String {
        let mut request = format!(
            "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
            host = host,
            port = port
        );
        if let Some(authorization) = &self.authorization {
            request.push_str(&format!("Proxy-Authorization: {}\r\n", authorization));
        }
        request.push_str("\r\n");
        request
    }

    /// Opens a TCP tunnel through the proxy to `host:port`
    pub async fn tunnel(&self, host: &str, port: u16) -> Result<TcpStream, BotError> {
        debug!("Tunnelling to {}:{} through proxy {}:{}", host, port, self.host, self.port);
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| BotError::Network(format!("Proxy connection failed: {}", e)))?;

        stream
            .write_all(self.connect_request(host, port).as_bytes())
            .await
            .map_err(|e| BotError::Network(format!("Proxy write failed: {}", e)))?;

        let mut head = Vec::new();
        let mut buf = [0u8; 512];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            if head.len() > MAX_RESPONSE_HEAD {
                return Err(BotError::Network("Proxy response head too large".to_string()));
            }
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| BotError::Network(format!("Proxy read failed: {}", e)))?;
            if n == 0 {
                return Err(BotError::Network("Proxy closed the connection".to_string()));
            }
            head.extend_from_slice(&buf[..n]);
        }

        check_connect_status(&head)?;
        Ok(stream)
    }
}

/// Host and port a websocket URL connects to
pub fn tunnel_target(url: &str) -> Result<(String, u16), BotError> {
    let url = Url::parse(url)
        .map_err(|e| BotError::Network(format!("Invalid RTM URL {}: {}", url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| BotError::Network("RTM URL has no host".to_string()))?
        .to_string();
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "ws" { 80 } else { 443 });
    Ok((host, port))
}

fn check_connect_status(head: &[u8]) -> Result<(), BotError> {
    let head = String::from_utf8_lossy(head);
    let status_line = head.lines().next().unwrap_or("");
    let status = status_line.split_whitespace().nth(1).unwrap_or("");
    if status == "200" {
        Ok(())
    } else {
        Err(BotError::Network(format!("Proxy refused tunnel: {}", status_line)))
    }
}
