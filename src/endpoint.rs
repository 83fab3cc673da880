//! Fetching the newest sensor record from the collector endpoint.
//!
//! One GET, one attempt: a reading that cannot be fetched right now is an
//! error for the caller to surface, never something to retry silently. The
//! collector answers with its recent-records window, oldest first.

use std::io::{self, Read};
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::sensor::RawRecord;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for an endpoint response body.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint request failed: {0}")]
    Transport(String),
    #[error("endpoint returned status {0}")]
    Status(u16),
    #[error("endpoint response unreadable: {0}")]
    Read(#[from] io::Error),
    #[error("endpoint response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("endpoint returned no records")]
    NoRecords,
}

/// Return a shared HTTP agent with consistent timeouts.
fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// Fetch the newest reading from the collector at `url`.
///
/// Only an HTTP 200 body reaches the parser. An array body is the
/// collector's oldest-first window and yields its last element; a single
/// object body is accepted as-is.
pub fn fetch_latest_record(url: &str) -> Result<RawRecord, EndpointError> {
    let response = match agent()
        .get(url)
        .set("Accept", "application/json")
        .call()
    {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(EndpointError::Status(code)),
        Err(err) => return Err(EndpointError::Transport(err.to_string())),
    };
    if response.status() != 200 {
        return Err(EndpointError::Status(response.status()));
    }
    let bytes = read_response_bytes(response, MAX_RESPONSE_BYTES)?;
    parse_latest(&bytes)
}

fn parse_latest(bytes: &[u8]) -> Result<RawRecord, EndpointError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    match value {
        serde_json::Value::Array(mut items) => {
            debug!(records = items.len(), "fetched collector window");
            let newest = items.pop().ok_or(EndpointError::NoRecords)?;
            Ok(serde_json::from_value(newest)?)
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

/// Read a response into memory, enforcing a maximum byte size.
fn read_response_bytes(response: ureq::Response, max_bytes: usize) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}

fn check_content_length(response: &ureq::Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response too large: {length} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::normalize_record;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    fn serve_once_capturing(response: String) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 2048];
                let read = stream.read(&mut buf).unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..read]).to_string());
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn window_body() -> String {
        concat!(
            r#"[{"_id":"a1","RGB":{"red":100,"green":180,"blue":130},"lightIntensity":410,"timeTaken":9000,"__v":0},"#,
            r#"{"_id":"a2","RGB":{"red":110,"green":190,"blue":140},"lightIntensity":430,"timeTaken":12000,"__v":0},"#,
            r#"{"_id":"a3","RGB":{"red":120,"green":200,"blue":150},"lightIntensity":450.75,"timeTaken":14500,"__v":0}]"#
        )
        .to_string()
    }

    #[test]
    fn takes_the_last_record_of_the_window() {
        let body = window_body();
        let url = serve_once(format!("HTTP/1.0 200 OK\r\n\r\n{body}"));
        let record = fetch_latest_record(&url).unwrap();
        let reading = normalize_record(&record).unwrap();
        assert_eq!(reading.elapsed_time, 14500.0);
        assert_eq!(reading.red, 120.0);
    }

    #[test]
    fn accepts_a_single_object_body() {
        let body = r#"{"RGB":{"red":1,"green":2,"blue":3},"lightIntensity":4,"timeTaken":5}"#;
        let url = serve_once(format!("HTTP/1.0 200 OK\r\n\r\n{body}"));
        let record = fetch_latest_record(&url).unwrap();
        let reading = normalize_record(&record).unwrap();
        assert_eq!(reading.elapsed_time, 5.0);
    }

    #[test]
    fn sends_the_json_accept_header() {
        let (url, rx) = serve_once_capturing(format!("HTTP/1.0 200 OK\r\n\r\n{}", window_body()));
        fetch_latest_record(&url).unwrap();
        let request = rx.recv().unwrap().to_ascii_lowercase();
        assert!(request.contains("accept: application/json"));
    }

    #[test]
    fn a_non_200_status_never_reaches_the_parser() {
        let url = serve_once("HTTP/1.0 500 Internal Server Error\r\n\r\noops".to_string());
        let err = fetch_latest_record(&url).unwrap_err();
        assert!(matches!(err, EndpointError::Status(500)));
    }

    #[test]
    fn an_empty_window_is_an_error() {
        let url = serve_once("HTTP/1.0 200 OK\r\n\r\n[]".to_string());
        let err = fetch_latest_record(&url).unwrap_err();
        assert!(matches!(err, EndpointError::NoRecords));
    }

    #[test]
    fn an_unparseable_body_is_an_error() {
        let url = serve_once("HTTP/1.0 200 OK\r\n\r\nnot json".to_string());
        let err = fetch_latest_record(&url).unwrap_err();
        assert!(matches!(err, EndpointError::Json(_)));
    }

    #[test]
    fn read_response_bytes_rejects_content_length_over_max() {
        let response = concat!("HTTP/1.1 200 OK\r\n", "Content-Length: 100\r\n", "\r\n", "ok")
            .to_string();
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_response_bytes_rejects_body_over_max() {
        let body = "a".repeat(32);
        let response = format!("HTTP/1.0 200 OK\r\n\r\n{body}");
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
