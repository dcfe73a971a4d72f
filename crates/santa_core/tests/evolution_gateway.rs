use santa_core::{EvolutionGateway, GatewayConfig, GatewayError, MessageGateway};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One-shot HTTP stub: answers each accepted connection with the next canned response.
struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    fn spawn(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let request = read_request(&mut reader);
                recorded.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut stream = reader.into_inner();
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        Self {
            base_url,
            requests,
            handle: Some(handle),
        }
    }

    fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        let requests = self.requests.lock().unwrap().clone();
        requests
    }
}

fn read_request(reader: &mut impl BufRead) -> RecordedRequest {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body).unwrap();

    RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

fn gateway(base_url: &str) -> EvolutionGateway {
    EvolutionGateway::new(GatewayConfig {
        base_url: base_url.to_string(),
        instance: "santa".to_string(),
        api_key: "secret".to_string(),
        request_timeout: Duration::from_secs(5),
        ..GatewayConfig::default()
    })
    .unwrap()
}

#[test]
fn send_one_posts_normalized_number_with_api_key() {
    let server = StubServer::spawn(vec![(201, r#"{"key":{"id":"abc"},"status":"PENDING"}"#)]);
    let gateway = gateway(&server.base_url);

    gateway
        .send_one("(27) 99999-1234", "Hi Ana! Your link is ready.")
        .unwrap();

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/message/sendText/santa");
    assert_eq!(request.header("apikey"), Some("secret"));

    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["number"], "5527999991234");
    assert_eq!(body["text"], "Hi Ana! Your link is ready.");
}

#[test]
fn rejected_send_uses_nested_gateway_message() {
    let server = StubServer::spawn(vec![(
        400,
        r#"{"status":400,"error":"Bad Request","response":{"message":["Number not on WhatsApp"]}}"#,
    )]);
    let gateway = gateway(&server.base_url);

    let err = gateway.send_one("27999991234", "hi").unwrap_err();
    assert_eq!(
        err,
        GatewayError::Rejected {
            status: 400,
            message: "Number not on WhatsApp".to_string(),
        }
    );
    assert_eq!(err.to_string(), "Number not on WhatsApp");
    server.finish();
}

#[test]
fn rejected_send_without_json_falls_back_to_status() {
    let server = StubServer::spawn(vec![(500, "upstream exploded")]);
    let gateway = gateway(&server.base_url);

    let err = gateway.send_one("27999991234", "hi").unwrap_err();
    assert_eq!(
        err,
        GatewayError::Rejected {
            status: 500,
            message: "HTTP 500".to_string(),
        }
    );
    server.finish();
}

#[test]
fn successful_status_with_invalid_body_is_decode_error() {
    let server = StubServer::spawn(vec![(200, "not json")]);
    let gateway = gateway(&server.base_url);

    let err = gateway.send_one("27999991234", "hi").unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
    server.finish();
}

#[test]
fn probe_reports_availability_from_instance_listing() {
    let server = StubServer::spawn(vec![(200, r#"[{"name":"santa"}]"#), (401, r#"{}"#)]);
    let gateway = gateway(&server.base_url);

    assert!(gateway.probe_availability());
    assert!(!gateway.probe_availability());

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/instance/fetchInstances");
    assert_eq!(requests[0].header("apikey"), Some("secret"));
}

#[test]
fn unreachable_gateway_is_unavailable_and_send_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let gateway = gateway(&base_url);

    assert!(!gateway.probe_availability());
    let err = gateway.send_one("27999991234", "hi").unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}

#[test]
fn address_without_digits_is_rejected_before_any_request() {
    let server = StubServer::spawn(Vec::new());
    let gateway = gateway(&server.base_url);

    let err = gateway.send_one("no phone", "hi").unwrap_err();
    assert_eq!(err, GatewayError::InvalidAddress("no phone".to_string()));
    assert!(server.finish().is_empty());
}
