use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query string, exactly as sent.
    pub path: String,
    pub headers: HashMap<String, String>,
    /// Lossy UTF-8; multipart bodies may carry binary parts.
    pub body: String,
}

impl CapturedRequest {
    /// Last path segment without the query, e.g. `LoadChat`.
    pub fn endpoint(&self) -> &str {
        let path = self.path.split('?').next().unwrap_or("");
        path.rsplit('/').next().unwrap_or("")
    }

    /// Decoded query parameter.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let parsed = url::Url::parse(&format!("http://mock{}", self.path)).ok()?;
        parsed
            .query_pairs()
            .find_map(|(k, v)| if k == key { Some(v.into_owned()) } else { None })
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Holds the response back for `delay` after the request has been captured.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Routes {
    // endpoint -> queued responses; the last one is sticky.
    queues: HashMap<String, VecDeque<MockResponse>>,
    requests: Vec<CapturedRequest>,
}

impl Routes {
    fn next_response(&mut self, endpoint: &str) -> Option<MockResponse> {
        let queue = self.queues.get_mut(endpoint)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// Multi-request HTTP mock for the chat backend. Responses are queued per endpoint
/// (last path segment); once a queue is down to one response it is repeated for every
/// further request. Unknown endpoints get a 404.
pub struct MockChatServer {
    addr: std::net::SocketAddr,
    routes: Arc<Mutex<Routes>>,
    shutdown: Arc<AtomicBool>,
}

impl MockChatServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("read mock server addr");
        let routes = Arc::new(Mutex::new(Routes::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let routes_for_loop = routes.clone();
        let shutdown_for_loop = shutdown.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                if shutdown_for_loop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else {
                    continue;
                };
                let routes = routes_for_loop.clone();
                thread::spawn(move || serve_connection(stream, routes));
            }
        });

        Self {
            addr,
            routes,
            shutdown,
        }
    }

    /// Base URL to configure the client with.
    pub fn base_url(&self) -> String {
        format!("http://{}/Umee_Chat_App", self.addr)
    }

    pub fn respond(&self, endpoint: &str, response: MockResponse) {
        self.routes
            .lock()
            .unwrap()
            .queues
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    /// Drops anything queued for `endpoint` and serves `response` from now on.
    pub fn replace(&self, endpoint: &str, response: MockResponse) {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.queues.entry(endpoint.to_string()).or_default();
        queue.clear();
        queue.push_back(response);
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.routes.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, endpoint: &str) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.endpoint() == endpoint)
            .collect()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.requests_to(endpoint).len()
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Unblock the accept loop.
        let _ = TcpStream::connect(self.addr);
    }
}

fn serve_connection(mut stream: TcpStream, routes: Arc<Mutex<Routes>>) {
    let Some(req) = read_http_request(&mut stream) else {
        return;
    };
    let endpoint = req.endpoint().to_string();
    let response = {
        let mut routes = routes.lock().unwrap();
        routes.requests.push(req);
        routes.next_response(&endpoint)
    };
    let response = response.unwrap_or_else(|| MockResponse::status(404, r#"{"error":"not found"}"#));
    if !response.delay.is_zero() {
        thread::sleep(response.delay);
    }
    let _ = stream.write_all(render_response(&response).as_bytes());
}

fn render_response(response: &MockResponse) -> String {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    format!(
        "HTTP/1.1 {} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    )
}

fn read_http_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut header_end = None;
    let mut content_length = 0usize;

    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if header_end.is_none() {
            header_end = buf
                .windows(4)
                .position(|window| window == b"\r\n\r\n")
                .map(|idx| idx + 4);
            if let Some(end) = header_end {
                let headers = String::from_utf8_lossy(&buf[..end]);
                for line in headers.lines() {
                    if let Some((key, value)) = line.split_once(':') {
                        if key.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse::<usize>().unwrap_or(0);
                        }
                    }
                }
            }
        }
        if let Some(end) = header_end {
            if buf.len() >= end + content_length {
                break;
            }
        }
    }

    let end = header_end?;
    let headers_raw = String::from_utf8_lossy(&buf[..end]);
    let mut lines = headers_raw.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let body_end = (end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[end..body_end]).into_owned();

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}
