#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// 1x1 PNG signature bytes, base64 encoded.
pub const STUB_IMAGE_BASE64: &str = "iVBORw0KGgo=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Aladin,
    Responses,
    Gemini,
    /// Gemini calls that carried an inline reference image.
    GeminiWithReference,
    Cover,
}

#[derive(Debug, Clone, Copy)]
pub enum AladinBehavior {
    /// Twelve items, so the provider has to cap the list.
    Books,
    Empty,
    ServerError,
}

#[derive(Debug, Clone, Copy)]
pub enum TextBehavior {
    Valid,
    InvalidJson,
    ServerError,
}

#[derive(Debug, Clone)]
pub struct ApiStubConfig {
    pub aladin: AladinBehavior,
    pub text: TextBehavior,
    /// Image prompts containing this marker get a 500 from the image API.
    pub failing_image_marker: Option<String>,
    /// Delay applied to every image response.
    pub image_delay: Duration,
}

impl Default for ApiStubConfig {
    fn default() -> Self {
        Self {
            aladin: AladinBehavior::Books,
            text: TextBehavior::Valid,
            failing_image_marker: None,
            image_delay: Duration::ZERO,
        }
    }
}

pub struct ApiStub {
    pub base_url: String,
    hits: Arc<Mutex<HashMap<Route, usize>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl ApiStub {
    pub fn spawn(config: ApiStubConfig) -> Self {
        let server =
            Arc::new(tiny_http::Server::http("127.0.0.1:0").expect("start api stub server"));
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let hits: Arc<Mutex<HashMap<Route, usize>>> = Arc::default();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let shutdown_rx = Arc::new(Mutex::new(shutdown_rx));
        let stopped = Arc::new(AtomicUsize::new(0));

        // Scene images are requested concurrently, so serve on a few threads.
        let handles = (0..4)
            .map(|_| {
                let server = Arc::clone(&server);
                let hits = Arc::clone(&hits);
                let config = config.clone();
                let base_url = base_url.clone();
                let shutdown_rx = Arc::clone(&shutdown_rx);
                let stopped = Arc::clone(&stopped);
                thread::spawn(move || {
                    loop {
                        if stopped.load(Ordering::SeqCst) > 0 {
                            break;
                        }
                        if shutdown_rx.lock().unwrap().try_recv().is_ok() {
                            stopped.fetch_add(1, Ordering::SeqCst);
                            break;
                        }

                        let request = match server.recv_timeout(Duration::from_millis(50)) {
                            Ok(Some(req)) => req,
                            Ok(None) => continue,
                            Err(_) => break,
                        };
                        handle(request, &config, &base_url, &hits);
                    }
                })
            })
            .collect();

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handles,
        }
    }

    pub fn aladin_base_url(&self) -> String {
        format!("{}/ttb/api", self.base_url)
    }

    pub fn openai_base_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    pub fn gemini_base_url(&self) -> String {
        format!("{}/v1beta", self.base_url)
    }

    pub fn cover_url(&self, n: usize) -> String {
        cover_url(&self.base_url, n)
    }

    pub fn hits(&self, route: Route) -> usize {
        self.hits.lock().unwrap().get(&route).copied().unwrap_or(0)
    }

    /// Environment pointing every external API at this stub.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("OPENAI_API_KEY", "test-openai-key".to_owned()),
            ("BESSELCHU_OPENAI_BASE_URL", self.openai_base_url()),
            ("BESSELCHU_OPENAI_MODEL", "gpt-4o".to_owned()),
            ("GEMINI_API_KEY", "test-gemini-key".to_owned()),
            ("BESSELCHU_GEMINI_BASE_URL", self.gemini_base_url()),
            ("BESSELCHU_IMAGE_MODEL", "gemini-stub-image".to_owned()),
            ("ALADIN_TTB_KEY", "test-ttb-key".to_owned()),
            ("BESSELCHU_ALADIN_BASE_URL", self.aladin_base_url()),
            ("BESSELCHU_HTTP_TIMEOUT_SECS", "10".to_owned()),
        ]
    }
}

impl Drop for ApiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn cover_url(base_url: &str, n: usize) -> String {
    format!("{base_url}/covers/{n}.jpg")
}

fn record(hits: &Mutex<HashMap<Route, usize>>, route: Route) {
    *hits.lock().unwrap().entry(route).or_insert(0) += 1;
}

fn json_response(status: u16, body: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

fn handle(
    mut request: tiny_http::Request,
    config: &ApiStubConfig,
    base_url: &str,
    hits: &Mutex<HashMap<Route, usize>>,
) {
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or_default().to_owned();
    let method = request.method().clone();

    if method == tiny_http::Method::Get && path == "/ttb/api/ItemList.aspx" {
        record(hits, Route::Aladin);
        let response = match config.aladin {
            AladinBehavior::Books => json_response(200, &aladin_books(base_url)),
            AladinBehavior::Empty => json_response(200, &serde_json::json!({ "item": [] })),
            AladinBehavior::ServerError => {
                json_response(500, &serde_json::json!({ "error": "boom" }))
            }
        };
        let _ = request.respond(response);
        return;
    }

    if method == tiny_http::Method::Get && path.starts_with("/covers/") {
        record(hits, Route::Cover);
        let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"image/jpeg"[..])
            .expect("build header");
        let _ = request.respond(
            tiny_http::Response::from_data(b"\xFF\xD8\xFFstub-cover".to_vec()).with_header(header),
        );
        return;
    }

    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        let _ = request.respond(
            tiny_http::Response::from_string("invalid request body").with_status_code(400),
        );
        return;
    }
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    if method == tiny_http::Method::Post && path == "/v1/responses" {
        record(hits, Route::Responses);
        let response = match config.text {
            TextBehavior::ServerError => json_response(
                500,
                &serde_json::json!({ "error": { "message": "stub text failure" } }),
            ),
            TextBehavior::InvalidJson => {
                json_response(200, &responses_body(&parsed, "this is not json"))
            }
            TextBehavior::Valid => {
                let input = parsed.get("input").and_then(Value::as_str).unwrap_or("");
                let text = if input.contains("\"scenes\"") {
                    reels_json()
                } else {
                    post_json()
                };
                json_response(200, &responses_body(&parsed, &text))
            }
        };
        let _ = request.respond(response);
        return;
    }

    if method == tiny_http::Method::Post
        && path.starts_with("/v1beta/models/")
        && path.ends_with(":generateContent")
    {
        record(hits, Route::Gemini);
        let parts = parsed
            .pointer("/contents/0/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if parts.iter().any(|part| part.get("inlineData").is_some()) {
            record(hits, Route::GeminiWithReference);
        }
        let prompt = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        if !config.image_delay.is_zero() {
            thread::sleep(config.image_delay);
        }

        let fails = config
            .failing_image_marker
            .as_deref()
            .is_some_and(|marker| prompt.contains(marker));
        let response = if fails {
            json_response(
                500,
                &serde_json::json!({ "error": { "message": "stub image failure" } }),
            )
        } else {
            json_response(
                200,
                &serde_json::json!({
                    "candidates": [{
                        "content": {
                            "parts": [
                                { "inlineData": { "mimeType": "image/png", "data": STUB_IMAGE_BASE64 } }
                            ]
                        }
                    }]
                }),
            )
        };
        let _ = request.respond(response);
        return;
    }

    let _ = request.respond(tiny_http::Response::from_string("not found").with_status_code(404));
}

fn aladin_books(base_url: &str) -> Value {
    let items = (1..=12)
        .map(|n| {
            // Item 3 has no description so the rank placeholder kicks in.
            let description = if n == 3 {
                String::new()
            } else {
                format!("Description {n}")
            };
            serde_json::json!({
                "title": format!("Stub Book {n}"),
                "author": format!("Author {n}"),
                "description": description,
                "isbn13": format!("97889{n:08}"),
                "cover": cover_url(base_url, n),
                "categoryName": "국내도서>소설/시/희곡>한국소설",
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({
        "version": "20131101",
        "title": "알라딘 베스트셀러",
        "item": items,
    })
}

fn responses_body(request: &Value, output_text: &str) -> Value {
    serde_json::json!({
        "id": "resp_stub",
        "object": "response",
        "model": request.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
        "output": [
            {
                "type": "message",
                "role": "assistant",
                "content": [
                    { "type": "output_text", "text": output_text }
                ]
            }
        ],
        "output_text": output_text
    })
}

fn post_json() -> String {
    serde_json::json!({
        "caption": "이번 주 베스트셀러를 소개합니다.",
        "hashtags": "#책추천 #베스트셀러",
        "imagePrompt": "A book on a wooden desk with soft light",
    })
    .to_string()
}

fn reels_json() -> String {
    let scenes = (1..=4)
        .map(|n| {
            serde_json::json!({
                "sceneNumber": n,
                "timeRange": format!("{}-{}s", (n - 1) * 5, n * 5),
                "visualDescription": format!("Visual {n}"),
                "audioScript": format!("Audio {n}"),
                "imagePrompt": format!("Scene {n} prompt"),
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({ "scenes": scenes }).to_string()
}
