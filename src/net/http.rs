//! Minimal HTTP GET over the browser's `fetch`.
//!
//! Requests carry an `AbortSignal`; dropping the returned future before it
//! completes aborts the underlying browser request. Native builds have no
//! transport and fail with [`FetchError::Unavailable`].

use crate::error::FetchError;
use serde::de::DeserializeOwned;

/// Stateless browser HTTP client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClient;

impl HttpClient {
    pub fn new() -> Self {
        Self
    }

    /// Fetches `url` and decodes the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches `url` and returns the body as text.
    #[cfg(target_arch = "wasm32")]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;
        use web_sys::{AbortController, Request, RequestInit, RequestMode, Response};

        let window = web_sys::window()
            .ok_or_else(|| FetchError::Unavailable("No window".to_string()))?;

        let controller = AbortController::new().map_err(js_network)?;
        let mut guard = AbortOnDrop(Some(controller.clone()));

        let init = RequestInit::new();
        init.set_method("GET");
        init.set_mode(RequestMode::Cors);
        init.set_signal(Some(&controller.signal()));

        let request = Request::new_with_str_and_init(url, &init).map_err(js_network)?;
        request
            .headers()
            .set("Accept", "application/json")
            .map_err(js_network)?;

        log::debug!("GET {}", redact(url));
        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_network)?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| FetchError::Decode("fetch did not return a Response".to_string()))?;

        if !response.ok() {
            guard.disarm();
            return Err(FetchError::Status {
                status: response.status(),
                message: response.status_text(),
            });
        }

        let text = JsFuture::from(response.text().map_err(js_network)?)
            .await
            .map_err(js_network)?;
        guard.disarm();

        text.as_string()
            .ok_or_else(|| FetchError::Decode("Response body is not text".to_string()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        log::debug!("No HTTP transport for {}", redact(url));
        Err(FetchError::Unavailable(
            "HTTP requests are only available in the browser build".to_string(),
        ))
    }
}

/// Aborts the browser request unless disarmed after completion.
#[cfg(target_arch = "wasm32")]
struct AbortOnDrop(Option<web_sys::AbortController>);

#[cfg(target_arch = "wasm32")]
impl AbortOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.abort();
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn js_network(e: wasm_bindgen::JsValue) -> FetchError {
    // An aborted fetch rejects with a DOMException named "AbortError".
    let name = js_sys::Reflect::get(&e, &wasm_bindgen::JsValue::from_str("name"))
        .ok()
        .and_then(|v| v.as_string());
    if name.as_deref() == Some("AbortError") {
        return FetchError::Aborted;
    }
    FetchError::Network(format!("{:?}", e))
}

/// Strips the access token from a URL before it is logged.
pub fn redact(url: &str) -> String {
    match url.find("access_token=") {
        Some(start) => {
            let value_start = start + "access_token=".len();
            let end = url[value_start..]
                .find('&')
                .map_or(url.len(), |i| value_start + i);
            format!("{}***{}", &url[..value_start], &url[end..])
        }
        None => url.to_string(),
    }
}
