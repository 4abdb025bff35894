use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::BrowserConfig;
use crate::error::Error;

/// What the fetch stage needs from a browser. Each call reports failure
/// as `false` after logging it; nothing is propagated to the caller.
pub trait Browser {
    fn load(&mut self, url: &str) -> bool;
    fn scroll_to_end(&mut self) -> bool;
    fn click_by_locator(&mut self, xpath: &str) -> bool;
}

/// Window-level control of a started browser session.
pub trait Window: Sized {
    fn maximize(&mut self) -> Result<(), Error>;
    fn quit(self);
}

/// Apply the configured window settings to a freshly started session.
/// On failure the session is quit before the error is returned.
pub fn prepare_window<W: Window>(mut session: W, config: &BrowserConfig) -> Result<W, Error> {
    if config.maximize_window {
        if let Err(e) = session.maximize() {
            error!("Error while maximizing browser window: {}", e);
            session.quit();
            return Err(e);
        }
    }
    Ok(session)
}

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebDriverFailure {
    Navigation(String),
    Script(String),
    ElementNotFound(String),
    NotClickable(String),
    Transport(String),
    Other { code: String, message: String },
}

impl fmt::Display for WebDriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebDriverFailure::Navigation(m) => write!(f, "navigation failed: {}", m),
            WebDriverFailure::Script(m) => write!(f, "script failed: {}", m),
            WebDriverFailure::ElementNotFound(m) => write!(f, "element not found: {}", m),
            WebDriverFailure::NotClickable(m) => write!(f, "element not clickable: {}", m),
            WebDriverFailure::Transport(m) => write!(f, "webdriver unreachable: {}", m),
            WebDriverFailure::Other { code, message } => write!(f, "{}: {}", code, message),
        }
    }
}

/// Map a W3C WebDriver error payload (`{"value": {"error", "message"}}`).
fn classify_error(body: &Value) -> WebDriverFailure {
    let value = &body["value"];
    let code = value["error"].as_str().unwrap_or("unknown error").to_string();
    let message = value["message"]
        .as_str()
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    match code.as_str() {
        "no such element" | "stale element reference" => WebDriverFailure::ElementNotFound(message),
        "element click intercepted" | "element not interactable" => {
            WebDriverFailure::NotClickable(message)
        }
        "javascript error" | "script timeout" => WebDriverFailure::Script(message),
        "timeout" | "insecure certificate" | "invalid argument" | "unknown error"
            if message.contains("net::") || code == "timeout" =>
        {
            WebDriverFailure::Navigation(message)
        }
        _ => WebDriverFailure::Other {
            code: code.clone(),
            message,
        },
    }
}

/// Chrome session driven over the W3C WebDriver HTTP protocol
/// (e.g. a running `chromedriver`). Lifecycle: `start`, use, `quit`.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: Option<String>,
}

impl WebDriverSession {
    /// Create a browser session that saves downloads into `download_dir`
    /// without prompting.
    pub fn start(config: &BrowserConfig, download_dir: &Path) -> Result<Self, Error> {
        let download_dir = download_dir.canonicalize()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Browser(e.to_string()))?;

        let mut args = vec!["--disable-popup-blocking".to_string()];
        if config.headless {
            args.push("--headless=new".to_string());
        }

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir.to_string_lossy(),
                            "download.prompt_for_download": false,
                            "profile.default_content_settings.popups": 0,
                            "directory_upgrade": true,
                            "plugins.always_open_pdf_externally": true
                        }
                    }
                }
            }
        });

        let mut session = Self {
            client,
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
            session_id: None,
        };

        info!("Starting browser session via {}", session.base_url);
        let value = session
            .request("POST", "/session", Some(capabilities))
            .map_err(|e| Error::Browser(format!("could not create session: {}", e)))?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| Error::Browser("session response had no sessionId".to_string()))?
            .to_string();
        debug!("WebDriver session id {}", session_id);
        session.session_id = Some(session_id);

        session
            .session_request(
                "POST",
                "/timeouts",
                Some(json!({ "implicit": config.implicit_wait_secs * 1000 })),
            )
            .map_err(|e| Error::Browser(format!("could not set implicit wait: {}", e)))?;

        info!("Browser session started");
        Ok(session)
    }

    fn end_session(&mut self) {
        if self.session_id.is_none() {
            return;
        }
        info!("Quitting browser session");
        match self.session_request("DELETE", "", None) {
            Ok(_) => info!("Browser session closed"),
            Err(e) => error!("Error while quitting browser session: {}", e),
        }
        self.session_id = None;
    }

    fn session_request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverFailure> {
        let session_id = self
            .session_id
            .as_deref()
            .ok_or_else(|| WebDriverFailure::Transport("no active session".to_string()))?;
        self.request(method, &format!("/session/{}{}", session_id, path), body)
    }

    fn request(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value, WebDriverFailure> {
        let url = format!("{}{}", self.base_url, path);
        let builder = match method {
            "POST" => self.client.post(&url).json(&body.unwrap_or_else(|| json!({}))),
            "DELETE" => self.client.delete(&url),
            _ => self.client.get(&url),
        };

        let response = builder
            .send()
            .map_err(|e| WebDriverFailure::Transport(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|e| WebDriverFailure::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(payload["value"].clone())
        } else {
            Err(classify_error(&payload))
        }
    }
}

impl Window for WebDriverSession {
    fn maximize(&mut self) -> Result<(), Error> {
        info!("Maximizing browser window");
        self.session_request("POST", "/window/maximize", Some(json!({})))
            .map(|_| ())
            .map_err(|e| Error::Browser(format!("could not maximize window: {}", e)))
    }

    fn quit(mut self) {
        self.end_session();
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        self.end_session();
    }
}

impl Browser for WebDriverSession {
    fn load(&mut self, url: &str) -> bool {
        info!("Loading URL: {}", url);
        match self.session_request("POST", "/url", Some(json!({ "url": url }))) {
            Ok(_) => {
                debug!("URL {} loaded", url);
                true
            }
            Err(e) => {
                error!("Error while loading URL {}: {}", url, e);
                false
            }
        }
    }

    fn scroll_to_end(&mut self) -> bool {
        let body = json!({ "script": SCROLL_SCRIPT, "args": [] });
        match self.session_request("POST", "/execute/sync", Some(body)) {
            Ok(_) => {
                debug!("Scrolled to end of page");
                true
            }
            Err(e) => {
                error!("Error while scrolling to end of page: {}", e);
                false
            }
        }
    }

    fn click_by_locator(&mut self, xpath: &str) -> bool {
        let body = json!({ "using": "xpath", "value": xpath });
        let element = match self.session_request("POST", "/element", Some(body)) {
            Ok(value) => value,
            Err(e) => {
                error!("Element not found with XPath {}: {}", xpath, e);
                return false;
            }
        };
        let element_id = match element[ELEMENT_KEY].as_str() {
            Some(id) => id.to_string(),
            None => {
                warn!("WebDriver returned no element reference for {}", xpath);
                return false;
            }
        };

        match self.session_request("POST", &format!("/element/{}/click", element_id), Some(json!({}))) {
            Ok(_) => {
                info!("Clicked element with XPath {}", xpath);
                true
            }
            Err(e @ WebDriverFailure::NotClickable(_)) => {
                error!("Element with XPath {} could not be clicked: {}", xpath, e);
                false
            }
            Err(e) => {
                error!("Unexpected error clicking element with XPath {}: {}", xpath, e);
                false
            }
        }
    }
}
