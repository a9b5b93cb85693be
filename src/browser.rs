//! Headless Chrome driver for sites that render listings with JavaScript.
//!
//! The CDP client is async; `BrowserFetcher` owns a small tokio runtime and
//! blocks on every call so site scrapers stay synchronous.

use crate::config::BrowserConfig;
use crate::rate_limiter;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::Rng;
use std::future::Future;
use std::ops::Range;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CRASH_MARKERS: [&str; 2] = ["tab crashed", "session deleted"];
const ERROR_TITLE_MARKERS: [&str; 5] = ["error", "404", "not found", "エラー", "見つかりません"];
const CAPTCHA_MARKERS: [&str; 4] = ["captcha", "recaptcha", "bot detection", "human verification"];
const POPUP_CLOSE_SELECTORS: [&str; 7] = [
    "[aria-label*='close']",
    "[title*='close']",
    ".modal-close",
    ".popup-close",
    ".close-button",
    "button[aria-label='Close']",
    ".btn-close",
];

const STABILITY_ARGS: [&str; 14] = [
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--memory-pressure-off",
    "--js-flags=--max-old-space-size=8192",
    "--disable-gpu-sandbox",
    "--no-first-run",
    "--disable-default-apps",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
    "--disable-crash-reporter",
    "--disable-extensions",
    "--lang=ja-JP",
];

const WEBDRIVER_SPOOF: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const RELAUNCH_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser is not launched")]
    NotLaunched,
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("browser crashed: {0}")]
    Crashed(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser driver error: {0}")]
    Driver(String),
    #[error("crash recovery failed: {0}")]
    RecoveryFailed(String),
}

impl BrowserError {
    /// Map a driver message to `Crashed` when it names a dead tab or session.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if CRASH_MARKERS.iter().any(|marker| lower.contains(marker)) {
            BrowserError::Crashed(message)
        } else {
            BrowserError::Driver(message)
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, BrowserError::Crashed(_))
    }
}

/// Detect a dead browser and bring it back.
pub trait CrashRecovery {
    fn is_crashed(&mut self) -> bool;

    fn recover(&mut self) -> Result<(), BrowserError>;

    fn max_crash_retries(&self) -> usize {
        2
    }

    /// Run `operation`, relaunching the browser first if it is dead and
    /// retrying after a crash up to `max_crash_retries` times. Any other
    /// error is returned as is.
    fn execute_with_recovery<T, F>(&mut self, mut operation: F) -> Result<T, BrowserError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, BrowserError>,
    {
        let max_retries = self.max_crash_retries();
        let mut attempt = 0;

        loop {
            if self.is_crashed() {
                self.recover()?;
            }

            match operation(self) {
                Err(BrowserError::Crashed(message)) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        "Tab crashed during execution (attempt {}/{}): {}",
                        attempt,
                        max_retries + 1,
                        message
                    );
                    self.recover()?;
                }
                result => return result,
            }
        }
    }
}

struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

pub struct BrowserFetcher {
    config: BrowserConfig,
    user_agent: String,
    runtime: Runtime,
    session: Option<Session>,
}

impl BrowserFetcher {
    pub fn new(config: BrowserConfig, user_agent: impl Into<String>) -> Result<Self, BrowserError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Self {
            config,
            user_agent: user_agent.into(),
            runtime,
            session: None,
        })
    }

    pub fn is_launched(&self) -> bool {
        self.session.is_some()
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.config.wait_timeout_secs)
    }

    fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.config.page_load_timeout_secs)
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.session
            .as_ref()
            .map(|session| &session.page)
            .ok_or(BrowserError::NotLaunched)
    }

    fn block_with_timeout<T, E, F>(&self, timeout: Duration, future: F) -> Result<T, BrowserError>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        self.runtime
            .block_on(tokio::time::timeout(timeout, future))
            .map_err(|_| BrowserError::Timeout(timeout))?
            .map_err(|e| BrowserError::classify(e.to_string()))
    }

    /// Start Chrome with the stability flags and open a blank tab.
    pub fn launch(&mut self) -> bool {
        match self.try_launch() {
            Ok(()) => {
                info!("Browser setup successful");
                true
            }
            Err(e) => {
                error!("Failed to set up browser: {}", e);
                info!("Make sure Chrome or Chromium is installed");
                false
            }
        }
    }

    fn try_launch(&mut self) -> Result<(), BrowserError> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(self.page_load_timeout());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(PathBuf::from(path));
        }
        for arg in STABILITY_ARGS {
            builder = builder.arg(arg);
        }
        let chrome_config = builder.build().map_err(BrowserError::Launch)?;

        info!("Launching browser (headless={})", self.config.headless);
        let user_agent = self.user_agent.clone();
        let session = self.runtime.block_on(async move {
            let (browser, mut handler) = Browser::launch(chrome_config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            page.execute(SetUserAgentOverrideParams::new(user_agent))
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(WEBDRIVER_SPOOF))
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            Ok::<_, BrowserError>(Session {
                browser,
                page,
                handler,
            })
        })?;

        self.session = Some(session);
        Ok(())
    }

    /// Close the browser. Safe to call when nothing is running.
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            self.runtime.block_on(async {
                if let Err(e) = session.browser.close().await {
                    warn!("Error closing browser: {}", e);
                }
                let _ = session.browser.wait().await;
            });
            session.handler.abort();
            info!("Browser closed");
        }
    }

    /// Navigate and wait a human-like moment. False on failure, timeout or an
    /// error-looking page title.
    pub fn goto(&mut self, url: &str) -> bool {
        match self.try_goto(url) {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    pub fn try_goto(&mut self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        let page = self.page()?;
        self.block_with_timeout(self.page_load_timeout(), async {
            page.goto(url).await.map(|_| ())
        })
        .map_err(|e| match e {
            BrowserError::Driver(reason) => BrowserError::Navigation {
                url: url.to_string(),
                reason,
            },
            other => other,
        })?;

        self.simulate_human_delay(1.0..3.0);

        let title = self
            .block_with_timeout(PROBE_TIMEOUT, page.get_title())?
            .unwrap_or_default();
        let lower = title.to_lowercase();
        if ERROR_TITLE_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("page title suggests an error: {}", title),
            });
        }
        Ok(())
    }

    pub fn current_url(&self) -> Option<String> {
        let page = self.page().ok()?;
        self.block_with_timeout(PROBE_TIMEOUT, page.url()).ok().flatten()
    }

    pub fn page_source(&self) -> Result<String, BrowserError> {
        let page = self.page()?;
        self.block_with_timeout(self.wait_timeout(), page.content())
    }

    /// Let dynamic content settle, scroll to trigger lazy loading, then read the page.
    pub fn page_source_after_js(&self, settle: Range<f64>) -> Result<String, BrowserError> {
        self.simulate_human_delay(settle);
        self.simulate_scrolling();
        self.page_source()
    }

    pub fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let page = self.page()?;
        let result = self.block_with_timeout(self.wait_timeout(), page.evaluate(script.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::Driver(e.to_string()))
    }

    /// Poll for the first element matching `selector`. `None` on timeout.
    pub fn wait_for_element(&self, selector: &str, timeout: Option<Duration>) -> Option<Element> {
        let page = self.page().ok()?;
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.wait_timeout());
        self.runtime.block_on(async {
            loop {
                match page.find_element(selector).await {
                    Ok(element) => return Some(element),
                    Err(_) if Instant::now() < deadline => tokio::time::sleep(POLL_INTERVAL).await,
                    Err(e) => {
                        debug!("Element not found: {} ({})", selector, e);
                        return None;
                    }
                }
            }
        })
    }

    /// Poll until at least one element matches `selector`. Empty on timeout.
    pub fn wait_for_elements(&self, selector: &str, timeout: Option<Duration>) -> Vec<Element> {
        let Ok(page) = self.page() else {
            return Vec::new();
        };
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.wait_timeout());
        self.runtime.block_on(async {
            loop {
                match page.find_elements(selector).await {
                    Ok(elements) if !elements.is_empty() => return elements,
                    _ if Instant::now() < deadline => tokio::time::sleep(POLL_INTERVAL).await,
                    _ => {
                        debug!("Elements not found: {}", selector);
                        return Vec::new();
                    }
                }
            }
        })
    }

    pub fn element_text(&self, element: &Element) -> String {
        self.runtime
            .block_on(element.inner_text())
            .ok()
            .flatten()
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    /// Native click with a scripted click as fallback.
    pub fn safe_click(&self, element: &Element) -> bool {
        let native = self.runtime.block_on(async {
            element.scroll_into_view().await?;
            element.click().await.map(|_| ())
        });
        self.simulate_human_delay(0.5..1.0);

        match native {
            Ok(()) => true,
            Err(e) => {
                debug!("Click failed: {}", e);
                let scripted = self
                    .runtime
                    .block_on(element.call_js_fn("function() { this.click(); }", false));
                match scripted {
                    Ok(_) => {
                        self.simulate_human_delay(1.0..3.0);
                        true
                    }
                    Err(e) => {
                        warn!("Both click methods failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Type into a field, falling back to setting its value from script.
    pub fn safe_send_keys(&self, element: &Element, text: &str) -> bool {
        let typed = self.runtime.block_on(async {
            element.click().await?;
            element.type_str(text).await.map(|_| ())
        });

        match typed {
            Ok(()) => true,
            Err(e) => {
                debug!("Typing failed: {}", e);
                let value = match serde_json::to_string(text) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Send keys failed: {}", e);
                        return false;
                    }
                };
                let script = format!(
                    "function() {{ this.value = {}; this.dispatchEvent(new Event('input', {{ bubbles: true }})); }}",
                    value
                );
                match self.runtime.block_on(element.call_js_fn(script, false)) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Send keys failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Choose the first `<option>` whose text contains `option_text`.
    pub fn select_option_containing(&self, select_selector: &str, option_text: &str) -> bool {
        let (Ok(selector), Ok(text)) = (
            serde_json::to_string(select_selector),
            serde_json::to_string(option_text),
        ) else {
            return false;
        };
        let script = format!(
            r#"(() => {{
                const select = document.querySelector({selector});
                if (!select) return false;
                const option = Array.from(select.options).find(o => o.text.includes({text}));
                if (!option) return false;
                select.value = option.value;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#
        );
        match self.evaluate::<bool>(&script) {
            Ok(selected) => selected,
            Err(e) => {
                debug!("Selecting option {} failed: {}", option_text, e);
                false
            }
        }
    }

    pub fn simulate_human_delay(&self, range: Range<f64>) {
        let secs = if range.is_empty() {
            range.start.max(0.0)
        } else {
            rand::thread_rng().gen_range(range)
        };
        thread::sleep(rate_limiter::capped_secs(secs));
    }

    pub fn simulate_scrolling(&self) {
        let (down, scroll_up) = {
            let mut rng = rand::thread_rng();
            let up = rng.gen_bool(0.3).then(|| rng.gen_range(100..300));
            (rng.gen_range(300..800), up)
        };

        if let Err(e) = self.evaluate::<serde_json::Value>(&format!("window.scrollBy(0, {});", down)) {
            debug!("Scrolling simulation failed: {}", e);
            return;
        }
        self.simulate_human_delay(0.5..1.5);

        if let Some(up) = scroll_up {
            let _ = self.evaluate::<serde_json::Value>(&format!("window.scrollBy(0, -{});", up));
            self.simulate_human_delay(0.5..1.0);
        }
    }

    pub fn check_for_captcha(&self) -> bool {
        match self.page_source() {
            Ok(html) => {
                let lower = html.to_lowercase();
                CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker))
            }
            Err(_) => false,
        }
    }

    pub fn handle_popup_if_present(&self) {
        for selector in POPUP_CLOSE_SELECTORS {
            if let Some(button) = self.wait_for_element(selector, Some(Duration::ZERO)) {
                if self.safe_click(&button) {
                    info!("Closed popup");
                    return;
                }
            }
        }
    }
}

impl CrashRecovery for BrowserFetcher {
    fn is_crashed(&mut self) -> bool {
        let Ok(page) = self.page() else {
            return true;
        };
        match self.block_with_timeout(PROBE_TIMEOUT, page.url()) {
            Err(BrowserError::Crashed(message)) => {
                warn!("Browser crash detected: {}", message);
                true
            }
            _ => false,
        }
    }

    fn recover(&mut self) -> Result<(), BrowserError> {
        info!("Attempting to recover from browser crash");
        self.teardown();
        thread::sleep(RELAUNCH_PAUSE);
        self.try_launch()
            .map_err(|e| BrowserError::RecoveryFailed(e.to_string()))?;
        info!("Browser recovery successful");
        Ok(())
    }

    fn max_crash_retries(&self) -> usize {
        self.config.max_crash_retries
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBrowser {
        crashed_checks: usize,
        recoveries: usize,
        recover_fails: bool,
    }

    impl StubBrowser {
        fn crashed_once() -> Self {
            Self {
                crashed_checks: 1,
                recoveries: 0,
                recover_fails: false,
            }
        }
    }

    impl CrashRecovery for StubBrowser {
        fn is_crashed(&mut self) -> bool {
            if self.crashed_checks > 0 {
                self.crashed_checks -= 1;
                true
            } else {
                false
            }
        }

        fn recover(&mut self) -> Result<(), BrowserError> {
            self.recoveries += 1;
            if self.recover_fails {
                Err(BrowserError::RecoveryFailed("relaunch failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn classify_crash_messages() {
        assert!(BrowserError::classify("unknown error: Tab Crashed").is_crash());
        assert!(BrowserError::classify("invalid session id: session deleted because of page crash").is_crash());
        assert!(!BrowserError::classify("no such element").is_crash());
    }

    #[test]
    fn recovers_once_before_running_operation() {
        let mut stub = StubBrowser::crashed_once();
        let mut calls = 0;
        let result = stub.execute_with_recovery(|browser| {
            calls += 1;
            assert_eq!(browser.recoveries, 1);
            Ok::<_, BrowserError>("done")
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(stub.recoveries, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn crash_during_operation_is_retried() {
        let mut stub = StubBrowser {
            crashed_checks: 0,
            recoveries: 0,
            recover_fails: false,
        };
        let mut calls = 0;
        let result = stub.execute_with_recovery(|_| {
            calls += 1;
            if calls == 1 {
                Err(BrowserError::Crashed("tab crashed".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(stub.recoveries, 1);
    }

    #[test]
    fn crash_retries_are_bounded() {
        let mut stub = StubBrowser {
            crashed_checks: 0,
            recoveries: 0,
            recover_fails: false,
        };
        let mut calls = 0;
        let result: Result<(), _> = stub.execute_with_recovery(|_| {
            calls += 1;
            Err(BrowserError::Crashed("tab crashed".to_string()))
        });
        assert!(matches!(result, Err(BrowserError::Crashed(_))));
        assert_eq!(calls, 3);
        assert_eq!(stub.recoveries, 2);
    }

    #[test]
    fn other_errors_propagate_without_recovery() {
        let mut stub = StubBrowser {
            crashed_checks: 0,
            recoveries: 0,
            recover_fails: false,
        };
        let result: Result<(), _> =
            stub.execute_with_recovery(|_| Err(BrowserError::Driver("no such element".to_string())));
        assert!(matches!(result, Err(BrowserError::Driver(_))));
        assert_eq!(stub.recoveries, 0);
    }

    #[test]
    fn failed_recovery_propagates() {
        let mut stub = StubBrowser {
            crashed_checks: 1,
            recoveries: 0,
            recover_fails: true,
        };
        let result = stub.execute_with_recovery(|_| Ok::<_, BrowserError>(()));
        assert!(matches!(result, Err(BrowserError::RecoveryFailed(_))));
    }

    #[test]
    fn unlaunched_fetcher_reports_crashed() {
        let mut fetcher = BrowserFetcher::new(BrowserConfig::default(), "test-agent").unwrap();
        assert!(!fetcher.is_launched());
        assert!(fetcher.is_crashed());
        assert!(fetcher.page_source().is_err());
        assert!(fetcher.wait_for_elements(".x", Some(Duration::ZERO)).is_empty());
        assert!(fetcher.wait_for_element(".x", Some(Duration::ZERO)).is_none());
        assert!(fetcher.page_source_after_js(0.0..0.0).is_err());
    }
}
