use crate::config::HttpConfig;
use crate::rate_limiter::RateLimiter;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION};
use reqwest::{StatusCode, Url};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.3"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

/// Rate-limited HTTP GET with browser-like headers and a cookie jar.
pub struct HttpFetcher {
    client: Client,
    rate_limiter: RateLimiter,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig, rate_limiter: RateLimiter) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(http.user_agent.clone())
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Fetch and parse a page, reporting why it failed.
    pub fn try_fetch(&mut self, url: &str) -> Result<Html, FetchError> {
        self.rate_limiter.wait_if_needed();
        info!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        Self::into_document(url, response)
    }

    /// Fetch and parse a page. Failures are logged and yield `None`.
    pub fn fetch_document(&mut self, url: &str) -> Option<Html> {
        match self.try_fetch(url) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }

    /// Submit a form the way a browser would. Failures yield `None`.
    pub fn submit_form(&mut self, form: &FormSubmission) -> Option<Html> {
        self.rate_limiter.wait_if_needed();
        info!("Submitting {:?} form to {}", form.method, form.action);

        let request = match form.method {
            FormMethod::Get => self.client.get(&form.action).query(&form.fields),
            FormMethod::Post => self.client.post(&form.action).form(&form.fields),
        };
        let result = request
            .send()
            .map_err(|source| FetchError::Request {
                url: form.action.clone(),
                source,
            })
            .and_then(|response| Self::into_document(&form.action, response));

        match result {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Form submission to {} failed: {}", form.action, e);
                None
            }
        }
    }

    fn into_document(url: &str, response: reqwest::blocking::Response) -> Result<Html, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        debug!("Received {} bytes from {}", body.len(), url);
        Ok(Html::parse_document(&body))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A filled-in HTML form ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub action: String,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

static FORM_INPUTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input[name]").unwrap());
static FORM_SELECTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select[name]").unwrap());
static FORM_OPTIONS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

const SEARCH_FIELD_HINTS: [&str; 3] = ["area", "location", "keyword"];
const SKIPPED_INPUT_TYPES: [&str; 6] = ["submit", "button", "image", "reset", "checkbox", "radio"];

impl FormSubmission {
    /// Fill a `<form>`: area, location and keyword fields get `keyword`, other
    /// inputs keep their value, selects take their first non-empty option.
    pub fn from_element(form: ElementRef<'_>, page_url: &Url, keyword: &str) -> Self {
        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| page_url.join(a).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| page_url.to_string());
        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };

        let mut fields = Vec::new();
        for input in form.select(&FORM_INPUTS) {
            let Some(name) = input.value().attr("name") else { continue };
            let kind = input.value().attr("type").unwrap_or("text").to_lowercase();
            if SKIPPED_INPUT_TYPES.contains(&kind.as_str()) {
                continue;
            }
            let value = input.value().attr("value").unwrap_or("");
            let lower = name.to_lowercase();
            let is_search_field =
                kind != "hidden" && SEARCH_FIELD_HINTS.iter().any(|hint| lower.contains(hint));
            let value = if is_search_field { keyword } else { value };
            fields.push((name.to_string(), value.to_string()));
        }

        for select in form.select(&FORM_SELECTS) {
            let Some(name) = select.value().attr("name") else { continue };
            let first_value = select
                .select(&FORM_OPTIONS)
                .filter_map(|option| option.value().attr("value"))
                .find(|value| !value.trim().is_empty());
            if let Some(value) = first_value {
                fields.push((name.to_string(), value.to_string()));
            }
        }

        Self {
            action,
            method,
            fields,
        }
    }
}
