//! HTTP content fetcher adapters.
//!
//! Thin clients over two public endpoints: a URL-to-Markdown conversion
//! proxy and the wttr.in weather service. Bodies are returned verbatim;
//! the gateway segments them for whatever transport is attached.

use std::time::Duration;

use async_trait::async_trait;
use tgw_core::errors::Error;
use tgw_core::ports::ContentFetcher;
use tgw_core::Result;

/// wttr.in one-shot format: location, condition + temperature, wind and
/// humidity with moon phase, sunrise, sunset.
const WTTR_FORMAT: &str = "%l:\n%c%t\n%w %h - %m\nsr %S\nss %s\n";

fn fetch_err(e: impl std::fmt::Display) -> Error {
    Error::Fetch(e.to_string())
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("reqwest client build")
}

async fn read_ok_body(resp: reqwest::Response) -> Result<String> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Fetch(format!(
            "upstream returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )));
    }
    resp.text().await.map_err(fetch_err)
}

/// Converts a web page into readable Markdown via a conversion proxy.
#[derive(Clone, Debug)]
pub struct MarkdownFetcher {
    base_url: String,
    http: reqwest::Client,
}

impl MarkdownFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http: http_client(timeout),
        }
    }
}

#[async_trait]
impl ContentFetcher for MarkdownFetcher {
    fn name(&self) -> &str {
        "markdown"
    }

    /// `query` is the page URL to convert.
    async fn fetch(&self, query: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[("clean", "true"), ("url", query)])
            .send()
            .await
            .map_err(fetch_err)?;
        read_ok_body(resp).await
    }
}

/// Compact current-conditions report from wttr.in.
#[derive(Clone, Debug)]
pub struct WeatherFetcher {
    base_url: String,
    http: reqwest::Client,
}

impl WeatherFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http: http_client(timeout),
        }
    }
}

#[async_trait]
impl ContentFetcher for WeatherFetcher {
    fn name(&self) -> &str {
        "weather"
    }

    /// `query` is the location; empty means "detect from the caller IP",
    /// which wttr.in supports on the bare path.
    async fn fetch(&self, query: &str) -> Result<String> {
        let location = query.trim();
        let resp = self
            .http
            .get(format!("{}/{location}", self.base_url))
            .query(&[("format", WTTR_FORMAT)])
            .send()
            .await
            .map_err(fetch_err)?;
        read_ok_body(resp).await
    }
}
