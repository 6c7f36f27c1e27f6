//! Dry-run console front end for the gateway.
//!
//! Reads `identity query` lines from stdin and drives the full pipeline
//! (quota admission, content fetch, segmentation, paced delivery) with a
//! transport that prints segments instead of calling a provider. Queries:
//!
//!   <identity> subscribe            raise the sender to the subscriber tier
//!   <identity> unsubscribe          drop back to the default tier
//!   <identity> weather [location]   wttr.in current conditions
//!   <identity> <http(s) url>        page converted to Markdown

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use tgw_core::{
    config::Config,
    domain::{self, Identity, SubscriptionStatus},
    gateway::{Gateway, Outcome},
    quota::{self, store::FileQuotaStore, QuotaTracker},
    transport::{PacedSender, PacingConfig, TransportCapabilities, TransportSender},
    Result,
};
use tgw_fetch::{MarkdownFetcher, WeatherFetcher};

/// Prints framed segments to stdout, one line per outbound message.
struct ConsoleSender {
    caps: TransportCapabilities,
}

#[async_trait]
impl TransportSender for ConsoleSender {
    fn capabilities(&self) -> TransportCapabilities {
        self.caps
    }

    async fn send(&self, identity: &Identity, messages: &[String]) -> Result<()> {
        for msg in messages {
            println!("-> {identity}: {msg}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tgw_core::logging::init("tgw")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(FileQuotaStore::new(cfg.quota_store_path.clone()));
    let tracker = Arc::new(QuotaTracker::with_default_limit(
        store,
        cfg.default_hourly_limit,
    ));

    let console = Arc::new(ConsoleSender {
        caps: TransportCapabilities {
            max_message_len: cfg.sms_segment_limit,
            encode: true,
        },
    });
    let sender = Arc::new(PacedSender::new(
        console,
        PacingConfig {
            global_min_interval: cfg.global_send_interval,
            per_identity_min_interval: cfg.per_identity_send_interval,
        },
    ));

    let gateway = Gateway::new(cfg.clone(), tracker.clone(), sender);

    let markdown = MarkdownFetcher::new(cfg.markdown_base_url.clone(), cfg.fetch_timeout);
    let weather = WeatherFetcher::new(cfg.weather_base_url.clone(), cfg.fetch_timeout);

    let cancel = CancellationToken::new();
    let purge = tokio::spawn(quota::retention_loop(
        tracker,
        cfg.purge_interval,
        cfg.attempt_retention,
        cancel.clone(),
    ));

    println!("[tgw] ready, reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((identity, query)) = line.split_once(char::is_whitespace) else {
            eprintln!("[tgw] expected `identity query`, got {line:?}");
            continue;
        };
        let identity = Identity::new(identity);
        let query = query.trim();

        let outcome = match query {
            "subscribe" => {
                gateway
                    .apply_subscription(&identity, SubscriptionStatus::Active)
                    .await?;
                continue;
            }
            "unsubscribe" => {
                gateway
                    .apply_subscription(&identity, SubscriptionStatus::Cancelled)
                    .await?;
                continue;
            }
            q if q == "weather" || q.starts_with("weather ") => {
                let location = q.strip_prefix("weather").unwrap_or_default().trim();
                gateway.handle_request(&identity, &weather, location).await
            }
            q if domain::is_url(q) => gateway.handle_request(&identity, &markdown, q).await,
            q => {
                eprintln!("[tgw] unsupported query {q:?} (try a URL or `weather <loc>`)");
                continue;
            }
        };

        match outcome {
            Ok(Outcome::Delivered { segments }) => {
                println!("[tgw] delivered {segments} segment(s) to {identity}")
            }
            Ok(Outcome::RateLimited) => println!("[tgw] {identity} is over quota"),
            Ok(Outcome::FetchFailed { reason }) => {
                eprintln!("[tgw] fetch failed for {identity}: {reason}")
            }
            Ok(Outcome::SendFailed { reason }) => {
                eprintln!("[tgw] delivery failed for {identity}: {reason}")
            }
            Err(e) => eprintln!("[tgw] request from {identity} aborted: {e}"),
        }
    }

    cancel.cancel();
    let _ = purge.await;
    Ok(())
}
