use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the gateway.
#[derive(Clone, Debug)]
pub struct Config {
    // Quota
    pub quota_store_path: PathBuf,
    pub default_hourly_limit: u32,
    pub subscriber_hourly_limit: u32,
    pub attempt_retention: Duration,
    pub purge_interval: Duration,
    pub rate_limit_notice: String,

    // Segmentation
    pub sms_segment_limit: usize,
    pub long_segment_limit: usize,

    // Content endpoints
    pub markdown_base_url: String,
    pub weather_base_url: String,
    pub fetch_timeout: Duration,

    // Delivery pacing
    pub global_send_interval: Duration,
    pub per_identity_send_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let quota_store_path =
            env_path("QUOTA_STORE_PATH").unwrap_or_else(|| PathBuf::from("tgw-quota.json"));

        let default_hourly_limit = env_u32("DEFAULT_HOURLY_LIMIT")
            .unwrap_or(crate::quota::DEFAULT_HOURLY_LIMIT);
        let subscriber_hourly_limit = env_u32("SUBSCRIBER_HOURLY_LIMIT")
            .unwrap_or(crate::quota::SUBSCRIBER_HOURLY_LIMIT);
        if default_hourly_limit == 0 || subscriber_hourly_limit == 0 {
            return Err(Error::Config(
                "hourly limits must be greater than zero".to_string(),
            ));
        }

        let attempt_retention =
            Duration::from_secs(env_u64("ATTEMPT_RETENTION_SECS").unwrap_or(24 * 3600));
        let purge_interval = Duration::from_secs(env_u64("PURGE_INTERVAL_SECS").unwrap_or(600));

        let rate_limit_notice = env_str("RATE_LIMIT_NOTICE").unwrap_or_else(|| {
            "!: You have reached your hourly message limit. \
             Please try again later or subscribe to raise it."
                .to_string()
        });

        let sms_segment_limit = env_usize("SMS_SEGMENT_LIMIT").unwrap_or(500);
        let long_segment_limit = env_usize("LONG_SEGMENT_LIMIT").unwrap_or(4000);
        if sms_segment_limit == 0 || long_segment_limit == 0 {
            return Err(Error::Config(
                "segment limits must be greater than zero".to_string(),
            ));
        }

        let markdown_base_url = env_str("MARKDOWN_BASE_URL")
            .unwrap_or_else(|| "https://urltomarkdown.herokuapp.com".to_string());
        let weather_base_url =
            env_str("WEATHER_BASE_URL").unwrap_or_else(|| "https://wttr.in".to_string());
        let fetch_timeout = Duration::from_millis(env_u64("FETCH_TIMEOUT_MS").unwrap_or(10_000));

        let global_send_interval =
            Duration::from_millis(env_u64("GLOBAL_SEND_INTERVAL_MS").unwrap_or(40));
        let per_identity_send_interval =
            Duration::from_millis(env_u64("PER_IDENTITY_SEND_INTERVAL_MS").unwrap_or(100));

        Ok(Self {
            quota_store_path,
            default_hourly_limit,
            subscriber_hourly_limit,
            attempt_retention,
            purge_interval,
            rate_limit_notice,
            sms_segment_limit,
            long_segment_limit,
            markdown_base_url,
            weather_base_url,
            fetch_timeout,
            global_send_interval,
            per_identity_send_interval,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}
