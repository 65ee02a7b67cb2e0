use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::settings::Settings;

pub fn http_client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the raw HTML of a page. Non-2xx responses are errors.
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    info!("Fetching page: {}", url);
    let html = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {}", url))?
        .text()
        .await
        .context("Failed to read page body")?;
    info!("Fetched {} bytes", html.len());
    Ok(html)
}

/// Class name derived from the URL host: `https://www.shop.example.com/x` → `ShopExampleComPage`.
pub fn class_name_for(url: &str) -> String {
    let host = url
        .split("//")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .trim_start_matches("www.");

    let mut name: String = host
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();

    if name.is_empty() {
        return "GeneratedPage".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Site");
    }
    name.push_str("Page");
    name
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
