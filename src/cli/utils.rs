use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print `key: value` lines for the scalar fields of a JSON object
pub fn print_fields(value: &Value, fields: &[&str]) {
    for field in fields {
        if let Some(v) = value.get(*field) {
            match v {
                Value::String(s) => println!("  {}: {}", field, s),
                Value::Null => {}
                other => println!("  {}: {}", field, other),
            }
        }
    }
}

/// Failure reported by the provisioner's error envelope
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}, HTTP {})", self.message, code, self.status.as_u16()),
            None => write!(f, "{} (HTTP {})", self.message, self.status.as_u16()),
        }
    }
}

impl std::error::Error for ApiFailure {}

/// Thin client over the provisioner API; unwraps the `{success, data}` envelope.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;
        let status = response.status();
        let text = response.text().await?;
        let envelope: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("unexpected response from {}: {}", url, text))?
        };

        if status.is_success() {
            return Ok(envelope.get("data").cloned().unwrap_or(Value::Null));
        }

        Err(anyhow!(ApiFailure {
            status,
            message: envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
            code: envelope.get("code").and_then(Value::as_str).map(str::to_string),
        }))
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        self.request(Method::POST, path, body).await
    }

    pub async fn patch(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::PATCH, path, None).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let port = portpicker::pick_unused_port().unwrap();
        let client = ApiClient::new(&format!("http://127.0.0.1:{}", port)).unwrap();
        let err = client.get("/health").await.unwrap_err();
        assert!(err.to_string().contains("/health"));
    }

    #[test]
    fn failure_display_includes_code() {
        let failure = ApiFailure {
            status: StatusCode::CONFLICT,
            message: "Tenant already onboarded".into(),
            code: Some("CONFLICT".into()),
        };
        assert_eq!(failure.to_string(), "Tenant already onboarded (CONFLICT, HTTP 409)");
    }
}
