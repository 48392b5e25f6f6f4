use anyhow::{Context, anyhow};
use serde::Deserialize;

use crate::request::HttpRequest;
use crate::runtime::execute;

/// What the vendor publishes about its realtime SDK.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SdkManifest {
    #[serde(default)]
    pub version: Option<String>,
    pub gateway_url: url::Url,
}

pub fn parse_sdk_manifest(body: &[u8]) -> anyhow::Result<SdkManifest> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        gateway_url: Option<String>,
    }

    let raw: Raw = serde_json::from_slice(body).context("decode SDK manifest JSON")?;
    let gateway = raw
        .gateway_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("SDK manifest does not export gateway_url"))?;
    let gateway_url =
        url::Url::parse(&gateway).with_context(|| format!("invalid gateway_url: {gateway}"))?;

    match gateway_url.scheme() {
        "ws" | "wss" => {}
        other => return Err(anyhow!("gateway_url must be ws or wss, got {other}")),
    }

    Ok(SdkManifest {
        version: raw.version,
        gateway_url,
    })
}

pub async fn fetch_sdk_manifest(manifest_url: &str) -> anyhow::Result<SdkManifest> {
    let resp = execute(&HttpRequest::get(manifest_url)).await?;
    let body = resp.into_success_body("SDK manifest fetch")?;
    parse_sdk_manifest(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_gateway_and_version() {
        let m = parse_sdk_manifest(br#"{"version":"2.0.1","gateway_url":"wss://rt.example.com/v2"}"#)
            .unwrap();
        assert_eq!(m.version.as_deref(), Some("2.0.1"));
        assert_eq!(m.gateway_url.as_str(), "wss://rt.example.com/v2");
    }

    #[test]
    fn missing_or_bad_gateway_is_rejected() {
        assert!(parse_sdk_manifest(br#"{"version":"1"}"#).is_err());
        assert!(parse_sdk_manifest(br#"{"gateway_url":""}"#).is_err());
        assert!(parse_sdk_manifest(br#"{"gateway_url":"https://rt.example.com"}"#).is_err());
        assert!(parse_sdk_manifest(b"<html>").is_err());
    }

    #[tokio::test]
    async fn fetches_manifest_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/manifest.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"gateway_url":"ws://127.0.0.1:9/gw"}"#),
            )
            .mount(&server)
            .await;

        let m = fetch_sdk_manifest(&format!("{}/sdk/manifest.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(m.gateway_url.scheme(), "ws");
        assert!(m.version.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetch_sdk_manifest(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("status=404"));
    }
}
