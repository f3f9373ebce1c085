//! Twitter/X announcement poster.
//!
//! Signs requests with OAuth 1.0a user context (HMAC-SHA1): media still
//! uploads through the v1.1 endpoint, the status itself goes to the v2
//! JSON endpoint. Status text is clipped to the platform limit. Missing
//! credentials disable the poster without failing the run.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use super::{Announcement, StatusPoster};

const MEDIA_ENDPOINT: &str = "https://upload.twitter.com/1.1/media/upload.json";
const TWEETS_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

/// Platform status limit in characters.
const MAX_STATUS_CHARS: usize = 280;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved chars survive; everything else becomes %XX.
/// OAuth 1.0a requires exactly this set, stricter than form encoding.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
    access_token: String,
    access_secret: String,
}

/// Clip to `max_chars` on a char boundary, marking the cut with an ellipsis.
fn clip_status(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// `METHOD&url&sorted-params`, every piece percent-encoded per RFC 5849.
fn signature_base(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut enc: Vec<(String, String)> =
        params.iter().map(|(k, v)| (percent(k), percent(v))).collect();
    enc.sort();
    let param_string = enc
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent(url),
        percent(&param_string)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", percent(consumer_secret), percent(token_secret));
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("hmac accepts any key length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Build the `Authorization: OAuth ...` header for one request.
/// `extra_params` are the request's query/form parameters, which join the
/// oauth parameters in the signature base but not the header itself.
fn authorization_header(
    creds: &Credentials,
    method: &str,
    url: &str,
    extra_params: &[(String, String)],
    nonce: &str,
    timestamp: u64,
) -> String {
    let mut oauth: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), creds.api_key.clone()),
        ("oauth_nonce".into(), nonce.to_string()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp.to_string()),
        ("oauth_token".into(), creds.access_token.clone()),
        ("oauth_version".into(), "1.0".into()),
    ];

    let mut all = oauth.clone();
    all.extend(extra_params.iter().cloned());
    let base = signature_base(method, url, &all);
    let signature = sign(&base, &creds.api_secret, &creds.access_secret);
    oauth.push(("oauth_signature".into(), signature));

    let inner = oauth
        .iter()
        .map(|(k, v)| format!(r#"{}="{}""#, percent(k), percent(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {inner}")
}

pub struct TwitterPoster {
    creds: Option<Credentials>,
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u8,
}

impl TwitterPoster {
    /// Reads `TWITTER_API_KEY` / `TWITTER_API_SECRET` /
    /// `TWITTER_ACCESS_TOKEN` / `TWITTER_ACCESS_SECRET`. Any missing
    /// variable leaves the poster disabled.
    pub fn from_env(client: reqwest::Client) -> Self {
        let creds = match (
            std::env::var("TWITTER_API_KEY"),
            std::env::var("TWITTER_API_SECRET"),
            std::env::var("TWITTER_ACCESS_TOKEN"),
            std::env::var("TWITTER_ACCESS_SECRET"),
        ) {
            (Ok(api_key), Ok(api_secret), Ok(access_token), Ok(access_secret)) => {
                Some(Credentials {
                    api_key,
                    api_secret,
                    access_token,
                    access_secret,
                })
            }
            _ => None,
        };
        Self {
            creds,
            client,
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Per-request nonce. Derived from the clock and consumer key; OAuth
    /// only needs uniqueness per (timestamp, key) pair.
    fn nonce(creds: &Credentials, timestamp_nanos: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(timestamp_nanos.to_le_bytes());
        hasher.update(creds.api_key.as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
    }

    fn now_parts() -> (u64, i64) {
        let now = chrono::Utc::now();
        let secs = now.timestamp().max(0) as u64;
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        (secs, nanos)
    }

    async fn upload_media(&self, creds: &Credentials, path: &Path) -> Result<String> {
        #[derive(Deserialize)]
        struct MediaResp {
            media_id_string: String,
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading media file {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();

        let (ts, nanos) = Self::now_parts();
        let nonce = Self::nonce(creds, nanos);
        // Multipart bodies stay out of the signature base per OAuth 1.0a.
        let auth = authorization_header(creds, "POST", MEDIA_ENDPOINT, &[], &nonce, ts);

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("media", part);

        let rsp = self
            .client
            .post(MEDIA_ENDPOINT)
            .header(reqwest::header::AUTHORIZATION, auth)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .context("media upload request")?
            .error_for_status()
            .context("media upload non-2xx")?;

        let body: MediaResp = rsp.json().await.context("media upload response")?;
        Ok(body.media_id_string)
    }

    async fn create_tweet(
        &self,
        creds: &Credentials,
        status: &str,
        media_id: Option<&str>,
    ) -> Result<()> {
        let mut payload = serde_json::json!({ "text": status });
        if let Some(id) = media_id {
            payload["media"] = serde_json::json!({ "media_ids": [id] });
        }

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            // Fresh nonce/timestamp per attempt; a replayed signature is rejected.
            let (ts, nanos) = Self::now_parts();
            let nonce = Self::nonce(creds, nanos);
            let auth = authorization_header(creds, "POST", TWEETS_ENDPOINT, &[], &nonce, ts);

            let res = self
                .client
                .post(TWEETS_ENDPOINT)
                .header(reqwest::header::AUTHORIZATION, auth)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("tweet HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("tweet request failed: {e}"));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl StatusPoster for TwitterPoster {
    async fn post(&self, announcement: &Announcement) -> Result<()> {
        let Some(creds) = &self.creds else {
            tracing::debug!("twitter disabled (credentials not fully set)");
            return Ok(());
        };

        let status = clip_status(&announcement.text, MAX_STATUS_CHARS);

        let media_id = match &announcement.image {
            Some(path) => Some(self.upload_media(creds, path).await?),
            None => None,
        };

        self.create_tweet(creds, &status, media_id.as_deref())
            .await?;
        tracing::info!("announcement posted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "twitter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text_and_marks_long_cuts() {
        assert_eq!(clip_status("short", 280), "short");
        let long = "x".repeat(300);
        let clipped = clip_status(&long, 280);
        assert_eq!(clipped.chars().count(), 280);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn oauth_percent_encoding_is_rfc3986_strict() {
        assert_eq!(percent("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent("safe-._~"), "safe-._~");
        assert_eq!(percent("☃"), "%E2%98%83");
    }

    // Worked example from the Twitter "creating a signature" docs.
    fn doc_example_params() -> Vec<(String, String)> {
        vec![
            ("status".into(), "Hello Ladies + Gentlemen, a signed OAuth request!".into()),
            ("include_entities".into(), "true".into()),
            ("oauth_consumer_key".into(), "xvz1evFS4wEEPTGEFPHBog".into()),
            (
                "oauth_nonce".into(),
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg".into(),
            ),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), "1318622958".into()),
            (
                "oauth_token".into(),
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            ),
            ("oauth_version".into(), "1.0".into()),
        ]
    }

    #[test]
    fn signature_base_matches_documented_example() {
        let base = signature_base(
            "post",
            "https://api.twitter.com/1/statuses/update.json",
            &doc_example_params(),
        );
        let expected = "POST&https%3A%2F%2Fapi.twitter.com%2F1%2Fstatuses%2Fupdate.json&\
            include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26\
            oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26\
            oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26\
            oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26\
            oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521";
        assert_eq!(base, expected);
    }

    #[test]
    fn signature_matches_documented_example() {
        let base = signature_base(
            "POST",
            "https://api.twitter.com/1/statuses/update.json",
            &doc_example_params(),
        );
        let sig = sign(
            &base,
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        assert_eq!(sig, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn authorization_header_carries_signature_not_body_params() {
        let creds = Credentials {
            api_key: "ck".into(),
            api_secret: "cs".into(),
            access_token: "tok".into(),
            access_secret: "ts".into(),
        };
        let header = authorization_header(
            &creds,
            "POST",
            "https://api.twitter.com/2/tweets",
            &[("text".into(), "hi".into())],
            "abcdef",
            1_318_622_958,
        );
        assert!(header.starts_with("OAuth "));
        assert!(header.contains(r#"oauth_consumer_key="ck""#));
        assert!(header.contains("oauth_signature=\""));
        assert!(!header.contains("text="));
    }
}
