//! Amazon S3 [`ObjectStore`].
//!
//! Talks to the S3 REST API directly with AWS Signature V4 authentication.
//! Supports `ListObjectsV2` pagination, `HEAD`, `GET` and `PUT`, and custom
//! endpoints for S3-compatible services (MinIO, LocalStack).
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for signing.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "s3"
//! region = "ap-northeast-2"
//! # endpoint_url = "http://localhost:9000"   # MinIO, path-style addressing
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials / IAM roles)
//!
//! # Addressing
//!
//! Without `endpoint_url`, requests go to the virtual-hosted endpoint
//! `<bucket>.s3.<region>.amazonaws.com`. With it, requests use path-style
//! URLs `<endpoint>/<bucket>/<key>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use sha2::{Digest, Sha256};

use super::{ObjectMeta, ObjectStore, StorageError};
use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self, StorageError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| StorageError::Credentials("AWS_ACCESS_KEY_ID not set".to_string()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            StorageError::Credentials("AWS_SECRET_ACCESS_KEY not set".to_string())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

pub struct S3Store {
    region: String,
    endpoint: Option<Endpoint>,
    creds: AwsCredentials,
    client: reqwest::Client,
}

/// A custom endpoint split into scheme and host (`http`, `localhost:9000`).
#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    scheme: String,
    host: String,
}

impl Endpoint {
    fn parse(url: &str) -> Self {
        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => ("https".to_string(), url),
        };
        Self {
            scheme,
            host: rest.trim_end_matches('/').to_string(),
        }
    }
}

/// One request before signing.
struct SignedRequest<'a> {
    method: reqwest::Method,
    bucket: &'a str,
    key: &'a str,
    query: Vec<(String, String)>,
    body: Vec<u8>,
    content_type: Option<&'a str>,
}

impl S3Store {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            region: config.region.clone(),
            endpoint: config.endpoint_url.as_deref().map(Endpoint::parse),
            creds: AwsCredentials::from_env()?,
            client,
        })
    }

    /// Returns `(scheme, host, canonical path)` for an object (or bucket root when `key` is empty).
    fn locate(&self, bucket: &str, key: &str) -> (String, String, String) {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        match &self.endpoint {
            Some(ep) => {
                let path = if key.is_empty() {
                    format!("/{}/", uri_encode(bucket))
                } else {
                    format!("/{}/{}", uri_encode(bucket), encoded_key)
                };
                (ep.scheme.clone(), ep.host.clone(), path)
            }
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", bucket, self.region),
                format!("/{}", encoded_key),
            ),
        }
    }

    async fn send(&self, req: SignedRequest<'_>) -> Result<reqwest::Response, StorageError> {
        let (scheme, host, canonical_uri) = self.locate(req.bucket, req.key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        // Build canonical query string (must be sorted)
        let mut sorted_params = req.query.clone();
        sorted_params.sort();
        let canonical_querystring: String = sorted_params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let payload_hash = hex_sha256(&req.body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(content_type) = req.content_type {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            req.method.as_str(),
            canonical_uri,
            canonical_querystring,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key =
            derive_signing_key(&self.creds.secret_access_key, &date_stamp, &self.region, "s3");
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut url = format!("{}://{}{}", scheme, host, canonical_uri);
        if !canonical_querystring.is_empty() {
            url.push('?');
            url.push_str(&canonical_querystring);
        }

        let mut builder = self
            .client
            .request(req.method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);
        if let Some(content_type) = req.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(ref token) = self.creds.session_token {
            builder = builder.header("x-amz-security-token", token);
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body);
        }

        Ok(builder.send().await?)
    }

    fn object_request<'a>(
        &self,
        method: reqwest::Method,
        bucket: &'a str,
        key: &'a str,
    ) -> SignedRequest<'a> {
        SignedRequest {
            method,
            bucket,
            key,
            query: Vec::new(),
            body: Vec::new(),
            content_type: None,
        }
    }
}

async fn check_status(
    resp: reqwest::Response,
    operation: &'static str,
    bucket: &str,
    key: &str,
) -> Result<reqwest::Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND && !key.is_empty() {
        return Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StorageError::Http {
        operation,
        status: status.as_u16(),
        message: body.chars().take(500).collect(),
    })
}

#[async_trait]
impl ObjectStore for S3Store {
    fn backend(&self) -> &str {
        "s3"
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
            ];
            if !prefix.is_empty() {
                query.push(("prefix".to_string(), prefix.to_string()));
            }
            if let Some(ref token) = continuation_token {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let resp = self
                .send(SignedRequest {
                    method: reqwest::Method::GET,
                    bucket,
                    key: "",
                    query,
                    body: Vec::new(),
                    content_type: None,
                })
                .await?;
            let resp = check_status(resp, "ListObjectsV2", bucket, "").await?;
            let page = parse_list_objects_response(&resp.text().await?)?;
            tracing::debug!(bucket, prefix, objects = page.objects.len(), "listed page");
            objects.extend(page.objects);

            match page.next_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError> {
        let resp = self
            .send(self.object_request(reqwest::Method::HEAD, bucket, key))
            .await?;
        let resp = check_status(resp, "HeadObject", bucket, key).await?;

        let headers = resp.headers();
        let size = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                StorageError::InvalidResponse(format!(
                    "HeadObject for '{}' has no Content-Length",
                    key
                ))
            })?;
        let last_modified = headers
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let etag = headers
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified,
            etag,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .send(self.object_request(reqwest::Method::GET, bucket, key))
            .await?;
        let resp = check_status(resp, "GetObject", bucket, key).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut req = self.object_request(reqwest::Method::PUT, bucket, key);
        req.body = body;
        req.content_type = Some(content_type);
        let resp = self.send(req).await?;
        check_status(resp, "PutObject", bucket, key).await?;
        Ok(())
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986, leaving `A-Z a-z 0-9 - _ . ~` as-is.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ ListObjectsV2 XML ============

#[derive(Debug)]
struct ListPage {
    objects: Vec<ObjectMeta>,
    is_truncated: bool,
    next_token: Option<String>,
}

#[derive(Default)]
struct ContentsBuilder {
    key: String,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
    etag: Option<String>,
}

/// Parse one `ListObjectsV2` response page.
fn parse_list_objects_response(xml: &str) -> Result<ListPage, StorageError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListPage {
        objects: Vec::new(),
        is_truncated: false,
        next_token: None,
    };
    let mut current: Option<ContentsBuilder> = None;
    let mut element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "Contents" {
                    current = Some(ContentsBuilder::default());
                }
                element = name;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| StorageError::InvalidResponse(e.to_string()))?
                    .to_string();
                match (current.as_mut(), element.as_str()) {
                    (Some(c), "Key") => c.key = text,
                    (Some(c), "Size") => {
                        c.size = text.parse().map_err(|_| {
                            StorageError::InvalidResponse(format!(
                                "ListObjectsV2 entry '{}' has invalid Size '{}'",
                                c.key, text
                            ))
                        })?
                    }
                    (Some(c), "LastModified") => {
                        c.last_modified = DateTime::parse_from_rfc3339(&text)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc))
                    }
                    (Some(c), "ETag") => c.etag = Some(text.trim_matches('"').to_string()),
                    (None, "IsTruncated") => page.is_truncated = text == "true",
                    (None, "NextContinuationToken") => page.next_token = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Contents" {
                    if let Some(c) = current.take() {
                        if !c.key.is_empty() {
                            page.objects.push(ObjectMeta {
                                key: c.key,
                                size: c.size,
                                last_modified: c.last_modified,
                                etag: c.etag,
                            });
                        }
                    }
                }
                element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StorageError::InvalidResponse(e.to_string())),
            _ => {}
        }
    }

    Ok(page)
}
