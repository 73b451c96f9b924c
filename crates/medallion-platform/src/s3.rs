// SPDX-License-Identifier: Apache-2.0

use crate::error::{PlatformError, PlatformErrorCode};
use crate::http::try_send_with_retry;
use crate::retry::RetryPolicy;
use crate::sigv4::{authorization_header, sha256_hex, uri_encode, CanonicalRequest, SigningKeys};
use async_trait::async_trait;
use medallion_model::{BucketSummary, ObjectSummary, ProvisionStatus};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method, Url};
use tracing::{debug, info, warn};

const MAX_LIST_PAGES: usize = 50;

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Authenticated round trip used by service discovery.
    async fn probe(&self) -> Result<(), PlatformError>;
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, PlatformError>;
    /// Idempotent: an existing bucket yields `Skipped`.
    async fn create_bucket(&self, name: &str) -> Result<ProvisionStatus, PlatformError>;
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectSummary>, PlatformError>;
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlatformError>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError>;
}

/// Path-style S3 client signing every request with SigV4.
pub struct S3Client {
    client: Client,
    endpoint: String,
    access_key: String,
    secret_key: String,
    region: String,
    retry: RetryPolicy,
}

impl S3Client {
    #[must_use]
    pub fn new(client: Client, endpoint: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: "us-east-1".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(u16, Vec<u8>), PlatformError> {
        let encoded_path = uri_encode(path, false);
        let mut url = Url::parse(&format!("{}{encoded_path}", self.endpoint))
            .map_err(|e| PlatformError::new(PlatformErrorCode::Validation, e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| PlatformError::new(PlatformErrorCode::Validation, "s3 endpoint has no host"))?
            .to_string();
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let context = format!("s3 {method} {path}");
        let payload_hash = sha256_hex(&body);
        let keys = SigningKeys {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            region: &self.region,
            service: "s3",
        };
        let canonical_query = CanonicalRequest {
            method: method.as_str(),
            path,
            query,
            headers: &[],
            payload_hash: &payload_hash,
        }
        .canonical_query();
        if !canonical_query.is_empty() {
            url.set_query(Some(&canonical_query));
        }

        let resp = try_send_with_retry(&self.retry, &context, || {
            let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
            let headers = vec![
                ("host".to_string(), host_header.clone()),
                ("x-amz-content-sha256".to_string(), payload_hash.clone()),
                ("x-amz-date".to_string(), amz_date.clone()),
            ];
            let request = CanonicalRequest {
                method: method.as_str(),
                path,
                query,
                headers: &headers,
                payload_hash: &payload_hash,
            };
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .header("x-amz-content-sha256", &payload_hash)
                .header("x-amz-date", &amz_date)
                .body(body.clone());
            if let Some(ct) = content_type {
                builder = builder.header(reqwest::header::CONTENT_TYPE, ct);
            }
            let auth = authorization_header(&keys, &request, &amz_date).map_err(|err| {
                warn!(%context, error = %err, "s3 request signing failed");
                err
            })?;
            Ok(builder.header(reqwest::header::AUTHORIZATION, auth))
        })
        .await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(PlatformError::network)?.to_vec();
        debug!(%context, status, bytes = bytes.len(), "s3 response");
        Ok((status, bytes))
    }

    fn error_from(status: u16, context: &str, body: &[u8]) -> PlatformError {
        let text = String::from_utf8_lossy(body);
        match parse_error(&text) {
            Some((code, message)) => {
                let mut err = PlatformError::from_status(status, context, "");
                err.message = format!("{context}: {code}: {message}");
                err
            }
            None => PlatformError::from_status(status, context, &text),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn probe(&self) -> Result<(), PlatformError> {
        self.list_buckets().await.map(|_| ())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, PlatformError> {
        let (status, body) = self.send(Method::GET, "/", &[], Vec::new(), None).await?;
        if !(200..300).contains(&status) {
            return Err(Self::error_from(status, "list buckets", &body));
        }
        parse_list_buckets(&String::from_utf8_lossy(&body))
    }

    async fn create_bucket(&self, name: &str) -> Result<ProvisionStatus, PlatformError> {
        if self.list_buckets().await?.iter().any(|b| b.name == name) {
            return Ok(ProvisionStatus::Skipped);
        }
        let path = format!("/{name}");
        let (status, body) = self.send(Method::PUT, &path, &[], Vec::new(), None).await?;
        if (200..300).contains(&status) {
            info!(bucket = name, "bucket created");
            return Ok(ProvisionStatus::Created);
        }
        let text = String::from_utf8_lossy(&body);
        if let Some((code, _)) = parse_error(&text) {
            if code == "BucketAlreadyOwnedByYou" || code == "BucketAlreadyExists" {
                return Ok(ProvisionStatus::Skipped);
            }
        }
        Err(Self::error_from(status, "create bucket", &body))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectSummary>, PlatformError> {
        let path = format!("/{bucket}");
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let mut query = vec![("list-type".to_string(), "2".to_string())];
            if let Some(p) = prefix.filter(|p| !p.is_empty()) {
                query.push(("prefix".to_string(), p.to_string()));
            }
            if let Some(t) = &token {
                query.push(("continuation-token".to_string(), t.clone()));
            }
            let (status, body) = self.send(Method::GET, &path, &query, Vec::new(), None).await?;
            if !(200..300).contains(&status) {
                return Err(Self::error_from(status, "list objects", &body));
            }
            let page = parse_list_objects(&String::from_utf8_lossy(&body))?;
            out.extend(page.objects);
            match page.next_token {
                Some(next) if page.truncated => token = Some(next),
                _ => return Ok(out),
            }
        }
        Ok(out)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("/{bucket}/{}", key.trim_start_matches('/'));
        let (status, resp) = self
            .send(Method::PUT, &path, &[], body, Some(content_type))
            .await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(Self::error_from(status, "put object", &resp))
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError> {
        let path = format!("/{bucket}/{}", key.trim_start_matches('/'));
        let (status, body) = self.send(Method::GET, &path, &[], Vec::new(), None).await?;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(Self::error_from(status, "get object", &body))
        }
    }
}

/// Walks an XML document, handing each text node to `on_text` with its element path.
fn walk_xml<F>(xml: &str, mut on_text: F) -> Result<(), PlatformError>
where
    F: FnMut(&[String], &str),
{
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                on_text(&path, "");
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| PlatformError::upstream(format!("invalid s3 xml: {err}")))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    on_text(&path, trimmed);
                }
            }
            Ok(Event::Eof) => return Ok(()),
            Err(err) => return Err(PlatformError::upstream(format!("invalid s3 xml: {err}"))),
            _ => {}
        }
    }
}

fn leaf(path: &[String]) -> (&str, &str) {
    let n = path.len();
    let last = path.last().map_or("", String::as_str);
    let parent = if n >= 2 { path[n - 2].as_str() } else { "" };
    (parent, last)
}

pub(crate) fn parse_list_buckets(xml: &str) -> Result<Vec<BucketSummary>, PlatformError> {
    let mut buckets: Vec<BucketSummary> = Vec::new();
    walk_xml(xml, |path, text| match leaf(path) {
        ("Buckets", "Bucket") if text.is_empty() => buckets.push(BucketSummary {
            name: String::new(),
            creation_date: None,
        }),
        ("Bucket", "Name") => {
            if let Some(b) = buckets.last_mut() {
                b.name = text.to_string();
            }
        }
        ("Bucket", "CreationDate") => {
            if let Some(b) = buckets.last_mut() {
                b.creation_date = Some(text.to_string());
            }
        }
        _ => {}
    })?;
    buckets.retain(|b| !b.name.is_empty());
    Ok(buckets)
}

#[derive(Debug, Default)]
pub(crate) struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    pub truncated: bool,
    pub next_token: Option<String>,
}

pub(crate) fn parse_list_objects(xml: &str) -> Result<ObjectPage, PlatformError> {
    let mut page = ObjectPage::default();
    walk_xml(xml, |path, text| match leaf(path) {
        ("ListBucketResult", "Contents") if text.is_empty() => page.objects.push(ObjectSummary {
            key: String::new(),
            size: 0,
            last_modified: None,
        }),
        ("Contents", "Key") => {
            if let Some(o) = page.objects.last_mut() {
                o.key = text.to_string();
            }
        }
        ("Contents", "Size") => {
            if let Some(o) = page.objects.last_mut() {
                o.size = text.parse().unwrap_or(0);
            }
        }
        ("Contents", "LastModified") => {
            if let Some(o) = page.objects.last_mut() {
                o.last_modified = Some(text.to_string());
            }
        }
        ("ListBucketResult", "IsTruncated") if !text.is_empty() => {
            page.truncated = text.eq_ignore_ascii_case("true");
        }
        ("ListBucketResult", "NextContinuationToken") if !text.is_empty() => {
            page.next_token = Some(text.to_string());
        }
        _ => {}
    })?;
    page.objects.retain(|o| !o.key.is_empty());
    Ok(page)
}

/// `(Code, Message)` of an S3 `<Error>` document.
pub(crate) fn parse_error(xml: &str) -> Option<(String, String)> {
    let mut code = None;
    let mut message = String::new();
    walk_xml(xml, |path, text| match leaf(path) {
        ("Error", "Code") if !text.is_empty() => code = Some(text.to_string()),
        ("Error", "Message") if !text.is_empty() => message = text.to_string(),
        _ => {}
    })
    .ok()?;
    code.map(|c| (c, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>1</ID><DisplayName>mapr</DisplayName></Owner>
  <Buckets>
    <Bucket><Name>bronze-bucket</Name><CreationDate>2024-05-01T10:00:00.000Z</CreationDate></Bucket>
    <Bucket><Name>gold-bucket</Name></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;
        let buckets = parse_list_buckets(xml).expect("parse");
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].name, "bronze-bucket");
        assert_eq!(
            buckets[0].creation_date.as_deref(),
            Some("2024-05-01T10:00:00.000Z")
        );
        assert!(buckets[1].creation_date.is_none());
    }

    #[test]
    fn parses_object_page_with_continuation() {
        let xml = r#"<ListBucketResult>
  <Name>silver-bucket</Name>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>tok-2</NextContinuationToken>
  <Contents><Key>iceberg/a &amp; b.jsonl</Key><Size>42</Size><LastModified>2024-05-01T10:00:00Z</LastModified></Contents>
  <Contents><Key>iceberg/c.jsonl</Key><Size>8</Size></Contents>
</ListBucketResult>"#;
        let page = parse_list_objects(xml).expect("parse");
        assert!(page.truncated);
        assert_eq!(page.next_token.as_deref(), Some("tok-2"));
        assert_eq!(page.objects[0].key, "iceberg/a & b.jsonl");
        assert_eq!(page.objects[0].size, 42);
        assert_eq!(page.objects[1].size, 8);
    }

    #[test]
    fn parses_error_document() {
        let xml = "<Error><Code>BucketAlreadyOwnedByYou</Code><Message>yours</Message></Error>";
        assert_eq!(
            parse_error(xml),
            Some(("BucketAlreadyOwnedByYou".to_string(), "yours".to_string()))
        );
        assert_eq!(parse_error("not xml at all"), None);
    }
}
