/*!
 * HTTP operations against the catalog-backed store
 *
 * One method per logical operation: create record, add relation, probe,
 * upload. Each builds a fresh request per attempt and goes through the
 * connection manager, with the retry policy owned here rather than there.
 */

use reqwest::blocking::{Body, Request};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use std::fs::File;
use std::path::Path;
use url::Url;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::core::progress::{ProgressPublisher, ProgressReader, ProgressTracker};
use crate::core::retry::with_reconnect;
use crate::error::{FerryError, Result};
use crate::remote::{ConnectionManager, CredentialProvider, ProbeOutcome, RemoteStore};

const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// Split multi-value metadata fields into repeated pairs.
///
/// A value like `soil||climate` under key `keyword` becomes two `keyword`
/// pairs, matching how the store expects repeated form fields.
pub fn expand_multi_values(
    pairs: &[(String, String)],
    delimiter: &str,
) -> Vec<(String, String)> {
    let mut expanded = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        if !delimiter.is_empty() && value.contains(delimiter) {
            for part in value.split(delimiter) {
                expanded.push((key.clone(), part.to_string()));
            }
        } else {
            expanded.push((key.clone(), value.clone()));
        }
    }
    expanded
}

/// HTTP implementation of [`RemoteStore`] for one configured host
pub struct HttpCatalogStore<'a> {
    config: &'a EngineConfig,
    conn: ConnectionManager,
    cancel: CancelToken,
    credentials: HeaderMap,
}

impl<'a> HttpCatalogStore<'a> {
    /// Build a store client. Credential resolution happens here, so a
    /// missing credential aborts before any network call.
    pub fn new(config: &'a EngineConfig, cancel: CancelToken) -> Result<Self> {
        let mut credentials = HeaderMap::new();
        for (name, value) in config.credential_headers()? {
            let name: HeaderName = name
                .parse()
                .map_err(|_| FerryError::Config(format!("invalid header name {}", name)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| FerryError::Config("invalid credential header value".to_string()))?;
            credentials.insert(name, value);
        }

        Ok(Self {
            config,
            conn: ConnectionManager::from_config(config)?,
            cancel,
            credentials,
        })
    }

    fn retrying<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        with_reconnect(
            self.config.retry_attempts,
            self.config.retry_backoff(),
            &self.cancel,
            || self.conn.reset(),
            operation,
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.conn
            .base()
            .join(path)
            .map_err(|e| FerryError::Config(format!("invalid endpoint path {}: {}", path, e)))
    }

    /// URL of one data target under a record: `<upload-url>/<pid>/data/<target>`
    fn data_url(&self, pid: &str, target: &str) -> Result<Url> {
        let mut url = self.endpoint(&self.config.upload_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FerryError::Config("upload_url cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push(pid);
            segments.push("data");
            for part in target.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        Ok(url)
    }

    fn link_url(&self, pid: &str) -> Result<Url> {
        let mut url = self.endpoint(&self.config.addlink_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FerryError::Config("addlink_url cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push(pid);
        }
        Ok(url)
    }

    fn apply_headers(&self, request: &mut Request) {
        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        for (name, value) in self.credentials.iter() {
            headers.insert(name.clone(), value.clone());
        }
    }

    fn form_request(&self, url: &Url, pairs: &[(String, String)]) -> Request {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        let mut request = Request::new(Method::POST, url.clone());
        self.apply_headers(&mut request);
        request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *request.body_mut() = Some(Body::from(encoded));
        request
    }
}

impl RemoteStore for HttpCatalogStore<'_> {
    fn create_record(&self, metadata: &[(String, String)]) -> Result<String> {
        let url = self.endpoint(&self.config.create_url)?;
        let pairs = expand_multi_values(metadata, &self.config.multi_value_delimiter);
        tracing::info!(url = %url, fields = pairs.len(), "creating record");

        let response = self.retrying(|| self.conn.execute(self.form_request(&url, &pairs)))?;

        if response.status == 201 {
            let pid = response.body.trim().to_string();
            tracing::info!(pid = %pid, "record created");
            Ok(pid)
        } else {
            Err(FerryError::RecordCreation {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn add_relation(&self, pid: &str, link_type: &str, related_pid: &str) -> Result<bool> {
        let url = self.link_url(pid)?;
        let pairs = vec![
            ("linkType".to_string(), link_type.to_string()),
            ("itemId".to_string(), related_pid.to_string()),
        ];
        tracing::info!(pid = %pid, link_type = %link_type, related = %related_pid, "creating relation");

        let response = self.retrying(|| self.conn.execute(self.form_request(&url, &pairs)))?;

        if response.is_success() {
            Ok(true)
        } else {
            tracing::warn!(
                status = response.status,
                body = %response.body,
                "relation not accepted by remote store"
            );
            Ok(false)
        }
    }

    fn probe(&self, pid: &str, target: &str, digest: &str) -> Result<ProbeOutcome> {
        let url = self.data_url(pid, target)?;

        let response = self.retrying(|| {
            let mut request = Request::new(Method::HEAD, url.clone());
            self.apply_headers(&mut request);
            self.conn.execute(request)
        })?;

        if response.status == 404 {
            return Ok(ProbeOutcome::NotFound);
        }
        match response.content_md5 {
            Some(ref remote) if remote.eq_ignore_ascii_case(digest) => {
                Ok(ProbeOutcome::FoundIdentical)
            }
            _ => Ok(ProbeOutcome::FoundDifferent),
        }
    }

    fn upload(
        &self,
        pid: &str,
        source: &Path,
        target: &str,
        digest: &str,
        publisher: &ProgressPublisher,
    ) -> Result<()> {
        let url = self.data_url(pid, target)?;
        tracing::info!(source = %source.display(), url = %url, "uploading");

        let response = self.retrying(|| {
            // Reopen the source on every attempt: the previous body may have
            // been partially consumed before the transport failed.
            let file = File::open(source)?;
            let total_bytes = file.metadata()?.len();
            let tracker =
                ProgressTracker::new(publisher.clone(), source.to_path_buf(), total_bytes);
            let reader = ProgressReader::new(file, tracker);

            let mut request = Request::new(Method::POST, url.clone());
            self.apply_headers(&mut request);
            request.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            request.headers_mut().insert(
                CONTENT_MD5,
                HeaderValue::from_str(digest).map_err(|_| {
                    FerryError::Config(format!("digest is not a valid header value: {}", digest))
                })?,
            );
            *request.body_mut() = Some(Body::sized(reader, total_bytes));
            self.conn.execute(request)
        })?;

        match response.status {
            200 | 201 => Ok(()),
            status => Err(FerryError::RemoteRejection {
                status,
                body: response.body,
            }),
        }
    }
}
