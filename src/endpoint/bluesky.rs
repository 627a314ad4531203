//! Bluesky posting over AT Protocol XRPC.
//!
//! One [`submit`](PostingEndpoint::submit) makes up to three requests:
//!
//! ```text
//! com.atproto.server.createSession   (first submit only, session is cached)
//! com.atproto.repo.uploadBlob        image bytes -> blob ref
//! com.atproto.repo.createRecord      app.bsky.feed.post embedding the blob
//! ```
//!
//! Responses are classified once, in [`classify`]: network failures, 5xx and
//! 429 are [`TransportError`]s; any other non-2xx is a rejection carrying the
//! XRPC `error: message` pair.

use super::backend::{EndpointResponse, PostingEndpoint, TransportError};
use crate::config::{Credentials, EndpointConfig};
use crate::fetch::{FetchedImage, USER_AGENT};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::cell::OnceCell;
use tracing::debug;

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Clone)]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionReply {
    access_jwt: String,
    did: String,
}

/// XRPC error body.
#[derive(Deserialize)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

pub struct BlueskyClient {
    agent: ureq::Agent,
    service: String,
    credentials: Credentials,
    session: OnceCell<Session>,
}

impl BlueskyClient {
    /// Build a client. No network traffic happens until the first submit.
    pub fn new(config: &EndpointConfig, credentials: Credentials) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            service: config.service.trim_end_matches('/').to_string(),
            credentials,
            session: OnceCell::new(),
        }
    }

    fn xrpc_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }

    fn post_json(
        &self,
        nsid: &str,
        access_jwt: Option<&str>,
        body: &Value,
    ) -> Result<EndpointResponse, TransportError> {
        let mut request = self
            .agent
            .post(self.xrpc_url(nsid))
            .header("User-Agent", USER_AGENT);
        if let Some(jwt) = access_jwt {
            request = request.header("Authorization", format!("Bearer {jwt}"));
        }
        let response = request.send_json(body).map_err(network)?;
        read_response(nsid, response)
    }

    fn post_bytes(
        &self,
        nsid: &str,
        access_jwt: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<EndpointResponse, TransportError> {
        let response = self
            .agent
            .post(self.xrpc_url(nsid))
            .header("User-Agent", USER_AGENT)
            .header("Authorization", format!("Bearer {access_jwt}"))
            .header("Content-Type", mime)
            .send(bytes)
            .map_err(network)?;
        read_response(nsid, response)
    }

    /// The cached session, or the endpoint's refusal to create one.
    fn session(&self) -> Result<Result<&Session, EndpointResponse>, TransportError> {
        if let Some(session) = self.session.get() {
            return Ok(Ok(session));
        }

        let reply = self.post_json(
            CREATE_SESSION,
            None,
            &json!({
                "identifier": self.credentials.identifier,
                "password": self.credentials.password,
            }),
        )?;
        if !reply.is_accepted() {
            return Ok(Err(reply));
        }
        let parsed: SessionReply = match serde_json::from_value(reply.payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(Err(EndpointResponse::rejected(vec![format!(
                    "unreadable session response: {err}"
                )])));
            }
        };
        debug!(did = %parsed.did, "session created");
        Ok(Ok(self.session.get_or_init(|| Session {
            access_jwt: parsed.access_jwt,
            did: parsed.did,
        })))
    }
}

impl PostingEndpoint for BlueskyClient {
    fn submit(
        &self,
        image: &FetchedImage,
        text: &str,
        alt_text: &str,
    ) -> Result<EndpointResponse, TransportError> {
        let session = match self.session()? {
            Ok(session) => session,
            Err(refused) => return Ok(refused),
        };

        let upload = self.post_bytes(UPLOAD_BLOB, &session.access_jwt, image.mime, &image.bytes)?;
        if !upload.is_accepted() {
            return Ok(upload);
        }
        let Some(blob) = upload.payload.get("blob").cloned() else {
            return Ok(EndpointResponse::rejected(vec![
                "uploadBlob response has no blob".to_string(),
            ]));
        };

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.post_json(
            CREATE_RECORD,
            Some(&session.access_jwt),
            &json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": post_record(text, alt_text, blob, &created_at),
            }),
        )
    }
}

fn network(err: ureq::Error) -> TransportError {
    TransportError::Network(err.to_string())
}

fn read_response(
    nsid: &str,
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<EndpointResponse, TransportError> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().map_err(network)?;
    debug!(nsid, status, "xrpc response");
    classify(status, &body)
}

/// Sort an HTTP exchange into accepted, rejected, or transient.
pub(crate) fn classify(status: u16, body: &str) -> Result<EndpointResponse, TransportError> {
    match status {
        200..=299 => Ok(match serde_json::from_str(body) {
            Ok(payload) => EndpointResponse::accepted(payload),
            // Processed but unreadable. Retrying could post twice.
            Err(err) => EndpointResponse::rejected(vec![format!("unreadable response: {err}")]),
        }),
        429 => Err(TransportError::RateLimited),
        500..=599 => Err(TransportError::Server { status }),
        _ => Ok(EndpointResponse {
            payload: serde_json::from_str(body).unwrap_or(Value::Null),
            errors: vec![xrpc_error_message(status, body)],
        }),
    }
}

fn xrpc_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<XrpcError>(body) {
        Ok(XrpcError {
            error: Some(error),
            message: Some(message),
        }) => format!("{error}: {message}"),
        Ok(XrpcError {
            error: Some(error), ..
        }) => error,
        Ok(XrpcError {
            message: Some(message),
            ..
        }) => message,
        _ => format!("HTTP {status}"),
    }
}

/// The `app.bsky.feed.post` record with a single embedded image.
fn post_record(text: &str, alt_text: &str, blob: Value, created_at: &str) -> Value {
    json!({
        "$type": POST_COLLECTION,
        "text": text,
        "createdAt": created_at,
        "embed": {
            "$type": "app.bsky.embed.images",
            "images": [{ "alt": alt_text, "image": blob }],
        },
    })
}
