//! Wire constants shared by the panel HTTP API and the push channel.

// ---------------------------------------------------------------------------
// HTTP endpoints
// ---------------------------------------------------------------------------

/// Multipart upload of a single `file` field.
pub const UPLOAD_PATH: &str = "/api/upload";

/// Job submission.
pub const GENERATE_PATH: &str = "/api/generate";

/// Result lookup, keyed by the `prompt_id` query parameter.
pub const RESULT_PATH: &str = "/api/result";

/// Backend liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Prefix of result URLs served through the panel's image proxy.
pub const PROXY_VIEW_PREFIX: &str = "/api/proxy/view?";

/// Header carrying the session token on job submission.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Multipart field name used by the upload endpoint.
pub const UPLOAD_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Payload status values
// ---------------------------------------------------------------------------

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

/// Default port of the push-notification endpoint.
pub const PUSH_PORT: u16 = 8188;

/// Step-level progress (`data.value`, `data.desc`).
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// A node started executing (`data.node`).
pub const MSG_TYPE_EXECUTING: &str = "executing";

/// A node finished executing.
pub const MSG_TYPE_EXECUTED: &str = "executed";

/// Strip the image-proxy prefix from a result URL, yielding the
/// backend-side reference (`filename=...&type=...`).
///
/// URLs without the prefix are returned unchanged.
pub fn strip_proxy_prefix(url: &str) -> &str {
    match url.find(PROXY_VIEW_PREFIX) {
        Some(idx) => &url[idx + PROXY_VIEW_PREFIX.len()..],
        None => url,
    }
}
