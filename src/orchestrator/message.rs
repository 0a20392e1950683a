//! Turning collaborator failures into the message shown to the user.

use serde_json::Value;

use crate::client::RequestError;

/// Shown when no extractor recognizes an error.
pub const FALLBACK_MESSAGE: &str = "Unknown error";

pub const TIMEOUT_MESSAGE: &str = "Request timed out";

pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the server";

pub const CANCELLED_MESSAGE: &str = "Operation cancelled";

/// Maps a collaborator error to a display message.
///
/// Returning `None` (or a blank message) falls back to [`FALLBACK_MESSAGE`].
/// Closures of the matching shape implement this trait.
pub trait MessageExtractor: Send + Sync {
    fn extract(&self, error: &RequestError) -> Option<String>;
}

impl<F> MessageExtractor for F
where
    F: Fn(&RequestError) -> Option<String> + Send + Sync,
{
    fn extract(&self, error: &RequestError) -> Option<String> {
        self(error)
    }
}

/// The default extractor for the management API's error bodies.
///
/// Recognizes `{"message": ".."}`, `{"error": ".."}` and
/// `{"error": {"message": ".."}}` in non-success responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMessageExtractor;

impl MessageExtractor for JsonMessageExtractor {
    fn extract(&self, error: &RequestError) -> Option<String> {
        match error {
            RequestError::Status { body, .. } => {
                let body: Value = serde_json::from_str(body).ok()?;
                body_message(&body)
            }
            RequestError::Timeout(_) => Some(TIMEOUT_MESSAGE.to_string()),
            RequestError::Transport(_) => Some(UNREACHABLE_MESSAGE.to_string()),
            RequestError::Decode(_) => None,
        }
    }
}

fn body_message(body: &Value) -> Option<String> {
    let text = |value: &Value| value.as_str().map(str::to_string);
    body.get("message")
        .and_then(text)
        .or_else(|| body.get("error").and_then(text))
        .or_else(|| {
            body.get("error")
                .and_then(|error| error.get("message"))
                .and_then(text)
        })
}

/// Run `extractor` and apply the fallback.
pub fn extract_message(extractor: &dyn MessageExtractor, error: &RequestError) -> String {
    extractor
        .extract(error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
