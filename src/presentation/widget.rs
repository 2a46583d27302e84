use serde_json::json;
use sha2::{Digest, Sha256};
use url::{ParseError, Url};

// Only the path and query of URLs built on this origin are returned.
const LOCAL_ORIGIN: &str = "http://localhost/";

/// Stable widget identifier for a scope and its requested channel objects.
pub fn widget_id(
    app: &str,
    content_type: &str,
    channel: Option<&str>,
    channel_objects: &[String],
) -> String {
    let seed = format!(
        "{app}-{content_type}-{}-{}",
        channel.unwrap_or_default(),
        json!(channel_objects)
    );
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Path (and `template` query) of the content endpoint serving this widget,
/// percent-encoded.
pub fn fetch_url(
    app: &str,
    content_type: &str,
    channel: Option<&str>,
    custom: Option<&str>,
) -> Result<String, ParseError> {
    let mut url = Url::parse(LOCAL_ORIGIN)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ParseError::RelativeUrlWithCannotBeABaseBase)?;
        segments.clear().push(app).push(content_type);
        if let Some(channel) = channel {
            segments.push(channel);
        }
    }
    if let Some(custom) = custom.filter(|custom| !custom.is_empty()) {
        url.query_pairs_mut().append_pair("template", custom);
    }

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Ok(path)
}
