//! Share links
//!
//! A share link is the page address with the percent-encoded JSON snapshot in
//! a single query parameter:
//!
//! ```text
//! https://host/path?settings=%7B%22records%22%3A...
//! ```

use super::Clipboard;
use crate::state::ViewState;
use thiserror::Error;
use url::Url;

/// Query parameter carrying the snapshot
pub const SHARE_PARAM: &str = "settings";

/// Errors building or reading share links
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid page URL {url}: {error}")]
    InvalidUrl { url: String, error: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The link carries a snapshot that cannot be decoded
    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(String),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] std::io::Error),
}

/// Build a share link for `state` on `page_url`.
///
/// Query string and fragment of `page_url` are dropped so the link carries
/// exactly one parameter.
pub fn build_share_link(state: &ViewState, page_url: &str, param: &str) -> Result<String, ShareError> {
    let mut url = Url::parse(page_url).map_err(|e| ShareError::InvalidUrl {
        url: page_url.to_string(),
        error: e.to_string(),
    })?;
    url.set_query(None);
    url.set_fragment(None);

    let json = serde_json::to_string(state).map_err(|e| ShareError::Serialization(e.to_string()))?;
    let encoded = urlencoding::encode(&json);

    Ok(format!("{}?{}={}", url, param, encoded))
}

/// Build a share link and copy it to `clipboard`
pub async fn share_link(
    state: &ViewState,
    page_url: &str,
    param: &str,
    clipboard: &dyn Clipboard,
) -> Result<String, ShareError> {
    let link = build_share_link(state, page_url, param)?;
    clipboard.write_text(&link).await?;

    tracing::info!(
        length = link.len(),
        records = state.records.len(),
        "Share link copied to clipboard"
    );
    Ok(link)
}

/// Read the snapshot out of a share link.
///
/// Accepts a full URL or a bare query string (with or without the leading
/// `?`). Returns `Ok(None)` when the parameter is absent or empty.
pub fn decode_share_link(link: &str, param: &str) -> Result<Option<ViewState>, ShareError> {
    let link = link.trim();
    let query = if link.contains("://") {
        let url = Url::parse(link).map_err(|e| ShareError::InvalidUrl {
            url: link.to_string(),
            error: e.to_string(),
        })?;
        url.query().unwrap_or("").to_string()
    } else {
        link.trim_start_matches('?').to_string()
    };

    let raw = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == param).then_some(value)
    });

    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let json = decode_component(raw)?;
    let state: ViewState =
        serde_json::from_str(&json).map_err(|e| ShareError::SnapshotDecode(e.to_string()))?;

    tracing::info!(records = state.records.len(), "Snapshot decoded from share link");
    Ok(Some(state))
}

/// Percent-decode one query value, rejecting malformed escapes
fn decode_component(raw: &str) -> Result<String, ShareError> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            let valid = escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(ShareError::SnapshotDecode(format!(
                    "malformed percent-encoding at byte {}",
                    i
                )));
            }
        }
    }

    // Form encoding writes spaces as '+'
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| ShareError::SnapshotDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::LabelOrder;
    use crate::persistence::MemoryClipboard;
    use crate::records::{Field, RowRecord};
    use crate::state::ViewStateStore;
    use serde_json::json;

    fn sample_state() -> ViewState {
        let mut store = ViewStateStore::with_records(
            vec![
                RowRecord::new()
                    .with(Field::LegalName, "Acme & Sons, Inc. #1")
                    .with(Field::OutOfServiceDate, "2021-03-15"),
                RowRecord::new().with(Field::LegalName, "Beta+Gamma 100%"),
            ],
            LabelOrder::FirstSeen,
        );
        store.set_settings(json!({ "note": "a=b&c" }));
        store.snapshot()
    }

    #[test]
    fn test_link_round_trip() {
        let state = sample_state();
        let link = build_share_link(&state, "https://example.com/app?old=1#frag", SHARE_PARAM)
            .unwrap();

        assert!(link.starts_with("https://example.com/app?settings="));
        assert!(!link.contains("old=1"));
        assert!(!link.contains('#'));

        let decoded = decode_share_link(&link, SHARE_PARAM).unwrap();
        assert_eq!(decoded, Some(state));
    }

    #[test]
    fn test_bare_query_string() {
        let state = sample_state();
        let link = build_share_link(&state, "http://localhost:3000/", SHARE_PARAM).unwrap();
        let query = &link[link.find('?').unwrap()..];

        assert_eq!(decode_share_link(query, SHARE_PARAM).unwrap(), Some(state));
    }

    #[test]
    fn test_absent_parameter() {
        assert!(decode_share_link("https://example.com/app", SHARE_PARAM)
            .unwrap()
            .is_none());
        assert!(decode_share_link("?other=1&settings=", SHARE_PARAM)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_links_are_decode_errors() {
        let bad_escape = decode_share_link("?settings=%7B%zz", SHARE_PARAM).unwrap_err();
        assert!(matches!(bad_escape, ShareError::SnapshotDecode(_)));

        let truncated = decode_share_link("?settings=%7", SHARE_PARAM).unwrap_err();
        assert!(matches!(truncated, ShareError::SnapshotDecode(_)));

        let bad_json = decode_share_link("?settings=%7B%22records", SHARE_PARAM).unwrap_err();
        assert!(matches!(bad_json, ShareError::SnapshotDecode(_)));

        let wrong_shape = decode_share_link("?settings=%5B1%2C2%5D", SHARE_PARAM).unwrap_err();
        assert!(matches!(wrong_shape, ShareError::SnapshotDecode(_)));
    }

    #[test]
    fn test_invalid_page_url() {
        let err = build_share_link(&ViewState::default(), "not a url", SHARE_PARAM).unwrap_err();
        assert!(matches!(err, ShareError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_share_link_copies_to_clipboard() {
        let clipboard = MemoryClipboard::new();
        let state = sample_state();

        let link = share_link(&state, "https://example.com/", SHARE_PARAM, &clipboard)
            .await
            .unwrap();

        assert_eq!(clipboard.contents().await, Some(link));
    }
}
