//! NewsAPI response parser
//!
//! Stateless parsing functions that turn raw response bodies into a
//! [`PageResponse`] or an [`ApiError`]. Transport and quota handling live in
//! [`super::newsapi_http`].

use crate::fetcher::{ApiError, FetcherError, FetcherResult};
use crate::PageResponse;

/// Longest raw body kept in an error message
const MAX_RAW_BODY_CHARS: usize = 512;

/// Stateless parser for NewsAPI responses
pub struct NewsApiParser;

impl NewsApiParser {
    /// Parse the body of a 200 response
    ///
    /// # Errors
    /// - [`FetcherError::ParseError`] when the body is not a page payload
    /// - [`FetcherError::Api`] when the payload itself reports a failure
    pub fn parse_page(status_code: u16, body: &[u8], url: &str) -> FetcherResult<PageResponse> {
        let page: PageResponse = serde_json::from_slice(body)
            .map_err(|e| FetcherError::ParseError(format!("failed to decode page: {e}")))?;

        if let Some(mut err) = page.to_api_error(status_code) {
            err.url = url.to_string();
            return Err(FetcherError::Api(err));
        }

        Ok(page)
    }

    /// Build an [`ApiError`] from the body of a non-200, non-429 response
    ///
    /// A JSON payload yields its code and message (both possibly empty).
    /// A body that is not JSON keeps its raw text as the message.
    pub fn parse_error(status_code: u16, body: &[u8], url: &str) -> ApiError {
        match serde_json::from_slice::<PageResponse>(body) {
            Ok(payload) => {
                let mut err = payload.to_api_error(status_code).unwrap_or(ApiError {
                    status_code,
                    code: None,
                    message: String::new(),
                    url: String::new(),
                });
                err.url = url.to_string();
                err
            }
            Err(_) => ApiError {
                status_code,
                code: None,
                message: raw_body_text(body),
                url: url.to_string(),
            },
        }
    }
}

fn raw_body_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_RAW_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
