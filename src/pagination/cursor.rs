//! Next-link cursor
//!
//! Decodes `odata.nextLink` values into reusable query parameters.

use crate::error::Result;
use crate::types::UrlParams;
use serde_json::Value;
use tracing::warn;
use url::Url;

/// Response fields that may carry the next-link (Service Layer v1 and v2)
pub const NEXT_LINK_FIELDS: [&str; 2] = ["odata.nextLink", "@odata.nextLink"];

/// Base used to resolve relative next-links; only the query survives
const PLACEHOLDER_BASE: &str = "http://next-link.invalid/";

/// Opaque continuation value taken verbatim from a response
pub type PageToken = String;

/// Result of inspecting a response for a next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue {
        /// The raw next-link
        token: PageToken,
        /// Parameters for the next request
        params: UrlParams,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Extracts next-page parameters from Service Layer list responses
#[derive(Debug, Clone)]
pub struct PageCursor {
    fields: Vec<String>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            fields: NEXT_LINK_FIELDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl PageCursor {
    /// Create a cursor reading the standard next-link fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cursor reading a custom field
    pub fn with_field(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
        }
    }

    /// Find the next-link in a response body.
    ///
    /// Field names contain dots, so they are looked up as literal keys.
    pub fn next_token(&self, body: &Value) -> Option<PageToken> {
        self.fields
            .iter()
            .find_map(|field| body.get(field.as_str()).and_then(Value::as_str))
            .filter(|link| !link.trim().is_empty())
            .map(ToString::to_string)
    }

    /// Compute the token and parameters for the request after `body`.
    ///
    /// The returned parameters come only from the next-link and replace
    /// whatever the previous request used. A link equal to `previous_token`
    /// ends paging, since following it would request the same page forever.
    pub fn next_params(
        &self,
        previous_token: Option<&str>,
        body: &Value,
    ) -> Result<(Option<PageToken>, UrlParams)> {
        let Some(token) = self.next_token(body) else {
            return Ok((None, UrlParams::new()));
        };

        if previous_token == Some(token.as_str()) {
            warn!("Next-link repeats the previous page, stopping: {token}");
            return Ok((None, UrlParams::new()));
        }

        let params = decode_next_link(&token)?;
        Ok((Some(token), params))
    }

    /// Same as `next_params`, shaped as a `NextPage`
    pub fn next_page(&self, previous_token: Option<&str>, body: &Value) -> Result<NextPage> {
        match self.next_params(previous_token, body)? {
            (Some(token), params) => Ok(NextPage::Continue { token, params }),
            (None, _) => Ok(NextPage::Done),
        }
    }
}

/// Decode the query string of an absolute or relative link.
///
/// Scheme, host and path are discarded. Repeated keys keep every value.
pub fn decode_next_link(link: &str) -> Result<UrlParams> {
    let url = Url::parse(PLACEHOLDER_BASE)?.join(link.trim())?;
    Ok(url.query_pairs().collect())
}
