//! Responses produced without reaching the transport.

use crate::headers::{content_type, HeaderMap};
use crate::listing::DirectoryListing;
use bytes::Bytes;
use http::StatusCode;
use url::Url;

/// A response synthesized locally instead of being fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntheticResponse {
    /// Placeholder returned while a form request is handed to the UI.
    Empty,
    /// Generated listing of a local directory.
    DirectoryListing(DirectoryListing),
}

impl SyntheticResponse {
    pub fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let SyntheticResponse::DirectoryListing(listing) = self {
            headers.insert("Content-Type", content_type::HTML_UTF8);
            headers.insert("Content-Length", listing.html().len().to_string());
        }
        headers
    }

    pub fn body(&self) -> Bytes {
        match self {
            SyntheticResponse::Empty => Bytes::new(),
            SyntheticResponse::DirectoryListing(listing) => Bytes::from(listing.html().to_owned()),
        }
    }
}

/// Why a request was rejected before reaching the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    ContentBlocked,
}

/// Non-network rejection standing in for a blocked request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// URL the page asked for.
    pub url: Url,
    pub reason: RejectReason,
}

impl Rejection {
    /// Bare scheme the page sees instead of the blocked URL.
    pub const PLACEHOLDER: &'static str = "http:";

    pub fn blocked(url: Url) -> Self {
        Self {
            url,
            reason: RejectReason::ContentBlocked,
        }
    }

    /// Rejections never carry a body.
    pub fn body(&self) -> Bytes {
        Bytes::new()
    }
}
