//! Feed documents: the redirect answer and the (gzip compressed) sheep list
//!
//! ```xml
//! <query><redir host="http://v2d7c.sheepserver.net/"/></query>
//!
//! <list gen="247" retry="600">
//!   <sheep id="1" type="0" state="done" time="1316548742" size="2100000"
//!          rating="3" first="10" last="20" url="http://.../00247=00001=00010=00020.avi"/>
//! </list>
//! ```

use crate::error::{Error, Result};
use crate::models::{FeedSnapshot, SheepDescriptor};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::borrow::Cow;
use std::io::Read;
use std::time::Duration;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Deserialize)]
struct RedirectDocument {
    redir: RedirectElement,
}

#[derive(Debug, Deserialize)]
struct RedirectElement {
    #[serde(rename = "@host")]
    host: String,
}

#[derive(Debug, Deserialize)]
struct ListDocument {
    #[serde(rename = "@gen")]
    generation: u32,
    #[serde(rename = "@retry")]
    retry: u64,
    #[serde(default)]
    sheep: Vec<SheepElement>,
}

#[derive(Debug, Deserialize)]
struct SheepElement {
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@type", default)]
    kind: u32,
    #[serde(rename = "@state", default)]
    state: String,
    #[serde(rename = "@time", default)]
    time: Option<i64>,
    #[serde(rename = "@size", default)]
    size: u64,
    #[serde(rename = "@rating", default)]
    rating: i32,
    #[serde(rename = "@first")]
    first: u32,
    #[serde(rename = "@last")]
    last: u32,
    #[serde(rename = "@url")]
    url: String,
}

impl SheepElement {
    fn into_descriptor(self, flock: u32) -> SheepDescriptor {
        SheepDescriptor {
            flock,
            id: self.id,
            kind: self.kind,
            state: self.state,
            time: self.time.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            size: self.size,
            rating: self.rating,
            first: self.first,
            last: self.last,
            url: self.url,
        }
    }
}

/// Extracts the list server host from the redirect answer
pub(crate) fn parse_redirect(xml: &str) -> Result<String> {
    let doc: RedirectDocument =
        quick_xml::de::from_str(xml).map_err(|e| Error::feed("Malformed redirect document", e))?;
    let host = doc.redir.host.trim().to_string();
    if host.is_empty() {
        return Err(Error::FeedUnavailable(
            "Redirect document names no host".to_string(),
        ));
    }
    Ok(host)
}

/// Parses a sheep list body, compressed or not, into a snapshot
pub(crate) fn parse_list(body: &[u8]) -> Result<FeedSnapshot> {
    let raw = decompress(body)?;
    let text = std::str::from_utf8(&raw).map_err(|e| Error::feed("Sheep list is not UTF-8", e))?;
    let doc: ListDocument =
        quick_xml::de::from_str(text).map_err(|e| Error::feed("Malformed sheep list", e))?;

    let flock = doc.generation;
    Ok(FeedSnapshot {
        flock,
        retry_after: Duration::from_secs(doc.retry),
        sheep: doc
            .sheep
            .into_iter()
            .map(|element| element.into_descriptor(flock))
            .collect(),
    })
}

fn decompress(body: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(body));
    }
    let mut out = Vec::with_capacity(body.len() * 4);
    GzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(|e| Error::feed("Corrupted gzip sheep list", e))?;
    Ok(Cow::Owned(out))
}
