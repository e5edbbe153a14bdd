//! Paginated message reading from Elasticsearch.

use serde::Deserialize;
use serde_json::Value;
use ttylog_core::{Error, JsonReader, Result};

/// Minimum number of messages to request per HTTP round trip.
pub const ES_PAGE_SIZE_MIN: usize = 1;

#[derive(Debug, Deserialize)]
struct EsReply {
    hits: EsHits,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source")]
    source: Value,
}

/// Reads messages from an Elasticsearch search endpoint, page by page.
#[derive(Debug)]
pub struct EsJsonReader {
    client: reqwest::blocking::Client,
    base_url: String,
    query: String,
    page_size: usize,
    page: std::vec::IntoIter<EsHit>,
    from: usize,
    exhausted: bool,
    idx: u64,
}

impl EsJsonReader {
    /// Creates a reader for `base_url` (scheme/host/path only) and a
    /// query-string search expression.
    pub fn new(base_url: &str, query: &str, page_size: usize) -> Result<Self> {
        if !base_url_is_valid(base_url) {
            return Err(Error::InvalidParam("base_url"));
        }
        if page_size < ES_PAGE_SIZE_MIN {
            return Err(Error::InvalidParam("page_size"));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::HttpTransport(e.to_string()))?;
        Ok(EsJsonReader {
            client,
            base_url: base_url.to_owned(),
            query: query.to_owned(),
            page_size,
            page: Vec::new().into_iter(),
            from: 0,
            exhausted: false,
            idx: 0,
        })
    }

    /// Fetches the next result page.
    fn fetch(&mut self) -> Result<()> {
        tracing::debug!(from = self.from, size = self.page_size, "requesting message page");
        let from = self.from.to_string();
        let size = self.page_size.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", self.query.as_str()),
                ("from", from.as_str()),
                ("size", size.as_str()),
                ("sort", "id"),
            ])
            .send()
            .map_err(|e| Error::HttpTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let reply: EsReply = response
            .json()
            .map_err(|e| Error::InvalidHttpReply(e.to_string()))?;

        let hits = reply.hits.hits;
        self.from += hits.len();
        if hits.len() < self.page_size {
            self.exhausted = true;
        }
        self.page = hits.into_iter();
        Ok(())
    }
}

impl JsonReader for EsJsonReader {
    fn read(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(hit) = self.page.next() {
                self.idx += 1;
                return Ok(Some(hit.source));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch()?;
        }
    }

    fn loc(&self) -> u64 {
        self.idx
    }

    fn format_loc(&self, loc: u64) -> String {
        format!("entry {loc}")
    }
}

/// True if the URL carries no query or fragment part of its own.
fn base_url_is_valid(base_url: &str) -> bool {
    !base_url.contains('?') && !base_url.contains('#')
}
