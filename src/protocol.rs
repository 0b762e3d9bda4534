//! Request framing shared by the service and the client.
//!
//! A request is one JSON line (`{"action":"blur","sigma":2.0,"k":0.001}\n`)
//! followed by the raw bytes of an encoded image until the client half-closes
//! its write side. The reply is a PNG-encoded grayscale image, or an empty
//! stream if the job failed.

use std::io::{BufRead, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::imgproc::{FilterConfig, FilterMode};

/// Upper bound on the config line so a peer can't make us buffer forever.
pub const MAX_CONFIG_LINE: usize = 4096;

/// Default upper bound on the encoded image that follows the config line.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Filter parameters as they travel on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireConfig {
    /// `"blur"`; anything else deblurs
    pub action: String,
    pub sigma: f64,
    pub k: f64,
}

impl WireConfig {
    pub fn new(mode: FilterMode, sigma: f64, k: f64) -> Self {
        Self {
            action: mode.action().to_string(),
            sigma,
            k,
        }
    }

    /// Validate into the core's [`FilterConfig`].
    pub fn to_filter_config(&self) -> Result<FilterConfig> {
        FilterConfig::new(FilterMode::from_action(&self.action), self.sigma, self.k)
    }
}

impl From<&FilterConfig> for WireConfig {
    fn from(config: &FilterConfig) -> Self {
        Self::new(config.mode(), config.sigma(), config.k())
    }
}

/// Write the config line followed by the image bytes.
pub fn write_request<W: Write>(writer: &mut W, config: &WireConfig, image_bytes: &[u8]) -> Result<()> {
    serde_json::to_writer(&mut *writer, config)?;
    writer.write_all(b"\n")?;
    writer.write_all(image_bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read the config line and the remaining image bytes, at most `max_body` of them.
pub fn read_request<R: BufRead>(reader: &mut R, max_body: u64) -> Result<(WireConfig, Vec<u8>)> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_CONFIG_LINE as u64)
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Err(FilterError::Protocol("connection closed before config line".into()));
    }
    if line.last() != Some(&b'\n') {
        return Err(FilterError::Protocol(format!(
            "config line missing or longer than {} bytes",
            MAX_CONFIG_LINE
        )));
    }
    let config: WireConfig = serde_json::from_slice(&line)?;

    let mut body = Vec::new();
    reader.take(max_body.saturating_add(1)).read_to_end(&mut body)?;
    if body.len() as u64 > max_body {
        return Err(FilterError::Protocol(format!(
            "image data exceeds {} bytes",
            max_body
        )));
    }
    if body.is_empty() {
        return Err(FilterError::Protocol("request carried no image data".into()));
    }
    Ok((config, body))
}
