//! Client side of the filter service: send one image, receive the result.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;

use image::DynamicImage;

use crate::error::{FilterError, Result};
use crate::io::decode_bytes;
use crate::protocol::{WireConfig, write_request};

/// Send already-encoded image bytes and decode the reply.
pub fn send_bytes(addr: &str, config: &WireConfig, image_bytes: &[u8]) -> Result<DynamicImage> {
    let mut stream = TcpStream::connect(addr)?;
    write_request(&mut stream, config, image_bytes)?;
    stream.flush()?;
    // Half-close so the service sees the end of the image stream.
    stream.shutdown(Shutdown::Write)?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    if reply.is_empty() {
        return Err(FilterError::Protocol(
            "service closed the connection without a result (see its log)".into(),
        ));
    }
    Ok(decode_bytes(&reply)?)
}

/// Send the file at `input` as-is (the service decodes it).
pub fn send_file(addr: &str, config: &WireConfig, input: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(input)?;
    send_bytes(addr, config, &bytes)
}
