//! FFT-based Gaussian blur and Wiener deblur for grayscale images.
//!
//! The numerical engine lives in [`imgproc`]; the remaining modules are the
//! surfaces around it: a local CLI, a TCP filter service and its client.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod cli;
pub mod client;
pub mod error;
pub mod imgproc;
pub mod io;
pub mod protocol;
pub mod server;
pub mod settings;

pub use error::{FilterError, Result};
