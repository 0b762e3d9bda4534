// ============================================================================
// FILTER SERVICE: TCP front end feeding a fixed pool of job workers
// ============================================================================
//
// One handler thread per connection parses the request and submits a `Job`.
// `job_workers` threads pull jobs from a shared channel, run the pipeline on
// their own `Dispatcher`, and answer on the job's single-use reply channel.
// A failing job only closes its own connection.
//
// Requests are bounded before any work is queued: the body by byte count,
// the decoded image by width and height, and every socket read and write by
// a timeout.

use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView, GrayImage};

use crate::error::{FilterError, Result};
use crate::imgproc::{Dispatcher, FilterConfig, PaddingMode, process_image};
use crate::io::{decode_bytes_limited, encode_png};
use crate::logger;
use crate::protocol::{DEFAULT_MAX_BODY_BYTES, read_request};

/// Largest accepted width or height unless configured otherwise.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Per-request resource bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequestLimits {
    /// Encoded image bytes after the config line
    pub max_body_bytes: u64,
    /// Largest decoded width or height
    pub max_dimension: u32,
    /// Applied to each socket read and write
    pub io_timeout: Duration,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            io_timeout: Duration::from_secs(30),
        }
    }
}

/// Service parameters.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    /// Jobs processed concurrently
    pub job_workers: usize,
    /// Dispatcher ceiling inside each job
    pub workers: usize,
    pub padding: PaddingMode,
    pub limits: RequestLimits,
}

/// What a job worker runs on each decoded request.
pub type Processor =
    fn(&DynamicImage, &FilterConfig, PaddingMode, &Dispatcher) -> Result<GrayImage>;

/// The filtering pipeline, as run by [`Server::bind`].
pub fn run_pipeline(
    image: &DynamicImage,
    config: &FilterConfig,
    padding: PaddingMode,
    dispatcher: &Dispatcher,
) -> Result<GrayImage> {
    process_image(image, config, padding, dispatcher).map(|done| done.image)
}

/// One decoded request waiting for a worker.
pub struct Job {
    pub image: DynamicImage,
    pub config: FilterConfig,
    pub reply: mpsc::SyncSender<Result<GrayImage>>,
}

/// Bound listener plus its running job workers.
pub struct Server {
    listener: TcpListener,
    jobs: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    limits: RequestLimits,
}

impl Server {
    /// Bind the listener and start job workers running the filter pipeline.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_with(config, run_pipeline)
    }

    /// Bind the listener and start job workers running `processor`.
    pub fn bind_with(config: &ServerConfig, processor: Processor) -> Result<Self> {
        if config.job_workers == 0 {
            return Err(FilterError::InvalidWorkers(config.job_workers));
        }
        let listener = TcpListener::bind(&config.addr)?;

        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(config.job_workers);
        for id in 1..=config.job_workers {
            let dispatcher = Dispatcher::new(config.workers)?;
            let rx = Arc::clone(&rx);
            let padding = config.padding;
            let handle = std::thread::Builder::new()
                .name(format!("fftblur-job-{}", id))
                .spawn(move || job_worker(id, rx, dispatcher, padding, processor))?;
            workers.push(handle);
        }

        log_info!(
            "service listening on {} ({} job workers x {} threads, {} padding, max {}px, {} byte bodies)",
            listener.local_addr()?,
            config.job_workers,
            config.workers,
            config.padding.name(),
            config.limits.max_dimension,
            config.limits.max_body_bytes
        );

        Ok(Self {
            listener,
            jobs: tx,
            workers,
            limits: config.limits,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub fn serve(self) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    spawn_handler(stream, self.jobs.clone(), self.limits);
                }
                Err(e) => {
                    log_err!("accept failed: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Accept exactly `n` connections, wait for their replies, then stop the
    /// job workers.
    pub fn serve_n(self, n: usize) -> Result<()> {
        let mut handlers = Vec::with_capacity(n);
        while handlers.len() < n {
            match self.listener.accept() {
                Ok((stream, _)) => handlers.push(spawn_handler(stream, self.jobs.clone(), self.limits)),
                Err(e) => {
                    log_err!("accept failed: {}", e);
                }
            }
        }
        for h in handlers.into_iter().flatten() {
            let _ = h.join();
        }
        self.shutdown();
        Ok(())
    }

    /// Close the job queue and join every worker.
    pub fn shutdown(self) {
        drop(self.jobs);
        for w in self.workers {
            let _ = w.join();
        }
    }
}

fn spawn_handler(
    stream: TcpStream,
    jobs: mpsc::Sender<Job>,
    limits: RequestLimits,
) -> Option<JoinHandle<()>> {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown peer".to_string(), |a| a.to_string());
    let spawned = std::thread::Builder::new()
        .name("fftblur-conn".to_string())
        .spawn(move || {
            if let Err(e) = handle_client(stream, &jobs, &limits) {
                log_err!("{}: request failed: {}", peer, e);
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log_err!("could not spawn connection handler: {}", e);
            None
        }
    }
}

/// Read one request, hand it to a job worker, write the PNG reply.
fn handle_client(stream: TcpStream, jobs: &mpsc::Sender<Job>, limits: &RequestLimits) -> Result<()> {
    stream.set_read_timeout(Some(limits.io_timeout))?;
    stream.set_write_timeout(Some(limits.io_timeout))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let (wire, body) = read_request(&mut reader, limits.max_body_bytes)?;
    let config = wire.to_filter_config()?;
    let image = decode_bytes_limited(&body, limits.max_dimension)?;

    let (reply_tx, reply_rx) = mpsc::sync_channel(1);
    jobs.send(Job {
        image,
        config,
        reply: reply_tx,
    })
    .map_err(|_| FilterError::Protocol("service is shutting down".into()))?;

    let result = reply_rx
        .recv()
        .map_err(|_| FilterError::Protocol("job worker dropped the request".into()))??;

    let mut writer = BufWriter::new(&stream);
    encode_png(&result, &mut writer)?;
    writer.flush()?;
    drop(writer);
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

fn job_worker(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    dispatcher: Dispatcher,
    padding: PaddingMode,
    processor: Processor,
) {
    loop {
        // Hold the lock only while waiting for the next job.
        let next = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(job) = next else { break };

        log_info!(
            "worker {}: {} {}x{} started",
            id,
            job.config.mode().action(),
            job.image.width(),
            job.image.height()
        );

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            processor(&job.image, &job.config, padding, &dispatcher)
        }));
        let result = match outcome {
            Ok(Ok(image)) => {
                log_info!(
                    "worker {}: finished in {:.1}ms",
                    id,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                Ok(image)
            }
            Ok(Err(e)) => {
                log_warn!("worker {}: job failed: {}", id, e);
                Err(e)
            }
            Err(payload) => {
                let message = logger::panic_message(payload.as_ref());
                log_err!("worker {}: job panicked: {}", id, message);
                Err(FilterError::TaskFailed { index: id, message })
            }
        };
        // Client may have gone away; nothing left to do then.
        let _ = job.reply.send(result);
    }
    log_info!("worker {}: queue closed, exiting", id);
}
