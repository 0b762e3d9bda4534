// Loopback round trips through the TCP filter service.

use std::io::{Cursor, Read};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use fftblur::FilterError;
use fftblur::client::send_bytes;
use fftblur::imgproc::{Dispatcher, FilterConfig, FilterMode, PaddingMode};
use fftblur::io::encode_png;
use fftblur::protocol::WireConfig;
use fftblur::server::{RequestLimits, Server, ServerConfig, run_pipeline};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};

fn config(job_workers: usize, limits: RequestLimits) -> ServerConfig {
    ServerConfig {
        addr: "127.0.0.1:0".to_string(),
        job_workers,
        workers: 2,
        padding: PaddingMode::Zero,
        limits,
    }
}

fn spawn(server: Server, connections: usize) -> (String, thread::JoinHandle<()>) {
    let addr = server.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || server.serve_n(connections).unwrap());
    (addr, handle)
}

fn start(connections: usize) -> (String, thread::JoinHandle<()>) {
    spawn(Server::bind(&config(2, RequestLimits::default())).unwrap(), connections)
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(w, h, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
    let mut buf = Cursor::new(Vec::new());
    encode_png(&img, &mut buf).unwrap();
    buf.into_inner()
}

fn noisy_png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let img = GrayImage::from_fn(w, h, |_, _| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        Luma([(state >> 56) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    encode_png(&img, &mut buf).unwrap();
    buf.into_inner()
}

#[test]
fn concurrent_requests_get_their_own_results() {
    let (addr, server) = start(4);

    let clients: Vec<_> = [(5, 3), (16, 16), (30, 7), (1, 1)]
        .into_iter()
        .map(|(w, h)| {
            let addr = addr.clone();
            thread::spawn(move || {
                let cfg = WireConfig::new(FilterMode::Blur, 1.5, 0.0);
                let out = send_bytes(&addr, &cfg, &png_bytes(w, h)).unwrap();
                assert_eq!(out.dimensions(), (w, h));
            })
        })
        .collect();

    for c in clients {
        c.join().unwrap();
    }
    server.join().unwrap();
}

#[test]
fn bad_request_only_fails_its_own_connection() {
    let (addr, server) = start(3);

    let bad = WireConfig::new(FilterMode::Deblur, -1.0, 0.001);
    assert!(matches!(
        send_bytes(&addr, &bad, &png_bytes(4, 4)),
        Err(FilterError::Protocol(_))
    ));

    let garbage = WireConfig::new(FilterMode::Deblur, 2.0, 0.001);
    assert!(send_bytes(&addr, &garbage, b"definitely not an image").is_err());

    let good = WireConfig::new(FilterMode::Deblur, 2.0, 0.001);
    let out = send_bytes(&addr, &good, &png_bytes(9, 5)).unwrap();
    assert_eq!(out.dimensions(), (9, 5));

    server.join().unwrap();
}

#[test]
fn oversized_images_are_refused_before_processing() {
    let limits = RequestLimits {
        max_dimension: 64,
        ..RequestLimits::default()
    };
    let (addr, server) = spawn(Server::bind(&config(1, limits)).unwrap(), 3);
    let cfg = WireConfig::new(FilterMode::Blur, 1.0, 0.0);

    assert!(matches!(
        send_bytes(&addr, &cfg, &png_bytes(100, 10)),
        Err(FilterError::Protocol(_))
    ));
    assert!(matches!(
        send_bytes(&addr, &cfg, &png_bytes(10, 65)),
        Err(FilterError::Protocol(_))
    ));
    assert_eq!(send_bytes(&addr, &cfg, &png_bytes(64, 64)).unwrap().dimensions(), (64, 64));

    server.join().unwrap();
}

#[test]
fn oversized_body_is_refused() {
    let limits = RequestLimits {
        max_body_bytes: 512,
        ..RequestLimits::default()
    };
    let (addr, server) = spawn(Server::bind(&config(1, limits)).unwrap(), 2);
    let cfg = WireConfig::new(FilterMode::Blur, 1.0, 0.0);

    let big = noisy_png_bytes(64, 64);
    assert!(big.len() > 512);
    assert!(send_bytes(&addr, &cfg, &big).is_err());

    let small = png_bytes(4, 4);
    assert!(small.len() <= 512);
    assert_eq!(send_bytes(&addr, &cfg, &small).unwrap().dimensions(), (4, 4));

    server.join().unwrap();
}

#[test]
fn silent_client_is_dropped_after_timeout() {
    let limits = RequestLimits {
        io_timeout: Duration::from_millis(200),
        ..RequestLimits::default()
    };
    let (addr, server) = spawn(Server::bind(&config(1, limits)).unwrap(), 1);

    let mut idle = TcpStream::connect(&addr).unwrap();
    idle.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let start = Instant::now();
    let mut reply = Vec::new();
    let _ = idle.read_to_end(&mut reply);
    assert!(reply.is_empty());
    assert!(start.elapsed() < Duration::from_secs(10));

    server.join().unwrap();
}

fn panics_on_width_13(
    image: &DynamicImage,
    config: &FilterConfig,
    padding: PaddingMode,
    dispatcher: &Dispatcher,
) -> fftblur::Result<GrayImage> {
    if image.width() == 13 {
        panic!("cannot handle width 13");
    }
    run_pipeline(image, config, padding, dispatcher)
}

#[test]
fn panicking_job_leaves_the_worker_serving() {
    // A single job worker: later requests only succeed if it survived.
    let server = Server::bind_with(&config(1, RequestLimits::default()), panics_on_width_13).unwrap();
    let (addr, server) = spawn(server, 3);
    let cfg = WireConfig::new(FilterMode::Blur, 1.0, 0.0);

    assert_eq!(send_bytes(&addr, &cfg, &png_bytes(8, 8)).unwrap().dimensions(), (8, 8));
    assert!(matches!(
        send_bytes(&addr, &cfg, &png_bytes(13, 4)),
        Err(FilterError::Protocol(_))
    ));
    assert_eq!(send_bytes(&addr, &cfg, &png_bytes(12, 4)).unwrap().dimensions(), (12, 4));

    server.join().unwrap();
}
