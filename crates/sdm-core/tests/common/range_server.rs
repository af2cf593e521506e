//! Minimal HTTP/1.1 server with HEAD and Range GET for integration
//! tests.
//!
//! Serves a single static body. Knobs cover the server behaviours the
//! downloader has to survive: missing HEAD, missing/unadvertised range
//! support, digest headers, throttled ranges (split/steal scenarios),
//! dropped connections (premature EOF) and a switchable throttle for
//! stop/resume runs.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If true, HEAD returns 405 (simulates servers that block HEAD).
    pub head_blocked: bool,
    /// If true, GET ignores Range and always returns 200 with the full
    /// body, and Accept-Ranges is never advertised.
    pub no_ranges: bool,
    /// Raw `Digest` header value (e.g. "sha-256=<base64>").
    pub digest: Option<String>,
    /// Raw `Content-MD5` header value.
    pub content_md5: Option<String>,
    /// Raw `Content-Disposition` header value.
    pub content_disposition: Option<String>,
    /// Throttle bodies of ranges starting at or above `.0` to `.1`
    /// bytes/sec (until the control switch turns it off).
    pub throttle_above: Option<(u64, u64)>,
    /// Delay the first body byte for ranges starting at or above `.0`
    /// by `.1` milliseconds.
    pub delay_above: Option<(u64, u64)>,
    /// Close the connection after sending this many body bytes, for the
    /// first `drops` GET requests.
    pub drop_after: Option<u64>,
    pub drops: usize,
}

/// Shared switchboard for a running server.
pub struct ServerControl {
    throttle_off: AtomicBool,
    drops_left: AtomicUsize,
}

impl ServerControl {
    pub fn disable_throttle(&self) {
        self.throttle_off.store(true, Ordering::SeqCst);
    }
}

/// Starts a server in a background thread serving `body`. Returns the
/// base URL ("http://127.0.0.1:PORT/file.bin"). Runs until process exit.
pub fn start(body: Vec<u8>) -> (String, Arc<ServerControl>) {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(
    body: Vec<u8>,
    opts: RangeServerOptions,
) -> (String, Arc<ServerControl>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let control = Arc::new(ServerControl {
        throttle_off: AtomicBool::new(false),
        drops_left: AtomicUsize::new(opts.drops),
    });
    let control_for_server = Arc::clone(&control);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = opts.clone();
            let control = Arc::clone(&control_for_server);
            thread::spawn(move || handle(stream, &body, &opts, &control));
        }
    });
    (format!("http://127.0.0.1:{}/file.bin", port), control)
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    control: &ServerControl,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    let mut extra = String::new();
    if !opts.no_ranges {
        extra.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(d) = &opts.digest {
        extra.push_str(&format!("Digest: {d}\r\n"));
    }
    if let Some(d) = &opts.content_md5 {
        extra.push_str(&format!("Content-MD5: {d}\r\n"));
    }
    if let Some(d) = &opts.content_disposition {
        extra.push_str(&format!("Content-Disposition: {d}\r\n"));
    }

    if method.eq_ignore_ascii_case("HEAD") {
        if opts.head_blocked {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{extra}Connection: close\r\n\r\n"
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let (status, start, end_excl) = match range {
        Some((start, end_incl)) if !opts.no_ranges => {
            let start = start.min(total);
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                let response = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes());
                return;
            }
            ("206 Partial Content", start, end_incl + 1)
        }
        _ => ("200 OK", 0, total),
    };

    let slice = &body[start as usize..end_excl as usize];
    let content_range = format!(
        "Content-Range: bytes {}-{}/{}\r\n",
        start,
        end_excl.saturating_sub(1),
        total
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{content_range}{extra}Connection: close\r\n\r\n",
        slice.len()
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }

    if let Some((min_offset, millis)) = opts.delay_above {
        if start >= min_offset {
            thread::sleep(Duration::from_millis(millis));
        }
    }

    // Probe requests (tiny ranges) never consume a drop.
    let drop_after = opts
        .drop_after
        .filter(|limit| (slice.len() as u64) > *limit)
        .filter(|_| {
            control
                .drops_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    left.checked_sub(1)
                })
                .is_ok()
        });

    let throttle = opts
        .throttle_above
        .filter(|(min_offset, _)| start >= *min_offset)
        .filter(|_| !control.throttle_off.load(Ordering::SeqCst));

    let mut sent = 0u64;
    for chunk in slice.chunks(4096) {
        if let Some(limit) = drop_after {
            if sent >= limit {
                return; // connection closes: premature EOF downstream
            }
        }
        if stream.write_all(chunk).is_err() {
            return;
        }
        sent += chunk.len() as u64;
        if let Some((_, bytes_per_sec)) = throttle {
            if control.throttle_off.load(Ordering::SeqCst) {
                continue;
            }
            let secs = chunk.len() as f64 / bytes_per_sec as f64;
            thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
