//! Per-URL download orchestrator.
//!
//! Lifecycle: `probe` resolves size, file name, range support and
//! advertised digests; `download` (fresh) or `resume` (persisted parts)
//! runs the transfer; `stop` cancels the root context. One worker task
//! runs per live segment; fast finishers steal from slow peers and slow
//! segments split, both through the shared scheduler. When every
//! segment is on disk the compile phase merges the part files into the
//! destination and the digest is validated.

mod error;
mod handlers;
mod journal;
mod setup;

pub use error::DownloadError;
pub use handlers::{Handlers, NoopHandlers};
pub use journal::{Journal, JournalingHandlers};
pub use setup::{check_destination, validate_dir};

use crate::checksum::{self, ChecksumResult, ExpectedChecksum};
use crate::compiler::{self, CompileSource};
use crate::config::{ChecksumSection, SdmConfig};
use crate::http;
use crate::part::{gen_part_hash, Part, PartError, PartInit, PartStatus};
use crate::probe::{self, ProbeResult};
use crate::retry::{self, RetryConfig};
use crate::scheduler::{effective_part_count, plan_segments, Scheduler, SlowAction};
use crate::storage::DestFile;
use reqwest::header::RANGE;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Reserved hash naming the download as a whole. Never a segment hash
/// (those are 4 hex chars).
pub const MAIN_HASH: &str = "main";

/// Part files are `<prefix><part-hash>` inside the per-download dir.
pub const PART_FILE_PREFIX: &str = "part.";

const JOURNAL_FILE: &str = "journal.log";

/// Split/steal budget when the caller did not pin `max_segments`.
const DEFAULT_SEGMENT_BUDGET: usize = 16;

/// The speed probe reads at most this much of the primary request.
const PROBE_TARGET_BYTES: u64 = 128 * 1024;
/// ...and gives up measuring after this long on a slow link.
const PROBE_MAX_TIME: std::time::Duration = std::time::Duration::from_millis(700);

/// Tuning for one download, normally derived from [`SdmConfig`].
#[derive(Debug, Clone)]
pub struct DownloadOpts {
    /// Destination directory.
    pub dir: PathBuf,
    /// Overrides the probed file name.
    pub file_name: Option<String>,
    pub overwrite: bool,
    /// Request headers, re-sent on resume.
    pub headers: Vec<(String, String)>,
    pub max_connections: usize,
    /// 0 = adaptive initial count with the default split budget.
    pub max_segments: usize,
    pub max_file_size: i64,
    pub chunk_bytes: usize,
    pub expected_speed: u64,
    /// Per-segment rate limit in bytes/sec; 0 = unlimited.
    pub speed_limit: u64,
    pub retry: RetryConfig,
    pub checksum: ChecksumSection,
    /// Root for per-download part directories (keyed by item hash).
    pub parts_root: PathBuf,
}

impl DownloadOpts {
    pub fn from_config(cfg: &SdmConfig, dir: PathBuf, parts_root: PathBuf) -> Self {
        Self {
            dir,
            file_name: None,
            overwrite: false,
            headers: Vec::new(),
            max_connections: cfg.max_connections,
            max_segments: cfg.max_segments,
            max_file_size: cfg.max_file_size,
            chunk_bytes: cfg.chunk_bytes,
            expected_speed: cfg.expected_speed,
            speed_limit: 0,
            retry: RetryConfig::from(&cfg.retry),
            checksum: cfg.checksum,
            parts_root,
        }
    }
}

/// What this server supports for this URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub parallel: bool,
    pub resumable: bool,
}

/// Persisted segment state handed back to `resume`.
#[derive(Debug, Clone)]
pub struct ResumePart {
    pub hash: String,
    pub final_offset: u64,
    pub compiled: bool,
}

#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    url: String,
    opts: DownloadOpts,
    cancel: CancellationToken,
    probed: Mutex<Option<ProbeResult>>,
}

impl Downloader {
    pub fn new(client: reqwest::Client, url: String, opts: DownloadOpts) -> Self {
        Self {
            client,
            url,
            opts,
            cancel: CancellationToken::new(),
            probed: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches download metadata. Must complete before `download` or
    /// `resume`.
    pub async fn probe(&self) -> Result<ProbeResult, DownloadError> {
        let result = probe::probe(
            &self.client,
            &self.url,
            &self.opts.headers,
            self.opts.max_file_size,
        )
        .await?;
        tracing::info!(
            url = %self.url,
            size = result.content_length,
            resumable = result.resumable,
            digests = result.checksums.len(),
            file = %result.file_name,
            "probe complete"
        );
        *self.probed.lock().unwrap() = Some(result.clone());
        Ok(result)
    }

    pub fn capabilities(&self) -> Result<Capabilities, DownloadError> {
        let probed = self.probe_result()?;
        Ok(Capabilities {
            parallel: probed.resumable,
            resumable: probed.resumable,
        })
    }

    /// Resolved destination file name (override wins over probe).
    pub fn file_name(&self) -> Result<String, DownloadError> {
        let probed = self.probe_result()?;
        Ok(self
            .opts
            .file_name
            .clone()
            .unwrap_or(probed.file_name))
    }

    /// Full destination path.
    pub fn absolute_location(&self) -> Result<PathBuf, DownloadError> {
        Ok(self.opts.dir.join(self.file_name()?))
    }

    /// Stable 128-bit identifier for this URL + destination.
    pub fn item_hash(&self) -> Result<String, DownloadError> {
        Ok(checksum::item_hash(&self.url, &self.absolute_location()?))
    }

    /// Cancels the root context. Non-blocking; in-flight reads unwind on
    /// their next suspension point and nothing is retried afterwards.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn probe_result(&self) -> Result<ProbeResult, DownloadError> {
        self.probed
            .lock()
            .unwrap()
            .clone()
            .ok_or(DownloadError::ProbeRequired)
    }

    /// Starts a fresh transfer.
    pub async fn download(&self, user_handlers: Arc<dyn Handlers>) -> Result<(), DownloadError> {
        let probed = self.probe_result()?;
        let (ctx, mut rx) = self.setup(&probed, user_handlers, &BTreeMap::new())?;

        let mut join_set = JoinSet::new();
        let total = probed.content_length;

        if !probed.resumable {
            // Single segment; no Range header games on servers that do
            // not advertise byte ranges.
            let end = if total > 0 { total - 1 } else { -1 };
            ctx.sched.note_initial(1);
            let part = ctx.new_part(0, end, 0);
            ctx.events.spawn_part(&part.hash, 0, end);
            join_set.spawn(drive_part(part, Arc::clone(&ctx), None));
        } else {
            let total = total as u64;
            let hash0 = ctx.reserve_hash();
            let part0_path = ctx.part_path(&hash0);
            let (mut primary_body, probe_bytes, speed) =
                match self.speed_probe(&ctx, total, &part0_path).await {
                    Ok(v) => v,
                    Err(DownloadError::Stopped) => {
                        ctx.events.download_stopped();
                        return Err(DownloadError::Stopped);
                    }
                    Err(e) => return Err(e),
                };
            let count = effective_part_count(
                speed,
                self.opts.max_segments,
                self.opts.max_connections,
                total,
            );
            let layout = layout_after_probe(total, count, probe_bytes);
            tracing::debug!(
                speed_bps = speed,
                probed_bytes = probe_bytes,
                segments = layout.len(),
                "initial segment layout"
            );
            ctx.sched.note_initial(layout.len());

            for (i, (ioff, foff)) in layout.iter().copied().enumerate() {
                let (part, body) = if i == 0 {
                    let part = ctx.adopt_part(hash0.clone(), ioff, foff as i64, probe_bytes);
                    (part, primary_body.take())
                } else {
                    (ctx.new_part(ioff, foff as i64, 0), None)
                };
                ctx.events.spawn_part(&part.hash, ioff, foff as i64);
                if part.read.load(Ordering::Relaxed) > 0 {
                    ctx.events
                        .download_progress(&part.hash, part.read.load(Ordering::Relaxed));
                }
                join_set.spawn(drive_part(part, Arc::clone(&ctx), body));
            }
        }

        self.supervise_and_finish(&ctx, &mut rx, join_set, Vec::new(), &probed)
            .await
    }

    /// Restarts from persisted segment state.
    pub async fn resume(
        &self,
        parts: BTreeMap<u64, ResumePart>,
        user_handlers: Arc<dyn Handlers>,
    ) -> Result<(), DownloadError> {
        if parts.is_empty() {
            // Nothing was persisted before the interruption.
            return self.download(user_handlers).await;
        }
        let probed = self.probe_result()?;
        let (ctx, mut rx) = self.setup(&probed, user_handlers, &parts)?;

        let mut join_set = JoinSet::new();
        let mut already_compiled = Vec::new();

        for (ioff, rp) in &parts {
            if rp.compiled {
                already_compiled.push(CompileSource {
                    hash: rp.hash.clone(),
                    ioff: *ioff,
                    foff: rp.final_offset,
                    path: ctx.part_path(&rp.hash),
                    compiled: true,
                });
                continue;
            }
            let path = ctx.part_path(&rp.hash);
            let want = rp.final_offset - ioff + 1;
            let already = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0).min(want);
            let part = ctx.adopt_part(rp.hash.clone(), *ioff, rp.final_offset as i64, already);
            ctx.events
                .spawn_part(&part.hash, *ioff, rp.final_offset as i64);
            if already > 0 {
                ctx.events.download_progress(&part.hash, already);
            }
            join_set.spawn(drive_part(part, Arc::clone(&ctx), None));
        }

        self.supervise_and_finish(&ctx, &mut rx, join_set, already_compiled, &probed)
            .await
    }

    fn setup(
        &self,
        probed: &ProbeResult,
        user_handlers: Arc<dyn Handlers>,
        resumed: &BTreeMap<u64, ResumePart>,
    ) -> Result<(Arc<WorkerCtx>, mpsc::UnboundedReceiver<SpawnReq>), DownloadError> {
        setup::validate_dir(&self.opts.dir)?;
        let dest_path = self.absolute_location()?;
        if resumed.is_empty() {
            setup::check_destination(&dest_path, self.opts.overwrite)?;
        }
        let item_hash = self.item_hash()?;
        let part_dir = self.opts.parts_root.join(&item_hash);
        std::fs::create_dir_all(&part_dir)?;

        let dest = if resumed.is_empty() || !dest_path.exists() {
            DestFile::create(&dest_path, probed.content_length.max(0) as u64)?
        } else {
            DestFile::open_existing(&dest_path)?
        };

        let journal = Journal::open(&part_dir.join(JOURNAL_FILE))?;
        let events: Arc<dyn Handlers> = Arc::new(JournalingHandlers::new(user_handlers, journal));

        // Custom headers do not cross an origin boundary.
        let headers = match url::Url::parse(&self.url) {
            Ok(original) if !http::same_origin(&original, &probed.final_url) => {
                http::strip_unsafe_cross_origin(&self.opts.headers)
            }
            _ => self.opts.headers.clone(),
        };

        let segment_budget = if self.opts.max_segments > 0 {
            self.opts.max_segments
        } else {
            DEFAULT_SEGMENT_BUDGET
        };
        let sched = Scheduler::new(
            segment_budget,
            self.opts.max_connections,
            probed.content_length.max(0) as u64,
        );

        let taken: HashSet<String> = resumed.values().map(|p| p.hash.clone()).collect();
        let active = resumed.values().filter(|p| !p.compiled).count();
        if active > 0 {
            sched.note_initial(active);
        }

        let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(WorkerCtx {
            client: self.client.clone(),
            url: self.url.clone(),
            headers,
            chunk_bytes: self.opts.chunk_bytes,
            expected_speed: self.opts.expected_speed,
            speed_limit: self.opts.speed_limit,
            retry: self.opts.retry.clone(),
            force_no_range: !probed.resumable,
            cancel: self.cancel.child_token(),
            events,
            sched,
            spawn_tx,
            dest,
            part_dir,
            taken: Mutex::new(taken),
            parts: Mutex::new(Vec::new()),
        });
        Ok((ctx, spawn_rx))
    }

    /// Primary request: read the first chunks, measure bytes/sec, and
    /// hand the still-open body to segment 0.
    async fn speed_probe(
        &self,
        ctx: &Arc<WorkerCtx>,
        total: u64,
        part0_path: &std::path::Path,
    ) -> Result<(OptionalBody, u64, u64), DownloadError> {
        let mut req = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes=0-{}", total - 1));
        for (name, value) in &ctx.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let mut resp = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(DownloadError::Stopped),
            r = req.send() => r?,
        };
        let status = resp.status().as_u16();
        if status != 206 && status != 200 {
            return Err(DownloadError::Part {
                hash: MAIN_HASH.to_string(),
                source: PartError::UnexpectedStatus(status),
            });
        }

        let mut file = tokio::fs::File::create(part0_path).await?;
        let started = Instant::now();
        let mut bytes = 0u64;
        while bytes < PROBE_TARGET_BYTES && bytes < total && started.elapsed() < PROBE_MAX_TIME {
            let chunk = tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(DownloadError::Stopped),
                c = resp.chunk() => c,
            };
            match chunk {
                Ok(Some(data)) => {
                    file.write_all(&data).await?;
                    bytes += data.len() as u64;
                }
                // EOF or a flaky read: the worker's retry layer picks it
                // up from here.
                Ok(None) | Err(_) => break,
            }
        }
        file.flush().await?;

        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        let speed = (bytes as f64 / elapsed) as u64;
        Ok((OptionalBody::new(resp), bytes, speed))
    }

    async fn supervise_and_finish(
        &self,
        ctx: &Arc<WorkerCtx>,
        rx: &mut mpsc::UnboundedReceiver<SpawnReq>,
        mut join_set: JoinSet<Result<(), DownloadError>>,
        already_compiled: Vec<CompileSource>,
        probed: &ProbeResult,
    ) -> Result<(), DownloadError> {
        let mut first_err: Option<DownloadError> = None;

        loop {
            tokio::select! {
                biased;
                Some(req) = rx.recv() => {
                    join_set.spawn(drive_part(req.part, Arc::clone(ctx), req.body));
                }
                joined = join_set.join_next() => match joined {
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        if first_err.is_none() && !matches!(e, DownloadError::Stopped) {
                            ctx.cancel.cancel();
                            first_err = Some(e);
                        }
                    }
                    Some(Err(join_err)) => {
                        if first_err.is_none() {
                            ctx.cancel.cancel();
                            first_err = Some(DownloadError::Io(std::io::Error::new(
                                std::io::ErrorKind::Other,
                                join_err.to_string(),
                            )));
                        }
                    }
                    None => {
                        // A finisher may have queued a steal just before
                        // the last worker returned.
                        match rx.try_recv() {
                            Ok(req) => {
                                join_set.spawn(drive_part(req.part, Arc::clone(ctx), req.body));
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            ctx.events.download_stopped();
            return Err(DownloadError::Stopped);
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        match self.finish(ctx, already_compiled, probed).await {
            // Cancelled mid-compile; the merge aborts and state persists.
            Err(DownloadError::Stopped) => {
                ctx.events.download_stopped();
                Err(DownloadError::Stopped)
            }
            other => other,
        }
    }

    /// Compile phase plus digest validation and terminal events.
    async fn finish(
        &self,
        ctx: &Arc<WorkerCtx>,
        already_compiled: Vec<CompileSource>,
        probed: &ProbeResult,
    ) -> Result<(), DownloadError> {
        let mut sources = already_compiled;
        for part in ctx.parts.lock().unwrap().iter() {
            let read = part.read.load(Ordering::Acquire);
            let end = part.end.load(Ordering::Acquire);
            let foff = if end >= 0 {
                end as u64
            } else if read > 0 {
                part.offset + read - 1
            } else {
                continue;
            };
            sources.push(CompileSource {
                hash: part.hash.clone(),
                ioff: part.offset,
                foff,
                path: part.part_path().clone(),
                compiled: false,
            });
        }
        sources.sort_by_key(|s| s.ioff);

        let expected: Option<ExpectedChecksum> = if self.opts.checksum.enabled {
            checksum::select_strongest(&probed.checksums).cloned()
        } else {
            None
        };
        let algorithm = expected.as_ref().map(|e| e.algorithm);

        let dest = ctx.dest.clone();
        let chunk_bytes = self.opts.chunk_bytes;
        let events = Arc::clone(&ctx.events);
        let cancel = ctx.cancel.clone();
        let src = sources.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            compiler::compile(&src, &dest, chunk_bytes, algorithm, &events, &cancel)
        })
        .await
        .map_err(|e| {
            DownloadError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })??;

        ctx.events.compile_complete(MAIN_HASH, outcome.total);

        if let (Some(expected), Some(digest)) = (expected, outcome.digest) {
            let result = ChecksumResult::compare(&expected, &digest);
            ctx.events.checksum_validation(&result);
            if !result.matched {
                tracing::warn!(
                    algorithm = %result.algorithm,
                    expected = %result.expected,
                    actual = %result.actual,
                    "digest mismatch"
                );
                if self.opts.checksum.fail_on_mismatch {
                    // The destination file is kept for inspection.
                    return Err(DownloadError::ChecksumMismatch {
                        algorithm: result.algorithm,
                        expected: result.expected,
                        actual: result.actual,
                    });
                }
            }
        }

        ctx.events.download_complete(MAIN_HASH, outcome.total);

        // Part files are gone; drop the journal and the directory.
        let _ = std::fs::remove_file(ctx.part_dir.join(JOURNAL_FILE));
        let _ = std::fs::remove_dir(&ctx.part_dir);
        Ok(())
    }
}

/// Wrapper so the initial body can move out of the layout loop once.
struct OptionalBody(Option<reqwest::Response>);

impl OptionalBody {
    fn new(resp: reqwest::Response) -> Self {
        Self(Some(resp))
    }

    fn take(&mut self) -> Option<reqwest::Response> {
        self.0.take()
    }
}

struct SpawnReq {
    part: Arc<Part>,
    body: Option<reqwest::Response>,
}

/// Shared state every segment worker runs against.
struct WorkerCtx {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
    chunk_bytes: usize,
    expected_speed: u64,
    speed_limit: u64,
    retry: RetryConfig,
    force_no_range: bool,
    cancel: CancellationToken,
    events: Arc<dyn Handlers>,
    sched: Scheduler,
    spawn_tx: mpsc::UnboundedSender<SpawnReq>,
    dest: DestFile,
    part_dir: PathBuf,
    taken: Mutex<HashSet<String>>,
    /// Every Part ever spawned; the compile phase reads ranges from here.
    parts: Mutex<Vec<Arc<Part>>>,
}

impl WorkerCtx {
    fn reserve_hash(&self) -> String {
        let mut taken = self.taken.lock().unwrap();
        let hash = gen_part_hash(&taken);
        taken.insert(hash.clone());
        hash
    }

    fn part_path(&self, hash: &str) -> PathBuf {
        self.part_dir.join(format!("{PART_FILE_PREFIX}{hash}"))
    }

    /// Builds and registers a Part under a pre-reserved hash. The part
    /// file is created up front so persisted segment state never refers
    /// to a file that does not exist yet.
    fn adopt_part(&self, hash: String, ioff: u64, foff: i64, already_read: u64) -> Arc<Part> {
        if let Err(e) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.part_path(&hash))
        {
            tracing::warn!(part = %hash, error = %e, "part file creation failed");
        }
        let part = Arc::new(Part::new(PartInit {
            hash: hash.clone(),
            offset: ioff,
            end: foff,
            url: self.url.clone(),
            client: self.client.clone(),
            headers: self.headers.clone(),
            chunk_bytes: self.chunk_bytes,
            part_path: self.part_path(&hash),
            main_file: self.dest.clone(),
            speed_limit: self.speed_limit,
            cancel: self.cancel.clone(),
            events: Arc::clone(&self.events),
        }));
        if already_read > 0 {
            part.set_already_read(already_read);
        }
        self.taken.lock().unwrap().insert(hash);
        self.sched.register(&part);
        self.parts.lock().unwrap().push(Arc::clone(&part));
        part
    }

    fn new_part(&self, ioff: u64, foff: i64, already_read: u64) -> Arc<Part> {
        let hash = self.reserve_hash();
        self.adopt_part(hash, ioff, foff, already_read)
    }

    /// Queues a freshly created segment for the supervisor to run.
    fn spawn(&self, part: Arc<Part>) {
        let _ = self.spawn_tx.send(SpawnReq { part, body: None });
    }
}

/// One segment worker: retry loop, slow handling, completion steal.
async fn drive_part(
    part: Arc<Part>,
    ctx: Arc<WorkerCtx>,
    initial_body: Option<reqwest::Response>,
) -> Result<(), DownloadError> {
    let started = Instant::now();
    let mut reused = initial_body;

    loop {
        let mut handed = reused.take();
        let attempt = retry::run_with_retry(
            &ctx.retry,
            &ctx.cancel,
            &part.hash,
            &ctx.events,
            |_| Arc::clone(&part).run_arc(ctx.expected_speed, ctx.force_no_range, handed.take()),
        )
        .await;

        match attempt {
            Ok(PartStatus::Complete { .. }) => break,
            Ok(PartStatus::Slow { body }) => {
                match ctx.sched.on_slow(&part) {
                    SlowAction::Split { new_ioff, new_foff } => {
                        let new_part = ctx.new_part(new_ioff, new_foff, 0);
                        // New segment first, then the narrowed old end:
                        // a crash between the two persists an overlap
                        // (harmless on resume), never a gap.
                        ctx.events.spawn_part(&new_part.hash, new_ioff, new_foff);
                        ctx.events.respawn_part(
                            &part.hash,
                            new_ioff,
                            part.end.load(Ordering::Acquire),
                            new_foff,
                        );
                        ctx.spawn(new_part);
                    }
                    SlowAction::Repeat => part.set_repeated(),
                    SlowAction::Continue => part.disable_slow_checks(),
                }
                reused = Some(body);
            }
            Err(PartError::Cancelled) => {
                ctx.sched.deregister(&part.hash);
                return Err(DownloadError::Stopped);
            }
            Err(e) => {
                ctx.sched.deregister(&part.hash);
                let err = DownloadError::Part {
                    hash: part.hash.clone(),
                    source: e,
                };
                ctx.events.error(&part.hash, &err);
                return Err(err);
            }
        }
    }

    let bytes = part.read.load(Ordering::Acquire);
    ctx.sched.deregister(&part.hash);
    ctx.events.download_complete(&part.hash, bytes);

    if let Some(grant) = ctx.sched.on_complete(bytes, started.elapsed()) {
        let new_part = ctx.new_part(grant.ioff, grant.foff, 0);
        ctx.events.spawn_part(&new_part.hash, grant.ioff, grant.foff);
        ctx.events
            .work_steal(&new_part.hash, &grant.victim_hash, grant.ioff, grant.foff);
        tracing::debug!(
            stealer = %new_part.hash,
            victim = %grant.victim_hash,
            ioff = grant.ioff,
            foff = grant.foff,
            "work steal"
        );
        ctx.spawn(new_part);
    }

    Ok(())
}

/// Full layout after the speed probe: segment 0 keeps everything the
/// probe already read (it may overshoot its planned share on tiny
/// files); the remainder is split evenly across the other segments.
fn layout_after_probe(total: u64, parts: usize, probe_bytes: u64) -> Vec<(u64, u64)> {
    let base = plan_segments(total, parts);
    let planned_end = base.first().map(|s| s.1).unwrap_or(total - 1);
    let seg0_end = planned_end.max(probe_bytes.saturating_sub(1));
    if seg0_end >= total - 1 || parts <= 1 {
        return vec![(0, total - 1)];
    }
    let remaining = total - (seg0_end + 1);
    let mut out = vec![(0, seg0_end)];
    for (s, e) in plan_segments(remaining, parts - 1) {
        out.push((s + seg0_end + 1, e + seg0_end + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_plain_plan_without_overshoot() {
        let layout = layout_after_probe(1000, 4, 0);
        assert_eq!(layout, plan_segments(1000, 4));
    }

    #[test]
    fn layout_grows_segment_zero_after_overshoot() {
        let layout = layout_after_probe(1000, 4, 400);
        assert_eq!(layout[0], (0, 399));
        assert_eq!(layout.last().unwrap().1, 999);
        for w in layout.windows(2) {
            assert_eq!(w[0].1 + 1, w[1].0);
        }
    }

    #[test]
    fn layout_collapses_when_probe_ate_everything() {
        assert_eq!(layout_after_probe(100, 4, 100), vec![(0, 99)]);
        assert_eq!(layout_after_probe(100, 4, 99), vec![(0, 99)]);
    }

    #[test]
    fn layout_single_part() {
        assert_eq!(layout_after_probe(100, 1, 10), vec![(0, 99)]);
    }
}
