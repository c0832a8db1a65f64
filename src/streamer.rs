use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::{Config, SourceConfig};
use crate::error::{Error, Result};
use crate::gamma::GammaTable;
use crate::layout::Serpentine;
use crate::opc::OpcEncoder;
use crate::sink::open_sink;
use crate::source::{PixelBuffer, TestPattern};

const STATS_INTERVAL: Duration = Duration::from_secs(5);
/// How often the stats thread checks whether it should stop
const STATS_POLL: Duration = Duration::from_millis(50);

/// Where frames come from
pub enum FrameSource {
    Image(PixelBuffer),
    Pattern(TestPattern),
}

impl FrameSource {
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.source {
            SourceConfig::Png { path } => Ok(FrameSource::Image(PixelBuffer::load_png(path)?)),
            SourceConfig::TestPattern => Ok(FrameSource::Pattern(TestPattern::new(
                config.display.width(),
                config.display.height(),
            ))),
        }
    }

    fn next_frame(&mut self) -> &PixelBuffer {
        match self {
            FrameSource::Image(image) => image,
            FrameSource::Pattern(pattern) => pattern.next_frame(),
        }
    }
}

/// Sends frames from one source to one sink at a fixed rate
pub struct Streamer {
    encoder: OpcEncoder,
    sink: Box<dyn Write + Send>,
    source: FrameSource,
    frame_interval: Duration,
    frames_sent: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    debug: bool,
    stats: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl Streamer {
    /// Build encoder, sink and source from `config`
    pub fn new(config: &Config, debug: bool) -> Result<Self> {
        let encoder = OpcEncoder::with_options(
            config.display,
            GammaTable::with_exponent(config.gamma),
            Serpentine,
            config.channel,
            config.crop,
        )?;
        let sink = open_sink(&config.sink)?;
        let source = FrameSource::from_config(config)?;

        Ok(Self::with_parts(encoder, sink, source, config.fps, debug))
    }

    pub fn with_parts(
        encoder: OpcEncoder,
        sink: Box<dyn Write + Send>,
        source: FrameSource,
        fps: u32,
        debug: bool,
    ) -> Self {
        Streamer {
            encoder,
            sink,
            source,
            frame_interval: Duration::from_secs(1) / fps.max(1),
            frames_sent: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(true)),
            debug,
            stats: None,
        }
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Encode and send the next frame
    pub fn send_next(&mut self) -> Result<()> {
        let frame = self.source.next_frame();
        self.encoder.send_frame(frame, &mut self.sink)?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stream until the running flag clears or `max_frames` have been sent.
    ///
    /// A blank frame goes out first so the receiver does not hang up while
    /// the source warms up. Send failures are logged and the frame dropped;
    /// the sink reconnects on the next frame. The stats thread lives only
    /// as long as this call.
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<()> {
        if let Err(e) = self.encoder.send_black(&mut self.sink) {
            warn!("Initial blank frame not sent: {}", e);
        }

        if self.debug {
            self.spawn_stats_thread();
        }

        let result = self.send_loop(max_frames);
        self.stop_stats_thread();

        info!("Stopped after {} frames", self.frames_sent());
        result
    }

    /// [`run`](Self::run), then turn the LEDs off whether or not it failed
    pub fn stream(&mut self, max_frames: Option<u64>) -> Result<()> {
        let result = self.run(max_frames);
        self.shutdown();
        result
    }

    fn send_loop(&mut self, max_frames: Option<u64>) -> Result<()> {
        let mut next_deadline = Instant::now();
        let mut attempted = 0u64;
        while self.running.load(Ordering::Relaxed) {
            if max_frames.is_some_and(|max| attempted >= max) {
                break;
            }

            match self.send_next() {
                Ok(()) => {}
                Err(e @ Error::Transmission(_)) => debug!("Frame dropped: {}", e),
                Err(e) => return Err(e),
            }
            attempted += 1;

            next_deadline += self.frame_interval;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                // fell behind, don't try to catch up
                next_deadline = now;
            }
        }
        Ok(())
    }

    /// Send a black frame to turn the LEDs off
    pub fn shutdown(&mut self) {
        info!("Turning off LEDs...");
        if let Err(e) = self.encoder.send_black(&mut self.sink) {
            error!("Failed to send blank frame: {}", e);
        }
    }

    fn spawn_stats_thread(&mut self) {
        let frames_sent = Arc::clone(&self.frames_sent);
        let running = Arc::clone(&self.running);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut last_sent = 0u64;
            let mut last_report = Instant::now();

            while running.load(Ordering::Relaxed) && !thread_stop.load(Ordering::Relaxed) {
                thread::sleep(STATS_POLL);
                if last_report.elapsed() < STATS_INTERVAL {
                    continue;
                }

                let current = frames_sent.load(Ordering::Relaxed);
                let fps = (current - last_sent) as f64 / last_report.elapsed().as_secs_f64();
                info!("[Stats] Sent: {:.1} fps", fps);
                last_sent = current;
                last_report = Instant::now();
            }
        });

        self.stats = Some((stop, handle));
    }

    fn stop_stats_thread(&mut self) {
        if let Some((stop, handle)) = self.stats.take() {
            stop.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.stop_stats_thread();
    }
}
