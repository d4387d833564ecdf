use crate::core::capture_source::FrameSource;
use crate::core::clock::{Clock, StopSignal};
use crate::core::session::{LoopReport, SessionId};
use crate::core::video_writer::VideoWriter;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Consecutive empty frames tolerated before the device is considered gone.
pub const MAX_CONSECUTIVE_EMPTY_FRAMES: u32 = 5;

/// Everything one producer loop owns for the lifetime of a session.
pub struct ProducerContext {
    pub session_id: SessionId,
    pub fps: u32,
    pub source: Box<dyn FrameSource>,
    pub writer: Box<dyn VideoWriter>,
    pub clock: Arc<dyn Clock>,
    pub stop: StopSignal,
    /// Fired when the loop ends on its own so the engine can finalize the session.
    pub fault_tx: Option<oneshot::Sender<SessionId>>,
}

/// Pulls frames at a fixed cadence until `stop` fires or capture fails,
/// then closes the writer. Blocking; run it on a dedicated thread.
///
/// Frame `n` is due at `start + n / fps`. A slow frame shortens the next
/// sleep instead of pushing every later frame back, and when the loop falls
/// more than a whole interval behind it skips the missed slots rather than
/// bursting to catch up.
pub fn run_producer_loop(ctx: ProducerContext) -> LoopReport {
    let ProducerContext {
        session_id,
        fps,
        mut source,
        mut writer,
        clock,
        stop,
        fault_tx,
    } = ctx;

    let source_name = source.name();
    let interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let interval_secs = interval.as_secs_f64();
    let origin = clock.monotonic();
    let progress_every = (fps as u64 * 5).max(1);

    let mut tick: u64 = 0;
    let mut frames_written: u64 = 0;
    let mut skipped_slots: u64 = 0;
    let mut empty_streak: u32 = 0;
    let mut abort_reason: Option<String> = None;

    info!("🎬 [{}] Producer loop started for '{}' at {} fps.", session_id, source_name, fps);

    loop {
        if stop.is_triggered() {
            debug!("[{}] Stop signal observed at tick {}.", session_id, tick);
            break;
        }

        match source.next_frame() {
            Ok(frame) => {
                empty_streak = 0;
                if let Err(e) = writer.write(&frame) {
                    error!("❌ [{}] Write failed after {} frames: {}", session_id, frames_written, e);
                    abort_reason = Some(e.to_string());
                    break;
                }
                frames_written += 1;
                if frames_written % progress_every == 0 {
                    debug!("  [{}] Recorded {} frames ({} slots skipped).", session_id, frames_written, skipped_slots);
                }
            }
            Err(e) if e.is_transient() => {
                empty_streak += 1;
                warn!("👻 [{}] {} (streak {}/{}).", session_id, e, empty_streak, MAX_CONSECUTIVE_EMPTY_FRAMES);
                if empty_streak > MAX_CONSECUTIVE_EMPTY_FRAMES {
                    let msg = format!(
                        "'{}' returned {} consecutive empty frames",
                        source_name, empty_streak
                    );
                    error!("❌ [{}] Aborting: {}", session_id, msg);
                    abort_reason = Some(msg);
                    break;
                }
            }
            Err(e) => {
                error!("🚫 [{}] Frame source failed: {}", session_id, e);
                abort_reason = Some(e.to_string());
                break;
            }
        }

        tick += 1;
        let deadline = origin + interval.mul_f64(tick as f64);
        let now = clock.monotonic();
        if deadline > now {
            if clock.sleep_or_stop(deadline - now, &stop) {
                debug!("[{}] Stop signal observed while waiting for tick {}.", session_id, tick);
                break;
            }
        } else {
            let behind = ((now - deadline).as_secs_f64() / interval_secs) as u64;
            if behind > 0 {
                skipped_slots += behind;
                tick += behind;
                debug!("  [{}] Fell {} slot(s) behind; re-anchoring to the frame grid.", session_id, behind);
            }
        }
    }

    let ended_at_monotonic = clock.monotonic();

    let file_size_bytes = match writer.close() {
        Ok(size) => size,
        Err(e) => {
            error!("❌ [{}] Failed to finalize video file: {}", session_id, e);
            abort_reason.get_or_insert_with(|| e.to_string());
            0
        }
    };

    info!(
        "🏁 [{}] Producer loop finished: {} frames, {} bytes, {} slots skipped{}.",
        session_id,
        frames_written,
        file_size_bytes,
        skipped_slots,
        if abort_reason.is_some() { ", aborted" } else { "" }
    );

    if abort_reason.is_some() {
        if let Some(tx) = fault_tx {
            // The receiver is gone if the session was already stopped.
            let _ = tx.send(session_id);
        }
    }

    LoopReport {
        frames_written,
        file_size_bytes,
        ended_at_monotonic,
        abort_reason,
    }
}
