//! Dedicated playback thread with a hard timeout.
//!
//! The engine hands each attempt to the worker and waits on the reply channel
//! for at most the configured timeout. A player that hangs past it is stopped
//! and the attempt abandoned; a reply that arrives afterwards carries an old
//! attempt id and is discarded. Requests are executed one at a time, so the
//! audio device is never driven by two attempts at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use super::PlaybackPort;
use crate::error::PlaybackError;
use crate::prayer::TrackSelector;

/// How a successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Finished,
    /// Interrupted through a [`StopHandle`].
    Cancelled,
    /// Stopped once the requested preview length had played.
    Truncated,
}

struct Request {
    id: u64,
    track: TrackSelector,
    volume: u8,
}

struct Reply {
    id: u64,
    result: Result<(), PlaybackError>,
}

/// Interrupts the playback in progress from any thread.
#[derive(Clone)]
pub struct StopHandle {
    port: Arc<dyn PlaybackPort>,
    cancelled: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.port.stop();
    }
}

pub struct PlaybackWorker {
    port: Arc<dyn PlaybackPort>,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    next_id: u64,
    abandoned_through: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl PlaybackWorker {
    pub fn spawn(port: Arc<dyn PlaybackPort>) -> Self {
        let (request_tx, request_rx) = channel::<Request>();
        let (reply_tx, reply_rx) = channel::<Reply>();
        let abandoned_through = Arc::new(AtomicU64::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let thread_port = Arc::clone(&port);
        let thread_abandoned = Arc::clone(&abandoned_through);
        let thread_cancelled = Arc::clone(&cancelled);
        thread::spawn(move || {
            for request in request_rx {
                if request.id <= thread_abandoned.load(Ordering::SeqCst) {
                    continue;
                }
                let result = if thread_cancelled.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    thread_port.play(request.track, request.volume)
                };
                let reply = Reply {
                    id: request.id,
                    result,
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
        });

        Self {
            port,
            requests: request_tx,
            replies: reply_rx,
            next_id: 0,
            abandoned_through,
            cancelled,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            port: Arc::clone(&self.port),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn port_name(&self) -> &'static str {
        self.port.name()
    }

    /// Run one attempt, waiting at most `timeout` for it to finish.
    pub fn play(
        &mut self,
        track: TrackSelector,
        volume: u8,
        timeout: Duration,
    ) -> Result<PlayOutcome, PlaybackError> {
        self.attempt(track, volume, timeout, None)
    }

    /// Play at most `length` of a track; a longer one is stopped and reported
    /// as [`PlayOutcome::Truncated`]. `timeout` still bounds a hung player.
    pub fn preview(
        &mut self,
        track: TrackSelector,
        volume: u8,
        length: Duration,
        timeout: Duration,
    ) -> Result<PlayOutcome, PlaybackError> {
        if length >= timeout {
            return self.play(track, volume, timeout);
        }
        self.attempt(track, volume, length, Some(PlayOutcome::Truncated))
    }

    /// `on_deadline` replaces the timeout error when the deadline is expected.
    fn attempt(
        &mut self,
        track: TrackSelector,
        volume: u8,
        timeout: Duration,
        on_deadline: Option<PlayOutcome>,
    ) -> Result<PlayOutcome, PlaybackError> {
        self.cancelled.store(false, Ordering::SeqCst);
        self.next_id += 1;
        let id = self.next_id;

        self.requests
            .send(Request { id, track, volume })
            .map_err(|_| PlaybackError::Fatal("playback worker has stopped".into()))?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.id == id => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return Ok(PlayOutcome::Cancelled);
                    }
                    return reply.result.map(|()| PlayOutcome::Finished);
                }
                // Late reply from an abandoned attempt
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => {
                    self.abandoned_through.store(id, Ordering::SeqCst);
                    self.port.stop();
                    if self.cancelled.load(Ordering::SeqCst) {
                        return Ok(PlayOutcome::Cancelled);
                    }
                    return on_deadline.ok_or(PlaybackError::TimedOut(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PlaybackError::Fatal("playback worker has stopped".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockPlaybackPort;
    use crate::prayer::{AdhanVoice, PrayerKind};

    fn track() -> TrackSelector {
        TrackSelector::new(AdhanVoice::Makkah, PrayerKind::Asr)
    }

    #[test]
    fn returns_player_result() {
        let mut port = MockPlaybackPort::new();
        port.expect_play()
            .times(1)
            .returning(|_, _| Err(PlaybackError::Fatal("no file".into())));
        let mut worker = PlaybackWorker::spawn(Arc::new(port));

        let result = worker.play(track(), 80, Duration::from_secs(5));
        assert_eq!(result, Err(PlaybackError::Fatal("no file".into())));
    }

    #[test]
    fn hung_player_times_out_and_is_stopped() {
        let mut port = MockPlaybackPort::new();
        port.expect_play().returning(|_, _| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        port.expect_stop().times(1..).return_const(());
        let mut worker = PlaybackWorker::spawn(Arc::new(port));

        let started = Instant::now();
        let result = worker.play(track(), 80, Duration::from_millis(50));
        assert_eq!(result, Err(PlaybackError::TimedOut(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn preview_stops_a_long_track_at_its_length() {
        let mut port = MockPlaybackPort::new();
        port.expect_play().returning(|_, _| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        port.expect_stop().times(1..).return_const(());
        let mut worker = PlaybackWorker::spawn(Arc::new(port));

        let result = worker.preview(
            track(),
            80,
            Duration::from_millis(50),
            Duration::from_secs(5),
        );
        assert_eq!(result, Ok(PlayOutcome::Truncated));
    }

    #[test]
    fn preview_of_a_short_track_finishes() {
        let mut port = MockPlaybackPort::new();
        port.expect_play().returning(|_, _| Ok(()));
        let mut worker = PlaybackWorker::spawn(Arc::new(port));

        let result = worker.preview(track(), 80, Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(result, Ok(PlayOutcome::Finished));
    }

    #[test]
    fn stale_reply_is_not_mistaken_for_next_attempt() {
        let mut port = MockPlaybackPort::new();
        let mut calls = 0;
        port.expect_play().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                thread::sleep(Duration::from_millis(200));
                Err(PlaybackError::Transient("first".into()))
            } else {
                Ok(())
            }
        });
        port.expect_stop().return_const(());
        let mut worker = PlaybackWorker::spawn(Arc::new(port));

        assert!(worker.play(track(), 80, Duration::from_millis(20)).is_err());
        // Second attempt waits behind the hung first one, then succeeds
        assert_eq!(
            worker.play(track(), 80, Duration::from_secs(2)),
            Ok(PlayOutcome::Finished)
        );
    }

    #[test]
    fn cancel_reports_cancelled() {
        let mut port = MockPlaybackPort::new();
        port.expect_play().returning(|_, _| {
            thread::sleep(Duration::from_millis(100));
            Ok(())
        });
        port.expect_stop().return_const(());
        let mut worker = PlaybackWorker::spawn(Arc::new(port));
        let stop = worker.stop_handle();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stop.cancel();
        });
        let result = worker.play(track(), 80, Duration::from_secs(2));
        canceller.join().unwrap();
        assert_eq!(result, Ok(PlayOutcome::Cancelled));
    }
}
