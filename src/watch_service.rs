//! The shared watch engine behind every [`crate::FileSystem::watch`]
//! implementation.
//!
//! Multiplexes a `notify` watcher with the caller's [`CancelToken`] on a
//! single background thread, classifies raw OS events into [`Event`]s, and
//! recovers from backing-buffer overflow by escalating the buffer size and
//! emitting a synthetic rescan event instead of silently losing changes.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use std::sync::Arc;

use crossbeam_channel::{bounded, Select};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::cancel::CancelToken;
use crate::{ErrorStream, Event, EventKind, EventStream, FsError, IgnoreMatcher};

/// Smallest raw-event buffer a watch ever starts with.
pub const MIN_BUFFER: usize = 500;
/// Default raw-event buffer size for a freshly registered watch.
pub const DEFAULT_BUFFER: usize = 2_000;
/// Largest size the adaptive buffer will grow to.
pub const MAX_BUFFER: usize = 10_000;

const OVERFLOW_THRESHOLD: u32 = 3;
const OVERFLOW_WINDOW: Duration = Duration::from_secs(1);

type RawResult = Result<notify::Event, notify::Error>;

/// Counts repeated backing-buffer overflow and decides when to double the
/// buffer (capped at [`MAX_BUFFER`]).
struct OverflowTracker {
    count: u32,
    window_start: Instant,
    buffer: usize,
}

impl OverflowTracker {
    fn new() -> Self {
        OverflowTracker {
            count: 0,
            window_start: Instant::now(),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Record one overflow. Returns `Some(new_buffer)` once
    /// [`OVERFLOW_THRESHOLD`] overflows land inside [`OVERFLOW_WINDOW`].
    fn record(&mut self) -> Option<usize> {
        let now = Instant::now();
        if now.duration_since(self.window_start) > OVERFLOW_WINDOW {
            self.count = 0;
            self.window_start = now;
        }
        self.count += 1;
        if self.count >= OVERFLOW_THRESHOLD && self.buffer < MAX_BUFFER {
            self.buffer = (self.buffer * 2).min(MAX_BUFFER);
            self.count = 0;
            self.window_start = now;
            Some(self.buffer)
        } else {
            None
        }
    }
}

/// Register an OS-level watcher rooted at `root`, sized for `buffer` raw
/// events. The returned `Receiver<()>` fires once whenever the raw channel
/// is full and an event from the OS had to be dropped.
fn arm_watcher(
    root: &Path,
    buffer: usize,
) -> Result<
    (
        RecommendedWatcher,
        crossbeam_channel::Receiver<RawResult>,
        crossbeam_channel::Receiver<()>,
    ),
    FsError,
> {
    let (raw_tx, raw_rx) = bounded::<RawResult>(buffer);
    let (overflow_tx, overflow_rx) = bounded::<()>(1);

    let mut watcher = notify::recommended_watcher(move |res: RawResult| {
        if raw_tx.try_send(res).is_err() {
            let _ = overflow_tx.try_send(());
        }
    })
    .map_err(|err| FsError::io("initialising OS watcher", std::io::Error::other(err)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| match err.kind {
            notify::ErrorKind::MaxFilesWatch => FsError::MaxWatchesReached,
            _ => FsError::io("registering OS watch", std::io::Error::other(err)),
        })?;

    Ok((watcher, raw_rx, overflow_rx))
}

/// What the multiplexing select produced this iteration, computed in a
/// scope where `Select`'s borrows of the receivers have already ended.
enum Dispatch {
    Cancelled,
    RawClosed,
    Raw(RawResult),
    Overflowed,
}

/// Register a watch rooted at `watch_root_abs` (already canonicalised and
/// within-root checked by the caller) and return the event/error streams,
/// backed by a background thread that multiplexes the OS watcher with
/// `cancel`.
///
/// Event paths are always relative to `watch_root_abs`, so resolving a
/// symlinked watch root to its canonical form before calling this (as
/// [`crate::backend::basic::BasicBackend::watch`] does) does not change the
/// shape of the events a caller observes.
pub(crate) fn spawn_watch(
    watch_root_abs: PathBuf,
    ignore: Arc<dyn IgnoreMatcher>,
    cancel: CancelToken,
    ignore_perms: bool,
) -> Result<(EventStream, ErrorStream), FsError> {
    let (event_tx, event_rx) = bounded::<Event>(DEFAULT_BUFFER);
    let (error_tx, error_rx) = bounded::<FsError>(64);

    let (mut watcher, mut raw_rx, mut overflow_rx) = arm_watcher(&watch_root_abs, DEFAULT_BUFFER)?;

    thread::spawn(move || {
        let mut tracker = OverflowTracker::new();

        loop {
            let dispatch = {
                let mut select = Select::new();
                let cancel_idx = select.recv(cancel.receiver());
                let raw_idx = select.recv(&raw_rx);
                let overflow_idx = select.recv(&overflow_rx);

                let oper = select.select();
                let index = oper.index();

                if index == cancel_idx {
                    let _ = oper.recv(cancel.receiver());
                    Dispatch::Cancelled
                } else if index == raw_idx {
                    match oper.recv(&raw_rx) {
                        Ok(msg) => Dispatch::Raw(msg),
                        Err(_) => Dispatch::RawClosed,
                    }
                } else {
                    debug_assert_eq!(index, overflow_idx);
                    let _ = oper.recv(&overflow_rx);
                    Dispatch::Overflowed
                }
            };

            match dispatch {
                Dispatch::Cancelled | Dispatch::RawClosed => break,
                Dispatch::Raw(Ok(raw_event)) => {
                    for event in classify(&watch_root_abs, raw_event, ignore_perms, ignore.as_ref()) {
                        if event_tx.try_send(event).is_err() {
                            rearm_on_overflow(
                                &watch_root_abs,
                                &error_tx,
                                &event_tx,
                                &mut tracker,
                                &mut watcher,
                                &mut raw_rx,
                                &mut overflow_rx,
                            );
                        }
                    }
                }
                Dispatch::Raw(Err(err)) => {
                    let _ = error_tx.try_send(FsError::io("OS watch", std::io::Error::other(err)));
                }
                Dispatch::Overflowed => {
                    rearm_on_overflow(
                        &watch_root_abs,
                        &error_tx,
                        &event_tx,
                        &mut tracker,
                        &mut watcher,
                        &mut raw_rx,
                        &mut overflow_rx,
                    );
                }
            }
        }

        drop(watcher);
    });

    Ok((event_rx, error_rx))
}

/// Report the overflow, emit a rescan marker, and rearm with a bigger
/// buffer once overflows repeat past [`OVERFLOW_THRESHOLD`].
#[allow(clippy::too_many_arguments)]
fn rearm_on_overflow(
    root: &Path,
    error_tx: &crossbeam_channel::Sender<FsError>,
    event_tx: &crossbeam_channel::Sender<Event>,
    tracker: &mut OverflowTracker,
    watcher: &mut RecommendedWatcher,
    raw_rx: &mut crossbeam_channel::Receiver<RawResult>,
    overflow_rx: &mut crossbeam_channel::Receiver<()>,
) {
    let _ = error_tx.try_send(FsError::Overflow { dropped: 1 });
    // A rescan marker (empty path) tells the consumer to re-walk the root
    // rather than trust the dropped slice of incremental events.
    let _ = event_tx.try_send(Event {
        path: PathBuf::new(),
        kind: EventKind::NonRemove,
    });

    if let Some(new_buffer) = tracker.record() {
        tracing::warn!(new_buffer, path = %root.display(), "watch overflowed repeatedly, rearming with a larger buffer");
        match arm_watcher(root, new_buffer) {
            Ok((new_watcher, new_raw_rx, new_overflow_rx)) => {
                *watcher = new_watcher;
                *raw_rx = new_raw_rx;
                *overflow_rx = new_overflow_rx;
            }
            Err(err) => {
                let _ = error_tx.try_send(err);
            }
        }
    }
}

/// Turn one raw `notify` event into zero or more root-relative [`Event`]s,
/// dropping anything the ignore matcher rejects and anything outside
/// `root` (which should never happen for a correctly scoped watch, but a
/// misbehaving platform backend is a log line, not a panic, outside debug
/// builds).
fn classify(
    root: &Path,
    raw: notify::Event,
    ignore_perms: bool,
    ignore: &dyn IgnoreMatcher,
) -> Vec<Event> {
    use notify::event::ModifyKind;
    use notify::EventKind as NotifyKind;

    if ignore_perms
        && matches!(
            raw.kind,
            NotifyKind::Modify(ModifyKind::Metadata(_)) | NotifyKind::Access(_)
        )
    {
        return Vec::new();
    }

    let kind = match raw.kind {
        NotifyKind::Remove(_) => EventKind::Remove,
        _ => EventKind::NonRemove,
    };

    raw.paths
        .into_iter()
        .filter_map(|abs_path| {
            let rel = match abs_path.strip_prefix(root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    debug_assert!(false, "watch event {abs_path:?} outside root {root:?}");
                    tracing::error!(path = %abs_path.display(), "dropping watch event outside root");
                    return None;
                }
            };
            if ignore.should_ignore(&rel) {
                return None;
            }
            Some(Event { path: rel, kind })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_tracker_escalates_after_threshold() {
        let mut tracker = OverflowTracker::new();
        assert!(tracker.record().is_none());
        assert!(tracker.record().is_none());
        let escalated = tracker.record();
        assert_eq!(escalated, Some(DEFAULT_BUFFER * 2));
    }

    #[test]
    fn overflow_tracker_caps_at_max_buffer() {
        let mut tracker = OverflowTracker::new();
        tracker.buffer = MAX_BUFFER;
        tracker.record();
        tracker.record();
        assert_eq!(tracker.record(), None);
        assert_eq!(tracker.buffer, MAX_BUFFER);
    }

    #[test]
    fn classify_maps_remove_kind() {
        let matcher = crate::NoopIgnore;
        let root = Path::new("/watched");
        let raw = notify::Event::new(notify::EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/watched/a.txt"));
        let events = classify(root, raw, false, &matcher);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, PathBuf::from("a.txt"));
        assert_eq!(events[0].kind, EventKind::Remove);
    }

    #[test]
    fn classify_drops_ignored_paths() {
        let matcher = crate::PrefixIgnore::new([PathBuf::from(".git")], true);
        let root = Path::new("/watched");
        let raw = notify::Event::new(notify::EventKind::Any)
            .add_path(PathBuf::from("/watched/.git/HEAD"));
        let events = classify(root, raw, false, &matcher);
        assert!(events.is_empty());
    }

    #[test]
    fn classify_skips_metadata_only_changes_when_ignoring_perms() {
        use notify::event::{MetadataKind, ModifyKind};
        let matcher = crate::NoopIgnore;
        let root = Path::new("/watched");
        let raw = notify::Event::new(notify::EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions,
        )))
        .add_path(PathBuf::from("/watched/a.txt"));
        let events = classify(root, raw, true, &matcher);
        assert!(events.is_empty());
    }
}
