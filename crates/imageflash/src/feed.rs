//! Local stand-in for the network transport: pushes image files into the raw
//! queue at a fixed pace.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use ingest::RawSender;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Expands `paths` into the files to feed.
///
/// Files are kept as given; directories contribute their image files (by
/// extension, non-recursive) sorted by name.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|candidate| candidate.is_file() && is_image(candidate))
                .collect::<Vec<_>>();
            entries.sort();
            debug!(dir = %path.display(), files = entries.len(), "expanded feed directory");
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSummary {
    pub pushed: u64,
    pub skipped: u64,
}

/// Background thread feeding files into the raw queue.
pub struct Feed {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<FeedSummary>>,
}

impl Feed {
    pub fn spawn(
        files: Vec<PathBuf>,
        sender: RawSender,
        interval: Duration,
        repeat: bool,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        info!(
            files = files.len(),
            interval = ?interval,
            repeat,
            "starting image feed"
        );
        let handle = thread::Builder::new()
            .name("imageflash-feed".into())
            .spawn(move || run_feed(&files, &sender, interval, repeat, &stop_rx))
            .context("failed to spawn feed thread")?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Stops the thread after its current file and returns the totals.
    pub fn stop(mut self) -> FeedSummary {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> FeedSummary {
        self.stop.take();
        let Some(handle) = self.handle.take() else {
            return FeedSummary::default();
        };
        match handle.join() {
            Ok(summary) => {
                info!(
                    pushed = summary.pushed,
                    skipped = summary.skipped,
                    "image feed stopped"
                );
                summary
            }
            Err(_) => {
                warn!("image feed thread panicked");
                FeedSummary::default()
            }
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_feed(
    files: &[PathBuf],
    sender: &RawSender,
    interval: Duration,
    repeat: bool,
    stop: &Receiver<()>,
) -> FeedSummary {
    let mut summary = FeedSummary::default();
    loop {
        let mut pushed_this_pass = 0;
        for path in files {
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable image");
                    summary.skipped += 1;
                    continue;
                }
            };
            let len = bytes.len();
            match sender.push(bytes) {
                Ok(sequence) => {
                    debug!(sequence, bytes = len, path = %path.display(), "fed image");
                    summary.pushed += 1;
                    pushed_this_pass += 1;
                }
                Err(_) => {
                    debug!("raw queue closed; ending feed");
                    return summary;
                }
            }
            if stopped(stop, interval) {
                return summary;
            }
        }
        if !repeat || pushed_this_pass == 0 {
            return summary;
        }
    }
}

/// Sleeps for `interval` unless a stop arrives first.
fn stopped(stop: &Receiver<()>, interval: Duration) -> bool {
    match stop.recv_timeout(interval) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::raw_queue;
    use std::time::Instant;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn directories_expand_to_sorted_images() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.png", b"b");
        touch(dir.path(), "a.JPG", b"a");
        touch(dir.path(), "notes.txt", b"n");
        fs::create_dir(dir.path().join("nested")).unwrap();
        let loose = touch(dir.path(), "loose.bin", b"x");

        let files = collect_files(&[dir.path().to_path_buf(), loose.clone()]).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.JPG"), dir.path().join("b.png"), loose]
        );
    }

    #[test]
    fn feeds_every_readable_file_once() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            touch(dir.path(), "one.png", b"1"),
            dir.path().join("missing.png"),
            touch(dir.path(), "two.png", b"22"),
        ];
        let (sender, _receiver) = raw_queue();

        let feed = Feed::spawn(files, sender.clone(), Duration::ZERO, false).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !feed.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let summary = feed.stop();

        assert_eq!(summary, FeedSummary { pushed: 2, skipped: 1 });
        assert_eq!(sender.pending(), 2);
    }

    #[test]
    fn stop_interrupts_a_looping_feed() {
        let dir = TempDir::new().unwrap();
        let files = vec![touch(dir.path(), "one.png", b"1")];
        let (sender, _receiver) = raw_queue();

        let feed = Feed::spawn(files, sender, Duration::from_secs(60), true).unwrap();
        let started = Instant::now();
        let summary = feed.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(summary.pushed <= 1);
    }

    #[test]
    fn looping_feed_with_no_readable_files_ends() {
        let dir = TempDir::new().unwrap();
        let (sender, _receiver) = raw_queue();
        let feed = Feed::spawn(
            vec![dir.path().join("gone.png")],
            sender,
            Duration::ZERO,
            true,
        )
        .unwrap();
        let summary = feed.stop();
        assert_eq!(summary.pushed, 0);
        assert_eq!(summary.skipped, 1);
    }
}
