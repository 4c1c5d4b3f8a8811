//! Frame scheduling support.
//!
//! The machine runs one frame per [`Lviv::run_frame`](crate::Lviv::run_frame)
//! call and reports what the host should do with it: play the audio,
//! present the framebuffer, wait [`FrameReport::delay`] before the next
//! frame. File acquisition happens off the emulation thread as a one-shot
//! [`LoadTask`]; while a task is outstanding the machine is suspended.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::error::LoadError;
use crate::video::RenderStats;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Running,
    /// Frames still present video and audio but the CPU does not run.
    Paused,
    /// Waiting on a file task; frames do nothing but poll it.
    Suspended,
}

impl RunState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Suspended => "suspended",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// CPU cycles executed.
    pub cycles: u32,
    /// Flushed beeper samples, mono at 44.1 kHz.
    pub audio: Vec<f32>,
    /// `None` when nothing was rendered (suspended frames).
    pub render: Option<RenderStats>,
    /// PNG bytes, when the screenshot key was pressed this frame.
    pub screenshot: Option<Vec<u8>>,
    /// State after the frame.
    pub state: RunState,
    /// Time to wait before the next frame.
    pub delay: Duration,
}

/// Delay to the next frame: whatever is left of the frame period.
#[must_use]
pub fn next_delay(frame: Duration, elapsed: Duration) -> Duration {
    frame.saturating_sub(elapsed)
}

pub type LoadResult = std::result::Result<Vec<u8>, LoadError>;

/// A one-shot file read.
#[derive(Debug)]
pub struct LoadTask {
    receiver: Receiver<LoadResult>,
}

impl LoadTask {
    /// Run `read` on a worker thread.
    pub fn spawn<F>(read: F) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            // The machine may have been dropped; nobody is left to tell.
            let _ = sender.send(read());
        });
        Self { receiver }
    }

    /// A task that has already finished.
    #[must_use]
    pub fn ready(result: LoadResult) -> Self {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(result);
        Self { receiver }
    }

    /// A task whose result is delivered through the returned sender.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<LoadResult>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    /// The result, once available. A task whose sender went away without
    /// answering resolves to [`LoadError::Disconnected`].
    pub fn poll(&self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::Disconnected)),
        }
    }
}

/// Where files come from when the ROM asks for one, or the user does.
pub trait FileSource {
    fn open(&mut self) -> LoadTask;
}

/// Hands out files from a list of paths, one per request, read on a worker
/// thread. Once the list is used up every request is cancelled.
#[derive(Debug, Clone, Default)]
pub struct PathSource {
    paths: VecDeque<PathBuf>,
}

impl PathSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FileSource for PathSource {
    fn open(&mut self) -> LoadTask {
        match self.paths.pop_front() {
            Some(path) => {
                log::debug!("scheduler: reading {}", path.display());
                LoadTask::spawn(move || Ok(std::fs::read(path)?))
            }
            None => LoadTask::ready(Err(LoadError::Cancelled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait(task: &LoadTask) -> LoadResult {
        let start = Instant::now();
        loop {
            if let Some(result) = task.poll() {
                return result;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "task never finished");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn delay_never_goes_negative() {
        let frame = Duration::from_millis(20);
        assert_eq!(next_delay(frame, Duration::from_millis(7)), Duration::from_millis(13));
        assert_eq!(next_delay(frame, Duration::from_millis(25)), Duration::ZERO);
    }

    #[test]
    fn pending_task_polls_empty() {
        let (sender, task) = LoadTask::channel();
        assert!(task.poll().is_none());
        sender.send(Ok(vec![1, 2])).expect("receiver alive");
        assert_eq!(task.poll().map(|r| r.ok()), Some(Some(vec![1, 2])));
    }

    #[test]
    fn dropped_sender_is_disconnected() {
        let (sender, task) = LoadTask::channel();
        drop(sender);
        assert!(matches!(task.poll(), Some(Err(LoadError::Disconnected))));
    }

    #[test]
    fn spawned_task_delivers() {
        let task = LoadTask::spawn(|| Ok(vec![0xD0]));
        assert_eq!(wait(&task).ok(), Some(vec![0xD0]));
    }

    #[test]
    fn path_source_reads_then_cancels() {
        let path = std::env::temp_dir().join(format!("emu-lviv-source-{}.bin", std::process::id()));
        std::fs::write(&path, [1, 2, 3]).expect("temp file");

        let mut source = PathSource::new([path.clone()]);
        assert_eq!(source.remaining(), 1);
        assert_eq!(wait(&source.open()).ok(), Some(vec![1, 2, 3]));
        assert!(matches!(wait(&source.open()), Err(LoadError::Cancelled)));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut source = PathSource::new([PathBuf::from("/nonexistent/emu-lviv/file.lvt")]);
        assert!(matches!(wait(&source.open()), Err(LoadError::Io(_))));
    }
}
