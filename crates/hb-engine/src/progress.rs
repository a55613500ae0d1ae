// Progress reporting
// Purely observational: sinks never influence what the runner does.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Levels of the benchmark grid, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgressLevel {
    Seeds,
    Targets,
    Datasets,
    Optimizers,
    Splits,
    Stage,
    Evaluations,
}

impl ProgressLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Seeds => "Seeds",
            Self::Targets => "Target Algorithms",
            Self::Datasets => "Datasets",
            Self::Optimizers => "Optimizers",
            Self::Splits => "Splits",
            Self::Stage => "Stage",
            Self::Evaluations => "Evaluations",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A level starts over with a new total and description.
    Reset {
        level: ProgressLevel,
        description: String,
        total: usize,
    },
    Advance {
        level: ProgressLevel,
        completed: usize,
        total: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn update(&self, event: ProgressEvent);

    fn reset(&self, level: ProgressLevel, description: &str, total: usize) {
        self.update(ProgressEvent::Reset {
            level,
            description: description.to_string(),
            total,
        });
    }

    fn advance(&self, level: ProgressLevel, completed: usize, total: usize) {
        self.update(ProgressEvent::Advance {
            level,
            completed,
            total,
        });
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _event: ProgressEvent) {}
}

/// Renders progress as log lines: outer levels at info, inner ones at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Reset {
                level,
                description,
                total,
            } => {
                if level <= ProgressLevel::Optimizers {
                    info!("{}: {} (0/{})", level.label(), description, total);
                } else {
                    debug!("{}: {} (0/{})", level.label(), description, total);
                }
            }
            ProgressEvent::Advance {
                level,
                completed,
                total,
            } => {
                if level <= ProgressLevel::Datasets {
                    info!("{}: {}/{}", level.label(), completed, total);
                } else {
                    debug!("{}: {}/{}", level.label(), completed, total);
                }
            }
        }
    }
}

/// Forwards events over a channel, e.g. to a UI thread.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// A sink plus the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn update(&self, event: ProgressEvent) {
        // a dropped receiver only means nobody is watching
        let _ = self.sender.send(event);
    }
}

/// Counts events per level.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    resets: Mutex<HashMap<ProgressLevel, usize>>,
    advances: Mutex<HashMap<ProgressLevel, usize>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resets(&self, level: ProgressLevel) -> usize {
        self.resets.lock().get(&level).copied().unwrap_or(0)
    }

    pub fn advances(&self, level: ProgressLevel) -> usize {
        self.advances.lock().get(&level).copied().unwrap_or(0)
    }
}

impl ProgressSink for RecordingProgress {
    fn update(&self, event: ProgressEvent) {
        let (map, level) = match event {
            ProgressEvent::Reset { level, .. } => (&self.resets, level),
            ProgressEvent::Advance { level, .. } => (&self.advances, level),
        };
        *map.lock().entry(level).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_progress_forwards_events() {
        let (sink, receiver) = ChannelProgress::unbounded();
        sink.reset(ProgressLevel::Seeds, "seed 0", 2);
        sink.advance(ProgressLevel::Seeds, 1, 2);

        let events: Vec<ProgressEvent> = receiver.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ProgressEvent::Advance {
                level: ProgressLevel::Seeds,
                completed: 1,
                total: 2
            }
        );
    }

    #[test]
    fn test_channel_progress_survives_dropped_receiver() {
        let (sink, receiver) = ChannelProgress::unbounded();
        drop(receiver);
        sink.advance(ProgressLevel::Evaluations, 1, 10);
    }

    #[test]
    fn test_recording_progress_counts() {
        let sink = RecordingProgress::new();
        sink.reset(ProgressLevel::Stage, "search", 2);
        sink.advance(ProgressLevel::Stage, 1, 2);
        sink.advance(ProgressLevel::Stage, 2, 2);
        assert_eq!(sink.resets(ProgressLevel::Stage), 1);
        assert_eq!(sink.advances(ProgressLevel::Stage), 2);
        assert_eq!(sink.advances(ProgressLevel::Seeds), 0);
    }
}
