//! What the toys tell the screen.
//!
//! Synths publish [`Snapshot`]s into a [`ViewSlot`]. The slot keeps only the
//! newest one, and the front end takes it at most once per drawn frame, so
//! a synth that updates many times between frames costs one redraw.

/// One DNA run as the view draws it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunView {
    pub voice: usize,
    /// Position in the base-pair sequence
    pub index: usize,
    pub pan: f32,
    /// False once the gesture that started it has ended
    pub playing: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Snapshot {
    /// Nothing to show (gesture ended)
    Cleared,
    /// Name of the latched church mode
    Mode { name: &'static str },
    Dna {
        runs: Vec<RunView>,
        /// Attack + hold + release of the current note, in seconds
        note_duration: f32,
    },
    /// Stereo position of the last drop
    Drop { pan: f32 },
    /// Pre-fold drive, 0 to 12
    Drive { gain: f32 },
    Breath { prompt: &'static str },
    Concrete { blur: f32, scale: f32, opacity: f32 },
}

#[derive(Debug, Default)]
pub struct ViewSlot {
    latest: Option<Snapshot>,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is waiting.
    pub fn publish(&mut self, snapshot: Snapshot) {
        self.latest = Some(snapshot);
    }

    pub fn take(&mut self) -> Option<Snapshot> {
        self.latest.take()
    }

    pub fn is_dirty(&self) -> bool {
        self.latest.is_some()
    }
}
