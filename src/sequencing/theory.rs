/*
Music Theory
============

Just enough theory for the toys: note names, the seven church modes, and the
minor pentatonic scale.

Note names follow scientific pitch notation: letter, optional accidentals,
octave. Middle C (C4) is MIDI 60 and A4 is 440 Hz.

  "A1"  -> 33   (55 Hz)
  "C#3" -> 49
  "Eb4" -> 63
  "c3"  -> 48   (letters are case-insensitive)

Mode steps are semitones above the tonic for each scale degree. The modes
toy plays degrees 1, 3, 5 and 7 (indices 0, 2, 4, 6) stacked over octaves.
*/

use thiserror::Error;

pub const A4_FREQ: f32 = 440.0;
pub const A4_MIDI: u8 = 69;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TheoryError {
    #[error("unknown note name '{0}'")]
    UnknownNote(String),
    #[error("note {0} is outside the MIDI range")]
    OutOfRange(i32),
}

/// Parse a note name like `A1`, `C#3` or `Eb4` into a MIDI note number.
pub fn parse_note(name: &str) -> Result<u8, TheoryError> {
    let unknown = || TheoryError::UnknownNote(name.to_string());
    let mut chars = name.trim().chars().peekable();

    let letter = chars.next().ok_or_else(unknown)?;
    let mut semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(unknown()),
    };

    while let Some(&c) = chars.peek() {
        match c {
            '#' => semitone += 1,
            'b' => semitone -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: String = chars.collect();
    let octave: i32 = octave.parse().map_err(|_| unknown())?;
    transpose(12 * (octave + 1) + semitone, 0)
}

/// `note + semitones`, checked against the MIDI range.
pub fn transpose(note: i32, semitones: i32) -> Result<u8, TheoryError> {
    let out = note + semitones;
    u8::try_from(out)
        .ok()
        .filter(|n| *n <= 127)
        .ok_or(TheoryError::OutOfRange(out))
}

/// Equal-tempered frequency of a MIDI note.
pub fn midi_to_freq(note: u8) -> f32 {
    A4_FREQ * 2f32.powf((note as f32 - A4_MIDI as f32) / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Ionian,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Aeolian,
        Mode::Locrian,
    ];

    /// Mode at `index`, saturating at the last one.
    pub fn from_index(index: usize) -> Mode {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ionian => "ionian",
            Mode::Dorian => "dorian",
            Mode::Phrygian => "phrygian",
            Mode::Lydian => "lydian",
            Mode::Mixolydian => "mixolydian",
            Mode::Aeolian => "aeolian",
            Mode::Locrian => "locrian",
        }
    }

    /// Semitones above the tonic of each of the seven degrees.
    pub fn steps(self) -> [u8; 7] {
        match self {
            Mode::Ionian => [0, 2, 4, 5, 7, 9, 11],
            Mode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            Mode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            Mode::Aeolian => [0, 2, 3, 5, 7, 8, 10],
            Mode::Locrian => [0, 1, 3, 5, 6, 8, 10],
        }
    }

    /// Semitones from the tonic to scale degree `degree` (0-based), counting
    /// whole octaves for degrees past the seventh.
    pub fn degree(self, degree: usize) -> i32 {
        12 * (degree / 7) as i32 + self.steps()[degree % 7] as i32
    }
}

pub const MINOR_PENTATONIC: [u8; 5] = [0, 3, 5, 7, 10];

/// The five notes of the minor pentatonic scale starting at `root`.
pub fn minor_pentatonic(root: u8) -> Result<[u8; 5], TheoryError> {
    let mut notes = [0u8; 5];
    for (note, step) in notes.iter_mut().zip(MINOR_PENTATONIC) {
        *note = transpose(root as i32, step as i32)?;
    }
    Ok(notes)
}
