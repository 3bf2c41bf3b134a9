//! Reading the spike mRNA out loud.
//!
//! Every gesture adds a run: a reader that walks the base-pair sequence from
//! a random point, playing one sample per base. Runs never stop being
//! remembered; the next gesture starts them all again together, each
//! offset by where it was in its bar when the pointer lifted. Left is short
//! and dry, right long and swelling; up is fast.

use std::collections::HashMap;
use std::sync::OnceLock;

use rand::Rng;

use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{AudioBuffer, NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::loader::{AssetRequest, LoadedAssets};
use crate::io::view::{RunView, Snapshot};
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

/// Sample groups, one per base. `T` is read as `D`.
pub const LETTERS: [u8; 4] = [b'A', b'D', b'G', b'C'];
pub const VOICES: usize = 5;
/// Resume offsets snap to this many divisions of the interval.
pub const QUANTIZE_DELAY: f64 = 4.0;
pub const JITTER: f64 = 0.005;
/// Rest before a gesture's first notes.
pub const LEAD_IN: f64 = 0.05;
/// Samples start with a click; keep the gain shut this long.
const CLICK_GUARD: f64 = 0.05;

const ROOM_SIZE: f32 = 0.95;
const DAMPENING: f32 = 5000.0;
const WET: f32 = 0.125;

/// The sequence as `A`, `D`, `G` and `C`.
pub fn sequence() -> &'static [u8] {
    static SEQUENCE: OnceLock<Vec<u8>> = OnceLock::new();
    SEQUENCE.get_or_init(|| {
        include_str!("assets/spike_mrna.txt")
            .bytes()
            .filter(|b| matches!(b, b'A' | b'T' | b'G' | b'C'))
            .map(|b| if b == b'T' { b'D' } else { b })
            .collect()
    })
}

fn group_name(letter: u8) -> Result<&'static str, SynthError> {
    match letter {
        b'A' => Ok("a"),
        b'D' => Ok("d"),
        b'G' => Ok("g"),
        b'C' => Ok("c"),
        other => Err(SynthError::UnknownLetter(other as char)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    pub attack: f64,
    pub hold: f64,
    pub release: f64,
    /// Seconds per beat; each run plays a fraction of a beat per note.
    pub interval: f64,
    pub gain: f32,
}

impl Params {
    pub fn duration(&self) -> f64 {
        self.attack + self.hold + self.release
    }
}

/// Per-note gain falls as runs pile up, but slower than the runs grow.
pub fn params(at: Point, runs: usize) -> Params {
    Params {
        attack: 0.15 + 0.1 * at.x as f64,
        hold: 0.04 * at.x as f64,
        release: 0.1 + 0.5 * at.x as f64,
        interval: 0.35 + (1.0 - at.y as f64),
        gain: 0.18 / (0.5 + 0.5 * ((runs + 1) as f32).sqrt()),
    }
}

#[derive(Debug, Clone)]
struct Run {
    voice: usize,
    /// Fraction of the interval between this run's notes
    ratio: f64,
    pan: f32,
    idx: usize,
    /// Offset into the bar carried over from the last gesture
    delay: f64,
    fire_at: f64,
    playing: bool,
    task: Task,
}

impl Run {
    fn view(&self) -> RunView {
        RunView {
            voice: self.voice,
            index: self.idx,
            pan: self.pan,
            playing: self.playing,
        }
    }
}

pub struct Dna {
    reverb: NodeId,
    samples: Option<HashMap<u8, Vec<AudioBuffer>>>,
    next_voice: usize,
    params: Params,
    runs: Vec<Run>,
    notes: Owned,
}

impl Dna {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let audio = &mut *ctx.audio;
        let reverb = audio.reverb();
        audio.param(reverb, ParamKind::RoomSize)?.set_value(ROOM_SIZE);
        audio.param(reverb, ParamKind::Dampening)?.set_value(DAMPENING);
        audio.param(reverb, ParamKind::Wet)?.set_value(WET);
        audio.connect(reverb, audio.destination())?;
        Ok(Self {
            reverb,
            samples: None,
            next_voice: 0,
            params: params(Point::default(), 0),
            runs: Vec::new(),
            notes: Owned::new(),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.len()
    }

    pub fn params(&self) -> Params {
        self.params
    }

    fn publish(&self, ctx: &mut SynthCtx) {
        ctx.publish(Snapshot::Dna {
            runs: self.runs.iter().map(Run::view).collect(),
            note_duration: self.params.duration() as f32,
        });
    }

    fn note(
        &mut self,
        ctx: &mut SynthCtx,
        time: f64,
        letter: u8,
        voice: usize,
        pan: f32,
    ) -> Result<(), SynthError> {
        let name = group_name(letter)?;
        let buffer = self
            .samples
            .as_ref()
            .and_then(|s| s.get(&letter))
            .and_then(|voices| voices.get(voice % voices.len().max(1)))
            .cloned()
            .ok_or_else(|| SynthError::MissingAsset(name.to_string()))?;
        let p = self.params;
        let end = time + p.duration();

        let audio = &mut *ctx.audio;
        let source = audio.buffer_source(buffer);
        let gain = audio.gain(0.0);
        let panner = audio.panner(pan);
        audio.chain(&[source, gain, panner, self.reverb])?;
        audio
            .param(gain, ParamKind::Gain)?
            .set_value_at_time(0.0, time)
            .set_value_at_time(0.0, time + CLICK_GUARD)
            .linear_ramp_to_value_at_time(p.gain, time + p.attack)
            .set_value_at_time(p.gain, time + p.attack + p.hold)
            .linear_ramp_to_value_at_time(0.0, end);
        audio.start(source, time)?;
        audio.stop(source, end)?;
        audio.free_on_end(&[source], &[gain, panner])?;
        self.notes.push(source);
        Ok(())
    }

    /// Arm run `i` to play its next base.
    fn queue_run(&mut self, ctx: &mut SynthCtx, i: usize) {
        let interval = self.params.interval;
        let jitter = ctx.rng.gen::<f64>() * JITTER;
        let run = &mut self.runs[i];
        run.fire_at = run.task.next_time() + run.delay * interval + jitter;
        ctx.wake_before(&mut run.task, run.fire_at);
    }

    fn fire(&mut self, ctx: &mut SynthCtx, i: usize) -> Result<(), SynthError> {
        let seq = sequence();
        let run = &mut self.runs[i];
        run.idx = (run.idx + 1) % seq.len();
        let (time, letter, voice, pan) = (run.fire_at, seq[run.idx], run.voice, run.pan);
        run.task.advance(self.params.interval * run.ratio);

        self.note(ctx, time, letter, voice, pan)?;
        self.queue_run(ctx, i);
        self.publish(ctx);
        Ok(())
    }
}

impl Synth for Dna {
    fn assets(&self) -> Option<AssetRequest> {
        let mut request = AssetRequest::new();
        for letter in LETTERS {
            let name = (letter as char).to_ascii_lowercase();
            request = request.group(
                &name.to_string(),
                (1..=VOICES).map(|v| format!("adgc/{name}{v}.wav")),
            );
        }
        Some(request)
    }

    fn install(&mut self, ctx: &mut SynthCtx, assets: LoadedAssets) -> Result<(), SynthError> {
        let mut samples = HashMap::new();
        for letter in LETTERS {
            let name = group_name(letter)?;
            let voices = assets
                .group(name)
                .filter(|g| !g.is_empty())
                .ok_or_else(|| SynthError::MissingAsset(name.to_string()))?;
            samples.insert(letter, voices.to_vec());
        }
        let voices = samples.get(&b'A').map_or(1, Vec::len);
        self.next_voice = ctx.rng.gen_range(0..voices);
        self.samples = Some(samples);
        Ok(())
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        let Some(voices) = self.samples.as_ref().and_then(|s| s.get(&b'A')).map(Vec::len) else {
            return Ok(());
        };
        self.update(ctx, at)?;
        self.next_voice = (self.next_voice + 1) % voices.max(1);

        let rng = &mut *ctx.rng;
        let run = Run {
            voice: self.next_voice,
            ratio: if rng.gen_bool(0.5) { 1.0 / 2.0 } else { 2.0 / 3.0 },
            pan: -0.5 + rng.gen::<f32>(),
            idx: rng.gen_range(0..sequence().len()),
            delay: 0.0,
            fire_at: 0.0,
            playing: true,
            task: Task::new(self.runs.len() as u32),
        };
        self.runs.push(run);

        let now = ctx.now();
        for i in 0..self.runs.len() {
            let run = &mut self.runs[i];
            run.playing = true;
            run.task.set_next_time(now + LEAD_IN);
            self.queue_run(ctx, i);
        }
        self.publish(ctx);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.params = params(at, self.runs.len());
        self.publish(ctx);
        Ok(())
    }

    /// Remember where each run was in its bar, quantized, so the next
    /// gesture picks the rhythm back up.
    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let now = ctx.now();
        let interval = self.params.interval;
        for run in &mut self.runs {
            run.task.cancel(ctx.timers);
            let ahead = (run.task.next_time() + run.delay * interval - now).max(0.0);
            run.delay = (QUANTIZE_DELAY * ahead).floor() % QUANTIZE_DELAY / QUANTIZE_DELAY;
            run.playing = false;
        }
        self.publish(ctx);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        let Some(i) = self.runs.iter_mut().position(|r| r.task.fired(timer)) else {
            return Ok(());
        };
        self.fire(ctx, i)
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.notes.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        for run in &mut self.runs {
            run.task.cancel(ctx.timers);
        }
        self.runs.clear();
        self.notes.release(ctx.audio);
        ctx.audio.release(&[self.reverb]);
    }
}
