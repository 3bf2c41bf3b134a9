//! Sample and processor loading.
//!
//! A synth that needs assets describes them with an [`AssetRequest`]: named
//! groups of sample files plus the names of the custom processors it wants
//! installed. A loader resolves the request into [`LoadedAssets`].
//!
//! - [`WavLoader`] decodes WAV files under an asset root with `hound`.
//! - [`SynthesizedLoader`] renders stand-in material in memory, so every toy
//!   can play without an asset directory (tests, benches, first run).
//! - [`BackgroundLoad`] runs either loader on a worker thread and hands the
//!   result back through a single-slot `rtrb` ring buffer, so the thread that
//!   owns the engine only ever polls.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::graph::buffer::AudioBuffer;
use crate::graph::processor::{self, ProcessorFactory};

/// Sample files loaded together and addressed by index (`a` → five voices).
#[derive(Debug, Clone, PartialEq)]
pub struct BufferGroup {
    pub name: String,
    /// Paths relative to the asset root
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetRequest {
    pub groups: Vec<BufferGroup>,
    pub processors: Vec<String>,
}

impl AssetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group<P: Into<PathBuf>>(
        mut self,
        name: &str,
        files: impl IntoIterator<Item = P>,
    ) -> Self {
        self.groups.push(BufferGroup {
            name: name.to_string(),
            files: files.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn processor(mut self, name: &str) -> Self {
        self.processors.push(name.to_string());
        self
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("{0} contains no audio")]
    Empty(PathBuf),
    #[error("no processor named '{0}'")]
    UnknownProcessor(String),
    #[error("the loader thread exited without a result")]
    Disconnected,
}

/// Everything a synth asked for, resolved.
#[derive(Clone, Default)]
pub struct LoadedAssets {
    groups: HashMap<String, Vec<AudioBuffer>>,
    processors: HashMap<String, ProcessorFactory>,
}

impl LoadedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&mut self, name: &str, buffers: Vec<AudioBuffer>) {
        self.groups.insert(name.to_string(), buffers);
    }

    pub fn insert_processor(&mut self, name: &str, factory: ProcessorFactory) {
        self.processors.insert(name.to_string(), factory);
    }

    pub fn group(&self, name: &str) -> Option<&[AudioBuffer]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn processor(&self, name: &str) -> Option<ProcessorFactory> {
        self.processors.get(name).copied()
    }
}

pub trait AssetLoader: Send {
    fn load(&self, request: &AssetRequest) -> Result<LoadedAssets, LoadError>;
}

fn resolve_processors(request: &AssetRequest, assets: &mut LoadedAssets) -> Result<(), LoadError> {
    for name in &request.processors {
        let factory =
            processor::lookup(name).ok_or_else(|| LoadError::UnknownProcessor(name.clone()))?;
        assets.insert_processor(name, factory);
    }
    Ok(())
}

/// Decodes WAV files relative to an asset root. Multi-channel files are
/// mixed down to mono.
pub struct WavLoader {
    root: PathBuf,
}

impl WavLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn decode(&self, relative: &Path) -> Result<AudioBuffer, LoadError> {
        let path = self.root.join(relative);
        let decode_err = |source| LoadError::Decode {
            path: path.clone(),
            source,
        };
        let mut reader = hound::WavReader::open(&path).map_err(decode_err)?;
        let spec = reader.spec();

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let mono: Vec<f32> = raw
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        if mono.is_empty() {
            return Err(LoadError::Empty(path));
        }
        debug!(path = %path.display(), frames = mono.len(), "decoded sample");
        Ok(AudioBuffer::new(mono, spec.sample_rate as f32))
    }
}

impl AssetLoader for WavLoader {
    fn load(&self, request: &AssetRequest) -> Result<LoadedAssets, LoadError> {
        let mut assets = LoadedAssets::new();
        for group in &request.groups {
            let buffers = group
                .files
                .iter()
                .map(|file| self.decode(file))
                .collect::<Result<Vec<_>, _>>()?;
            assets.insert_group(&group.name, buffers);
        }
        resolve_processors(request, &mut assets)?;
        Ok(assets)
    }
}

/// Renders stand-in samples instead of reading files: short pitched tones
/// for the letter groups, drum-like hits for `drums`, and a long collage of
/// textures for anything with a single member.
pub struct SynthesizedLoader {
    sample_rate: f32,
    seed: u64,
}

impl SynthesizedLoader {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self { sample_rate, seed }
    }

    fn render(&self, group: &str, index: usize, count: usize) -> AudioBuffer {
        let sr = self.sample_rate;
        let group_salt = group.bytes().fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(self.seed ^ group_salt ^ index as u64);

        match (group, count) {
            ("drums", _) => drum_hit(index, sr, &mut rng),
            (_, 1) => collage(sr, &mut rng),
            _ => {
                let letter = group.bytes().next().unwrap_or(b'a');
                let base = 110.0 * 2f32.powf((letter % 12) as f32 / 12.0);
                let freq = base * (1.0 + index as f32 * 0.5);
                AudioBuffer::from_fn((sr * 1.5) as usize, sr, |i| {
                    let t = i as f32 / sr;
                    let env = (-3.0 * t).exp();
                    env * (0.6 * (TAU * freq * t).sin() + 0.2 * (TAU * 2.0 * freq * t).sin())
                })
            }
        }
    }
}

fn drum_hit(index: usize, sr: f32, rng: &mut StdRng) -> AudioBuffer {
    let len = (sr * 0.4) as usize;
    let mut noise: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut phase = 0.0f32;
    for (i, s) in noise.iter_mut().enumerate() {
        let t = i as f32 / sr;
        *s = match index % 5 {
            // kick: falling sine
            0 => {
                phase += TAU * (50.0 + 120.0 * (-30.0 * t).exp()) / sr;
                phase.sin() * (-8.0 * t).exp()
            }
            // snare
            1 => *s * 0.6 * (-18.0 * t).exp() + 0.3 * (TAU * 190.0 * t).sin() * (-25.0 * t).exp(),
            // hat
            2 => *s * 0.4 * (-60.0 * t).exp(),
            // tom
            3 => (TAU * (110.0 + 40.0 * (-10.0 * t).exp()) * t).sin() * (-9.0 * t).exp(),
            // clap
            _ => *s * 0.5 * ((-40.0 * (t % 0.012)).exp() * (-12.0 * t).exp()),
        };
    }
    AudioBuffer::new(noise, sr)
}

fn collage(sr: f32, rng: &mut StdRng) -> AudioBuffer {
    const SECONDS: usize = 50;
    const SEGMENT: f32 = 0.75;
    let len = (sr as usize) * SECONDS;
    let mut out = vec![0.0f32; len];
    let segment_len = ((sr * SEGMENT) as usize).max(1);
    for segment in out.chunks_mut(segment_len) {
        let freq: f32 = rng.gen_range(60.0..900.0);
        let grit: f32 = rng.gen_range(0.0..0.6);
        for (i, s) in segment.iter_mut().enumerate() {
            let t = i as f32 / sr;
            let tone = (TAU * freq * t).sin();
            let noise: f32 = rng.gen_range(-1.0..1.0);
            *s = 0.4 * ((1.0 - grit) * tone + grit * noise) * (-2.0 * t).exp();
        }
    }
    AudioBuffer::new(out, sr)
}

impl AssetLoader for SynthesizedLoader {
    fn load(&self, request: &AssetRequest) -> Result<LoadedAssets, LoadError> {
        let mut assets = LoadedAssets::new();
        for group in &request.groups {
            let count = group.files.len();
            let buffers = (0..count)
                .map(|i| self.render(&group.name, i, count))
                .collect();
            assets.insert_group(&group.name, buffers);
        }
        resolve_processors(request, &mut assets)?;
        Ok(assets)
    }
}

/// A load running on a worker thread.
#[cfg(feature = "rtrb")]
pub struct BackgroundLoad {
    rx: rtrb::Consumer<Result<LoadedAssets, LoadError>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

#[cfg(feature = "rtrb")]
impl BackgroundLoad {
    pub fn spawn<L: AssetLoader + 'static>(loader: L, request: AssetRequest) -> Self {
        let (mut tx, rx) = rtrb::RingBuffer::new(1);
        let worker = std::thread::spawn(move || {
            // a full slot cannot happen with a single push
            let _ = tx.push(loader.load(&request));
        });
        Self {
            rx,
            worker: Some(worker),
        }
    }

    /// The result, once the worker has produced it.
    pub fn poll(&mut self) -> Option<Result<LoadedAssets, LoadError>> {
        match self.rx.pop() {
            Ok(result) => {
                if let Some(worker) = self.worker.take() {
                    let _ = worker.join();
                }
                Some(result)
            }
            Err(_) if self.worker.as_ref().is_some_and(|w| w.is_finished()) => {
                self.worker = None;
                // the worker may have pushed between the pop and the check
                Some(self.rx.pop().unwrap_or(Err(LoadError::Disconnected)))
            }
            Err(_) => None,
        }
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> Result<LoadedAssets, LoadError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.rx.pop().unwrap_or(Err(LoadError::Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AssetRequest {
        AssetRequest::new()
            .group("a", ["adgc/a1.wav", "adgc/a2.wav"])
            .group("drums", ["drum/drum1.wav", "drum/drum2.wav", "drum/drum3.wav"])
            .processor(processor::WAVE_FOLDER)
    }

    #[test]
    fn test_synthesized_loader_fills_every_group() {
        let assets = SynthesizedLoader::new(8_000.0, 1).load(&request()).unwrap();
        assert_eq!(assets.group("a").map(<[_]>::len), Some(2));
        assert_eq!(assets.group("drums").map(<[_]>::len), Some(3));
        assert!(assets.group("g").is_none());
        assert!(assets.processor(processor::WAVE_FOLDER).is_some());
        let kick = &assets.group("drums").unwrap()[0];
        assert!(kick.samples().iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_unknown_processor_fails_the_load() {
        let request = AssetRequest::new().processor("ring-mod");
        let result = SynthesizedLoader::new(8_000.0, 1).load(&request);
        assert!(matches!(result, Err(LoadError::UnknownProcessor(name)) if name == "ring-mod"));
    }

    #[test]
    fn test_wav_loader_reports_missing_files() {
        let loader = WavLoader::new("/nonexistent/asset/root");
        let result = loader.load(&request());
        assert!(matches!(result, Err(LoadError::Decode { .. })));
    }

    #[test]
    fn test_wav_loader_round_trips_a_file() {
        let dir = std::env::temp_dir().join(format!("saavy_toys_wav_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.join("tone.wav"), spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let request = AssetRequest::new().group("tone", ["tone.wav"]);
        let assets = WavLoader::new(&dir).load(&request).unwrap();
        let buffer = &assets.group("tone").unwrap()[0];
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.sample_rate(), 22_050.0);
        assert!((buffer.samples()[0] - 0.25).abs() < 1e-3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn test_background_load_delivers_result() {
        let load = BackgroundLoad::spawn(SynthesizedLoader::new(8_000.0, 3), request());
        let assets = load.wait().unwrap();
        assert!(assets.group("a").is_some());
    }
}
