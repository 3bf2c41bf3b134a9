//! Audio output, asset loading and the offline bounce

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use hound::{SampleFormat, WavSpec, WavWriter};
use rtrb::RingBuffer;
use tracing::{error, info};

use saavy_toys::io::loader::{AssetRequest, BackgroundLoad, SynthesizedLoader, WavLoader};
use saavy_toys::{Engine, EngineConfig, Status, SynthKind, MAX_BLOCK_SIZE};

use super::ui::{UiApp, VIS_BUFFER_SIZE};

/// Where samples come from.
#[derive(Debug, Clone)]
pub enum Samples {
    Files(PathBuf),
    Synthesized { sample_rate: f32, seed: u64 },
}

impl Samples {
    fn new(config: &EngineConfig, files: bool) -> Self {
        if files {
            Samples::Files(config.asset_root.clone())
        } else {
            Samples::Synthesized {
                sample_rate: config.sample_rate,
                seed: config.seed,
            }
        }
    }

    pub fn spawn(&self, request: AssetRequest) -> BackgroundLoad {
        match self {
            Samples::Files(root) => BackgroundLoad::spawn(WavLoader::new(root.clone()), request),
            Samples::Synthesized { sample_rate, seed } => {
                BackgroundLoad::spawn(SynthesizedLoader::new(*sample_rate, *seed), request)
            }
        }
    }

    fn init(&self, engine: &mut Engine) -> Status {
        match self {
            Samples::Files(root) => engine.init_with(&WavLoader::new(root.clone())),
            Samples::Synthesized { sample_rate, seed } => {
                engine.init_with(&SynthesizedLoader::new(*sample_rate, *seed))
            }
        }
    }
}

/// Interactive front end
pub struct Toys {
    config: EngineConfig,
    kind: SynthKind,
    files: bool,
}

impl Toys {
    pub fn new(config: EngineConfig, kind: SynthKind, files: bool) -> Self {
        Self {
            config,
            kind,
            files,
        }
    }

    /// Open the output device and hand the terminal to the interface.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let stream_config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = stream_config.sample_rate().0 as f32;
        let channels = stream_config.channels() as usize;
        let config = self.config.sample_rate(sample_rate);
        let samples = Samples::new(&config, self.files);
        info!(sample_rate, channels, synth = %self.kind, "opening output");

        let mut engine = Engine::new(config);
        engine.select(self.kind);
        let engine = Arc::new(Mutex::new(engine));

        let (mut audio_tx, audio_rx) = RingBuffer::<f32>::new(VIS_BUFFER_SIZE * 8);
        let shared = engine.clone();
        let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
        let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device.build_output_stream(
            &stream_config.into(),
            move |data: &mut [f32], _| {
                let Ok(mut engine) = shared.lock() else {
                    data.fill(0.0);
                    return;
                };
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let (l, r) = (&mut left[..frames], &mut right[..frames]);
                    engine.render(l, r);

                    let out_off = frames_written * channels;
                    for (i, (&ls, &rs)) in l.iter().zip(r.iter()).enumerate() {
                        let frame = &mut data[out_off + i * channels..out_off + (i + 1) * channels];
                        match frame {
                            [mono] => *mono = 0.5 * (ls + rs),
                            [fl, fr, rest @ ..] => {
                                *fl = ls;
                                *fr = rs;
                                rest.fill(0.0);
                            }
                            [] => {}
                        }
                        // the scope drops samples while the UI is behind
                        let _ = audio_tx.push(0.5 * (ls + rs));
                    }
                    frames_written += frames;
                }
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        let mut terminal = ratatui::init();
        execute!(std::io::stdout(), EnableMouseCapture)?;
        let result = UiApp::new(engine.clone(), samples, audio_rx, sample_rate).run(&mut terminal);
        execute!(std::io::stdout(), DisableMouseCapture)?;
        ratatui::restore();

        drop(stream);
        if let Ok(mut engine) = engine.lock() {
            engine.teardown();
        }
        result
    }
}

/// A pointer held still for a while.
#[derive(Debug, Clone, Copy)]
pub struct Hold {
    pub x: f32,
    pub y: f32,
    pub seconds: f64,
    pub tail: f64,
}

/// Render one held gesture offline and write it as a 32-bit float WAV.
pub fn bounce(
    config: EngineConfig,
    kind: SynthKind,
    files: bool,
    hold: Hold,
    out: &Path,
) -> EyreResult<()> {
    let sample_rate = config.sample_rate;
    let samples = Samples::new(&config, files);
    let mut engine = Engine::new(config);
    engine.select(kind);
    let status = samples.init(&mut engine);
    if status != Status::Ready {
        return Err(eyre!("{kind} did not become ready ({status:?})"));
    }

    let spec = WavSpec {
        channels: 2,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(out, spec)
        .wrap_err_with(|| format!("cannot create {}", out.display()))?;

    engine.pointer_down(hold.x, hold.y);
    write_for(&mut engine, &mut writer, hold.seconds)?;
    engine.pointer_up();
    write_for(&mut engine, &mut writer, hold.tail)?;
    engine.teardown();
    writer.finalize()?;

    info!(synth = %kind, path = %out.display(), "bounced");
    println!(
        "{kind}: {:.1}s written to {}",
        hold.seconds + hold.tail,
        out.display()
    );
    Ok(())
}

fn write_for(
    engine: &mut Engine,
    writer: &mut WavWriter<BufWriter<File>>,
    seconds: f64,
) -> EyreResult<()> {
    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut remaining = (seconds.max(0.0) * engine.config().sample_rate as f64).round() as usize;
    while remaining > 0 {
        let frames = remaining.min(MAX_BLOCK_SIZE);
        engine.run_into(&mut left[..frames], &mut right[..frames]);
        for (&l, &r) in left[..frames].iter().zip(&right[..frames]) {
            writer.write_sample(l)?;
            writer.write_sample(r)?;
        }
        remaining -= frames;
    }
    Ok(())
}
