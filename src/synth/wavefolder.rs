//! A sine driven into a wave folder.
//!
//! The folder is a custom processor installed at load time. Right raises the
//! pitch; down drives the sine harder into the folder, up to twelve times
//! its range, so the bottom of the pad is all fold and the top a plain sine.

use crate::dsp::oscillator::Waveform;
use crate::graph::processor::WAVE_FOLDER;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::loader::{AssetRequest, LoadedAssets};
use crate::io::view::Snapshot;
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

pub const OUT_GAIN: f32 = 0.35;
pub const MAX_DRIVE: f32 = 12.0;
/// Drive changes glide over this long to avoid zipper clicks.
pub const DRIVE_GLIDE: f64 = 0.05;
const INITIAL_FREQ: f32 = 110.0;

pub fn frequency(x: f32) -> f32 {
    25.0 + 160.0 * x
}

pub fn drive(y: f32) -> f32 {
    (1.0 - y) * MAX_DRIVE
}

pub struct WaveFolder {
    drive: NodeId,
    folder: Option<NodeId>,
    out: NodeId,
    osc: Option<NodeId>,
    sources: Owned,
}

impl WaveFolder {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let audio = &mut *ctx.audio;
        let drive = audio.gain(1.0);
        let out = audio.gain(OUT_GAIN);
        audio.connect(out, audio.destination())?;
        Ok(Self {
            drive,
            folder: None,
            out,
            osc: None,
            sources: Owned::new(),
        })
    }

    pub fn is_installed(&self) -> bool {
        self.folder.is_some()
    }
}

impl Synth for WaveFolder {
    fn assets(&self) -> Option<AssetRequest> {
        Some(AssetRequest::new().processor(WAVE_FOLDER))
    }

    fn install(&mut self, ctx: &mut SynthCtx, assets: LoadedAssets) -> Result<(), SynthError> {
        let factory = assets
            .processor(WAVE_FOLDER)
            .ok_or_else(|| SynthError::MissingAsset(WAVE_FOLDER.to_string()))?;
        let audio = &mut *ctx.audio;
        if let Some(old) = self.folder.take() {
            audio.release(&[old]);
        }
        let folder = audio.processor(factory());
        audio.chain(&[self.drive, folder, self.out])?;
        self.folder = Some(folder);
        Ok(())
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        if self.folder.is_none() {
            return Ok(());
        }
        let now = ctx.now();
        let audio = &mut *ctx.audio;
        let osc = audio.oscillator(Waveform::Sine, INITIAL_FREQ);
        audio.connect(osc, self.drive)?;
        audio.start(osc, now)?;
        audio.free_on_end(&[osc], &[])?;
        self.sources.push(osc);
        self.osc = Some(osc);
        self.update(ctx, at)
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        if let Some(osc) = self.osc {
            ctx.audio
                .param(osc, ParamKind::Frequency)?
                .set_value(frequency(at.x));
        }
        let gain = drive(at.y);
        let when = ctx.now() + DRIVE_GLIDE;
        ctx.audio
            .param(self.drive, ParamKind::Gain)?
            .linear_ramp_to_value_at_time(gain, when);
        ctx.publish(Snapshot::Drive { gain });
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        if let Some(osc) = self.osc.take() {
            let now = ctx.now();
            ctx.audio.stop(osc, now)?;
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.sources.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.osc = None;
        self.sources.release(ctx.audio);
        let folder = self.folder.take();
        ctx.audio
            .release(&[self.drive, self.out].into_iter().chain(folder).collect::<Vec<_>>());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::loader::{AssetLoader, SynthesizedLoader};
    use crate::synth::testing::{pad, Rig, SR};

    fn installed(rig: &mut Rig) -> WaveFolder {
        let mut synth = WaveFolder::new(&mut rig.ctx()).unwrap();
        let request = synth.assets().unwrap();
        let assets = SynthesizedLoader::new(SR, 0).load(&request).unwrap();
        synth.install(&mut rig.ctx(), assets).unwrap();
        synth
    }

    #[test]
    fn test_start_before_install_is_silent() {
        let mut rig = Rig::new();
        let mut synth = WaveFolder::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        assert_eq!(rig.audio.live_nodes(), 2);
        synth.end(&mut rig.ctx()).unwrap();
    }

    #[test]
    fn test_drive_glides_to_target() {
        let mut rig = Rig::new();
        let mut synth = installed(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.0)).unwrap();
        assert_eq!(rig.view.take(), Some(Snapshot::Drive { gain: MAX_DRIVE }));
        rig.run(&mut synth, DRIVE_GLIDE + 0.01);
        let gain = rig.audio.param_ref(synth.drive, ParamKind::Gain).unwrap();
        assert!((gain.value() - MAX_DRIVE).abs() < 1e-3);
    }

    #[test]
    fn test_drive_stays_in_range_across_the_pad() {
        let mut rig = Rig::new();
        let mut synth = installed(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        for at in pad() {
            synth.update(&mut rig.ctx(), at).unwrap();
            rig.run(&mut synth, 0.001);
            let gain = rig.audio.param_ref(synth.drive, ParamKind::Gain).unwrap();
            let target = gain.value_at(rig.audio.current_time() + DRIVE_GLIDE);
            assert!((0.0..=MAX_DRIVE).contains(&gain.value()), "{at:?}");
            assert!((0.0..=MAX_DRIVE).contains(&target), "{at:?}: {target}");
            assert!((25.0..=185.0).contains(&frequency(at.x)));
        }
    }

    #[test]
    fn test_output_stays_folded() {
        let mut rig = Rig::new();
        let mut synth = installed(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(1.0, 0.0)).unwrap();
        rig.run(&mut synth, 0.1);
        let mut left = vec![0.0; 1024];
        let mut right = vec![0.0; 1024];
        rig.audio.render(&mut left, &mut right);
        let peak = left.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.0 && peak <= OUT_GAIN + 1e-4);
    }

    #[test]
    fn test_end_frees_the_oscillator() {
        let mut rig = Rig::new();
        let mut synth = installed(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.2, 0.7)).unwrap();
        assert_eq!(rig.audio.live_nodes(), 4);
        synth.end(&mut rig.ctx()).unwrap();
        rig.run(&mut synth, 0.01);
        assert_eq!(rig.audio.live_nodes(), 3);
        synth.teardown(&mut rig.ctx());
        assert_eq!(rig.audio.live_nodes(), 0);
    }
}
