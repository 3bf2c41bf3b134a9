//! Spectrum panel
//!
//! Hann-windowed FFT of the scope buffer, read off at log-spaced
//! frequencies and smoothed so single drops and hits decay visibly.

use std::f32::consts::PI;
use std::sync::Arc;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

const BINS: usize = 48;
const FLOOR_DB: f64 = -100.0;
/// Fraction of the previous level kept per update when the new one is lower
const FALL: f64 = 0.8;

pub struct SpectrumAnalyzer {
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// FFT index read for each displayed bin
    indices: Vec<usize>,
    /// (log10 Hz, dB)
    levels: Vec<(f64, f64)>,
}

impl SpectrumAnalyzer {
    pub fn new(len: usize, sample_rate: f32) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(len);
        let window = (0..len)
            .map(|i| match len {
                0 | 1 => 1.0,
                _ => 0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos()),
            })
            .collect();

        let half = (len / 2).max(1);
        let top = (sample_rate as f64 / 2.0).clamp(21.0, 20_000.0);
        let (lo, hi) = (20f64.log10(), top.log10());
        let mut indices = Vec::with_capacity(BINS);
        let mut levels = Vec::with_capacity(BINS);
        for i in 0..BINS {
            let log_freq = lo + (hi - lo) * i as f64 / (BINS - 1) as f64;
            let index = (10f64.powf(log_freq) * len as f64 / sample_rate as f64).round() as usize;
            indices.push(index.min(half - 1));
            levels.push((log_freq, FLOOR_DB));
        }

        Self {
            window,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); len],
            indices,
            levels,
        }
    }

    pub fn update(&mut self, buffer: &[f32]) {
        if buffer.len() != self.window.len() {
            return;
        }
        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(buffer).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        for ((_, level), &index) in self.levels.iter_mut().zip(&self.indices) {
            let power = self.scratch[index].norm_sqr().max(1e-12) as f64;
            let db = (10.0 * power.log10()).max(FLOOR_DB);
            *level = if db > *level {
                db
            } else {
                FALL * *level + (1.0 - FALL) * db
            };
        }
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.levels
    }
}

pub fn render_spectrum(frame: &mut Frame, area: Rect, spectrum: &[(f64, f64)]) {
    let block = Block::default().title(" Spectrum ").borders(Borders::ALL);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(spectrum);

    let (lo, hi) = match (spectrum.first(), spectrum.last()) {
        (Some(&(lo, _)), Some(&(hi, _))) if hi > lo => (lo, hi),
        _ => (1.0, 4.0),
    };
    let top = spectrum.iter().map(|&(_, db)| db).fold(FLOOR_DB, f64::max);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels(vec!["20", "200", "2k", "20k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([FLOOR_DB, top.max(0.0) + 10.0])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peaks_near_its_bin() {
        let sr = 48_000.0;
        let len = 1024;
        let mut analyzer = SpectrumAnalyzer::new(len, sr);
        let buffer: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        analyzer.update(&buffer);
        let (loudest, _) = analyzer
            .data()
            .iter()
            .copied()
            .fold((0.0, FLOOR_DB), |best, bin| if bin.1 > best.1 { bin } else { best });
        assert!((10f64.powf(loudest) - 1000.0).abs() < 300.0);
    }
}
