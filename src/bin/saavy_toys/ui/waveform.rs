//! Oscilloscope of the mono mix

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Start the trace at the first rising zero crossing so periodic toys
/// (drone, wavefolder) hold still.
fn trigger(buffer: &[f32]) -> usize {
    buffer
        .windows(2)
        .take(buffer.len() / 2)
        .position(|w| w[0] <= 0.0 && w[1] > 0.0)
        .unwrap_or(0)
}

pub fn render_waveform(frame: &mut Frame, area: Rect, audio_buffer: &[f32]) {
    let block = Block::default().title(" Scope ").borders(Borders::ALL);

    let shown = &audio_buffer[trigger(audio_buffer)..];
    let peak = shown.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    // grow past full scale rather than clip the trace
    let range = peak.max(1.0) as f64;

    let data: Vec<(f64, f64)> = shown
        .iter()
        .enumerate()
        .map(|(i, &sample)| (i as f64 / shown.len().max(1) as f64, sample as f64))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-range, range])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_finds_rising_crossing() {
        let buffer = [0.5, -0.2, -0.1, 0.3, 0.6, -0.4];
        assert_eq!(trigger(&buffer), 2);
        assert_eq!(trigger(&[0.1; 8]), 0);
    }
}
