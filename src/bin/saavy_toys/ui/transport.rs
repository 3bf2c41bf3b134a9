//! Status bar - current toy, readiness, what it last said, and audio stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_toys::io::view::Snapshot;
use saavy_toys::{Status, SynthKind};

pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

fn describe(snapshot: Option<&Snapshot>) -> String {
    match snapshot {
        None | Some(Snapshot::Cleared) => String::new(),
        Some(Snapshot::Mode { name }) => format!("mode {name}"),
        Some(Snapshot::Dna { runs, .. }) => format!("{} runs", runs.len()),
        Some(Snapshot::Drop { pan }) => format!("drop at {pan:+.2}"),
        Some(Snapshot::Drive { gain }) => format!("drive {gain:.1}"),
        Some(Snapshot::Breath { prompt }) => prompt.to_string(),
        Some(Snapshot::Concrete { blur, scale, .. }) => format!("blur {blur:.1} scale {scale:.2}"),
    }
}

pub fn render_transport(
    frame: &mut Frame,
    area: Rect,
    kind: SynthKind,
    status: Status,
    snapshot: Option<&Snapshot>,
    audio_stats: &AudioStats,
) {
    let block = Block::default().title(" saavy-toys ").borders(Borders::ALL);

    let status_color = match status {
        Status::Ready => Color::Green,
        Status::Loading => Color::Yellow,
        Status::Idle => Color::DarkGray,
        Status::Halted => Color::Red,
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {}. {}  ", kind.id() % 10, kind),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("{status:?}  "), Style::default().fg(status_color)),
        Span::styled(
            format!("{:<24}", describe(snapshot)),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", audio_stats.peak, audio_stats.rms),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
