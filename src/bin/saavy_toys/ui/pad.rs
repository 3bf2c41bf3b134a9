//! The play surface
//!
//! Pointer position plus whatever the current toy last published, drawn on
//! the unit square with y running down like the pointer does.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Circle, Context, Line},
        Block, Borders,
    },
    Frame,
};

use saavy_toys::io::gesture::Point;
use saavy_toys::io::view::Snapshot;
use saavy_toys::Status;

/// Draw the pad and return the area pointer events are read against.
pub fn render_pad(
    frame: &mut Frame,
    area: Rect,
    status: Status,
    pointer: Option<Point>,
    snapshot: Option<&Snapshot>,
) -> Rect {
    let title = match status {
        Status::Idle => " press Enter to start ",
        Status::Loading => " loading... ",
        Status::Ready => " pad ",
        Status::Halted => " halted, pick a toy ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(match status {
            Status::Ready => Color::Cyan,
            Status::Halted => Color::Red,
            _ => Color::DarkGray,
        }));
    let inner = block.inner(area);

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, 1.0])
        .y_bounds([0.0, 1.0])
        .paint(|ctx| {
            if let Some(snapshot) = snapshot {
                paint_snapshot(ctx, snapshot);
            }
            if let Some(at) = pointer {
                ctx.draw(&Circle {
                    x: at.x as f64,
                    y: 1.0 - at.y as f64,
                    radius: 0.02,
                    color: Color::Yellow,
                });
            }
        });
    frame.render_widget(canvas, area);
    inner
}

fn paint_snapshot(ctx: &mut Context, snapshot: &Snapshot) {
    match snapshot {
        Snapshot::Cleared => {}
        Snapshot::Mode { name } => ctx.print(0.02, 0.95, name.to_string()),
        Snapshot::Dna {
            runs,
            note_duration,
        } => {
            for (i, run) in runs.iter().enumerate() {
                let y = 1.0 - (i as f64 + 1.0) / (runs.len() as f64 + 1.0);
                let x = run.pan as f64 + 0.5;
                let color = if run.playing {
                    Color::Green
                } else {
                    Color::DarkGray
                };
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: 0.01 + 0.02 * *note_duration as f64,
                    color,
                });
                ctx.print(x + 0.03, y, format!("{}:{}", run.voice, run.index));
            }
        }
        Snapshot::Drop { pan } => ctx.draw(&Line {
            x1: *pan as f64 + 0.5,
            y1: 0.0,
            x2: *pan as f64 + 0.5,
            y2: 0.1,
            color: Color::Blue,
        }),
        Snapshot::Drive { gain } => ctx.draw(&Line {
            x1: 0.0,
            y1: 0.02,
            x2: (*gain as f64 / 12.0).min(1.0),
            y2: 0.02,
            color: Color::Magenta,
        }),
        Snapshot::Breath { prompt } => ctx.print(0.42, 0.5, prompt.to_string()),
        Snapshot::Concrete {
            blur,
            scale,
            opacity,
        } => {
            if *opacity > 0.0 {
                ctx.draw(&Circle {
                    x: 0.5,
                    y: 0.5,
                    radius: 0.05 + 0.2 * *scale as f64 + 0.01 * *blur as f64,
                    color: Color::White,
                });
            }
        }
    }
}
