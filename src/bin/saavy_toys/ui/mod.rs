//! TUI module for saavy-toys
//!
//! A pad to play on, the state of the current toy, and a scope and spectrum
//! of what it sounds like.

mod pad;
mod spectrum;
mod transport;
mod waveform;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use color_eyre::eyre::{eyre, Result as EyreResult};
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use tracing::debug;

use saavy_toys::io::gesture::{normalize, Point, Surface};
use saavy_toys::io::loader::BackgroundLoad;
use saavy_toys::io::view::Snapshot;
use saavy_toys::{Engine, SynthKind};

use super::app::Samples;
use pad::render_pad;
use spectrum::{render_spectrum, SpectrumAnalyzer};
use transport::{render_transport, AudioStats};
use waveform::render_waveform;

/// Audio visualization buffer size
pub const VIS_BUFFER_SIZE: usize = 1024;

pub struct UiApp {
    engine: Arc<Mutex<Engine>>,
    samples: Samples,
    load: Option<BackgroundLoad>,
    audio_rx: Consumer<f32>,
    audio_buffer: Vec<f32>,
    spectrum: SpectrumAnalyzer,
    /// Latest thing the toy showed, kept until it clears it
    snapshot: Option<Snapshot>,
    /// Where the pointer is held, if it is
    pointer: Option<Point>,
    /// Pad area from the last draw, in terminal cells
    pad: Rect,
    started: Instant,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        engine: Arc<Mutex<Engine>>,
        samples: Samples,
        audio_rx: Consumer<f32>,
        sample_rate: f32,
    ) -> Self {
        Self {
            engine,
            samples,
            load: None,
            audio_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            spectrum: SpectrumAnalyzer::new(VIS_BUFFER_SIZE, sample_rate),
            snapshot: None,
            pointer: None,
            pad: Rect::default(),
            started: Instant::now(),
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.poll_load()?;
            self.step()?;

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key.code)?;
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn engine(&self) -> EyreResult<MutexGuard<'_, Engine>> {
        self.engine
            .lock()
            .map_err(|_| eyre!("audio thread panicked while holding the engine"))
    }

    /// Advance the host clock and pick up what the toy published.
    fn step(&mut self) -> EyreResult<()> {
        let now = self.started.elapsed().as_secs_f64();
        let snapshot = {
            let mut engine = self.engine()?;
            engine.tick(now);
            engine.frame()
        };
        match snapshot {
            Some(Snapshot::Cleared) => self.snapshot = None,
            Some(snapshot) => self.snapshot = Some(snapshot),
            None => {}
        }
        Ok(())
    }

    fn poll_audio(&mut self) {
        let mut new_samples = Vec::new();
        while let Ok(sample) = self.audio_rx.pop() {
            new_samples.push(sample);
        }
        if !new_samples.is_empty() {
            self.audio_buffer.extend(new_samples);
            if self.audio_buffer.len() > VIS_BUFFER_SIZE {
                let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
                self.audio_buffer.drain(0..excess);
            }
            self.spectrum.update(&self.audio_buffer);
        }
    }

    fn poll_load(&mut self) -> EyreResult<()> {
        let Some(result) = self.load.as_mut().and_then(BackgroundLoad::poll) else {
            return Ok(());
        };
        self.load = None;
        self.engine()?.complete_load(result);
        Ok(())
    }

    fn select(&mut self, kind: SynthKind) -> EyreResult<()> {
        // a load still running belongs to the old toy
        self.load = None;
        self.pointer = None;
        self.snapshot = None;
        self.engine()?.select(kind);
        Ok(())
    }

    fn ready(&mut self) -> EyreResult<()> {
        let request = self.engine()?.init();
        if let Some(request) = request {
            debug!(groups = request.groups.len(), "loading assets");
            self.load = Some(self.samples.spawn(request));
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) -> EyreResult<()> {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.ready()?,
            KeyCode::Char(c) => {
                // 1-9 then 0 for the tenth
                let id = match c.to_digit(10) {
                    Some(0) => Some(10),
                    Some(d) => Some(d as u8),
                    None => None,
                };
                if let Some(kind) = id.and_then(SynthKind::from_id) {
                    self.select(kind)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> EyreResult<()> {
        let surface = Surface::new(
            self.pad.x as f32,
            self.pad.y as f32,
            self.pad.width as f32,
            self.pad.height as f32,
        );
        // centre of the cell
        let (px, py) = (mouse.column as f32 + 0.5, mouse.row as f32 + 0.5);
        let at = normalize(&surface, px, py);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if surface.contains(px, py) => {
                let active = {
                    let mut engine = self.engine()?;
                    engine.pointer_down(at.x, at.y);
                    engine.is_gesture_active()
                };
                if active {
                    self.pointer = Some(at);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.pointer.is_some() => {
                self.pointer = Some(at);
                self.engine()?.pointer_move(at.x, at.y);
            }
            MouseEventKind::Up(MouseButton::Left) if self.pointer.take().is_some() => {
                self.engine()?.pointer_up();
            }
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(8),    // Pad
                Constraint::Length(8), // Scope and spectrum
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let (kind, status) = match self.engine.lock() {
            Ok(engine) => (engine.kind(), engine.status()),
            Err(_) => return,
        };
        let stats = AudioStats::from_buffer(&self.audio_buffer);
        render_transport(frame, chunks[0], kind, status, self.snapshot.as_ref(), &stats);

        self.pad = render_pad(frame, chunks[1], status, self.pointer, self.snapshot.as_ref());

        let scopes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);
        render_waveform(frame, scopes[0], &self.audio_buffer);
        render_spectrum(frame, scopes[1], self.spectrum.data());

        let help = Paragraph::new(" [1-0] Toy  [Enter] Ready  [Mouse] Play  [Q] Quit")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
