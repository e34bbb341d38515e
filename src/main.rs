mod app;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::{App, Home};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::{info, warn};
use tui_pinmap::data::{self, ContentSource, GeoJsonEntitySource, LocalThumbnails, SyntheticEntitySource};
use tui_pinmap::geo::GeoPoint;
use tui_pinmap::logging::{self, DEFAULT_LOG_DIR};

/// Grid spacing of the fallback base map (degrees)
const GRATICULE_STEP: f64 = 0.005;
const GRATICULE_CELLS: i32 = 60;

/// Geotagged posts and audio records on a terminal map
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// GeoJSON file of point features to show as markers
    #[arg(long)]
    data: Option<PathBuf>,

    /// GeoJSON line/polygon file drawn under the markers
    #[arg(long)]
    basemap: Option<PathBuf>,

    /// Start latitude
    #[arg(long, default_value_t = 37.5665, allow_negative_numbers = true)]
    lat: f64,

    /// Start longitude
    #[arg(long, default_value_t = 126.978, allow_negative_numbers = true)]
    lon: f64,

    /// Start zoom level (2-21)
    #[arg(long, default_value_t = 16.0)]
    zoom: f64,

    /// Generate this many entities instead of reading --data
    #[arg(long, default_value_t = 800)]
    synthetic: usize,

    /// Scatter radius of generated entities (meters)
    #[arg(long, default_value_t = 3_000.0)]
    spread: f64,

    /// Seed for generated entities
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Artificial delay on every entity fetch (ms)
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Directory for tui-pinmap.log
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let guard = logging::init_logging(&args.log_dir)
        .with_context(|| format!("initializing logging in {}", args.log_dir.display()))?;
    info!(log = %guard.path.display(), ?args, "starting");

    // Thumbnails and entity fetches run here; the UI loop stays on this thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("pinmap-io")
        .enable_all()
        .build()
        .context("starting the tokio runtime")?;

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, &args, runtime.handle().clone());

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    if let Err(ref e) = result {
        warn!(error = %e, "exited with error");
    }
    result
}

fn build_source(args: &Args, center: GeoPoint) -> (ContentSource, LocalThumbnails) {
    let latency = Duration::from_millis(args.latency_ms);
    match &args.data {
        Some(path) => {
            let base_dir = path.parent().map(|p| p.to_path_buf());
            let source = GeoJsonEntitySource::new(path).with_latency(latency);
            (ContentSource::GeoJson(source), LocalThumbnails::new(base_dir))
        }
        None => {
            let source = SyntheticEntitySource::new(center, args.spread, args.synthetic, args.seed).with_latency(latency);
            (ContentSource::Synthetic(source), LocalThumbnails::default())
        }
    }
}

/// Handle mouse events for panning, zooming and selection
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        // Press and release selects, press and drag pans
        MouseEventKind::Down(MouseButton::Left) => app.begin_press(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_press(mouse.column, mouse.row),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, args: &Args, runtime: tokio::runtime::Handle) -> Result<()> {
    let size = terminal.size()?;
    let home = Home {
        center: GeoPoint::new(args.lat, args.lon),
        zoom: args.zoom,
    };
    let (source, thumbnails) = build_source(args, home.center);
    let mut app = App::new(size.width as usize, size.height as usize, home, source, thumbnails, runtime);

    if let Some(path) = &args.basemap {
        if let Err(e) = data::load_basemap(&mut app.map_renderer, path) {
            warn!(error = %e, "base map unavailable");
        }
    }

    // Fall back to a reference grid if no base map loaded
    if !app.map_renderer.has_data() {
        data::generate_graticule(&mut app.map_renderer, home.center, GRATICULE_STEP, GRATICULE_CELLS);
    }

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -8),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 8),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Content filters
                            KeyCode::Char(c @ '1'..='5') => app.toggle_kind(c as usize - '1' as usize),
                            KeyCode::Char('a') | KeyCode::Char('A') => app.toggle_records(),

                            // Layer toggles
                            KeyCode::Char('b') | KeyCode::Char('B') => app.map_renderer.toggle_basemap(),
                            KeyCode::Char('L') => app.map_renderer.toggle_labels(),
                            KeyCode::Char('m') | KeyCode::Char('M') => app.map_renderer.toggle_markers(),

                            // Reset view
                            KeyCode::Char('r') | KeyCode::Char('0') => app.reset(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse(&mut app, mouse);
                }
                Event::Resize(width, height) => {
                    app.resize(width as usize, height as usize);
                }
                _ => {}
            }
        }

        app.update(Instant::now());

        if app.should_quit {
            break;
        }
    }

    info!("quit");
    Ok(())
}
