mod app;
mod braille;
mod data;
mod feed;
mod legend;
mod map;
mod ui;
mod viz;

use anyhow::{bail, Result};
use app::App;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use viz::{ShadeMode, VizModel, VizOptions};

const USAGE: &str = "\
quakemap - terminal earthquake map

USAGE:
    quakemap [OPTIONS]

OPTIONS:
    --feed <url>        Feed URL (default: USGS all_week, or QUAKEMAP_FEED_URL)
    --file <path>       Load a local GeoJSON feed instead of fetching
    --data-dir <path>   Basemap coastline directory (default: data)
    --shade <variant>   Marker shading: color (default) or opacity
    --adjust-latitude   Shrink marker radii toward the poles
    -h, --help          Print this help
";

struct Options {
    feed_url: String,
    file: Option<PathBuf>,
    data_dir: PathBuf,
    shade: ShadeMode,
    adjust_latitude: bool,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut opts = Options {
            feed_url: std::env::var("QUAKEMAP_FEED_URL")
                .unwrap_or_else(|_| feed::DEFAULT_FEED_URL.to_string()),
            file: None,
            data_dir: PathBuf::from("data"),
            shade: ShadeMode::Color,
            adjust_latitude: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--feed" => match args.next() {
                    Some(url) => opts.feed_url = url,
                    None => bail!("--feed requires a URL\n\n{USAGE}"),
                },
                "--file" => match args.next() {
                    Some(path) => opts.file = Some(PathBuf::from(path)),
                    None => bail!("--file requires a path\n\n{USAGE}"),
                },
                "--data-dir" => match args.next() {
                    Some(path) => opts.data_dir = PathBuf::from(path),
                    None => bail!("--data-dir requires a path\n\n{USAGE}"),
                },
                "--shade" => match args.next().as_deref() {
                    Some("color") => opts.shade = ShadeMode::Color,
                    Some("opacity") => opts.shade = ShadeMode::Opacity,
                    other => bail!("--shade must be 'color' or 'opacity', got {other:?}"),
                },
                "--adjust-latitude" => opts.adjust_latitude = true,
                "-h" | "--help" => {
                    print!("{USAGE}");
                    std::process::exit(0);
                }
                other => bail!("unknown argument '{other}'\n\n{USAGE}"),
            }
        }

        Ok(opts)
    }
}

/// Log to a file: stdout/stderr belong to the TUI
fn init_tracing() -> Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("quakemap.log")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    Ok(())
}

/// One-shot feed acquisition: local file or a single HTTP GET, no retries.
/// A failure is reported in the status bar, never fatal.
fn acquire_feed(opts: &Options) -> (Option<feed::Feed>, String, Option<String>) {
    match &opts.file {
        Some(path) => match feed::load_feed_file(path) {
            Ok(f) => (Some(f), path.display().to_string(), None),
            Err(e) => {
                tracing::error!("loading {} failed: {e:#}", path.display());
                (None, path.display().to_string(), Some(format!("{e:#}")))
            }
        },
        None => {
            let fetched = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(anyhow::Error::from)
                .and_then(|rt| rt.block_on(feed::fetch_feed(&opts.feed_url)));
            match fetched {
                Ok(f) => {
                    let source = f.title.clone().unwrap_or_else(|| "usgs feed".to_string());
                    (Some(f), source, None)
                }
                Err(e) => {
                    tracing::error!("feed fetch failed: {e:#}");
                    (None, "usgs feed".to_string(), Some(format!("{e:#}")))
                }
            }
        }
    }
}

fn main() -> Result<()> {
    let opts = Options::parse(std::env::args().skip(1))?;
    init_tracing()?;

    // The whole pipeline runs once, before the event loop:
    // fetch -> range -> buckets -> classify. Rendering replays the result.
    let (feed, source, fetch_error) = acquire_feed(&opts);
    let viz_opts = VizOptions {
        shade: opts.shade,
        adjust_radius_for_latitude: opts.adjust_latitude,
    };
    let model = match &feed {
        Some(feed) => VizModel::build(feed, viz_opts),
        None => VizModel::empty(opts.shade),
    };

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, model, source, fetch_error, &opts.data_dir);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Handle mouse events for panning, zooming and marker selection
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        // Click and drag to pan
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.end_drag();
        }
        // Right click to select the nearest marker (popup equivalent)
        MouseEventKind::Down(MouseButton::Right) => {
            app.select_at(mouse.column, mouse.row);
        }
        _ => {}
    }
}

fn run(
    terminal: &mut DefaultTerminal,
    model: VizModel,
    source: String,
    fetch_error: Option<String>,
    data_dir: &Path,
) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(
        size.width as usize,
        size.height as usize,
        model,
        source,
        fetch_error,
    );

    // Load coastline basemap, falling back to the built-in outline
    if data_dir.exists() {
        data::load_basemap(&mut app.map_renderer, data_dir);
    }
    if !app.map_renderer.has_data() {
        data::generate_simple_world(&mut app.map_renderer);
    }

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| ui::render(frame, &mut app))?;

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
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Layer toggles
                            KeyCode::Char('c') | KeyCode::Char('C') => {
                                app.map_renderer.toggle_coastlines();
                            }
                            KeyCode::Char('m') | KeyCode::Char('M') => {
                                app.map_renderer.toggle_markers();
                            }
                            KeyCode::Char('g') | KeyCode::Char('G') => {
                                app.toggle_legend();
                            }

                            // Event selection
                            KeyCode::Char('n') | KeyCode::Tab => app.select_next(),
                            KeyCode::Char('p') | KeyCode::BackTab => app.select_prev(),

                            // Reset view
                            KeyCode::Char('r') | KeyCode::Char('0') => {
                                app.viewport = crate::map::Viewport::initial(
                                    app.viewport.width,
                                    app.viewport.height,
                                );
                                app.selected = None;
                            }

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

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
