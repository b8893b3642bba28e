//! platoterm - a PLATO terminal client
//!
//! platoterm speaks the PLATO terminal protocol over a TCP link: it decodes
//! the host's drawing commands onto the local terminal and relays keyboard
//! input upstream, with XON/XOFF software flow control on the wire.
//!
//! # Quick Start
//!
//! ```text
//! platoterm                     # Connect to the configured host
//! platoterm irata.online:8005   # Connect to a specific service
//! platoterm --loopback          # Draw a canned frame, no network
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | printable keys | sent to the host |
//! | Enter | NEXT |
//! | Backspace | ERASE |
//! | Ctrl+Q | quit |

mod config;
mod core;
mod ui;

use std::env;
use std::io::Write;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::core::proto::{encode, Command, Coordinate, Mode, Rgb};
use crate::core::session::Session;
use crate::core::transport::{FlowConfig, TcpLink, TransportError};
use crate::ui::{KeyMapper, TextRenderer};

/// Command-line options, layered over the config file.
#[derive(Default)]
struct Options {
    host: Option<String>,
    port: Option<u16>,
    loopback: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("platoterm {}", VERSION);
}

fn print_help() {
    eprintln!("platoterm {} - a PLATO terminal client", VERSION);
    eprintln!();
    eprintln!("Usage: platoterm [OPTIONS] [HOST[:PORT]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --port <PORT>     Service port (default: 8005)");
    eprintln!("  -l, --loopback        Draw a canned frame without connecting");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys: printable input goes to the host, Enter is NEXT,");
    eprintln!("      Backspace is ERASE, Ctrl+Q quits.");
    eprintln!();
    eprintln!("Configuration: ~/.platoterm/config.toml");
    eprintln!("Log file:      ~/.platoterm/platoterm.log");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-l" | "--loopback" => {
                options.loopback = true;
            }
            "-p" | "--port" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing port argument".to_string());
                }
                options.port = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid port: {}", args[i]))?,
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => {
                if let Some((host, port)) = arg.split_once(':') {
                    options.host = Some(host.to_string());
                    options.port =
                        Some(port.parse().map_err(|_| format!("Invalid port: {}", port))?);
                } else {
                    options.host = Some(arg.to_string());
                }
            }
        }
        i += 1;
    }

    Ok(options)
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Initialize logging to file
    let log_path = config::home_dir()
        .map(|h| h.join(".platoterm").join("platoterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("platoterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    info!("platoterm starting...");

    let file_config = Config::load();
    let host = options.host.unwrap_or_else(|| file_config.host.clone());
    let port = options.port.unwrap_or(file_config.port);
    let flow = file_config.flow_control.to_flow();

    if options.loopback {
        return run_loopback(flow);
    }
    run_terminal(&host, port, flow)
}

fn run_terminal(host: &str, port: u16, flow: FlowConfig) -> anyhow::Result<()> {
    info!("connecting to {}:{}", host, port);
    let link = match TcpLink::connect(host, port) {
        Ok(link) => link,
        Err(e) => {
            eprintln!("Failed to connect to {}:{}: {}", host, port, e);
            return Err(e.into());
        }
    };
    info!("connected");

    let mut session = Session::new(flow);
    session.start(Box::new(link))?;

    let mut renderer = TextRenderer::new();
    renderer.init()?;

    let result = run_main_loop(&mut session, &mut renderer);

    // Restore the console even on error paths
    let _ = renderer.cleanup();
    let _ = crossterm::terminal::disable_raw_mode();
    print!("\x1b[?1049l\x1b[?25h\x1b[0m");
    let _ = std::io::stdout().flush();

    result
}

fn run_main_loop(session: &mut Session, renderer: &mut TextRenderer) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);

    loop {
        if !session.is_running() {
            info!("link closed");
            break;
        }

        if let Err(e) = session.pump(renderer) {
            error!("session error: {}", e);
            break;
        }

        if event::poll(poll_timeout)? {
            match event::read()? {
                Event::Key(key_event) => {
                    if key_event.kind != KeyEventKind::Press {
                        continue;
                    }

                    if key_event.modifiers.contains(KeyModifiers::CONTROL)
                        && matches!(key_event.code, KeyCode::Char('q') | KeyCode::Char('Q'))
                    {
                        info!("quit requested");
                        break;
                    }

                    if let Some(bytes) = KeyMapper::map(&key_event) {
                        match session.send_input(&bytes) {
                            Ok(()) => {}
                            Err(TransportError::Full { .. }) => {
                                // Remote has us paused; the key is dropped
                                // and the user can retry once flow clears.
                                warn!("outbound buffer full, input dropped");
                            }
                            Err(e) => {
                                error!("failed to send input: {}", e);
                                break;
                            }
                        }
                    }
                }
                Event::Resize(cols, rows) => {
                    info!("resize: {}x{}", cols, rows);
                    renderer.resize(cols, rows);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Decode and draw a canned frame without a network peer, to check the
/// terminal setup end to end.
fn run_loopback(flow: FlowConfig) -> anyhow::Result<()> {
    info!("running loopback demo");
    let frame: Vec<u8> = demo_frame().iter().flat_map(encode).collect();

    let mut session = Session::new(flow);
    let mut renderer = TextRenderer::new();
    renderer.init()?;

    let result = (|| -> anyhow::Result<()> {
        session.inject(&frame, &mut renderer)?;
        // Hold the frame until a key is pressed.
        loop {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }
        Ok(())
    })();

    let _ = renderer.cleanup();
    result
}

fn demo_frame() -> Vec<Command> {
    vec![
        Command::SetForeground(Rgb::new(252, 128, 0)),
        Command::ClearScreen,
        Command::SetMode(Mode::Write),
        Command::LoadCoordinate(Coordinate::new(96, 352)),
        Command::DrawLineTo(Coordinate::new(416, 352)),
        Command::DrawLineTo(Coordinate::new(416, 160)),
        Command::DrawLineTo(Coordinate::new(96, 160)),
        Command::DrawLineTo(Coordinate::new(96, 352)),
        Command::LoadCoordinate(Coordinate::new(192, 256)),
        Command::PlotCharacters(b"PLATO READY".to_vec()),
        Command::Beep,
    ]
}
