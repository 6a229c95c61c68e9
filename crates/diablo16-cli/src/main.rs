//! Diablo16 Display Control Tool
//!
//! CLI for drawing on a Diablo16 display over a serial port.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diablo16_hw::{
    parse_hex_color, poly_points, Display, ScreenMode, SerialTransport, DEFAULT_MEDIA_RETRIES,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "diabloctl")]
#[command(about = "Control tool for Diablo16 serial displays")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Serial port path (overrides the configuration file)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(long)]
    baud: Option<u32>,

    /// Wait for each drawing command's ACK before sending the next
    #[arg(long, conflicts_with = "deferred")]
    blocking: bool,

    /// Collect each drawing command's ACK just before the next command
    #[arg(long)]
    deferred: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the screen to the background colour
    Clear,
    /// Draw a circle
    Circle {
        x: u16,
        y: u16,
        radius: u16,
        /// Color in hex format (e.g., #FF0000 for red)
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
        /// Fill the circle
        #[arg(long)]
        filled: bool,
    },
    /// Draw a line
    Line {
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
    },
    /// Draw a rectangle between two corners
    Rect {
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
        /// Fill the rectangle
        #[arg(long)]
        filled: bool,
    },
    /// Draw a triangle
    Triangle {
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        x3: u16,
        y3: u16,
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
        /// Fill the triangle
        #[arg(long)]
        filled: bool,
    },
    /// Draw a polygon or polyline through points
    Polygon {
        /// Points as "x,y x,y ..."
        #[arg(long)]
        points: String,
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
        /// Fill the polygon
        #[arg(long, conflicts_with = "open")]
        filled: bool,
        /// Leave the shape open (polyline)
        #[arg(long)]
        open: bool,
    },
    /// Set the contrast and show the previous value
    Contrast {
        /// Contrast level (0-15)
        level: u16,
    },
    /// Set the screen mode and show the previous one
    ScreenMode {
        /// Mode: landscape, landscape-reverse, portrait, portrait-reverse
        mode: String,
    },
    /// Initialise the uSD card
    MediaInit {
        /// Number of attempts
        #[arg(long, default_value_t = DEFAULT_MEDIA_RETRIES)]
        retries: u32,
    },
    /// Draw a raw image stored on the uSD card
    Image {
        /// Byte address of the image on the card
        #[arg(long)]
        address: u32,
        #[arg(long, default_value = "0")]
        x: u16,
        #[arg(long, default_value = "0")]
        y: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    apply_overrides(&cli, &mut config);

    let transport = SerialTransport::open(&config.serial.port, config.serial.baud)
        .with_context(|| format!("Failed to open serial port {}", config.serial.port))?;
    let mut display = Display::with_config(transport, config.link());
    display.set_blocking(config.blocking);

    run(cli.command, &mut display)?;

    // Collect the last deferred ACK so nothing is left unread on the link
    if !display.settle()? {
        let pending = display.dispatcher().pending().unwrap_or("the last command");
        warn!("Display did not acknowledge {}", pending);
    }
    if let Some(fault) = display.dispatcher().last_fault() {
        info!("Last link fault: {}", fault);
    }

    Ok(())
}

/// Applies command line flags on top of the configuration file.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud = baud;
    }
    if cli.blocking {
        config.blocking = true;
    } else if cli.deferred {
        config.blocking = false;
    }
}

fn run(command: Commands, display: &mut Display<SerialTransport>) -> Result<()> {
    match command {
        Commands::Clear => {
            display.clear()?;
            println!("Display cleared");
        }
        Commands::Circle {
            x,
            y,
            radius,
            color,
            filled,
        } => {
            let color = parse_hex_color(&color)?;
            if filled {
                display.draw_circle_filled(x, y, radius, color)?;
            } else {
                display.draw_circle(x, y, radius, color)?;
            }
        }
        Commands::Line {
            x1,
            y1,
            x2,
            y2,
            color,
        } => {
            display.draw_line(x1, y1, x2, y2, parse_hex_color(&color)?)?;
        }
        Commands::Rect {
            x1,
            y1,
            x2,
            y2,
            color,
            filled,
        } => {
            let color = parse_hex_color(&color)?;
            if filled {
                display.draw_rectangle_filled(x1, y1, x2, y2, color)?;
            } else {
                display.draw_rectangle(x1, y1, x2, y2, color)?;
            }
        }
        Commands::Triangle {
            x1,
            y1,
            x2,
            y2,
            x3,
            y3,
            color,
            filled,
        } => {
            let color = parse_hex_color(&color)?;
            if filled {
                display.draw_triangle_filled(x1, y1, x2, y2, x3, y3, color)?;
            } else {
                display.draw_triangle(x1, y1, x2, y2, x3, y3, color)?;
            }
        }
        Commands::Polygon {
            points,
            color,
            filled,
            open,
        } => {
            let vertices = poly_points(&parse_points(&points)?);
            let color = parse_hex_color(&color)?;
            if open {
                display.draw_polyline(&vertices, color)?;
            } else if filled {
                display.draw_polygon_filled(&vertices, color)?;
            } else {
                display.draw_polygon(&vertices, color)?;
            }
        }
        Commands::Contrast { level } => {
            if level > 15 {
                anyhow::bail!("Contrast must be between 0 and 15");
            }
            let previous = display.contrast(level)?;
            println!("Contrast set to: {} (was {})", level, previous);
        }
        Commands::ScreenMode { mode } => {
            let mode: ScreenMode = mode.parse()?;
            match display.screen_mode(mode)? {
                Some(previous) => println!("Screen mode set to: {} (was {})", mode, previous),
                None => println!("Screen mode set to: {} (previous unknown)", mode),
            }
        }
        Commands::MediaInit { retries } => {
            if display.media_init_with_retries(retries)? {
                println!("Media initialised");
            } else {
                anyhow::bail!("Media init failed after {} attempts", retries);
            }
        }
        Commands::Image { address, x, y } => {
            display.media_draw_image(address, x, y)?;
        }
    }

    Ok(())
}

/// Parses `"x,y x,y ..."` into points.
fn parse_points(input: &str) -> Result<Vec<(u16, u16)>> {
    input
        .split_whitespace()
        .map(|pair| -> Result<(u16, u16)> {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("Invalid point (expected x,y): {}", pair))?;
            let x: u16 = x
                .trim()
                .parse()
                .with_context(|| format!("Invalid x in {}", pair))?;
            let y: u16 = y
                .trim()
                .parse()
                .with_context(|| format!("Invalid y in {}", pair))?;
            Ok((x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        assert_eq!(
            parse_points("0,0 10,0  5,8").unwrap(),
            vec![(0, 0), (10, 0), (5, 8)]
        );
        assert!(parse_points("1,2 3").is_err());
        assert!(parse_points("1,-2").is_err());
        assert!(parse_points("").unwrap().is_empty());
    }

    #[test]
    fn test_flags_override_blocking() {
        let mut config = Config {
            blocking: true,
            ..Config::default()
        };
        let cli = Cli::try_parse_from(["diabloctl", "--deferred", "clear"]).unwrap();
        apply_overrides(&cli, &mut config);
        assert!(!config.blocking);

        let cli = Cli::try_parse_from(["diabloctl", "--blocking", "clear"]).unwrap();
        apply_overrides(&cli, &mut config);
        assert!(config.blocking);

        // Without either flag the file value stands
        let cli = Cli::try_parse_from(["diabloctl", "--baud", "115200", "clear"]).unwrap();
        apply_overrides(&cli, &mut config);
        assert!(config.blocking);
        assert_eq!(config.serial.baud, 115200);

        assert!(Cli::try_parse_from(["diabloctl", "--blocking", "--deferred", "clear"]).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "diabloctl",
            "--port",
            "/dev/ttyACM0",
            "circle",
            "10",
            "10",
            "5",
            "--filled",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        assert!(matches!(
            cli.command,
            Commands::Circle {
                x: 10,
                filled: true,
                ..
            }
        ));
    }
}
