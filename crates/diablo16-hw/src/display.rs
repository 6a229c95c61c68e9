//! Diablo16 command catalogue.
//!
//! One method per controller command, each building a [`Command`] and
//! handing it to the dispatcher. Drawing and media address commands use the
//! display's blocking mode (deferred by default). Settings queries always
//! block, since the previous value they return is the point of the call.

use crate::command::Command;
use crate::dispatcher::Dispatcher;
use crate::poller::LinkConfig;
use crate::protocol::Opcode;
use crate::screen_mode::ScreenMode;
use crate::transport::Transport;
use crate::Result;
use tracing::{info, warn, Level};

/// Attempts made by [`Display::media_init_with_retries`] callers by default.
pub const DEFAULT_MEDIA_RETRIES: u32 = 10;

fn first_word(words: &[u16]) -> u16 {
    words.first().copied().unwrap_or_default()
}

fn is_one(words: &[u16]) -> bool {
    words.first() == Some(&1)
}

fn screen_mode_word(words: &[u16]) -> Option<ScreenMode> {
    words.first().and_then(|&w| ScreenMode::from_word(w).ok())
}

/// Diablo16 display driven through a pipelined dispatcher.
pub struct Display<P> {
    dispatcher: Dispatcher<P>,
    blocking: bool,
}

impl<P: Transport> Display<P> {
    /// Creates a display with default timeouts and deferred ACKs.
    pub fn new(transport: P) -> Self {
        Self::with_config(transport, LinkConfig::default())
    }

    /// Creates a display with explicit timeouts and deferred ACKs.
    pub fn with_config(transport: P, config: LinkConfig) -> Self {
        Self {
            dispatcher: Dispatcher::with_config(transport, config),
            blocking: false,
        }
    }

    /// Sets whether drawing commands wait for their ACK inline.
    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    /// Returns the underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }

    /// Returns the underlying dispatcher mutably.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<P> {
        &mut self.dispatcher
    }

    /// Collects any deferred ACK and response words.
    pub fn settle(&mut self) -> Result<bool> {
        self.dispatcher.settle()
    }

    fn draw(&mut self, name: &'static str, opcode: Opcode, args: &[u16]) -> Result<()> {
        let command = Command::new(name, opcode, args).blocking(self.blocking);
        self.dispatcher.invoke(command)
    }

    fn draw_vertices(
        &mut self,
        name: &'static str,
        opcode: Opcode,
        vertices: &[u16],
        color: u16,
    ) -> Result<()> {
        let command = Command::vertices(name, opcode, vertices, color)?.blocking(self.blocking);
        self.dispatcher.invoke(command)
    }

    fn query(&mut self, name: &'static str, opcode: Opcode, args: &[u16]) -> Result<u16> {
        let command = Command::new(name, opcode, args)
            .with_response(1, first_word)
            .blocking(true)
            .log_level(Level::INFO);
        self.dispatcher.invoke(command)
    }

    /// Clears the screen to the background colour (5.2.1).
    ///
    /// Also resets transparency, outline colour, opacity, pen, line
    /// pattern, text margins and magnification, and all origins.
    pub fn clear(&mut self) -> Result<()> {
        self.draw("clear", Opcode::Clear, &[])
    }

    /// Circle outline centred on `x, y` (5.2.3).
    pub fn draw_circle(&mut self, x: u16, y: u16, radius: u16, color: u16) -> Result<()> {
        self.draw("draw_circle", Opcode::DrawCircle, &[x, y, radius, color])
    }

    /// Solid circle centred on `x, y` (5.2.4).
    pub fn draw_circle_filled(&mut self, x: u16, y: u16, radius: u16, color: u16) -> Result<()> {
        self.draw(
            "draw_circle_filled",
            Opcode::DrawCircleFilled,
            &[x, y, radius, color],
        )
    }

    /// Line from `x1, y1` to `x2, y2` (5.2.5).
    pub fn draw_line(&mut self, x1: u16, y1: u16, x2: u16, y2: u16, color: u16) -> Result<()> {
        self.draw("draw_line", Opcode::DrawLine, &[x1, y1, x2, y2, color])
    }

    /// Rectangle outline between two corners (5.2.6).
    pub fn draw_rectangle(&mut self, x1: u16, y1: u16, x2: u16, y2: u16, color: u16) -> Result<()> {
        self.draw("draw_rectangle", Opcode::DrawRectangle, &[x1, y1, x2, y2, color])
    }

    /// Solid rectangle between two corners (5.2.7).
    pub fn draw_rectangle_filled(
        &mut self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        color: u16,
    ) -> Result<()> {
        self.draw(
            "draw_rectangle_filled",
            Opcode::DrawRectangleFilled,
            &[x1, y1, x2, y2, color],
        )
    }

    /// Open polyline (5.2.8).
    ///
    /// `vertices` is every x coordinate followed by every y coordinate, not
    /// interleaved pairs. See [`poly_points`](crate::poly_points).
    pub fn draw_polyline(&mut self, vertices: &[u16], color: u16) -> Result<()> {
        self.draw_vertices("draw_polyline", Opcode::DrawPolyline, vertices, color)
    }

    /// Closed polygon outline (5.2.9). Same vertex layout as `draw_polyline`.
    pub fn draw_polygon(&mut self, vertices: &[u16], color: u16) -> Result<()> {
        self.draw_vertices("draw_polygon", Opcode::DrawPolygon, vertices, color)
    }

    /// Solid polygon, at least 3 vertices (5.2.10).
    pub fn draw_polygon_filled(&mut self, vertices: &[u16], color: u16) -> Result<()> {
        self.draw_vertices(
            "draw_polygon_filled",
            Opcode::DrawPolygonFilled,
            vertices,
            color,
        )
    }

    /// Triangle outline (5.2.11).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_triangle(
        &mut self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        x3: u16,
        y3: u16,
        color: u16,
    ) -> Result<()> {
        self.draw(
            "draw_triangle",
            Opcode::DrawTriangle,
            &[x1, y1, x2, y2, x3, y3, color],
        )
    }

    /// Solid triangle (5.2.12).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_triangle_filled(
        &mut self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        x3: u16,
        y3: u16,
        color: u16,
    ) -> Result<()> {
        self.draw(
            "draw_triangle_filled",
            Opcode::DrawTriangleFilled,
            &[x1, y1, x2, y2, x3, y3, color],
        )
    }

    /// Moves the origin used by graphics and text (5.2.16).
    pub fn move_origin(&mut self, x: u16, y: u16) -> Result<()> {
        self.draw("move_origin", Opcode::MoveOrigin, &[x, y])
    }

    /// Sets the outline colour, returning the previous one (5.2.30).
    pub fn outline_color(&mut self, color: u16) -> Result<u16> {
        self.query("outline_color", Opcode::OutlineColor, &[color])
    }

    /// Sets contrast 0-15, returning the previous value (5.2.31).
    pub fn contrast(&mut self, level: u16) -> Result<u16> {
        self.query("contrast", Opcode::Contrast, &[level])
    }

    /// Sets the line pattern, returning the previous one (5.2.33).
    ///
    /// Zero draws solid lines; each set bit turns a pixel off.
    pub fn line_pattern(&mut self, pattern: u16) -> Result<u16> {
        self.query("line_pattern", Opcode::LinePattern, &[pattern])
    }

    /// Sets the screen mode, returning the previous one (5.2.34).
    ///
    /// `None` if the previous mode could not be read.
    pub fn screen_mode(&mut self, mode: ScreenMode) -> Result<Option<ScreenMode>> {
        let command = Command::new("screen_mode", Opcode::ScreenMode, &[mode.word()])
            .with_response(1, screen_mode_word)
            .blocking(true)
            .log_level(Level::INFO);
        self.dispatcher.invoke(command)
    }

    /// Turns transparency on or off, returning the previous state (5.2.35).
    ///
    /// Transparency turns itself off after the next image or video command.
    pub fn transparency(&mut self, enabled: bool) -> Result<bool> {
        let command = Command::new("transparency", Opcode::Transparency, &[enabled as u16])
            .with_response(1, is_one)
            .blocking(true)
            .log_level(Level::INFO);
        self.dispatcher.invoke(command)
    }

    /// Sets the colour treated as transparent, returning the previous one (5.2.36).
    pub fn transparent_color(&mut self, color: u16) -> Result<u16> {
        self.query("transparent_color", Opcode::TransparentColor, &[color])
    }

    /// Sets a graphics parameter, returning its previous value (5.2.37).
    pub fn set_graphics_parameters(&mut self, function: u16, value: u16) -> Result<u16> {
        self.query(
            "set_graphics_parameters",
            Opcode::SetGraphicsParameters,
            &[function, value],
        )
    }

    /// Initialises the uSD card (5.3.1). True on success.
    pub fn media_init(&mut self) -> Result<bool> {
        let command = Command::new("media_init", Opcode::MediaInit, &[])
            .with_response(1, is_one)
            .blocking(true)
            .log_level(Level::INFO);
        self.dispatcher.invoke(command)
    }

    /// Retries `media_init` up to `attempts` times.
    pub fn media_init_with_retries(&mut self, attempts: u32) -> Result<bool> {
        for attempt in 1..=attempts {
            if self.media_init()? {
                info!("Media initialised (attempt {}/{})", attempt, attempts);
                return Ok(true);
            }
            warn!("Media init failed (attempt {}/{})", attempt, attempts);
        }
        Ok(false)
    }

    /// Sets the media byte address for the next media read (5.3.2).
    pub fn media_set_byte(&mut self, address: u32) -> Result<()> {
        self.draw(
            "media_set_byte",
            Opcode::MediaSetByte,
            &[(address >> 16) as u16, (address & 0xFFFF) as u16],
        )
    }

    /// Draws the raw image at the current media address with its top left
    /// corner at `x, y` (5.3.11).
    pub fn media_image_raw(&mut self, x: u16, y: u16) -> Result<()> {
        self.draw("media_image_raw", Opcode::MediaImageRaw, &[x, y])
    }

    /// Draws the raw image stored at `address`.
    pub fn media_draw_image(&mut self, address: u32, x: u16, y: u16) -> Result<()> {
        self.media_set_byte(address)?;
        self.media_image_raw(x, y)
    }
}
