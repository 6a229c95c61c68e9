//! Command values and their word encoding.
//!
//! A [`Command`] is built per call and consumed once by the dispatcher. Its
//! words are transmitted exactly as given: argument order in is byte order
//! out, with no validation or reordering.

use crate::protocol::{word_to_bytes, Opcode};
use crate::{Error, Result};
use tracing::Level;

/// Decoder turning collected response words into a typed value.
pub type Decoder<T> = fn(&[u16]) -> T;

fn no_response(_: &[u16]) {}

/// One logical request to the controller.
pub struct Command<T> {
    name: &'static str,
    groups: Vec<Vec<u16>>,
    blocking: bool,
    response_words: u16,
    decode: Decoder<T>,
    level: Level,
}

impl Command<()> {
    /// Creates an ack-only command from an opcode and its arguments.
    pub fn new(name: &'static str, opcode: Opcode, args: &[u16]) -> Self {
        let mut words = Vec::with_capacity(args.len() + 1);
        words.push(opcode.word());
        words.extend_from_slice(args);
        Self::compound(name, vec![words])
    }

    /// Creates an ack-only command from several word groups written
    /// back-to-back.
    pub fn compound(name: &'static str, groups: Vec<Vec<u16>>) -> Self {
        Self {
            name,
            groups,
            blocking: false,
            response_words: 0,
            decode: no_response,
            level: Level::TRACE,
        }
    }

    /// Creates a variable-length vertex command.
    ///
    /// `vertices` holds all x coordinates followed by all y coordinates. The
    /// request is the opcode and vertex count, then the coordinate arrays,
    /// then the colour.
    pub fn vertices(
        name: &'static str,
        opcode: Opcode,
        vertices: &[u16],
        color: u16,
    ) -> Result<Self> {
        if vertices.len() % 2 != 0 {
            return Err(Error::InvalidVertices(format!(
                "{} coordinates cannot be split into x and y halves",
                vertices.len()
            )));
        }
        let count = u16::try_from(vertices.len() / 2).map_err(|_| {
            Error::InvalidVertices(format!("{} vertices exceed u16", vertices.len() / 2))
        })?;
        Ok(Self::compound(
            name,
            vec![vec![opcode.word(), count], vertices.to_vec(), vec![color]],
        ))
    }

    /// Expects `words` response words, decoded by `decode`.
    pub fn with_response<U>(self, words: u16, decode: Decoder<U>) -> Command<U> {
        Command {
            name: self.name,
            groups: self.groups,
            blocking: self.blocking,
            response_words: words,
            decode,
            level: self.level,
        }
    }
}

impl<T> Command<T> {
    /// Sets whether the ACK is resolved before `invoke` returns.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Sets the level at which the command's latency is logged.
    pub fn log_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Command name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the ACK is resolved inline.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Number of response words the controller sends back.
    pub fn response_words(&self) -> u16 {
        self.response_words
    }

    pub(crate) fn level(&self) -> Level {
        self.level
    }

    pub(crate) fn decode(&self, words: &[u16]) -> T {
        (self.decode)(words)
    }

    /// Encodes all groups into wire bytes, most significant byte first.
    pub fn encode(&self) -> Vec<u8> {
        self.groups
            .iter()
            .flatten()
            .flat_map(|&word| word_to_bytes(word))
            .collect()
    }
}

/// Converts `(x, y)` points into the xs-then-ys layout vertex commands use.
pub fn poly_points(points: &[(u16, u16)]) -> Vec<u16> {
    points
        .iter()
        .map(|&(x, _)| x)
        .chain(points.iter().map(|&(_, y)| y))
        .collect()
}
