//! Deterministic random number generation with draw recording.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed produces identical sequence
//! - **Recorded**: Every word handed to a reducer is captured in its log entry
//! - **Substitutable**: Replay feeds recorded words back instead of generating
//! - **Serializable**: O(1) state capture and restore
//!
//! [`DrawSource`] implements [`RngCore`], so reducers sample through the
//! ordinary [`rand::Rng`] and [`rand::seq::SliceRandom`] methods. Each call
//! to the source records one `u64` word, including `next_u32` and every
//! eight-byte chunk of `fill_bytes`. Replay substitutes the same words, so
//! any sampling built on them reproduces exactly.
//!
//! ```
//! use rand::Rng;
//! use turnkit::core::{DrawSource, GameRng};
//!
//! let mut rng = GameRng::new(42);
//! let mut source = DrawSource::live(&mut rng);
//! let roll: u32 = source.gen_range(1..7);
//! let words = source.finish().unwrap();
//!
//! // Replaying the recorded words yields the same roll.
//! let mut replay = DrawSource::replay(&words);
//! assert_eq!(replay.gen_range(1..7), roll);
//! assert!(replay.finish().is_ok());
//! ```

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Words drawn during a single reduction. Most actions draw a handful.
pub type Draws = SmallVec<[u64; 4]>;

/// Deterministic RNG for one game instance.
///
/// Uses ChaCha8 for speed while maintaining cryptographic quality randomness.
#[derive(Clone, Debug)]
pub struct GameRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed this generator was created from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate the next raw word.
    pub fn next_word(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Discard `count` words.
    ///
    /// Replay substitutes recorded words without touching the generator;
    /// this moves a rebuilt generator to where the live one stood.
    pub fn skip(&mut self, count: u64) {
        for _ in 0..count {
            self.inner.next_u64();
        }
    }

    /// Get the current state for serialization.
    #[must_use]
    pub fn state(&self) -> GameRngState {
        GameRngState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Restore from a saved state.
    #[must_use]
    pub fn from_state(state: &GameRngState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
        }
    }
}

/// Serializable RNG state for checkpointing.
///
/// Uses ChaCha8 word position for O(1) serialization regardless of
/// how many random numbers have been generated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRngState {
    /// Original seed
    pub seed: u64,
    /// ChaCha8 word position (128-bit counter)
    pub word_pos: u128,
}

/// Replay asked for a different number of words than were recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawMismatch {
    /// Words recorded in the log entry.
    pub recorded: usize,
    /// Words the reducer asked for.
    pub requested: usize,
}

impl std::fmt::Display for DrawMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reducer drew {} random words but {} were recorded",
            self.requested, self.recorded
        )
    }
}

enum Mode<'a> {
    Live(&'a mut GameRng),
    Replay { recorded: &'a [u64], cursor: usize },
}

/// The randomness handed to reducers and setup functions.
///
/// In live mode words come from the game's [`GameRng`] and are recorded.
/// In replay mode words come from a log entry; asking for more than were
/// recorded yields zeros and is reported as a mismatch by [`finish`].
///
/// [`finish`]: DrawSource::finish
pub struct DrawSource<'a> {
    mode: Mode<'a>,
    drawn: Draws,
    overdrawn: usize,
}

impl<'a> DrawSource<'a> {
    /// Draw fresh words from `rng`, recording each one.
    pub fn live(rng: &'a mut GameRng) -> Self {
        Self {
            mode: Mode::Live(rng),
            drawn: Draws::new(),
            overdrawn: 0,
        }
    }

    /// Yield previously recorded words in order.
    pub fn replay(recorded: &'a [u64]) -> Self {
        Self {
            mode: Mode::Replay {
                recorded,
                cursor: 0,
            },
            drawn: Draws::new(),
            overdrawn: 0,
        }
    }

    fn draw(&mut self) -> u64 {
        let word = match &mut self.mode {
            Mode::Live(rng) => rng.next_word(),
            Mode::Replay { recorded, cursor } => match recorded.get(*cursor) {
                Some(&word) => {
                    *cursor += 1;
                    word
                }
                None => {
                    self.overdrawn += 1;
                    0
                }
            },
        };
        self.drawn.push(word);
        word
    }

    /// Number of words drawn so far.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.drawn.len()
    }

    /// Finish drawing and return the words consumed.
    ///
    /// In replay mode, every recorded word must have been consumed and no
    /// extra words requested.
    pub fn finish(self) -> Result<Draws, DrawMismatch> {
        if let Mode::Replay { recorded, cursor } = self.mode {
            if self.overdrawn > 0 || cursor != recorded.len() {
                return Err(DrawMismatch {
                    recorded: recorded.len(),
                    requested: cursor + self.overdrawn,
                });
            }
        }
        Ok(self.drawn)
    }
}

impl RngCore for DrawSource<'_> {
    fn next_u32(&mut self) -> u32 {
        // Low half of one recorded word.
        self.draw() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.draw()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.draw().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
