#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic cache generation keyed by cell coordinates.
//!
//! Every decision is a pure function of the global seed string, a domain tag
//! and the cell's row and column. Nothing here holds state between calls, so
//! revisiting a cell after a restart reproduces the same verdicts.

use geocache_core::{Cell, ConfigError, Token, WorldConfig};
use sha2::{Digest, Sha256};

/// Pure system answering "is there a cache here" and "what did it start with".
#[derive(Clone, Debug)]
pub struct Generator {
    seed: String,
    spawn_tag: String,
    token_count_tag: String,
    spawn_probability: f64,
    token_draw_scale: u32,
}

impl Generator {
    /// Creates a generator from validated configuration.
    pub fn new(config: &WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            seed: config.seed.clone(),
            spawn_tag: config.spawn_tag.clone(),
            token_count_tag: config.token_count_tag.clone(),
            spawn_probability: config.spawn_probability,
            token_draw_scale: config.token_draw_scale,
        })
    }

    /// Spawn test: reports whether a cache exists at the cell.
    #[must_use]
    pub fn exists_at(&self, cell: Cell) -> bool {
        luck(&self.seed, &draw_key(cell, &self.spawn_tag)) < self.spawn_probability
    }

    /// Number of tokens a fresh cache at the cell starts with.
    ///
    /// Only consulted the first time a cache is generated; once a snapshot
    /// exists the stored tokens are authoritative.
    #[must_use]
    pub fn token_count_for(&self, cell: Cell) -> u32 {
        let draw = luck(&self.seed, &draw_key(cell, &self.token_count_tag));
        let scaled = (draw * f64::from(self.token_draw_scale)).floor();
        scaled.clamp(0.0, f64::from(u32::MAX)) as u32
    }

    /// Mints the initial token collection for a fresh cache at the cell.
    #[must_use]
    pub fn initial_tokens(&self, cell: Cell) -> Vec<Token> {
        (0..self.token_count_for(cell))
            .map(|serial| Token::new(cell, serial))
            .collect()
    }
}

/// Deterministic draw in `[0, 1)` for the provided seed and key.
#[must_use]
pub fn luck(seed: &str, key: &str) -> f64 {
    let mut rng = SplitMix64::new(derive_labeled_seed(seed, key));
    rng.next_unit()
}

fn draw_key(cell: Cell, tag: &str) -> String {
    format!("{},{},{tag}", cell.row(), cell.col())
}

fn derive_labeled_seed(seed: &str, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    // Separator keeps ("ab", "c") and ("a", "bc") apart.
    hasher.update([0u8]);
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}

#[derive(Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    fn next_unit(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
        let value = self.next_u64() >> 11;
        (value as f64) * SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(spawn_probability: f64, token_draw_scale: u32) -> Generator {
        Generator::new(&WorldConfig {
            spawn_probability,
            token_draw_scale,
            ..WorldConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn luck_is_stable_for_same_inputs() {
        assert_eq!(luck("geocache", "0,0,spawn"), luck("geocache", "0,0,spawn"));
        assert_ne!(luck("geocache", "0,0,spawn"), luck("geocache", "0,1,spawn"));
        assert_ne!(luck("geocache", "0,0,spawn"), luck("other", "0,0,spawn"));
    }

    #[test]
    fn luck_stays_in_unit_interval() {
        for row in -50..50 {
            let value = luck("geocache", &format!("{row},7,spawn"));
            assert!((0.0..1.0).contains(&value), "draw out of range: {value}");
        }
    }

    #[test]
    fn spawn_rate_tracks_probability() {
        let generator = generator(0.1, 5);
        let mut hits = 0u32;
        for row in 0..100 {
            for col in 0..100 {
                if generator.exists_at(Cell::new(row, col)) {
                    hits += 1;
                }
            }
        }
        let rate = f64::from(hits) / 10_000.0;
        assert!((0.08..0.12).contains(&rate), "spawn rate drifted: {rate}");
    }

    #[test]
    fn probability_extremes_are_absolute() {
        let never = generator(0.0, 5);
        let always = generator(1.0, 5);
        for col in -20..20 {
            let cell = Cell::new(3, col);
            assert!(!never.exists_at(cell));
            assert!(always.exists_at(cell));
        }
    }

    #[test]
    fn token_count_respects_scale() {
        let scaled = generator(0.1, 5);
        for row in -30..30 {
            let count = scaled.token_count_for(Cell::new(row, -row));
            assert!(count < 5, "token count {count} exceeds scale");
        }
        assert_eq!(generator(0.1, 0).token_count_for(Cell::new(1, 1)), 0);
    }

    #[test]
    fn initial_tokens_are_minted_in_cell() {
        let generator = generator(0.1, 100);
        let cell = Cell::new(369_995, -1_220_533);
        let tokens = generator.initial_tokens(cell);
        assert_eq!(tokens.len() as u32, generator.token_count_for(cell));
        for (serial, token) in tokens.iter().enumerate() {
            assert_eq!(token.origin(), cell);
            assert_eq!(token.serial() as usize, serial);
        }
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let config = WorldConfig {
            spawn_probability: -0.5,
            ..WorldConfig::default()
        };
        assert!(Generator::new(&config).is_err());
    }
}
