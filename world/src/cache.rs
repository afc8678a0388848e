//! Mutable token collection bound to a single cell.

use geocache_core::{Cell, Token};

use crate::{
    board::Board,
    snapshot::{self, SnapshotError},
};

/// Tokens currently present at one cell.
///
/// Tokens keep their insertion order; the most recently added token is the
/// one [`Cache::pop_token`] hands out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cache {
    cell: Cell,
    tokens: Vec<Token>,
}

impl Cache {
    /// Creates a cache at the cell holding the provided tokens.
    #[must_use]
    pub fn new(cell: Cell, tokens: Vec<Token>) -> Self {
        Self { cell, tokens }
    }

    /// Cell the cache is bound to.
    #[must_use]
    pub const fn cell(&self) -> Cell {
        self.cell
    }

    /// Tokens currently present, oldest first.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Number of tokens present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Reports whether the cache holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reports whether a token with the given identity is present.
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        self.tokens.contains(&token)
    }

    /// Places a token into the cache.
    ///
    /// Callers move tokens by identity, so the token must already have been
    /// removed from its previous container.
    pub fn add_token(&mut self, token: Token) {
        debug_assert!(!self.contains(token), "token {token} already cached");
        self.tokens.push(token);
    }

    /// Removes the token with the given identity; `None` is a plain miss.
    pub fn remove_token(&mut self, token: Token) -> Option<Token> {
        let index = self.tokens.iter().position(|held| *held == token)?;
        Some(self.tokens.remove(index))
    }

    /// Removes the most recently added token.
    pub fn pop_token(&mut self) -> Option<Token> {
        self.tokens.pop()
    }

    /// Captures the cache as a snapshot string.
    #[must_use]
    pub fn serialize(&self) -> String {
        snapshot::encode(self.cell, &self.tokens)
    }

    /// Restores a cache from a snapshot, re-canonicalizing its cell.
    pub fn deserialize(value: &str, board: &mut Board) -> Result<Self, SnapshotError> {
        let decoded = snapshot::decode(value)?;
        Ok(Self {
            cell: board.canonical(decoded.cell),
            tokens: decoded.tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn sample_cache() -> Cache {
        let cell = Cell::new(10, -20);
        Cache::new(cell, (0..4).map(|serial| Token::new(cell, serial)).collect())
    }

    #[test]
    fn remove_by_identity_takes_matching_token() {
        let mut cache = sample_cache();
        let target = Token::new(Cell::new(10, -20), 2);
        assert_eq!(cache.remove_token(target), Some(target));
        assert!(!cache.contains(target));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn remove_missing_token_is_a_miss() {
        let mut cache = sample_cache();
        assert_eq!(cache.remove_token(Token::new(Cell::new(0, 0), 0)), None);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn pop_takes_most_recent_token() {
        let mut cache = sample_cache();
        let deposited = Token::new(Cell::new(1, 1), 9);
        cache.add_token(deposited);
        assert_eq!(cache.pop_token(), Some(deposited));
        assert_eq!(cache.pop_token(), Some(Token::new(Cell::new(10, -20), 3)));
    }

    #[test]
    fn deserialize_registers_cell_with_board() {
        let cache = sample_cache();
        let mut board = Board::new(1e-4).expect("board");
        assert!(!board.is_known(cache.cell()));

        let restored = Cache::deserialize(&cache.serialize(), &mut board).expect("restores");
        assert!(board.is_known(cache.cell()));
        assert_eq!(restored.cell(), cache.cell());

        let before: BTreeSet<Token> = cache.tokens().iter().copied().collect();
        let after: BTreeSet<Token> = restored.tokens().iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn deserialize_reports_corruption() {
        let mut board = Board::new(1e-4).expect("board");
        assert!(Cache::deserialize("cache:v1:1,1:not-json", &mut board).is_err());
        assert!(!board.is_known(Cell::new(1, 1)));
    }
}
