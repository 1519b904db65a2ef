//! Castling rights as a 4-bit field.

use std::fmt;

use crate::error::FenError;

/// Castling rights: bit 0 = `K`, 1 = `Q`, 2 = `k`, 3 = `q`.
///
/// Feature encoding ignores castling; the rights are carried so a position
/// prints back to the same FEN and mirrors correctly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastleRights(u8);

impl CastleRights {
    pub const NONE: CastleRights = CastleRights(0);
    pub const ALL: CastleRights = CastleRights(0b1111);

    const FLAGS: [(char, u8); 4] = [('K', 0b0001), ('Q', 0b0010), ('k', 0b0100), ('q', 0b1000)];

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Rights with the two colors exchanged (`KQ` <-> `kq`).
    #[inline]
    pub const fn swap_colors(self) -> CastleRights {
        CastleRights(((self.0 & 0b0011) << 2) | ((self.0 & 0b1100) >> 2))
    }

    /// Parse the FEN castling field (`"KQkq"`, `"Kq"`, `"-"`, ...).
    pub fn from_fen(s: &str) -> Result<CastleRights, FenError> {
        if s == "-" {
            return Ok(CastleRights::NONE);
        }
        let mut bits = 0;
        for c in s.chars() {
            let (_, flag) = Self::FLAGS
                .iter()
                .find(|(letter, _)| *letter == c)
                .ok_or(FenError::InvalidCastlingChar { character: c })?;
            bits |= flag;
        }
        Ok(CastleRights(bits))
    }
}

impl fmt::Display for CastleRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (letter, flag) in Self::FLAGS {
            if self.0 & flag != 0 {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastleRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastleRights({self})")
    }
}
