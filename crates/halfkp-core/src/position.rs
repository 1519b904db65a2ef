//! Read-only position state: piece placement, side to move, castling, en passant, counters.

use crate::bitboard::Bitboard;
use crate::castle_rights::CastleRights;
use crate::color::Color;
use crate::error::PositionError;
use crate::piece::Piece;
use crate::piece_kind::PieceKind;
use crate::square::Square;

/// A chess position as supplied by the position source.
///
/// Unlike a playing board, a `Position` may lack a king for either side.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Bitboard for each piece kind, indexed by [`PieceKind::index()`].
    pieces: [Bitboard; PieceKind::COUNT],
    /// Bitboard for each side, indexed by [`Color::index()`].
    sides: [Bitboard; Color::COUNT],
    side_to_move: Color,
    castling: CastleRights,
    en_passant: Option<Square>,
    halfmove_clock: u16,
    fullmove_number: u16,
}

impl Position {
    /// An empty board, White to move, no rights.
    pub fn empty() -> Position {
        Position {
            pieces: [Bitboard::EMPTY; PieceKind::COUNT],
            sides: [Bitboard::EMPTY; Color::COUNT],
            side_to_move: Color::White,
            castling: CastleRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// The standard starting position.
    pub fn starting_position() -> Position {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        let mut position = Position::empty();
        for (file, kind) in (0u8..).zip(BACK_RANK) {
            for (rank, pawn_rank, color) in [(0, 1, Color::White), (7, 6, Color::Black)] {
                if let (Some(back), Some(front)) =
                    (Square::from_coords(file, rank), Square::from_coords(file, pawn_rank))
                {
                    position.put(back, Piece::new(kind, color));
                    position.put(front, Piece::new(PieceKind::Pawn, color));
                }
            }
        }
        position.castling = CastleRights::ALL;
        position
    }

    /// Place a piece on an empty square. Used while building positions.
    pub(crate) fn put(&mut self, sq: Square, piece: Piece) {
        let bb = sq.bitboard();
        self.pieces[piece.kind.index()] |= bb;
        self.sides[piece.color.index()] |= bb;
    }

    pub(crate) fn set_state(
        &mut self,
        side_to_move: Color,
        castling: CastleRights,
        en_passant: Option<Square>,
        halfmove_clock: u16,
        fullmove_number: u16,
    ) {
        self.side_to_move = side_to_move;
        self.castling = castling;
        self.en_passant = en_passant;
        self.halfmove_clock = halfmove_clock;
        self.fullmove_number = fullmove_number;
    }

    /// The piece on `sq`, if any.
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        let color = Color::ALL
            .into_iter()
            .find(|&color| self.sides[color.index()].contains(sq))?;
        let kind = PieceKind::ALL
            .into_iter()
            .find(|&kind| self.pieces[kind.index()].contains(sq))?;
        Some(Piece::new(kind, color))
    }

    /// Squares holding `kind` pieces of `color`.
    #[inline]
    pub fn pieces_of(&self, kind: PieceKind, color: Color) -> Bitboard {
        self.pieces[kind.index()] & self.sides[color.index()]
    }

    /// Squares occupied by `color`.
    #[inline]
    pub fn side(&self, color: Color) -> Bitboard {
        self.sides[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.sides[Color::White.index()] | self.sides[Color::Black.index()]
    }

    /// Every piece on the board as `(square, piece)`, grouped by color then kind.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Color::ALL.into_iter().flat_map(move |color| {
            PieceKind::ALL.into_iter().flat_map(move |kind| {
                self.pieces_of(kind, color)
                    .map(move |sq| (sq, Piece::new(kind, color)))
            })
        })
    }

    /// The king square for `color`, or `None` when that king is missing.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces_of(PieceKind::King, color).lsb()
    }

    /// Number of pieces other than kings.
    pub fn non_king_count(&self) -> u32 {
        (self.occupied() & !self.pieces[PieceKind::King.index()]).count()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastleRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    /// The color-reversed mirror image: ranks flipped, piece colors swapped,
    /// side to move, castling rights and en passant square carried across.
    pub fn mirrored(&self) -> Position {
        let [white, black] = self.sides;
        Position {
            pieces: self.pieces.map(Bitboard::flip_vertical),
            sides: [black.flip_vertical(), white.flip_vertical()],
            side_to_move: !self.side_to_move,
            castling: self.castling.swap_colors(),
            en_passant: self.en_passant.map(Square::mirror),
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
    }

    /// Check structural consistency. Missing kings are accepted.
    pub fn validate(&self) -> Result<(), PositionError> {
        for color in Color::ALL {
            let count = self.pieces_of(PieceKind::King, color).count();
            if count > 1 {
                return Err(PositionError::TooManyKings {
                    color: color.name(),
                    count,
                });
            }
        }

        let back_ranks = Bitboard::RANK_1 | Bitboard::RANK_8;
        if !(self.pieces[PieceKind::Pawn.index()] & back_ranks).is_empty() {
            return Err(PositionError::PawnsOnBackRank);
        }

        for i in 0..PieceKind::COUNT {
            for j in (i + 1)..PieceKind::COUNT {
                if !(self.pieces[i] & self.pieces[j]).is_empty() {
                    return Err(PositionError::OverlappingPieces);
                }
            }
        }

        if !(self.sides[Color::White.index()] & self.sides[Color::Black.index()]).is_empty() {
            return Err(PositionError::InconsistentSides);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position(\"{self}\")")
    }
}
