//! Error types for FEN parsing and position validation.

/// Errors that occur when parsing a FEN string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    /// Only the placement, color, castling and en-passant fields are
    /// required; the two move counters are optional.
    #[error("expected 4 or 6 FEN fields, found {found}")]
    WrongFieldCount { found: usize },

    #[error("expected 8 ranks in piece placement, found {found}")]
    WrongRankCount { found: usize },

    /// `rank_index` counts from the top of the FEN (0 = rank 8).
    #[error("rank {rank_index} describes {length} squares, expected 8")]
    BadRankLength { rank_index: usize, length: usize },

    #[error("invalid piece character: '{character}'")]
    InvalidPieceChar { character: char },

    #[error("invalid active color: \"{found}\"")]
    InvalidColor { found: String },

    #[error("invalid castling character: '{character}'")]
    InvalidCastlingChar { character: char },

    #[error("invalid en passant square: \"{found}\"")]
    InvalidEnPassant { found: String },

    #[error("invalid {field}: \"{found}\"")]
    InvalidMoveCounter { field: &'static str, found: String },

    #[error("invalid position: {source}")]
    InvalidPosition {
        #[from]
        source: PositionError,
    },
}

/// Structural problems in a [`Position`](crate::Position).
///
/// A missing king is deliberately not an error: feature encoding treats it
/// as a degraded perspective.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("expected at most 1 king for {color}, found {count}")]
    TooManyKings { color: &'static str, count: u32 },

    #[error("pawns found on back rank")]
    PawnsOnBackRank,

    #[error("overlapping piece bitboards")]
    OverlappingPieces,

    #[error("white and black side bitboards overlap")]
    InconsistentSides,
}
