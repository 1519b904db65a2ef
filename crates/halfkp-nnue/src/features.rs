//! HalfKP feature encoding: one sparse binary vector per perspective.

use halfkp_core::{Color, PieceKind, Position, Square};
use tracing::debug;

use crate::config::FeatureLayout;

/// A fixed-length vector of 0/1 features stored as a bitset.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector {
    len: usize,
    words: Vec<u64>,
}

impl FeatureVector {
    /// An all-zero vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(64)],
        }
    }

    /// Build from dense values: any non-zero entry is a set feature.
    pub fn from_dense(values: &[f32]) -> Self {
        let mut features = Self::zeros(values.len());
        for (i, _) in values.iter().enumerate().filter(|(_, v)| **v != 0.0) {
            features.set(i);
        }
        features
    }

    /// Length of the vector (set or not).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of set features.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// `true` when no feature is set. A missing perspective king gives an
    /// empty vector, but so does a board holding only kings; whether a position
    /// can be scored is [`Evaluator::is_evaluable`](crate::evaluator::Evaluator::is_evaluable).
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    #[inline]
    pub fn is_set(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Set `index`. Returns `false` and leaves the vector unchanged when the
    /// index is outside the vector.
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / 64] |= 1u64 << (index % 64);
        true
    }

    /// Set indices in ascending order.
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(word_index * 64 + bit)
            })
        })
    }

    /// Dense 0.0 / 1.0 representation.
    pub fn to_dense(&self) -> Vec<f32> {
        let mut dense = vec![0.0; self.len];
        for i in self.active() {
            dense[i] = 1.0;
        }
        dense
    }
}

impl std::fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureVector")
            .field("len", &self.len)
            .field("active", &self.active().collect::<Vec<_>>())
            .finish()
    }
}

/// Number of squares per piece-kind block.
const SQUARES: usize = 64;

/// Compute the HalfKP index for one piece as seen from one perspective.
///
/// `king_sq` and `piece_sq` must already be mirrored for the Black perspective.
/// `ally` is whether the piece belongs to the perspective side.
#[inline]
pub fn feature_index(
    layout: FeatureLayout,
    king_sq: Square,
    ally: bool,
    kind: PieceKind,
    piece_sq: Square,
) -> usize {
    let bucket = if ally { 0 } else { 1 };
    king_sq.index() * layout.king_stride()
        + bucket * PieceKind::COUNT * SQUARES
        + kind.index() * SQUARES
        + piece_sq.index()
}

/// Maps positions to per-perspective feature vectors.
///
/// Pure and stateless apart from its immutable layout, so one codec can be
/// shared across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfKpCodec {
    layout: FeatureLayout,
    input_size: usize,
}

impl HalfKpCodec {
    /// Codec whose vectors span the whole layout.
    pub fn new(layout: FeatureLayout) -> Self {
        Self {
            layout,
            input_size: layout.input_size(),
        }
    }

    /// Codec with an explicit vector length; indices at or beyond it are dropped.
    pub fn with_input_size(layout: FeatureLayout, input_size: usize) -> Self {
        Self { layout, input_size }
    }

    #[inline]
    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Encode both perspectives: `(white, black)`.
    pub fn encode(&self, position: &Position) -> (FeatureVector, FeatureVector) {
        (
            self.encode_perspective(position, Color::White),
            self.encode_perspective(position, Color::Black),
        )
    }

    /// Encode the perspective of the side to move.
    pub fn encode_side_to_move(&self, position: &Position) -> FeatureVector {
        self.encode_perspective(position, position.side_to_move())
    }

    /// Encode the board as seen by `perspective`.
    ///
    /// A missing perspective king yields an all-zero vector.
    pub fn encode_perspective(&self, position: &Position, perspective: Color) -> FeatureVector {
        let mut features = FeatureVector::zeros(self.input_size);

        let Some(king_sq) = position.king_square(perspective) else {
            debug!(%perspective, "no king for perspective, returning empty features");
            return features;
        };
        let orient = |sq: Square| match perspective {
            Color::White => sq,
            Color::Black => sq.mirror(),
        };
        let king_sq = orient(king_sq);

        let mut dropped = 0usize;
        for color in Color::ALL {
            let ally = color == perspective;
            for kind in PieceKind::NON_KING {
                for sq in position.pieces_of(kind, color) {
                    let index = feature_index(self.layout, king_sq, ally, kind, orient(sq));
                    if !features.set(index) {
                        dropped += 1;
                    }
                }
            }
        }

        if dropped > 0 {
            debug!(
                %perspective,
                dropped,
                input_size = self.input_size,
                "feature indices outside the input were dropped"
            );
        }
        features
    }
}

impl Default for HalfKpCodec {
    fn default() -> Self {
        Self::new(FeatureLayout::Compact)
    }
}

#[cfg(test)]
mod tests {
    use halfkp_core::{Color, PieceKind, Position, STARTING_FEN, Square};

    use super::{FeatureVector, HalfKpCodec, feature_index};
    use crate::config::FeatureLayout;

    fn pos(fen: &str) -> Position {
        fen.parse().unwrap()
    }

    #[test]
    fn bitset_basics() {
        let mut v = FeatureVector::zeros(130);
        assert!(v.is_empty());
        assert!(v.set(0));
        assert!(v.set(129));
        assert!(!v.set(130));
        assert_eq!(v.count(), 2);
        assert_eq!(v.active().collect::<Vec<_>>(), vec![0, 129]);
        assert!(v.is_set(129));
        assert!(!v.is_set(500));
        assert_eq!(FeatureVector::from_dense(&v.to_dense()), v);
    }

    #[test]
    fn compact_index_formula() {
        let idx = feature_index(FeatureLayout::Compact, Square::E1, false, PieceKind::Queen, Square::D8);
        assert_eq!(idx, 384 + 4 * 64 + 59);
        let idx = feature_index(FeatureLayout::KingRelative, Square::E1, true, PieceKind::Pawn, Square::E2);
        assert_eq!(idx, 4 * 640 + 12);
    }

    #[test]
    fn starting_position_sets_thirty_bits_each() {
        let codec = HalfKpCodec::default();
        let (white, black) = codec.encode(&pos(STARTING_FEN));
        assert_eq!(white.len(), 768);
        assert_eq!(white.count(), 30);
        assert_eq!(black.count(), 30);
        // the start position is its own color-reversed mirror
        assert_eq!(white, black);
    }

    #[test]
    fn black_perspective_mirrors_squares() {
        let codec = HalfKpCodec::default();
        let position = pos("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        let white = codec.encode_perspective(&position, Color::White);
        let black = codec.encode_perspective(&position, Color::Black);
        // white pawn on e2: ally for white, enemy for black seen from e7
        assert_eq!(white.active().collect::<Vec<_>>(), vec![Square::E2.index()]);
        assert_eq!(black.active().collect::<Vec<_>>(), vec![384 + Square::E7.index()]);
    }

    #[test]
    fn kings_never_set_bits() {
        let codec = HalfKpCodec::default();
        let (white, black) = codec.encode(&pos("4k3/8/8/8/8/8/8/4K3 w - - 0 1"));
        assert!(white.is_empty());
        assert!(black.is_empty());
    }

    #[test]
    fn missing_king_degrades_to_zero_vector() {
        let codec = HalfKpCodec::default();
        let position = pos("8/8/8/8/4r3/8/8/4K3 w - - 0 1");
        let (white, black) = codec.encode(&position);
        assert_eq!(white.count(), 1);
        assert!(black.is_empty());
        assert_eq!(black.len(), 768);
    }

    #[test]
    fn out_of_range_indices_are_dropped() {
        // literal king-relative formula squeezed into 768 inputs
        let codec = HalfKpCodec::with_input_size(FeatureLayout::KingRelative, 768);
        let (white, _) = codec.encode(&pos(STARTING_FEN));
        assert!(white.is_empty(), "king on e1 pushes every index past 767");

        let corner = pos("4k3/pppppppp/8/8/8/8/PPPPPPPP/K7 w - - 0 1");
        let (white, black) = codec.encode(&corner);
        assert_eq!(white.count(), 16, "king on a1 keeps every index in range");
        assert!(black.is_empty());
    }

    #[test]
    fn king_relative_layout_keeps_every_piece() {
        let codec = HalfKpCodec::new(FeatureLayout::KingRelative);
        let (white, black) = codec.encode(&pos(STARTING_FEN));
        assert_eq!(white.count(), 30);
        assert_eq!(black.count(), 30);
        assert!(white.active().all(|i| i < FeatureLayout::KingRelative.input_size()));
    }
}
