//! Fixed-seed Zobrist table. The search tree keys its prediction cache and
//! transposition/repetition bookkeeping off `Board::fingerprint`, so the
//! table must be stable across process restarts -- hence a fixed seed
//! rather than OS randomness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Color, PieceKind, Square};

const SEED: u64 = 0x636f_7276_6964_2073; // "corvid s" ascii, arbitrary but fixed

pub struct ZobristTable {
    piece_square: [[u64; 64]; 12],
    side_to_move: u64,
    castling: [u64; 4],
    en_passant_file: [u64; 8],
}

fn piece_index(kind: PieceKind, color: Color) -> usize {
    let base = match kind {
        PieceKind::Pawn => 0,
        PieceKind::Knight => 1,
        PieceKind::Bishop => 2,
        PieceKind::Rook => 3,
        PieceKind::Queen => 4,
        PieceKind::King => 5,
    };

    base + if color == Color::White { 0 } else { 6 }
}

impl ZobristTable {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut piece_square = [[0u64; 64]; 12];

        for table in piece_square.iter_mut() {
            for slot in table.iter_mut() {
                *slot = rng.gen();
            }
        }

        let mut castling = [0u64; 4];
        for slot in castling.iter_mut() {
            *slot = rng.gen();
        }

        let mut en_passant_file = [0u64; 8];
        for slot in en_passant_file.iter_mut() {
            *slot = rng.gen();
        }

        Self { piece_square, side_to_move: rng.gen(), castling, en_passant_file }
    }

    pub fn piece(&self, kind: PieceKind, color: Color, square: Square) -> u64 {
        self.piece_square[piece_index(kind, color)][square.0 as usize]
    }

    pub fn side_to_move(&self) -> u64 {
        self.side_to_move
    }

    /// `index` follows the usual KQkq ordering: white kingside, white
    /// queenside, black kingside, black queenside.
    pub fn castling(&self, index: usize) -> u64 {
        self.castling[index]
    }

    pub fn en_passant_file(&self, file: u8) -> u64 {
        self.en_passant_file[file as usize]
    }
}

lazy_static::lazy_static! {
    pub static ref ZOBRIST: ZobristTable = ZobristTable::new();
}
