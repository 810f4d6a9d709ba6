//! A mailbox chess board: legal move generation, FEN parsing, Zobrist
//! fingerprinting, and terminal-state classification. This is the
//! reference implementation of the `Position` collaborator named in the
//! search spec -- a real, if unoptimized, rules engine rather than a
//! tablebase-grade move generator, since move generation speed is out of
//! this crate's scope.

use std::fmt;

use crate::types::{Color, Move, Piece, PieceKind, Square};
use crate::zobrist::ZOBRIST;
use crate::{Position, TablebaseBound, TablebaseProbe, TablebaseScore, TerminalClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    fn none() -> Self {
        Self { white_kingside: false, white_queenside: false, black_kingside: false, black_queenside: false }
    }

    fn hash_contribution(&self) -> u64 {
        let mut h = 0;
        if self.white_kingside { h ^= ZOBRIST.castling(0); }
        if self.white_queenside { h ^= ZOBRIST.castling(1); }
        if self.black_kingside { h ^= ZOBRIST.castling(2); }
        if self.black_queenside { h ^= ZOBRIST.castling(3); }
        h
    }
}

#[derive(Debug, Clone)]
struct Undo {
    mv: Move,
    moved_kind: PieceKind,
    captured: Option<(PieceKind, Square)>,
    prev_castling: CastlingRights,
    prev_en_passant: Option<Square>,
    prev_halfmove_clock: u32,
    prev_hash: u64,
    castle_rook: Option<(Square, Square)>,
}

#[derive(Debug, Clone)]
pub struct Board {
    squares: [Option<Piece>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
    history: Vec<u64>,
    undo_stack: Vec<Undo>,
}

const KNIGHT_OFFSETS: [(i8, i8); 8] =
    [(1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2)];
const KING_OFFSETS: [(i8, i8); 8] =
    [(1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

impl Board {
    pub fn starting_position() -> Self {
        Self::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap()
    }

    pub fn from_fen(fen: &str) -> Result<Self, String> {
        let mut parts = fen.split_whitespace();
        let board_part = parts.next().ok_or("missing board field")?;
        let side_part = parts.next().unwrap_or("w");
        let castling_part = parts.next().unwrap_or("-");
        let ep_part = parts.next().unwrap_or("-");
        let halfmove_part = parts.next().unwrap_or("0");
        let fullmove_part = parts.next().unwrap_or("1");

        let mut squares: [Option<Piece>; 64] = [None; 64];
        let mut rank = 7i8;
        let mut file = 0i8;

        for c in board_part.chars() {
            match c {
                '/' => {
                    if file != 8 {
                        return Err(format!("rank did not fill 8 files: {}", board_part));
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => {
                    file += c.to_digit(10).unwrap() as i8;
                }
                _ => {
                    let (kind, color) = PieceKind::from_char(c).ok_or_else(|| format!("bad piece char {}", c))?;
                    if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                        return Err("board field overflowed 8x8".to_string());
                    }
                    squares[Square::new(file as u8, rank as u8).0 as usize] = Some(Piece { kind, color });
                    file += 1;
                }
            }
        }

        let side_to_move = match side_part {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("bad side-to-move field: {}", other)),
        };

        let mut castling = CastlingRights::none();
        if castling_part != "-" {
            for c in castling_part.chars() {
                match c {
                    'K' => castling.white_kingside = true,
                    'Q' => castling.white_queenside = true,
                    'k' => castling.black_kingside = true,
                    'q' => castling.black_queenside = true,
                    _ => return Err(format!("bad castling char {}", c)),
                }
            }
        }

        let en_passant = if ep_part == "-" { None } else { Square::from_algebraic(ep_part) };
        let halfmove_clock: u32 = halfmove_part.parse().map_err(|_| "bad halfmove clock")?;
        let fullmove_number: u32 = fullmove_part.parse().map_err(|_| "bad fullmove number")?;

        let mut board = Self {
            squares,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            hash: 0,
            history: Vec::with_capacity(64),
            undo_stack: Vec::with_capacity(64),
        };

        board.hash = board.compute_hash();
        board.history.push(board.hash);

        Ok(board)
    }

    pub fn to_fen(&self) -> String {
        let mut out = String::new();

        for rank in (0..8).rev() {
            let mut empty_run = 0;

            for file in 0..8 {
                match self.squares[Square::new(file, rank).0 as usize] {
                    None => empty_run += 1,
                    Some(piece) => {
                        if empty_run > 0 {
                            out.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        out.push(piece.kind.to_char(piece.color));
                    }
                }
            }

            if empty_run > 0 {
                out.push_str(&empty_run.to_string());
            }

            if rank != 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.side_to_move == Color::White { 'w' } else { 'b' });
        out.push(' ');

        let mut any_castling = false;
        if self.castling.white_kingside { out.push('K'); any_castling = true; }
        if self.castling.white_queenside { out.push('Q'); any_castling = true; }
        if self.castling.black_kingside { out.push('k'); any_castling = true; }
        if self.castling.black_queenside { out.push('q'); any_castling = true; }
        if !any_castling { out.push('-'); }

        out.push(' ');
        out.push_str(&self.en_passant.map(|s| s.to_algebraic()).unwrap_or_else(|| "-".to_string()));
        out.push(' ');
        out.push_str(&self.halfmove_clock.to_string());
        out.push(' ');
        out.push_str(&self.fullmove_number.to_string());

        out
    }

    fn compute_hash(&self) -> u64 {
        let mut h = 0u64;

        for square in Square::all() {
            if let Some(piece) = self.squares[square.0 as usize] {
                h ^= ZOBRIST.piece(piece.kind, piece.color, square);
            }
        }

        if self.side_to_move == Color::Black {
            h ^= ZOBRIST.side_to_move();
        }

        h ^= self.castling.hash_contribution();

        if let Some(ep) = self.en_passant {
            h ^= ZOBRIST.en_passant_file(ep.file());
        }

        h
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.0 as usize]
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    fn king_square(&self, color: Color) -> Square {
        Square::all()
            .find(|&s| self.squares[s.0 as usize] == Some(Piece { kind: PieceKind::King, color }))
            .expect("a legally reached position always has both kings on the board")
    }

    /// Returns true if `square` is attacked by any piece of `by_color`.
    pub fn is_square_attacked(&self, square: Square, by_color: Color) -> bool {
        // Pawn attacks: a pawn attacks diagonally forward from its own square.
        let pawn_dir = by_color.pawn_direction();
        for df in [-1i8, 1] {
            if let Some(origin) = square.offset(-df, -pawn_dir) {
                if self.squares[origin.0 as usize] == Some(Piece { kind: PieceKind::Pawn, color: by_color }) {
                    return true;
                }
            }
        }

        for &(df, dr) in &KNIGHT_OFFSETS {
            if let Some(origin) = square.offset(df, dr) {
                if self.squares[origin.0 as usize] == Some(Piece { kind: PieceKind::Knight, color: by_color }) {
                    return true;
                }
            }
        }

        for &(df, dr) in &KING_OFFSETS {
            if let Some(origin) = square.offset(df, dr) {
                if self.squares[origin.0 as usize] == Some(Piece { kind: PieceKind::King, color: by_color }) {
                    return true;
                }
            }
        }

        for &(df, dr) in &BISHOP_DIRS {
            let mut cur = square;
            while let Some(next) = cur.offset(df, dr) {
                cur = next;
                match self.squares[cur.0 as usize] {
                    None => continue,
                    Some(piece) if piece.color == by_color
                        && matches!(piece.kind, PieceKind::Bishop | PieceKind::Queen) => return true,
                    Some(_) => break,
                }
            }
        }

        for &(df, dr) in &ROOK_DIRS {
            let mut cur = square;
            while let Some(next) = cur.offset(df, dr) {
                cur = next;
                match self.squares[cur.0 as usize] {
                    None => continue,
                    Some(piece) if piece.color == by_color
                        && matches!(piece.kind, PieceKind::Rook | PieceKind::Queen) => return true,
                    Some(_) => break,
                }
            }
        }

        false
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        self.is_square_attacked(self.king_square(color), color.opposite())
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        let color = self.side_to_move;

        for from in Square::all() {
            let piece = match self.squares[from.0 as usize] {
                Some(p) if p.color == color => p,
                _ => continue,
            };

            match piece.kind {
                PieceKind::Pawn => self.pawn_moves(from, color, &mut moves),
                PieceKind::Knight => self.jump_moves(from, color, &KNIGHT_OFFSETS, &mut moves),
                PieceKind::Bishop => self.slide_moves(from, color, &BISHOP_DIRS, &mut moves),
                PieceKind::Rook => self.slide_moves(from, color, &ROOK_DIRS, &mut moves),
                PieceKind::Queen => {
                    self.slide_moves(from, color, &BISHOP_DIRS, &mut moves);
                    self.slide_moves(from, color, &ROOK_DIRS, &mut moves);
                }
                PieceKind::King => {
                    self.jump_moves(from, color, &KING_OFFSETS, &mut moves);
                    self.castle_moves(color, &mut moves);
                }
            }
        }

        moves
    }

    fn pawn_moves(&self, from: Square, color: Color, out: &mut Vec<Move>) {
        let dir = color.pawn_direction();
        let start_rank = if color == Color::White { 1 } else { 6 };
        let promotion_rank = if color == Color::White { 7 } else { 0 };

        let push_promotions = |to: Square, out: &mut Vec<Move>| {
            if to.rank() == promotion_rank {
                for kind in [PieceKind::Queen, PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight] {
                    out.push(Move::promoting(from, to, kind));
                }
            } else {
                out.push(Move::quiet(from, to));
            }
        };

        if let Some(one) = from.offset(0, dir) {
            if self.squares[one.0 as usize].is_none() {
                push_promotions(one, out);

                if from.rank() == start_rank {
                    if let Some(two) = from.offset(0, 2 * dir) {
                        if self.squares[two.0 as usize].is_none() {
                            out.push(Move::quiet(from, two));
                        }
                    }
                }
            }
        }

        for df in [-1i8, 1] {
            if let Some(to) = from.offset(df, dir) {
                let is_capture = self.squares[to.0 as usize].map(|p| p.color != color).unwrap_or(false);
                let is_en_passant = self.en_passant == Some(to);

                if is_capture || is_en_passant {
                    push_promotions(to, out);
                }
            }
        }
    }

    fn jump_moves(&self, from: Square, color: Color, offsets: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(df, dr) in offsets {
            if let Some(to) = from.offset(df, dr) {
                if self.squares[to.0 as usize].map(|p| p.color != color).unwrap_or(true) {
                    out.push(Move::quiet(from, to));
                }
            }
        }
    }

    fn slide_moves(&self, from: Square, color: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(df, dr) in dirs {
            let mut cur = from;

            while let Some(to) = cur.offset(df, dr) {
                cur = to;

                match self.squares[to.0 as usize] {
                    None => out.push(Move::quiet(from, to)),
                    Some(piece) => {
                        if piece.color != color {
                            out.push(Move::quiet(from, to));
                        }
                        break;
                    }
                }
            }
        }
    }

    fn castle_moves(&self, color: Color, out: &mut Vec<Move>) {
        let rank = color.back_rank();
        let king_from = Square::new(4, rank);

        if self.squares[king_from.0 as usize] != Some(Piece { kind: PieceKind::King, color }) {
            return;
        }

        if self.is_square_attacked(king_from, color.opposite()) {
            return;
        }

        let (kingside, queenside) = match color {
            Color::White => (self.castling.white_kingside, self.castling.white_queenside),
            Color::Black => (self.castling.black_kingside, self.castling.black_queenside),
        };

        if kingside {
            let f = Square::new(5, rank);
            let g = Square::new(6, rank);

            if self.squares[f.0 as usize].is_none()
                && self.squares[g.0 as usize].is_none()
                && !self.is_square_attacked(f, color.opposite())
                && !self.is_square_attacked(g, color.opposite())
            {
                out.push(Move::quiet(king_from, g));
            }
        }

        if queenside {
            let d = Square::new(3, rank);
            let c = Square::new(2, rank);
            let b = Square::new(1, rank);

            if self.squares[d.0 as usize].is_none()
                && self.squares[c.0 as usize].is_none()
                && self.squares[b.0 as usize].is_none()
                && !self.is_square_attacked(d, color.opposite())
                && !self.is_square_attacked(c, color.opposite())
            {
                out.push(Move::quiet(king_from, c));
            }
        }
    }

    /// Plays `mv`, recording enough information on the internal undo stack
    /// to reverse it exactly.
    pub fn make_move(&mut self, mv: Move) {
        let color = self.side_to_move;
        let moved = self.squares[mv.from.0 as usize]
            .expect("make_move called with a move whose origin square is empty");
        let moved_kind = moved.kind;

        let is_en_passant = moved_kind == PieceKind::Pawn && Some(mv.to) == self.en_passant
            && self.squares[mv.to.0 as usize].is_none();
        let captured_square = if is_en_passant {
            Square::new(mv.to.file(), mv.from.rank())
        } else {
            mv.to
        };
        let captured = self.squares[captured_square.0 as usize].map(|p| (p.kind, captured_square));

        let prev_castling = self.castling;
        let prev_en_passant = self.en_passant;
        let prev_halfmove_clock = self.halfmove_clock;
        let prev_hash = self.hash;

        // remove captured piece (including en passant victim)
        if let Some((kind, square)) = captured {
            self.hash ^= ZOBRIST.piece(kind, color.opposite(), square);
            self.squares[square.0 as usize] = None;
        }

        // move the piece
        self.hash ^= ZOBRIST.piece(moved_kind, color, mv.from);
        self.squares[mv.from.0 as usize] = None;

        let placed_kind = mv.promotion.unwrap_or(moved_kind);
        self.hash ^= ZOBRIST.piece(placed_kind, color, mv.to);
        self.squares[mv.to.0 as usize] = Some(Piece { kind: placed_kind, color });

        // castling rook hop
        let rank = color.back_rank();
        let castle_rook = if moved_kind == PieceKind::King && mv.from == Square::new(4, rank) && mv.to == Square::new(6, rank) {
            Some((Square::new(7, rank), Square::new(5, rank)))
        } else if moved_kind == PieceKind::King && mv.from == Square::new(4, rank) && mv.to == Square::new(2, rank) {
            Some((Square::new(0, rank), Square::new(3, rank)))
        } else {
            None
        };

        if let Some((rook_from, rook_to)) = castle_rook {
            self.hash ^= ZOBRIST.piece(PieceKind::Rook, color, rook_from);
            self.squares[rook_from.0 as usize] = None;
            self.hash ^= ZOBRIST.piece(PieceKind::Rook, color, rook_to);
            self.squares[rook_to.0 as usize] = Some(Piece { kind: PieceKind::Rook, color });
        }

        // castling rights
        self.hash ^= prev_castling.hash_contribution();
        if moved_kind == PieceKind::King {
            match color {
                Color::White => { self.castling.white_kingside = false; self.castling.white_queenside = false; }
                Color::Black => { self.castling.black_kingside = false; self.castling.black_queenside = false; }
            }
        }
        let touches = |square: Square, rights: &mut CastlingRights| {
            if square == Square::new(0, 0) { rights.white_queenside = false; }
            if square == Square::new(7, 0) { rights.white_kingside = false; }
            if square == Square::new(0, 7) { rights.black_queenside = false; }
            if square == Square::new(7, 7) { rights.black_kingside = false; }
        };
        touches(mv.from, &mut self.castling);
        touches(mv.to, &mut self.castling);
        self.hash ^= self.castling.hash_contribution();

        // en passant target
        if let Some(ep) = prev_en_passant {
            self.hash ^= ZOBRIST.en_passant_file(ep.file());
        }
        self.en_passant = if moved_kind == PieceKind::Pawn && (mv.to.rank() as i8 - mv.from.rank() as i8).abs() == 2 {
            Some(Square::new(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2))
        } else {
            None
        };
        if let Some(ep) = self.en_passant {
            self.hash ^= ZOBRIST.en_passant_file(ep.file());
        }

        // halfmove clock
        self.halfmove_clock = if moved_kind == PieceKind::Pawn || captured.is_some() {
            0
        } else {
            self.halfmove_clock + 1
        };

        if color == Color::Black {
            self.fullmove_number += 1;
        }

        self.hash ^= ZOBRIST.side_to_move();
        self.side_to_move = color.opposite();

        self.history.push(self.hash);
        self.undo_stack.push(Undo {
            mv,
            moved_kind,
            captured,
            prev_castling,
            prev_en_passant,
            prev_halfmove_clock,
            prev_hash,
            castle_rook,
        });
    }

    pub fn undo_move(&mut self) {
        let undo = self.undo_stack.pop().expect("undo_move called with an empty undo stack");
        self.history.pop();

        let color = self.side_to_move.opposite();
        self.side_to_move = color;

        self.squares[undo.mv.to.0 as usize] = None;
        self.squares[undo.mv.from.0 as usize] = Some(Piece { kind: undo.moved_kind, color });

        if let Some((rook_from, rook_to)) = undo.castle_rook {
            self.squares[rook_to.0 as usize] = None;
            self.squares[rook_from.0 as usize] = Some(Piece { kind: PieceKind::Rook, color });
        }

        if let Some((kind, square)) = undo.captured {
            self.squares[square.0 as usize] = Some(Piece { kind, color: color.opposite() });
        }

        self.castling = undo.prev_castling;
        self.en_passant = undo.prev_en_passant;
        self.halfmove_clock = undo.prev_halfmove_clock;
        self.hash = undo.prev_hash;
        self.fullmove_number -= if color == Color::Black { 1 } else { 0 };
    }

    fn has_insufficient_material(&self) -> bool {
        let mut minors = Vec::new(); // (color, is_bishop, square color parity)
        let mut any_major_or_pawn = false;

        for square in Square::all() {
            if let Some(piece) = self.squares[square.0 as usize] {
                match piece.kind {
                    PieceKind::King => {}
                    PieceKind::Bishop => minors.push((piece.color, (square.file() + square.rank()) % 2)),
                    PieceKind::Knight => minors.push((piece.color, 2)),
                    _ => any_major_or_pawn = true,
                }
            }
        }

        if any_major_or_pawn {
            return false;
        }

        match minors.len() {
            0 => true,
            1 => true,
            2 => {
                let (c0, p0) = minors[0];
                let (c1, p1) = minors[1];
                c0 != c1 && p0 != 2 && p1 != 2 && p0 == p1
            }
            _ => false,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.to_fen())
    }
}

impl Position for Board {
    fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    fn apply_move(&mut self, mv: Move) {
        self.make_move(mv);
    }

    fn undo_move(&mut self) {
        Board::undo_move(self);
    }

    fn legal_moves(&self) -> Vec<Move> {
        let mut legal = Vec::new();
        let mover = self.side_to_move;

        for mv in self.pseudo_legal_moves() {
            let mut scratch = self.clone();
            scratch.make_move(mv);

            if !scratch.is_in_check(mover) {
                legal.push(mv);
            }
        }

        legal
    }

    fn ply(&self) -> usize {
        self.history.len()
    }

    fn repetition_count(&self, since_ply: usize) -> u32 {
        let current = self.hash;
        self.history[since_ply.min(self.history.len())..]
            .iter()
            .filter(|&&h| h == current)
            .count() as u32
    }

    fn terminal_class(&self) -> TerminalClass {
        if self.legal_moves().is_empty() {
            return if self.is_in_check(self.side_to_move) {
                TerminalClass::Checkmate
            } else {
                TerminalClass::Stalemate
            };
        }

        if self.halfmove_clock >= 100 {
            return TerminalClass::FiftyMoveRule;
        }

        if self.repetition_count(0) >= 3 {
            return TerminalClass::ThreefoldRepetition;
        }

        if self.has_insufficient_material() {
            return TerminalClass::InsufficientMaterial;
        }

        TerminalClass::None
    }

    fn fingerprint(&self) -> u64 {
        self.hash
    }

    fn probe_tablebase(&self) -> Option<TablebaseProbe> {
        // No tablebase file format is implemented (out of scope); callers
        // treat `None` identically to a failed probe.
        let _ = TablebaseScore::Win;
        let _ = TablebaseBound::Exact;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_has_twenty_moves() {
        let board = Board::starting_position();
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn fen_round_trip() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let board = Board::from_fen(fen).unwrap();
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn mate_in_one_is_found() {
        let board = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mate_move = Move::quiet(Square::from_algebraic("a1").unwrap(), Square::from_algebraic("a8").unwrap());

        let mut after = board.clone();
        after.make_move(mate_move);

        assert_eq!(after.terminal_class(), TerminalClass::Checkmate);
    }

    #[test]
    fn stalemate_is_detected() {
        let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(board.terminal_class(), TerminalClass::Stalemate);
        assert!(board.legal_moves().is_empty());
    }

    #[test]
    fn make_undo_round_trips_hash_and_board() {
        let mut board = Board::starting_position();
        let before = board.to_fen();
        let before_hash = board.fingerprint();

        let mv = Move::quiet(Square::from_algebraic("e2").unwrap(), Square::from_algebraic("e4").unwrap());
        board.make_move(mv);
        assert_ne!(board.fingerprint(), before_hash);

        board.undo_move();
        assert_eq!(board.to_fen(), before);
        assert_eq!(board.fingerprint(), before_hash);
    }

    #[test]
    fn castling_updates_rook_and_rights() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let king_side = Move::quiet(Square::from_algebraic("e1").unwrap(), Square::from_algebraic("g1").unwrap());
        board.make_move(king_side);

        assert_eq!(board.piece_at(Square::from_algebraic("f1").unwrap()).map(|p| p.kind), Some(PieceKind::Rook));
        assert_eq!(board.piece_at(Square::from_algebraic("h1").unwrap()), None);
        assert!(!board.castling.white_kingside);
        assert!(!board.castling.white_queenside);
    }

    #[test]
    fn en_passant_capture_removes_victim() {
        let mut board = Board::from_fen("4k3/8/8/Pp6/8/8/8/4K3 w - b6 0 1").unwrap();
        let capture = Move::quiet(Square::from_algebraic("a5").unwrap(), Square::from_algebraic("b6").unwrap());
        board.make_move(capture);

        assert_eq!(board.piece_at(Square::from_algebraic("b5").unwrap()), None);
        assert_eq!(board.piece_at(Square::from_algebraic("b6").unwrap()).map(|p| p.kind), Some(PieceKind::Pawn));
    }

    #[test]
    fn insufficient_material_king_vs_king() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(board.terminal_class(), TerminalClass::InsufficientMaterial);
    }
}
