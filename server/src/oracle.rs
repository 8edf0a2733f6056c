//! Move-legality oracle.
//!
//! The session engine never inspects chess rules itself. It hands the current
//! FEN and a candidate move to a [`MoveOracle`] and gets back the resulting
//! position, its SAN/UCI notation and terminal flags.
//!
//! [`ChessRules`] is the production oracle, backed by the `chess` crate. It is
//! stateless: the half-move and full-move counters ride along in the FEN so the
//! fifty-move rule can be detected without any history.

use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square};
use shared::{Color, MoveInput, START_FEN};
use std::str::FromStr;

/// What the oracle reports for a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub position: String,
    pub san: String,
    pub uci: String,
    pub is_checkmate: bool,
    pub is_draw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("unreadable position")]
    InvalidPosition,

    #[error("cannot parse move '{0}'")]
    Unparseable(String),

    #[error("'{0}' is not legal here")]
    Illegal(String),
}

pub trait MoveOracle: Send + Sync {
    fn initial_position(&self) -> String;

    fn side_to_move(&self, position: &str) -> Option<Color>;

    fn apply(&self, position: &str, mv: &MoveInput) -> Result<Verdict, OracleError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChessRules;

impl MoveOracle for ChessRules {
    fn initial_position(&self) -> String {
        START_FEN.to_string()
    }

    fn side_to_move(&self, position: &str) -> Option<Color> {
        let board = Board::from_str(position).ok()?;
        Some(to_color(board.side_to_move()))
    }

    fn apply(&self, position: &str, mv: &MoveInput) -> Result<Verdict, OracleError> {
        let board = Board::from_str(position).map_err(|_| OracleError::InvalidPosition)?;
        let chess_move = parse_move(&board, mv)?;

        if !board.legal(chess_move) {
            return Err(OracleError::Illegal(mv.to_string()));
        }

        let san = to_san(&board, chess_move);
        let after = board.make_move_new(chess_move);

        let (halfmove, fullmove) = move_counters(position);
        let resets_halfmove = board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            || is_capture(&board, chess_move);
        let halfmove = if resets_halfmove { 0 } else { halfmove + 1 };
        let fullmove = if board.side_to_move() == chess::Color::Black {
            fullmove + 1
        } else {
            fullmove
        };

        let status = after.status();
        Ok(Verdict {
            position: with_counters(&after, halfmove, fullmove),
            san,
            uci: to_uci(chess_move),
            is_checkmate: status == BoardStatus::Checkmate,
            is_draw: status == BoardStatus::Stalemate
                || insufficient_material(&after)
                || halfmove >= 100,
        })
    }
}

/// Strips the move counters so identical placements compare equal.
pub fn repetition_key(position: &str) -> String {
    position
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

fn move_counters(position: &str) -> (u32, u32) {
    let fields: Vec<&str> = position.split_whitespace().collect();
    let halfmove = fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
    let fullmove = fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(1);
    (halfmove, fullmove)
}

fn with_counters(board: &Board, halfmove: u32, fullmove: u32) -> String {
    format!("{} {} {}", repetition_key(&board.to_string()), halfmove, fullmove)
}

fn parse_move(board: &Board, mv: &MoveInput) -> Result<ChessMove, OracleError> {
    match mv {
        MoveInput::Coordinates {
            from,
            to,
            promotion,
        } => parse_coordinates(board, from, to, promotion.as_deref()),
        MoveInput::Text(text) => {
            let text = text.trim();
            if (text.len() == 4 || text.len() == 5) && text.is_ascii() {
                let (from, to) = (&text[0..2], &text[2..4]);
                if Square::from_str(from).is_ok() && Square::from_str(to).is_ok() {
                    let promotion = text.get(4..5);
                    return parse_coordinates(board, from, to, promotion);
                }
            }

            if let Some(found) = find_san(board, text) {
                return Ok(found);
            }
            // Over-disambiguated and other lenient spellings
            ChessMove::from_san(board, &normalize_san(text))
                .map_err(|_| OracleError::Illegal(text.to_string()))
        }
    }
}

/// Matches the text against the SAN this oracle renders for each legal move.
fn find_san(board: &Board, text: &str) -> Option<ChessMove> {
    let wanted = normalize_san(text);
    let castling = wanted.starts_with("O-O");
    MoveGen::new_legal(board)
        .filter(|mv| castling || wanted.contains(square_name(mv.get_dest()).as_str()))
        .find(|mv| normalize_san(&to_san(board, *mv)) == wanted)
}

// Check and annotation suffixes are optional; castling may use zeros
fn normalize_san(san: &str) -> String {
    san.trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'))
        .replace('0', "O")
}

fn parse_coordinates(
    board: &Board,
    from: &str,
    to: &str,
    promotion: Option<&str>,
) -> Result<ChessMove, OracleError> {
    let unparseable = || OracleError::Unparseable(format!("{}{}", from, to));
    let source = Square::from_str(&from.to_ascii_lowercase()).map_err(|_| unparseable())?;
    let dest = Square::from_str(&to.to_ascii_lowercase()).map_err(|_| unparseable())?;

    let promotion = match promotion {
        Some(letter) => Some(parse_promotion(letter).ok_or_else(unparseable)?),
        None if requires_promotion(board, source, dest) => Some(Piece::Queen),
        None => None,
    };

    Ok(ChessMove::new(source, dest, promotion))
}

fn parse_promotion(letter: &str) -> Option<Piece> {
    match letter.to_ascii_lowercase().as_str() {
        "q" => Some(Piece::Queen),
        "r" => Some(Piece::Rook),
        "b" => Some(Piece::Bishop),
        "n" => Some(Piece::Knight),
        _ => None,
    }
}

// Pawn moving onto the last rank with no promotion piece given
fn requires_promotion(board: &Board, source: Square, dest: Square) -> bool {
    if board.piece_on(source) != Some(Piece::Pawn) {
        return false;
    }
    let last_rank = match board.side_to_move() {
        chess::Color::White => 7,
        chess::Color::Black => 0,
    };
    dest.get_rank().to_index() == last_rank
}

fn is_capture(board: &Board, mv: ChessMove) -> bool {
    board.piece_on(mv.get_dest()).is_some()
        || (board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file())
}

fn insufficient_material(board: &Board) -> bool {
    let majors_and_pawns =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if majors_and_pawns.popcnt() > 0 {
        return false;
    }
    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    if knights + bishops.popcnt() <= 1 {
        return true;
    }
    if knights > 0 {
        return false;
    }

    // Bishops that all share one square colour can never mate
    let mut shades =
        bishops.map(|square| (square.get_file().to_index() + square.get_rank().to_index()) % 2);
    match shades.next() {
        Some(first) => shades.all(|shade| shade == first),
        None => true,
    }
}

fn square_name(square: Square) -> String {
    let file = (b'a' + square.get_file().to_index() as u8) as char;
    let rank = (b'1' + square.get_rank().to_index() as u8) as char;
    format!("{}{}", file, rank)
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn to_uci(mv: ChessMove) -> String {
    let mut uci = format!("{}{}", square_name(mv.get_source()), square_name(mv.get_dest()));
    if let Some(piece) = mv.get_promotion() {
        uci.push(piece_letter(piece).to_ascii_lowercase());
    }
    uci
}

/// Renders a legal move in standard algebraic notation.
fn to_san(board: &Board, mv: ChessMove) -> String {
    let source = mv.get_source();
    let dest = mv.get_dest();
    let piece = board.piece_on(source).unwrap_or(Piece::Pawn);

    let file_distance =
        source.get_file().to_index() as i32 - dest.get_file().to_index() as i32;
    let mut san = if piece == Piece::King && file_distance.abs() == 2 {
        if file_distance < 0 {
            "O-O".to_string()
        } else {
            "O-O-O".to_string()
        }
    } else {
        let capture = is_capture(board, mv);
        let mut san = String::new();

        if piece == Piece::Pawn {
            if capture {
                san.push_str(&square_name(source)[..1]);
            }
        } else {
            san.push(piece_letter(piece));

            let rivals: Vec<Square> = MoveGen::new_legal(board)
                .filter(|other| {
                    other.get_dest() == dest
                        && other.get_source() != source
                        && board.piece_on(other.get_source()) == Some(piece)
                })
                .map(|other| other.get_source())
                .collect();

            if !rivals.is_empty() {
                let name = square_name(source);
                let shares_file = rivals.iter().any(|s| s.get_file() == source.get_file());
                let shares_rank = rivals.iter().any(|s| s.get_rank() == source.get_rank());
                if !shares_file {
                    san.push_str(&name[..1]);
                } else if !shares_rank {
                    san.push_str(&name[1..]);
                } else {
                    san.push_str(&name);
                }
            }
        }

        if capture {
            san.push('x');
        }
        san.push_str(&square_name(dest));

        if let Some(promoted) = mv.get_promotion() {
            san.push('=');
            san.push(piece_letter(promoted));
        }
        san
    };

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        san.push('#');
    } else if after.checkers().popcnt() > 0 {
        san.push('+');
    }
    san
}
