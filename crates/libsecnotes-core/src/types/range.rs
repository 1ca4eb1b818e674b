use serde::{Deserialize, Serialize};

/// Zero-based line/character position in a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A selected source range. `end` is never before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Build a range, swapping the endpoints if they are given in reverse
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Whole-line range covering `start_line..=end_line`
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self::new(Position::new(start_line, 0), Position::new(end_line, 0))
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }
}

/// Parse a 1-based `START[:COL][-END[:COL]]` range as typed on the command line.
///
/// Returns a zero-based range. `12` selects line 12, `12-20` lines 12 through 20,
/// `12:4-12:30` a span within one line.
pub fn parse_range_spec(spec: &str) -> Option<TextRange> {
    fn parse_pos(s: &str) -> Option<Position> {
        let (line, col) = match s.split_once(':') {
            Some((l, c)) => (l.trim().parse::<u32>().ok()?, c.trim().parse::<u32>().ok()?),
            None => (s.trim().parse::<u32>().ok()?, 1),
        };
        if line == 0 || col == 0 {
            return None;
        }
        Some(Position::new(line - 1, col - 1))
    }

    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (parse_pos(a)?, parse_pos(b)?),
        None => {
            let p = parse_pos(spec)?;
            (p, p)
        }
    };
    Some(TextRange::new(start, end))
}
