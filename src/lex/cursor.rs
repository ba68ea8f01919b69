// zsh-syntax - a grammar and lexical scanner for the Z shell.
// Copyright (C) 2025 The zsh-syntax Authors.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! The character-level capability set the host parser hands the scanner.
//!
//! The scanner never sees the source text as a whole.  It reads through a
//! [`Cursor`]: one character of lookahead, consumption with or without
//! inclusion in the token, a movable token-end mark, and column/end-of-file
//! queries.  Incremental hosts implement [`Cursor`] over their own buffer
//! structures; [`StrCursor`] is the in-crate implementation over `&str` used
//! by the test driver and by embedders parsing whole strings.

/// What the host lexer lets the scanner do.
///
/// The token produced by a successful scan spans from the first `advance`d
/// character (characters passed over with [`skip`](Cursor::skip) before that
/// point are excluded) to the position of the last
/// [`mark_end`](Cursor::mark_end) call, or to the current position if the
/// mark was never set.  Advancing beyond the mark is lookahead only; the
/// host rewinds to the mark when the scan returns.
pub trait Cursor {
    /// Returns the next character without consuming it, or `None` at end of
    /// input.
    fn lookahead(&self) -> Option<char>;

    /// Consumes the next character into the current token.
    fn advance(&mut self);

    /// Consumes the next character without including it in the token.  Only
    /// meaningful before the first [`advance`](Cursor::advance) of a scan.
    fn skip(&mut self);

    /// Marks the current position as the end of the token.
    fn mark_end(&mut self);

    /// Returns the current column, counted in bytes from the start of the
    /// line.
    fn column(&self) -> usize;

    /// Returns true when all input has been consumed.
    fn eof(&self) -> bool;
}

/// A [`Cursor`] over a borrowed string.
///
/// Cloning a `StrCursor` checkpoints it; a parser loop clones before each
/// scan call and restores the clone when the scanner declines, which is
/// exactly the rewind a generalized parser performs.
#[derive(Copy, Clone, Debug)]
pub struct StrCursor<'a> {
    input: &'a str,
    pos: usize,
    token_start: usize,
    marked: Option<usize>,
    advanced: bool,
}

impl<'a> StrCursor<'a> {
    /// Returns a cursor at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            token_start: 0,
            marked: None,
            advanced: false,
        }
    }

    /// Returns the current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the text of the token a successful scan just produced, and
    /// rewinds to the token end so the next scan starts there.
    pub fn finish_token(&mut self) -> &'a str {
        let end = self.marked.unwrap_or(self.pos);
        let text = &self.input[self.token_start..end];
        self.pos = end;
        self.token_start = end;
        self.marked = None;
        self.advanced = false;
        text
    }

    fn step(&mut self) {
        if let Some(c) = self.lookahead() {
            self.pos += c.len_utf8();
        }
    }
}

impl Cursor for StrCursor<'_> {
    fn lookahead(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        self.advanced = true;
        self.step();
    }

    fn skip(&mut self) {
        self.step();
        if !self.advanced {
            self.token_start = self.pos;
        }
    }

    fn mark_end(&mut self) {
        self.marked = Some(self.pos);
    }

    fn column(&self) -> usize {
        let line_start = self.input[..self.pos]
            .rfind('\n')
            .map_or(0, |nl| nl + 1);
        self.pos - line_start
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cursor, StrCursor};

    #[test]
    fn skip_moves_token_start() {
        let mut cursor = StrCursor::new("  ab");
        cursor.skip();
        cursor.skip();
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.finish_token(), "ab");
    }

    #[test]
    fn lookahead_past_mark_is_discarded() {
        let mut cursor = StrCursor::new("ab}rest");
        cursor.advance();
        cursor.advance();
        cursor.mark_end();
        cursor.advance();
        assert_eq!(cursor.finish_token(), "ab");
        assert_eq!(cursor.lookahead(), Some('}'));
    }

    #[test]
    fn column_resets_at_newlines() {
        let mut cursor = StrCursor::new("a\nbc");
        assert_eq!(cursor.column(), 0);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.column(), 0);
        cursor.advance();
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn clone_checkpoints() {
        let mut cursor = StrCursor::new("xy");
        let checkpoint = cursor;
        cursor.advance();
        assert!(!cursor.eof());
        cursor = checkpoint;
        assert_eq!(cursor.lookahead(), Some('x'));
        assert_eq!(cursor.position(), 0);
    }
}
