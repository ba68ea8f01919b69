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

//! Pending here-documents.
//!
//! A `<<` or `<<-` operator promises a body that only begins after the rest
//! of its command line.  Several operators can stack up on one line, and
//! their bodies then follow in the same order, so the scanner keeps a FIFO
//! queue of [`Heredoc`] records: the newest record (back of the queue)
//! receives its delimiter word, the oldest (front) is the one whose body is
//! currently being read.

use smallstr::SmallString;

/// Scratch and policy for one pending here-document.
#[derive(Clone, Debug, Default)]
pub struct Heredoc {
    /// The delimiter was quoted or backslash-escaped; the body is taken
    /// literally, with no expansions.
    pub is_raw: bool,
    /// Body content has started being emitted.
    pub started: bool,
    /// The `<<-` form: leading tabs are stripped before delimiter matching.
    pub allows_indent: bool,
    /// The word that terminates the body, unquoted.
    pub delimiter: SmallString<[u8; 16]>,
    /// Per-line prefix buffer reused while matching the delimiter.
    pub(crate) current_leading_word: SmallString<[u8; 16]>,
}

/// The scratch buffer is transient per-line state; two records are the same
/// pending here-document whenever the serialized fields agree.
impl PartialEq for Heredoc {
    fn eq(&self, other: &Self) -> bool {
        self.is_raw == other.is_raw
            && self.started == other.started
            && self.allows_indent == other.allows_indent
            && self.delimiter == other.delimiter
    }
}

impl Eq for Heredoc {}

impl Heredoc {
    /// Returns an empty record; [`allows_indent`](Heredoc::allows_indent) is
    /// set by the `<<-` arrow handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything but keeps the delimiter buffer's capacity for the
    /// next use.
    pub fn reset(&mut self) {
        self.is_raw = false;
        self.started = false;
        self.allows_indent = false;
        self.delimiter.clear();
        self.current_leading_word.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::Heredoc;

    #[test]
    fn reset_clears_length_not_capacity() {
        let mut heredoc = Heredoc::new();
        heredoc.delimiter.push_str("A_RATHER_LONG_DELIMITER");
        heredoc.started = true;
        heredoc.allows_indent = true;
        let capacity = heredoc.delimiter.capacity();
        heredoc.reset();
        assert_eq!(heredoc, Heredoc::new());
        assert_eq!(heredoc.delimiter.capacity(), capacity);
    }
}
