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

//! The token dispatcher.
//!
//! [`Scanner::scan`] is a priority list of handlers.  Each handler owns one
//! guard - a combination of the valid-terminals set, the lookahead
//! character, and the active context - and the first handler whose guard
//! matches decides the call: it either emits a terminal or declines.  A
//! handler whose guard does not match passes to the next one.  The order of
//! the list is part of the scanner's contract; two handlers can both be
//! willing to claim the same character (`#` inside `${...}` is the obvious
//! case) and priority is what disambiguates them.
//!
//! Four handlers at the end of the list - regex, extended glob, expansion
//! word, and brace range - double as continuation points: an earlier handler
//! that has looked at a character and found it belongs to one of those
//! families hands the scan over instead of declining, and a family whose own
//! guard does not match passes to the families after it.
//!
//! A handler that declines must leave the scanner state it is responsible
//! for untouched; the exceptions are spelled out where they occur (the
//! extended-glob paren depth resets on a failed glob scan, and a failed
//! here-document delimiter read clears the partially-filled delimiter).

use std::collections::VecDeque;
use std::mem;

use bitflags::bitflags;
use tracing::trace;

use super::context::{Context, ContextStack};
use super::cursor::Cursor;
use super::heredoc::Heredoc;
use super::state::{Reader, StateError, Writer};
use super::token::{TokenSet, TokenType};

bitflags! {
    /// Quote-interplay substate carried for extended-glob scanning.
    ///
    /// Round-tripped through checkpoints so cooperating hosts can hand
    /// states back and forth; the current dispatcher writes it only on
    /// reset.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ExtState: u8 {
        /// The glob scan was entered from inside a double-quoted string.
        const IN_DOUBLE_QUOTE = 1 << 0;
        /// The glob scan saw material outside any quote.
        const SAW_OUTSIDE_QUOTE = 1 << 1;
    }
}

/// One token of history.
///
/// A few guards depend on what the previous scan call emitted: `{` is only
/// the start of `${...}` right after a `BareDollar`, and `[` right after a
/// `VariableName` is a subscript rather than a concatenation point.  The
/// value is taken (reset to [`LastToken::Other`]) at the top of every scan,
/// so it influences at most the one call that follows it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LastToken {
    /// Anything else, or no previous token.
    #[default]
    Other,
    /// The previous call emitted [`TokenType::VariableName`].
    VariableName,
    /// The previous call emitted [`TokenType::BareDollar`].
    BareDollar,
}

/// Outcome of one dispatcher handler.
enum Scan {
    /// Guard did not match; try the next handler.
    Pass,
    /// Handler claimed the input but no token resulted.
    Reject,
    /// Emitted a terminal.
    Emit(TokenType),
}

/// Stops the dispatch on `Reject` or `Emit`, falls through on `Pass`.
macro_rules! handle {
    ($scan:expr) => {
        match $scan {
            Scan::Pass => (),
            Scan::Reject => return None,
            Scan::Emit(token) => return Some(token),
        }
    };
}

/// Re-enters the handler list at a continuation point.
fn chain(result: Option<TokenType>) -> Scan {
    match result {
        Some(token) => Scan::Emit(token),
        None => Scan::Reject,
    }
}

/// The context-sensitive lexer the parser calls when context-free lookahead
/// is not enough.
///
/// One instance serves one parse session.  All state lives in the value;
/// [`serialize`](Scanner::serialize) and
/// [`deserialize`](Scanner::deserialize) checkpoint and restore it so an
/// incremental host can rewind to any earlier token boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scanner {
    glob_paren_depth: u8,
    ext_state: ExtState,
    contexts: ContextStack,
    last_token: LastToken,
    heredocs: VecDeque<Heredoc>,
}

impl Scanner {
    /// Returns a fresh scanner: empty stacks, no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scanner to its freshly-created state.
    pub fn reset(&mut self) {
        self.glob_paren_depth = 0;
        self.ext_state = ExtState::empty();
        self.contexts.clear();
        self.last_token = LastToken::Other;
        self.heredocs.clear();
    }

    /// The stack of open lexical contexts.
    pub fn contexts(&self) -> &ContextStack {
        &self.contexts
    }

    /// How many here-documents have had their arrow but not their end
    /// delimiter.
    pub fn pending_heredocs(&self) -> usize {
        self.heredocs.len()
    }

    /// What the previous scan call emitted, if a later guard cares.
    pub fn last_token(&self) -> LastToken {
        self.last_token
    }

    /// Advances `cursor` and resolves at most one terminal out of `valid`.
    ///
    /// Returns `None` when no handler produced a token; the parser then
    /// falls back to its context-free lexer or its error recovery.  When
    /// `valid` contains [`TokenType::ErrorRecovery`] the scanner answers
    /// only from established state (pending here-documents, open contexts)
    /// and refuses to open new contexts or speculate.
    pub fn scan(&mut self, cursor: &mut dyn Cursor, valid: TokenSet) -> Option<TokenType> {
        let last = mem::take(&mut self.last_token);
        let token = self.dispatch(cursor, valid, last)?;
        trace!(?token, "emit");
        self.last_token = match token {
            TokenType::VariableName => LastToken::VariableName,
            TokenType::BareDollar => LastToken::BareDollar,
            _ => LastToken::Other,
        };
        Some(token)
    }

    fn dispatch(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        last: LastToken,
    ) -> Option<TokenType> {
        let recovering = valid.contains(TokenType::ErrorRecovery);
        trace!(
            lookahead = ?cursor.lookahead(),
            recovering,
            context = ?self.contexts.top(),
            "scan"
        );

        if valid.contains(TokenType::Newline) && !recovering && cursor.lookahead() == Some('\n')
        {
            while cursor.lookahead() == Some('\n') {
                cursor.skip();
            }
            cursor.mark_end();
            return Some(TokenType::Newline);
        }

        handle!(self.closing_expansion_brace(cursor, valid, recovering));
        handle!(self.concat(cursor, valid, recovering, last));
        handle!(self.bare_dollar(cursor, valid, recovering));

        // Must come after the consuming dollar handler.
        if valid.contains(TokenType::PeekBareDollar)
            && !recovering
            && cursor.lookahead() == Some('$')
        {
            return Some(TokenType::PeekBareDollar);
        }

        if valid.contains(TokenType::BraceStart)
            && !recovering
            && last == LastToken::BareDollar
            && cursor.lookahead() == Some('{')
        {
            cursor.advance();
            cursor.mark_end();
            self.contexts.push(Context::Parameter);
            return Some(TokenType::BraceStart);
        }

        handle!(self.open_paren_or_glob_flags(cursor, valid, recovering, last));
        handle!(self.open_bracket_or_test(cursor, valid, recovering, last));
        handle!(self.close_bracket_or_test(cursor, valid, recovering));
        handle!(self.close_paren(cursor, valid, recovering));
        handle!(self.pattern_markers(cursor, valid, recovering));

        // A stray colon inside `${...}` belongs to the grammar's operator
        // rules; consume-and-decline keeps it from reaching the word
        // handlers below.
        if self.contexts.in_parameter_expansion()
            && !recovering
            && cursor.lookahead() == Some(':')
        {
            cursor.advance();
            return None;
        }

        handle!(self.param_hash(cursor, valid, recovering));
        handle!(self.immediate_double_hash(cursor, valid, recovering));
        handle!(self.array_operators(cursor, valid, recovering));

        if valid.contains(TokenType::EmptyValue) {
            let c = cursor.lookahead();
            if is_ws(c) || cursor.eof() || c == Some(';') || c == Some('&') {
                return Some(TokenType::EmptyValue);
            }
        }

        handle!(self.heredoc_tokens(cursor, valid, recovering));

        if valid.contains(TokenType::TestOperator) && !valid.contains(TokenType::ExpansionWord) {
            handle!(self.test_operator(cursor, valid, recovering, last));

            if valid.contains(TokenType::RawDollar)
                && !recovering
                && scan_standalone_dollar(cursor)
            {
                return Some(TokenType::RawDollar);
            }
        }

        if valid.contains(TokenType::SimpleVariableName) && !recovering {
            while is_ws(cursor.lookahead()) {
                cursor.skip();
            }
            if is_alpha(cursor.lookahead()) || cursor.lookahead() == Some('_') {
                while is_alnum(cursor.lookahead()) || cursor.lookahead() == Some('_') {
                    cursor.advance();
                }
                cursor.mark_end();
                return Some(TokenType::SimpleVariableName);
            }
        }

        handle!(self.special_variable_name(cursor, valid, recovering));
        handle!(self.variable_name(cursor, valid, recovering, last));

        if valid.contains(TokenType::BareDollar) && !recovering && scan_standalone_dollar(cursor)
        {
            return Some(TokenType::BareDollar);
        }

        self.tail_regex(cursor, valid, recovering, last)
    }

    // `}` closing `${...}` and its pattern positions.  Range braces are the
    // grammar's own `}`.
    fn closing_expansion_brace(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if cursor.lookahead() != Some('}')
            || !valid.contains(TokenType::ClosingBrace)
            || recovering
        {
            return Scan::Pass;
        }
        let active = self.contexts.top();
        if active.is_parameter_expansion() {
            self.contexts.pop_expected(active);
            cursor.advance();
            return Scan::Emit(TokenType::ClosingBrace);
        }
        Scan::Pass
    }

    // Zero-width joiner between adjacent word parts.  The guard is the list
    // of characters that *separate* words instead.
    fn concat(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        if !valid.contains(TokenType::Concat) || recovering {
            return Scan::Pass;
        }
        let context = self.contexts.top();
        let separator = match cursor.lookahead() {
            None => true,
            Some(c) => {
                c.is_whitespace()
                    || c == '>'
                    || c == '<'
                    || (c == ')' && valid.contains(TokenType::ClosingParen))
                    || c == '('
                    || c == ';'
                    || c == '&'
                    || c == '|'
                    || (c == '}'
                        && (context.is_parameter_expansion()
                            || context == Context::BraceExpansion))
                    || (c == ']' && valid.contains(TokenType::ClosingBracket))
                    || (c == '[' && last == LastToken::VariableName)
            }
        };
        if separator {
            return Scan::Pass;
        }
        match cursor.lookahead() {
            // a`...` only concatenates when the closing backtick ends the
            // word.
            Some('`') => {
                cursor.mark_end();
                cursor.advance();
                while cursor.lookahead() != Some('`') && !cursor.eof() {
                    cursor.advance();
                }
                if cursor.eof() {
                    return Scan::Reject;
                }
                cursor.advance();
                if is_ws(cursor.lookahead()) || cursor.eof() {
                    Scan::Emit(TokenType::Concat)
                } else {
                    Scan::Reject
                }
            }
            // Escaped quotes and backslashes inside strings with expansions
            // still join onto the preceding part.
            Some('\\') => {
                cursor.mark_end();
                cursor.advance();
                match cursor.lookahead() {
                    Some('"' | '\'' | '\\') => Scan::Emit(TokenType::Concat),
                    None => Scan::Reject,
                    _ => Scan::Pass,
                }
            }
            _ => Scan::Emit(TokenType::Concat),
        }
    }

    fn bare_dollar(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !valid.contains(TokenType::BareDollar) || recovering {
            return Scan::Pass;
        }
        // Only skip blanks when they lead; whitespace significance matters
        // for concatenation.
        while matches!(cursor.lookahead(), Some(' ' | '\t')) {
            cursor.skip();
        }
        if cursor.lookahead() != Some('$') {
            return Scan::Pass;
        }
        cursor.advance();
        if cursor.lookahead() == Some('"') {
            // `$"..."` belongs to the double-quoted-string rules.
            return Scan::Reject;
        }
        cursor.mark_end();
        Scan::Emit(TokenType::BareDollar)
    }

    fn open_paren_or_glob_flags(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        if !(valid.contains(TokenType::OpeningParen)
            || valid.contains(TokenType::DoubleOpeningParen)
            || valid.contains(TokenType::ZshExtendedGlobFlags))
            || recovering
        {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        if cursor.lookahead() != Some('(') {
            return Scan::Pass;
        }
        cursor.advance();
        cursor.mark_end();

        if last == LastToken::BareDollar {
            if cursor.lookahead() == Some('(') && valid.contains(TokenType::DoubleOpeningParen) {
                cursor.advance();
                cursor.mark_end();
                self.contexts.push(Context::Arithmetic);
                return Scan::Emit(TokenType::DoubleOpeningParen);
            }
            if valid.contains(TokenType::OpeningParen) {
                self.contexts.push(Context::Command);
                return Scan::Emit(TokenType::OpeningParen);
            }
            return Scan::Pass;
        }

        if cursor.lookahead() == Some('#') && valid.contains(TokenType::ZshExtendedGlobFlags) {
            cursor.advance();
            let mut found_flags = false;
            while cursor.lookahead().is_some_and(is_glob_flag) {
                found_flags = true;
                cursor.advance();
            }
            if found_flags && cursor.lookahead() == Some(')') {
                cursor.advance();
                cursor.mark_end();
                return Scan::Emit(TokenType::ZshExtendedGlobFlags);
            }
            return Scan::Reject;
        }
        if valid.contains(TokenType::OpeningParen) {
            return Scan::Emit(TokenType::OpeningParen);
        }
        Scan::Pass
    }

    fn open_bracket_or_test(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        if !(valid.contains(TokenType::OpeningBracket)
            || valid.contains(TokenType::TestCommandStart))
            || recovering
        {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        if cursor.lookahead() != Some('[') {
            return Scan::Pass;
        }
        cursor.advance();

        if cursor.lookahead() == Some('[') && valid.contains(TokenType::TestCommandStart) {
            cursor.advance();
            cursor.mark_end();
            self.contexts.push(Context::Test);
            return Scan::Emit(TokenType::TestCommandStart);
        }
        if last == LastToken::BareDollar && valid.contains(TokenType::OpeningBracket) {
            // Legacy `$[...]` arithmetic.
            cursor.mark_end();
            self.contexts.push(Context::Arithmetic);
            return Scan::Emit(TokenType::OpeningBracket);
        }
        if valid.contains(TokenType::OpeningBracket) {
            cursor.mark_end();
            return Scan::Emit(TokenType::OpeningBracket);
        }
        Scan::Pass
    }

    fn close_bracket_or_test(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !(valid.contains(TokenType::TestCommandEnd)
            || valid.contains(TokenType::ClosingBracket))
            || recovering
        {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        if cursor.lookahead() != Some(']') {
            return Scan::Pass;
        }
        cursor.advance();

        if cursor.lookahead() == Some(']') && valid.contains(TokenType::TestCommandEnd) {
            cursor.advance();
            cursor.mark_end();
            self.contexts.pop_expected(Context::Test);
            return Scan::Emit(TokenType::TestCommandEnd);
        }
        if valid.contains(TokenType::ClosingBracket) {
            cursor.mark_end();
            // Legacy `$[...]` arithmetic closes here; a subscript `]` leaves
            // the stack alone.
            if self.contexts.top() == Context::Arithmetic {
                self.contexts.pop_expected(Context::Arithmetic);
            }
            return Scan::Emit(TokenType::ClosingBracket);
        }
        Scan::Reject
    }

    fn close_paren(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !(valid.contains(TokenType::ClosingParen)
            || valid.contains(TokenType::ClosingDoubleParen))
            || recovering
        {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        if cursor.lookahead() != Some(')') {
            return Scan::Pass;
        }
        cursor.advance();

        if cursor.lookahead() == Some(')') && valid.contains(TokenType::ClosingDoubleParen) {
            cursor.advance();
            cursor.mark_end();
            self.contexts.pop_expected(Context::Arithmetic);
            return Scan::Emit(TokenType::ClosingDoubleParen);
        }
        if valid.contains(TokenType::ClosingParen) {
            cursor.mark_end();
            // A single `)` closes whichever expansion opened it; a grouping
            // or case paren leaves the stack alone.
            match self.contexts.top() {
                Context::Arithmetic => self.contexts.pop_expected(Context::Arithmetic),
                Context::Command => self.contexts.pop_expected(Context::Command),
                _ => (),
            }
            return Scan::Emit(TokenType::ClosingParen);
        }
        Scan::Reject
    }

    // The two zero-width markers that rewrite the top of the context stack:
    // after them, `/`, `#`, `%`, and `}` tokenize by pattern rules.
    fn pattern_markers(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if recovering || self.contexts.top() != Context::Parameter {
            return Scan::Pass;
        }
        // Not when the expansion is about to end.
        if cursor.lookahead() == Some('}') {
            return Scan::Pass;
        }
        if valid.contains(TokenType::PatternStart) {
            self.contexts.replace_top(Context::ParamPatternSubstitute);
            cursor.mark_end();
            return Scan::Emit(TokenType::PatternStart);
        }
        if valid.contains(TokenType::PatternSuffixStart) {
            self.contexts.replace_top(Context::ParamPatternSuffix);
            cursor.mark_end();
            return Scan::Emit(TokenType::PatternSuffixStart);
        }
        Scan::Pass
    }

    fn param_hash(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !self.contexts.in_parameter_expansion()
            || recovering
            || cursor.lookahead() != Some('#')
        {
            return Scan::Pass;
        }
        cursor.advance();
        if cursor.lookahead() == Some('#') {
            if valid.contains(TokenType::DoubleHashPattern) {
                cursor.advance();
                // `##}` leaves nothing for the pattern; not an operator.
                if cursor.lookahead() != Some('}') {
                    cursor.mark_end();
                    return Scan::Emit(TokenType::DoubleHashPattern);
                }
            }
            return Scan::Reject;
        }
        if valid.contains(TokenType::HashPattern) {
            cursor.mark_end();
            return Scan::Emit(TokenType::HashPattern);
        }
        Scan::Reject
    }

    fn immediate_double_hash(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !valid.contains(TokenType::ImmediateDoubleHash)
            || recovering
            || cursor.lookahead() != Some('#')
        {
            return Scan::Pass;
        }
        cursor.mark_end();
        cursor.advance();
        if cursor.lookahead() == Some('#') {
            cursor.advance();
            if cursor.lookahead() != Some('}') {
                cursor.mark_end();
                return Scan::Emit(TokenType::ImmediateDoubleHash);
            }
        }
        Scan::Pass
    }

    // `${arr[*]}` / `${arr[@]}` whole-array subscripts.
    fn array_operators(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !(valid.contains(TokenType::ArrayStarToken)
            || valid.contains(TokenType::ArrayAtToken))
            || recovering
        {
            return Scan::Pass;
        }
        // When a regex is also acceptable, `*` and `@` are regex atoms.
        let regex_wanted = valid.contains(TokenType::Regex)
            || valid.contains(TokenType::RegexNoSlash)
            || valid.contains(TokenType::RegexNoSpace);
        if regex_wanted {
            return Scan::Pass;
        }
        if cursor.lookahead() == Some('*') && valid.contains(TokenType::ArrayStarToken) {
            cursor.advance();
            cursor.mark_end();
            return Scan::Emit(TokenType::ArrayStarToken);
        }
        if cursor.lookahead() == Some('@') && valid.contains(TokenType::ArrayAtToken) {
            cursor.advance();
            cursor.mark_end();
            return Scan::Emit(TokenType::ArrayAtToken);
        }
        Scan::Pass
    }

    // The four here-document cases, gated by what the queue says.  The
    // front of the queue is the body being read; the back is the record
    // whose delimiter is still on its operator line.
    fn heredoc_tokens(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if (valid.contains(TokenType::HeredocBodyBeginning)
            || valid.contains(TokenType::SimpleHeredocBody))
            && self.heredocs.front().is_some_and(|h| !h.started)
            && !recovering
        {
            return self.heredoc_content(
                cursor,
                TokenType::HeredocBodyBeginning,
                TokenType::SimpleHeredocBody,
            );
        }

        if valid.contains(TokenType::HeredocEnd) {
            let matched = match self.heredocs.front_mut() {
                Some(heredoc) => heredoc_end_matches(heredoc, cursor),
                None => false,
            };
            if matched {
                self.heredocs.pop_front();
                trace!(pending = self.heredocs.len(), "heredoc closed");
                return Scan::Emit(TokenType::HeredocEnd);
            }
        }

        if valid.contains(TokenType::HeredocContent)
            && self.heredocs.front().is_some_and(|h| h.started)
            && !recovering
        {
            return self.heredoc_content(cursor, TokenType::HeredocContent, TokenType::HeredocEnd);
        }

        if valid.contains(TokenType::HeredocStart) && !recovering {
            if let Some(heredoc) = self.heredocs.back_mut() {
                return scan_heredoc_start(heredoc, cursor);
            }
        }

        Scan::Pass
    }

    // Body state machine shared by the "body begins" and "body continues"
    // requests; `middle` and `end` name the terminals for the two exits.
    fn heredoc_content(
        &mut self,
        cursor: &mut dyn Cursor,
        middle: TokenType,
        end: TokenType,
    ) -> Scan {
        let mut did_advance = false;
        loop {
            match cursor.lookahead() {
                None => {
                    if cursor.eof() && did_advance {
                        // Unterminated body: the text so far is the body,
                        // and the record stays queued but cleared.
                        self.heredocs.front_mut().expect("pending heredoc").reset();
                        return Scan::Emit(end);
                    }
                    return Scan::Reject;
                }

                Some('\\') => {
                    did_advance = true;
                    cursor.advance();
                    cursor.advance();
                }

                Some('$') => {
                    let heredoc = self.heredocs.front_mut().expect("pending heredoc");
                    if heredoc.is_raw {
                        did_advance = true;
                        cursor.advance();
                    } else if did_advance {
                        cursor.mark_end();
                        heredoc.started = true;
                        cursor.advance();
                        if is_alpha(cursor.lookahead())
                            || matches!(cursor.lookahead(), Some('{' | '('))
                        {
                            return Scan::Emit(middle);
                        }
                    } else if middle == TokenType::HeredocBodyBeginning && cursor.column() == 0 {
                        heredoc.started = true;
                        return Scan::Emit(middle);
                    } else {
                        return Scan::Reject;
                    }
                }

                Some('\n') => {
                    if did_advance {
                        cursor.advance();
                    } else {
                        cursor.skip();
                    }
                    did_advance = true;
                    let result;
                    let matched;
                    {
                        let heredoc = self.heredocs.front_mut().expect("pending heredoc");
                        if heredoc.allows_indent {
                            while is_ws(cursor.lookahead()) {
                                cursor.advance();
                            }
                        }
                        result = if heredoc.started { middle } else { end };
                        cursor.mark_end();
                        matched = heredoc_end_matches(heredoc, cursor);
                    }
                    if matched {
                        if result == TokenType::HeredocEnd {
                            self.heredocs.pop_front();
                            trace!(pending = self.heredocs.len(), "heredoc closed");
                        }
                        return Scan::Emit(result);
                    }
                }

                Some(_) => {
                    if cursor.column() == 0 {
                        // A scan can resume mid-body at a line start; the
                        // line may already be the delimiter.
                        while is_ws(cursor.lookahead()) {
                            if did_advance {
                                cursor.advance();
                            } else {
                                cursor.skip();
                            }
                        }
                        let heredoc = self.heredocs.front_mut().expect("pending heredoc");
                        if end != TokenType::SimpleHeredocBody {
                            if heredoc_end_matches(heredoc, cursor) {
                                return Scan::Emit(middle);
                            }
                        } else {
                            cursor.mark_end();
                            if heredoc_end_matches(heredoc, cursor) {
                                return Scan::Emit(end);
                            }
                        }
                    }
                    did_advance = true;
                    cursor.advance();
                }
            }
        }
    }

    // `[[ -f file ]]` style operators: `-` followed by letters and a space.
    fn test_operator(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        while is_ws(cursor.lookahead()) && cursor.lookahead() != Some('\n') {
            cursor.skip();
        }

        if cursor.lookahead() == Some('\\') {
            if valid.contains(TokenType::ExtglobPattern) {
                return chain(self.tail_extglob(cursor, valid, recovering, last));
            }
            if valid.contains(TokenType::RegexNoSpace) {
                return chain(self.tail_regex(cursor, valid, recovering, last));
            }
            cursor.skip();
            if cursor.eof() {
                return Scan::Reject;
            }
            // Line continuation or nothing.
            if cursor.lookahead() == Some('\r') {
                cursor.skip();
                if cursor.lookahead() == Some('\n') {
                    cursor.skip();
                }
            } else if cursor.lookahead() == Some('\n') {
                cursor.skip();
            } else {
                return Scan::Reject;
            }
            while is_ws(cursor.lookahead()) {
                cursor.skip();
            }
        }

        if cursor.lookahead() == Some('\n') && !valid.contains(TokenType::Newline) {
            cursor.skip();
            while is_ws(cursor.lookahead()) {
                cursor.skip();
            }
        }

        if cursor.lookahead() == Some('-') {
            cursor.advance();
            let mut advanced_once = false;
            while is_alpha(cursor.lookahead()) {
                advanced_once = true;
                cursor.advance();
            }

            if is_ws(cursor.lookahead()) && advanced_once {
                cursor.mark_end();
                cursor.advance();
                if cursor.lookahead() == Some('}') && self.contexts.in_parameter_expansion() {
                    // `${x:-word}` material, not an operator.
                    return Scan::Reject;
                }
                return Scan::Emit(TokenType::TestOperator);
            }
            if is_ws(cursor.lookahead()) && valid.contains(TokenType::ExtglobPattern) {
                // A lone `-` in a case pattern.
                return Scan::Emit(TokenType::ExtglobPattern);
            }
        }

        Scan::Pass
    }

    fn special_variable_name(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !valid.contains(TokenType::SpecialVariableName) || recovering {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        let Some(c) = cursor.lookahead() else {
            return Scan::Pass;
        };
        if !matches!(c, '*' | '@' | '?' | '!' | '#' | '-' | '$' | '_') && !c.is_ascii_digit() {
            return Scan::Pass;
        }
        // Inside `${...}`, `#` and `!` are expansion-flag prefixes, not
        // parameters.
        let flag_char = c == '#' || c == '!';
        cursor.advance();
        if self.contexts.in_parameter_expansion() && flag_char {
            return Scan::Reject;
        }
        cursor.mark_end();
        Scan::Emit(TokenType::SpecialVariableName)
    }

    // Names in binding positions, file descriptors, and the heredoc arrows
    // share one handler: all three start with a run of word characters (or
    // the arrow itself) and are told apart by what follows.
    fn variable_name(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        if !(valid.contains(TokenType::VariableName)
            || valid.contains(TokenType::FileDescriptor)
            || valid.contains(TokenType::HeredocArrow))
            || valid.contains(TokenType::RegexNoSlash)
            || recovering
        {
            return Scan::Pass;
        }

        loop {
            match cursor.lookahead() {
                Some(c)
                    if (c == ' '
                        || c == '\t'
                        || c == '\r'
                        || (c == '\n' && !valid.contains(TokenType::Newline)))
                        && !valid.contains(TokenType::ExpansionWord) =>
                {
                    cursor.skip();
                }
                Some('\\') => {
                    cursor.skip();
                    if cursor.eof() {
                        cursor.mark_end();
                        return Scan::Emit(TokenType::VariableName);
                    }
                    if cursor.lookahead() == Some('\r') {
                        cursor.skip();
                    }
                    if cursor.lookahead() == Some('\n') {
                        cursor.skip();
                    } else {
                        if cursor.lookahead() == Some('\\')
                            && valid.contains(TokenType::ExpansionWord)
                        {
                            return chain(self.tail_expansion_word(
                                cursor, valid, recovering, last,
                            ));
                        }
                        return Scan::Reject;
                    }
                }
                _ => break,
            }
        }

        if !valid.contains(TokenType::ExpansionWord)
            && matches!(cursor.lookahead(), Some('*' | '@' | '?' | '-' | '0' | '_' | '#'))
        {
            cursor.mark_end();
            cursor.advance();
            if matches!(cursor.lookahead(), Some('=' | '[' | ':' | '-' | '%' | '/')) {
                return Scan::Reject;
            }
            if valid.contains(TokenType::ExtglobPattern) && is_ws(cursor.lookahead()) {
                cursor.mark_end();
                return Scan::Emit(TokenType::ExtglobPattern);
            }
        }

        if valid.contains(TokenType::HeredocArrow) && cursor.lookahead() == Some('<') {
            cursor.advance();
            if cursor.lookahead() != Some('<') {
                return Scan::Reject;
            }
            cursor.advance();
            return match cursor.lookahead() {
                Some('-') => {
                    cursor.advance();
                    let mut heredoc = Heredoc::new();
                    heredoc.allows_indent = true;
                    self.heredocs.push_back(heredoc);
                    trace!(pending = self.heredocs.len(), "heredoc queued");
                    Scan::Emit(TokenType::HeredocArrowDash)
                }
                // `<<<` is a here-string, `<<=` an operator.
                Some('<' | '=') => Scan::Reject,
                _ => {
                    self.heredocs.push_back(Heredoc::new());
                    trace!(pending = self.heredocs.len(), "heredoc queued");
                    Scan::Emit(TokenType::HeredocArrow)
                }
            };
        }

        let mut is_number = true;
        match cursor.lookahead() {
            Some(c) if c.is_ascii_digit() => cursor.advance(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                is_number = false;
                cursor.advance();
            }
            Some('{') => {
                return match self.brace_range(cursor, valid, recovering) {
                    Scan::Emit(token) => Scan::Emit(token),
                    _ => Scan::Reject,
                };
            }
            _ => {
                if valid.contains(TokenType::ExpansionWord) {
                    return chain(self.tail_expansion_word(cursor, valid, recovering, last));
                }
                if valid.contains(TokenType::ExtglobPattern) {
                    return chain(self.tail_extglob(cursor, valid, recovering, last));
                }
                return Scan::Reject;
            }
        }

        loop {
            match cursor.lookahead() {
                Some(c) if c.is_ascii_digit() => cursor.advance(),
                Some(c) if c.is_alphabetic() || c == '_' => {
                    is_number = false;
                    cursor.advance();
                }
                _ => break,
            }
        }

        if is_number
            && valid.contains(TokenType::FileDescriptor)
            && matches!(cursor.lookahead(), Some('>' | '<'))
        {
            return Scan::Emit(TokenType::FileDescriptor);
        }

        if valid.contains(TokenType::VariableName) {
            if cursor.lookahead() == Some('+') {
                cursor.mark_end();
                cursor.advance();
                if matches!(cursor.lookahead(), Some('=' | ':'))
                    || self.contexts.in_parameter_expansion()
                {
                    return Scan::Emit(TokenType::VariableName);
                }
                return Scan::Reject;
            }
            if cursor.lookahead() == Some('/') {
                return Scan::Reject;
            }
            let successor = match cursor.lookahead() {
                Some('=' | '[' | '%' | '@') => true,
                Some('#') => !is_number,
                Some('-') => self.contexts.in_parameter_expansion(),
                _ => false,
            };
            if successor {
                cursor.mark_end();
                return Scan::Emit(TokenType::VariableName);
            }
            if cursor.lookahead() == Some('?') {
                cursor.mark_end();
                cursor.advance();
                return if is_alpha(cursor.lookahead()) {
                    Scan::Emit(TokenType::VariableName)
                } else {
                    Scan::Reject
                };
            }
        }

        Scan::Reject
    }

    // --- continuation points ---------------------------------------------

    fn tail_regex(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Option<TokenType> {
        match self.regex(cursor, valid, recovering) {
            Scan::Pass => self.tail_extglob(cursor, valid, recovering, last),
            Scan::Reject => None,
            Scan::Emit(token) => Some(token),
        }
    }

    fn tail_extglob(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Option<TokenType> {
        match self.extglob_pattern(cursor, valid, recovering) {
            Scan::Pass => self.tail_expansion_word(cursor, valid, recovering, last),
            Scan::Reject => None,
            Scan::Emit(token) => Some(token),
        }
    }

    fn tail_expansion_word(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Option<TokenType> {
        match self.expansion_word(cursor, valid, recovering, last) {
            Scan::Pass => match self.brace_range(cursor, valid, recovering) {
                Scan::Emit(token) => Some(token),
                _ => None,
            },
            Scan::Reject => None,
            Scan::Emit(token) => Some(token),
        }
    }

    // Balanced-expression scan shared by the three regex terminals; they
    // differ only in what terminates them.
    fn regex(&mut self, cursor: &mut dyn Cursor, valid: TokenSet, recovering: bool) -> Scan {
        let no_slash = valid.contains(TokenType::RegexNoSlash);
        let no_space = valid.contains(TokenType::RegexNoSpace);
        let plain = valid.contains(TokenType::Regex);
        if !(plain || no_slash || no_space) || recovering {
            return Scan::Pass;
        }

        if plain || no_space {
            while is_ws(cursor.lookahead()) {
                cursor.skip();
            }
        }

        let c = cursor.lookahead();
        let enters = (c != Some('"') && c != Some('\''))
            || ((c == Some('$') || c == Some('\'')) && no_slash)
            || (c == Some('\'') && no_space);
        if !enters {
            return Scan::Pass;
        }

        if cursor.lookahead() == Some('$') && no_slash {
            cursor.mark_end();
            cursor.advance();
            // `$(` is a command substitution, never regex text.
            if cursor.lookahead() == Some('(') {
                return Scan::Reject;
            }
        }

        cursor.mark_end();

        let mut done = false;
        let mut advanced_once = false;
        let mut found_non_word = false;
        let mut last_was_escape = false;
        let mut in_single_quote = false;
        let mut paren_depth: u32 = 0;
        let mut bracket_depth: u32 = 0;
        let mut brace_depth: u32 = 0;

        while !done {
            if in_single_quote && cursor.lookahead() == Some('\'') {
                in_single_quote = false;
                cursor.advance();
                cursor.mark_end();
            }
            match cursor.lookahead() {
                Some('\\') => last_was_escape = true,
                None => return Scan::Reject,
                Some('(') => {
                    paren_depth += 1;
                    last_was_escape = false;
                }
                Some('[') => {
                    bracket_depth += 1;
                    last_was_escape = false;
                }
                Some('{') => {
                    if !last_was_escape {
                        brace_depth += 1;
                    }
                    last_was_escape = false;
                }
                Some(')') => {
                    if paren_depth == 0 {
                        done = true;
                    }
                    paren_depth = paren_depth.saturating_sub(1);
                    last_was_escape = false;
                }
                Some(']') => {
                    if bracket_depth == 0 {
                        done = true;
                    }
                    bracket_depth = bracket_depth.saturating_sub(1);
                    last_was_escape = false;
                }
                Some('}') => {
                    if brace_depth == 0 {
                        done = true;
                    }
                    brace_depth = brace_depth.saturating_sub(1);
                    last_was_escape = false;
                }
                Some('\'') => {
                    in_single_quote = !in_single_quote;
                    cursor.advance();
                    advanced_once = true;
                    last_was_escape = false;
                    continue;
                }
                Some(_) => last_was_escape = false,
            }

            if done {
                break;
            }

            if plain {
                let was_space = !in_single_quote && is_ws(cursor.lookahead());
                cursor.advance();
                advanced_once = true;
                if !was_space || paren_depth > 0 {
                    cursor.mark_end();
                }
            } else if no_slash {
                if cursor.lookahead() == Some('/') {
                    cursor.mark_end();
                    return if advanced_once {
                        Scan::Emit(TokenType::RegexNoSlash)
                    } else {
                        Scan::Reject
                    };
                }
                if cursor.lookahead() == Some('\\') {
                    cursor.advance();
                    advanced_once = true;
                    if !cursor.eof()
                        && cursor.lookahead() != Some('[')
                        && cursor.lookahead() != Some('/')
                    {
                        cursor.advance();
                        cursor.mark_end();
                    }
                } else {
                    let was_space = !in_single_quote && is_ws(cursor.lookahead());
                    cursor.advance();
                    advanced_once = true;
                    if !was_space {
                        cursor.mark_end();
                    }
                }
            } else if no_space {
                if cursor.lookahead() == Some('\\') {
                    found_non_word = true;
                    cursor.advance();
                    if !cursor.eof() {
                        cursor.advance();
                    }
                } else if cursor.lookahead() == Some('$') {
                    cursor.mark_end();
                    cursor.advance();
                    // Not a command substitution...
                    if cursor.lookahead() == Some('(') {
                        return Scan::Reject;
                    }
                    // ...but a trailing anchor always ends a regex.
                    if is_ws(cursor.lookahead()) {
                        cursor.mark_end();
                        return Scan::Emit(TokenType::RegexNoSpace);
                    }
                } else {
                    let was_space = !in_single_quote && is_ws(cursor.lookahead());
                    if was_space && paren_depth == 0 {
                        cursor.mark_end();
                        return if found_non_word {
                            Scan::Emit(TokenType::RegexNoSpace)
                        } else {
                            Scan::Reject
                        };
                    }
                    if !is_alnum(cursor.lookahead())
                        && !matches!(cursor.lookahead(), Some('$' | '-' | '_'))
                    {
                        found_non_word = true;
                    }
                    cursor.advance();
                }
            }
        }

        if plain && !advanced_once {
            return Scan::Reject;
        }
        Scan::Emit(if no_slash {
            TokenType::RegexNoSlash
        } else if no_space {
            TokenType::RegexNoSpace
        } else {
            TokenType::Regex
        })
    }

    fn extglob_pattern(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !valid.contains(TokenType::ExtglobPattern) {
            return Scan::Pass;
        }
        // `*` and `?` inside `${...}` are pattern text, not extglobs.
        if self.contexts.in_parameter_expansion() {
            return Scan::Reject;
        }
        if recovering
            || valid.contains(TokenType::Regex)
            || valid.contains(TokenType::RegexNoSlash)
            || valid.contains(TokenType::RegexNoSpace)
        {
            return Scan::Pass;
        }

        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }

        let entry = match cursor.lookahead() {
            Some(c) => {
                matches!(c, '?' | '*' | '+' | '@' | '!' | '-' | ')' | '\\' | '.' | '[')
                    || c.is_alphabetic()
            }
            None => false,
        };
        if !entry {
            self.glob_paren_depth = 0;
            return Scan::Reject;
        }

        if cursor.lookahead() == Some('\\') {
            cursor.advance();
            match cursor.lookahead() {
                Some(c) if (c.is_whitespace() || c == '"') && c != '\r' && c != '\n' => {
                    cursor.advance();
                }
                _ => return Scan::Reject,
            }
        }

        if cursor.lookahead() == Some(')') && self.glob_paren_depth == 0 {
            cursor.mark_end();
            cursor.advance();
            if is_ws(cursor.lookahead()) {
                return Scan::Reject;
            }
        }

        cursor.mark_end();
        let was_non_alpha = !is_alpha(cursor.lookahead());
        if cursor.lookahead() != Some('[') {
            if cursor.lookahead() == Some('e') {
                // `esac` ends the case body, never a pattern.
                cursor.mark_end();
                cursor.advance();
                if cursor.lookahead() == Some('s') {
                    cursor.advance();
                    if cursor.lookahead() == Some('a') {
                        cursor.advance();
                        if cursor.lookahead() == Some('c') {
                            cursor.advance();
                            if is_ws(cursor.lookahead()) {
                                return Scan::Reject;
                            }
                        }
                    }
                }
            } else {
                cursor.advance();
            }
        }

        // `-word` alone is an ordinary word; something else glob-like has
        // to follow for a pattern.
        if cursor.lookahead() == Some('-') {
            cursor.mark_end();
            cursor.advance();
            while is_alnum(cursor.lookahead()) {
                cursor.advance();
            }
            if matches!(cursor.lookahead(), Some(')' | '\\' | '.')) {
                return Scan::Reject;
            }
            cursor.mark_end();
        }

        // Case items like `-)` and `*)`.
        if cursor.lookahead() == Some(')') && self.glob_paren_depth == 0 {
            cursor.mark_end();
            cursor.advance();
            if is_ws(cursor.lookahead()) {
                return if was_non_alpha {
                    Scan::Emit(TokenType::ExtglobPattern)
                } else {
                    Scan::Reject
                };
            }
        }

        if is_ws(cursor.lookahead()) {
            cursor.mark_end();
            self.glob_paren_depth = 0;
            return Scan::Emit(TokenType::ExtglobPattern);
        }

        if cursor.lookahead() == Some('$') {
            cursor.mark_end();
            cursor.advance();
            if matches!(cursor.lookahead(), Some('{' | '(')) {
                return Scan::Emit(TokenType::ExtglobPattern);
            }
        }

        if cursor.lookahead() == Some('|') {
            cursor.mark_end();
            cursor.advance();
            return Scan::Emit(TokenType::ExtglobPattern);
        }

        match cursor.lookahead() {
            Some(c)
                if c.is_alphanumeric()
                    || matches!(c, '(' | '"' | '[' | '?' | '/' | '\\' | '_' | '*') => {}
            _ => return Scan::Reject,
        }

        let mut done = false;
        let mut saw_non_alphadot = was_non_alpha;
        let mut paren_depth = u32::from(self.glob_paren_depth);
        let mut bracket_depth: u32 = 0;
        let mut brace_depth: u32 = 0;

        while !done {
            match cursor.lookahead() {
                None => return Scan::Reject,
                Some('(') => paren_depth += 1,
                Some('[') => bracket_depth += 1,
                Some('{') => brace_depth += 1,
                Some(')') => {
                    if paren_depth == 0 {
                        done = true;
                    }
                    paren_depth = paren_depth.saturating_sub(1);
                }
                Some(']') => {
                    if bracket_depth == 0 {
                        done = true;
                    }
                    bracket_depth = bracket_depth.saturating_sub(1);
                }
                Some('}') => {
                    if brace_depth == 0 {
                        done = true;
                    }
                    brace_depth = brace_depth.saturating_sub(1);
                }
                _ => (),
            }

            if cursor.lookahead() == Some('|') {
                cursor.mark_end();
                cursor.advance();
                if paren_depth == 0 && bracket_depth == 0 && brace_depth == 0 {
                    return Scan::Emit(TokenType::ExtglobPattern);
                }
            }

            if !done {
                let was_space = is_ws(cursor.lookahead());
                if cursor.lookahead() == Some('$') {
                    cursor.mark_end();
                    saw_non_alphadot = true;
                    cursor.advance();
                    if matches!(cursor.lookahead(), Some('(' | '{')) {
                        self.glob_paren_depth = depth_u8(paren_depth);
                        return Scan::Emit(TokenType::ExtglobPattern);
                    }
                }
                if was_space || cursor.lookahead() == Some('"') {
                    cursor.mark_end();
                    self.glob_paren_depth = 0;
                    return if saw_non_alphadot {
                        Scan::Emit(TokenType::ExtglobPattern)
                    } else {
                        Scan::Reject
                    };
                }
                if cursor.lookahead() == Some('\\') {
                    saw_non_alphadot = true;
                    cursor.advance();
                    if is_ws(cursor.lookahead()) || cursor.lookahead() == Some('"') {
                        cursor.advance();
                    }
                } else {
                    if !is_alpha(cursor.lookahead())
                        && !matches!(cursor.lookahead(), Some('.' | '\\'))
                    {
                        saw_non_alphadot = true;
                    }
                    cursor.advance();
                }
                if !was_space {
                    cursor.mark_end();
                }
            }
        }

        self.glob_paren_depth = 0;
        if saw_non_alphadot {
            Scan::Emit(TokenType::ExtglobPattern)
        } else {
            Scan::Reject
        }
    }

    // Pattern text inside `${...}`: everything up to the next thing that
    // tokenizes on its own (`}`, the substitution `/`, an operator prefix,
    // or a `$` that introduces an expansion).
    fn expansion_word(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
        last: LastToken,
    ) -> Scan {
        if !valid.contains(TokenType::ExpansionWord) || recovering {
            return Scan::Pass;
        }
        // Directly after the variable name, `#` and `%` are operators.
        if last == LastToken::VariableName && matches!(cursor.lookahead(), Some('#' | '%')) {
            return Scan::Reject;
        }

        let mut advanced_once = false;
        let mut advanced_space = false;
        loop {
            if cursor.lookahead() == Some('"') {
                return Scan::Reject;
            }
            if cursor.lookahead() == Some('$') {
                cursor.mark_end();
                cursor.advance();
                if matches!(cursor.lookahead(), Some('{' | '(' | '\''))
                    || is_alnum(cursor.lookahead())
                {
                    return Scan::Emit(TokenType::ExpansionWord);
                }
                advanced_once = true;
            }

            if cursor.lookahead() == Some('/') && self.contexts.should_break_on_slash() {
                cursor.mark_end();
                return Scan::Emit(TokenType::ExpansionWord);
            }

            if cursor.lookahead() == Some('}') && self.contexts.in_parameter_expansion() {
                cursor.mark_end();
                return Scan::Emit(TokenType::ExpansionWord);
            }

            if cursor.lookahead() == Some('(') && !(advanced_once || advanced_space) {
                cursor.mark_end();
                cursor.advance();
                while cursor.lookahead() != Some(')') && !cursor.eof() {
                    if cursor.lookahead() == Some('$') {
                        // A `$(`/`${` here means this word was garbage
                        // concatenated onto a real expansion.
                        cursor.mark_end();
                        cursor.advance();
                        if matches!(cursor.lookahead(), Some('{' | '(' | '\''))
                            || is_alnum(cursor.lookahead())
                        {
                            return Scan::Emit(TokenType::ExpansionWord);
                        }
                        advanced_once = true;
                    } else {
                        if self.contexts.in_parameter_expansion()
                            && matches!(cursor.lookahead(), Some(']' | '#' | '%' | ':'))
                        {
                            cursor.mark_end();
                            return Scan::Emit(TokenType::ExpansionWord);
                        }
                        advanced_once = advanced_once || !is_ws(cursor.lookahead());
                        advanced_space = advanced_space || is_ws(cursor.lookahead());
                        cursor.advance();
                    }
                }
                cursor.mark_end();
                if cursor.lookahead() != Some(')') {
                    return Scan::Reject;
                }
                advanced_once = true;
                cursor.advance();
                cursor.mark_end();
            }

            if cursor.lookahead() == Some('\'') {
                return Scan::Reject;
            }
            if cursor.eof() {
                return Scan::Reject;
            }

            if self.contexts.in_parameter_expansion() {
                match cursor.lookahead() {
                    Some(']') => {
                        cursor.mark_end();
                        return Scan::Emit(TokenType::ExpansionWord);
                    }
                    // Operator prefixes end the word so they can be lexed
                    // as operators; an empty word is no word at all.
                    Some('#' | '%' | ':') => {
                        if advanced_once || advanced_space {
                            cursor.mark_end();
                            return Scan::Emit(TokenType::ExpansionWord);
                        }
                        return Scan::Reject;
                    }
                    _ => (),
                }
            }

            advanced_once = advanced_once || !is_ws(cursor.lookahead());
            advanced_space = advanced_space || is_ws(cursor.lookahead());
            cursor.advance();
        }
    }

    // `{N..M}` ranges.  Only the `{` is the token; the shape is verified by
    // lookahead, and the grammar owns the rest of the pair, so no context
    // is pushed.
    fn brace_range(
        &mut self,
        cursor: &mut dyn Cursor,
        valid: TokenSet,
        recovering: bool,
    ) -> Scan {
        if !valid.contains(TokenType::BraceStart) || recovering {
            return Scan::Pass;
        }
        while is_ws(cursor.lookahead()) {
            cursor.skip();
        }
        if cursor.lookahead() != Some('{') {
            return Scan::Reject;
        }
        cursor.advance();
        cursor.mark_end();

        while is_digit(cursor.lookahead()) {
            cursor.advance();
        }
        if cursor.lookahead() != Some('.') {
            return Scan::Reject;
        }
        cursor.advance();
        if cursor.lookahead() != Some('.') {
            return Scan::Reject;
        }
        cursor.advance();
        while is_digit(cursor.lookahead()) {
            cursor.advance();
        }
        if cursor.lookahead() != Some('}') {
            return Scan::Reject;
        }
        Scan::Emit(TokenType::BraceStart)
    }

    // --- checkpoints ------------------------------------------------------

    /// Writes the scanner state into `buffer`.
    ///
    /// Returns the number of bytes written, or 0 when the state does not
    /// fit the buffer or the one-byte counts of the layout.
    pub fn serialize(&self, buffer: &mut [u8]) -> usize {
        if self.contexts.depth() > usize::from(u8::MAX)
            || self.heredocs.len() > usize::from(u8::MAX)
        {
            return 0;
        }
        let mut writer = Writer::new(buffer);
        writer.u8(self.glob_paren_depth);
        writer.flag(self.ext_state.contains(ExtState::IN_DOUBLE_QUOTE));
        writer.flag(self.ext_state.contains(ExtState::SAW_OUTSIDE_QUOTE));
        writer.u8(self.contexts.depth() as u8);
        writer.u8(self.heredocs.len() as u8);
        writer.flag(self.last_token == LastToken::VariableName);
        writer.flag(self.last_token == LastToken::BareDollar);
        for context in self.contexts.iter() {
            writer.u8(context.tag());
        }
        for heredoc in &self.heredocs {
            writer.flag(heredoc.is_raw);
            writer.flag(heredoc.started);
            writer.flag(heredoc.allows_indent);
            let delimiter = heredoc.delimiter.as_str().as_bytes();
            match u32::try_from(delimiter.len()) {
                Ok(len) => writer.u32_le(len),
                Err(_) => writer.mark_overflowed(),
            }
            writer.bytes(delimiter);
        }
        writer.finish()
    }

    /// Replaces the scanner state with the checkpoint in `buffer`.
    ///
    /// An empty buffer, or one that is truncated or malformed, resets the
    /// scanner instead; restoring never fails outward.
    pub fn deserialize(&mut self, buffer: &[u8]) {
        if buffer.is_empty() {
            self.reset();
            return;
        }
        if let Err(error) = self.restore(buffer) {
            trace!(%error, "checkpoint rejected; scanner reset");
            self.reset();
        }
    }

    fn restore(&mut self, buffer: &[u8]) -> Result<(), StateError> {
        let mut reader = Reader::new(buffer);
        let glob_paren_depth = reader.u8()?;
        let mut ext_state = ExtState::empty();
        ext_state.set(ExtState::IN_DOUBLE_QUOTE, reader.flag()?);
        ext_state.set(ExtState::SAW_OUTSIDE_QUOTE, reader.flag()?);
        let context_count = reader.u8()?;
        let heredoc_count = reader.u8()?;
        let last_token = match (reader.flag()?, reader.flag()?) {
            (false, false) => LastToken::Other,
            (true, false) => LastToken::VariableName,
            (false, true) => LastToken::BareDollar,
            (true, true) => return Err(StateError::ConflictingHistory),
        };

        let mut contexts = ContextStack::new();
        for _ in 0..context_count {
            let tag = reader.u8()?;
            contexts.push(Context::from_tag(tag).ok_or(StateError::UnknownContextTag(tag))?);
        }

        let mut heredocs = VecDeque::with_capacity(usize::from(heredoc_count));
        for _ in 0..heredoc_count {
            let mut heredoc = Heredoc::new();
            heredoc.is_raw = reader.flag()?;
            heredoc.started = reader.flag()?;
            heredoc.allows_indent = reader.flag()?;
            let len = reader.u32_le()?;
            let bytes = reader.bytes(len as usize)?;
            let delimiter =
                std::str::from_utf8(bytes).map_err(|_| StateError::MalformedDelimiter)?;
            heredoc.delimiter.push_str(delimiter);
            heredocs.push_back(heredoc);
        }
        reader.finish()?;

        self.glob_paren_depth = glob_paren_depth;
        self.ext_state = ext_state;
        self.contexts = contexts;
        self.last_token = last_token;
        self.heredocs = heredocs;
        Ok(())
    }
}

/// Reads the here-document delimiter word on the operator line.
fn scan_heredoc_start(heredoc: &mut Heredoc, cursor: &mut dyn Cursor) -> Scan {
    while is_ws(cursor.lookahead()) {
        cursor.skip();
    }
    heredoc.is_raw = matches!(cursor.lookahead(), Some('\'' | '"' | '\\'));
    if advance_word(cursor, heredoc) {
        Scan::Emit(TokenType::HeredocStart)
    } else {
        heredoc.delimiter.clear();
        Scan::Reject
    }
}

/// Consumes a POSIX word into the delimiter, unquoted.
///
/// Approximate: no substitutions, default IFS.
fn advance_word(cursor: &mut dyn Cursor, heredoc: &mut Heredoc) -> bool {
    let mut empty = true;

    let quote = match cursor.lookahead() {
        Some(q @ ('\'' | '"')) => {
            cursor.advance();
            Some(q)
        }
        _ => None,
    };

    loop {
        let Some(c) = cursor.lookahead() else { break };
        let stop = match quote {
            Some(q) => c == q || c == '\r' || c == '\n',
            None => c.is_whitespace(),
        };
        if stop {
            break;
        }
        let mut unquoted = c;
        if c == '\\' {
            cursor.advance();
            match cursor.lookahead() {
                Some(escaped) => unquoted = escaped,
                None => return false,
            }
        }
        empty = false;
        heredoc.delimiter.push(unquoted);
        cursor.advance();
    }

    if let Some(q) = quote {
        if cursor.lookahead() == Some(q) {
            cursor.advance();
        }
    }

    !empty
}

/// Compares the current line prefix to the delimiter, character for
/// character, consuming the prefix as it matches.
fn heredoc_end_matches(heredoc: &mut Heredoc, cursor: &mut dyn Cursor) -> bool {
    let leading = &mut heredoc.current_leading_word;
    leading.clear();
    let mut expected = heredoc.delimiter.chars();
    let mut next_expected = expected.next();
    while let (Some(c), Some(want)) = (cursor.lookahead(), next_expected) {
        if c == '\n' || c != want {
            break;
        }
        leading.push(c);
        cursor.advance();
        next_expected = expected.next();
    }
    !heredoc.delimiter.is_empty() && leading.as_str() == heredoc.delimiter.as_str()
}

/// A `$` standing alone: skip blanks, consume it, and confirm nothing
/// expandable follows.
fn scan_standalone_dollar(cursor: &mut dyn Cursor) -> bool {
    while is_ws(cursor.lookahead()) && cursor.lookahead() != Some('\n') && !cursor.eof() {
        cursor.skip();
    }
    if cursor.lookahead() != Some('$') {
        return false;
    }
    cursor.advance();
    cursor.mark_end();
    is_ws(cursor.lookahead()) || cursor.eof() || cursor.lookahead() == Some('"')
}

fn is_ws(c: Option<char>) -> bool {
    c.is_some_and(char::is_whitespace)
}

fn is_alpha(c: Option<char>) -> bool {
    c.is_some_and(char::is_alphabetic)
}

fn is_alnum(c: Option<char>) -> bool {
    c.is_some_and(char::is_alphanumeric)
}

fn is_digit(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit())
}

fn is_glob_flag(c: char) -> bool {
    matches!(
        c,
        'i' | 'q' | 'b' | 'm' | 'n' | 's' | 'B' | 'I' | 'N' | 'U' | 'X' | 'c' | 'e' | 'l' | 'f'
            | 'a' | 'C' | 'o'
    ) || c.is_ascii_digit()
        || c == '.'
}

fn depth_u8(depth: u32) -> u8 {
    depth.min(u32::from(u8::MAX)) as u8
}

#[cfg(test)]
mod tests;
