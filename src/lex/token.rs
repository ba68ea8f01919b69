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

use flagset::{flags, FlagSet};

flags! {
    /// The closed set of terminals the scanner can be asked for.
    ///
    /// The parser passes a [`TokenSet`] of these to every
    /// [`Scanner::scan`](super::Scanner::scan) call; the scanner answers with
    /// at most one of them.  The set is part of the grammar contract: adding
    /// or reordering a terminal changes the serialized parse tables of every
    /// consumer.
    pub enum TokenType: u64 {
        /// Here-document delimiter word, read on the operator line.
        HeredocStart,
        /// An entire here-document body with no expansions in it.
        SimpleHeredocBody,
        /// Body text from the start of an interpolated here-document up to
        /// its first expansion.
        HeredocBodyBeginning,
        /// Body text between expansions, or trailing text before the end
        /// delimiter.
        HeredocContent,
        /// The line matching the here-document delimiter.
        HeredocEnd,
        /// A numeric word immediately before `<` or `>`.
        FileDescriptor,
        /// The empty right-hand side of `var=`.
        EmptyValue,
        /// Zero-width joiner between adjacent word parts.
        Concat,
        /// A name in a binding position: `x=1`, `x+=1`, `x[i]`, `${x:-...}`.
        VariableName,
        /// A plain `[A-Za-z_][A-Za-z0-9_]*` name, e.g. after `$`.
        SimpleVariableName,
        /// One of the one-character special parameters (`$?`, `$#`, `$1`...).
        SpecialVariableName,
        /// A unary test operator such as `-f` or `-n`.
        TestOperator,
        /// Regular expression operand; stops on unbalanced close or
        /// unquoted whitespace outside groups.
        Regex,
        /// Regex variant that additionally stops at a bare `/`.
        RegexNoSlash,
        /// Regex variant that stops at any unquoted whitespace.
        RegexNoSpace,
        /// Pattern text inside `${...}`.
        ExpansionWord,
        /// Extended glob: `?(...)`, `*(...)`, `+(...)`, `@(...)`, `!(...)`,
        /// and the bare forms used in case alternatives.
        ExtglobPattern,
        /// A `$` that stands alone (followed by whitespace, EOF, or `"`).
        RawDollar,
        /// A `$` introducing an expansion; consumed.
        BareDollar,
        /// Zero-width probe: is the next character `$`?
        PeekBareDollar,
        /// `{` opening `${...}` after a dollar, or a `{N..M}` range.
        BraceStart,
        /// `##` directly against the preceding word, not followed by `}`.
        ImmediateDoubleHash,
        /// `*` as a whole-array subscript.
        ArrayStarToken,
        /// `@` as a whole-array subscript.
        ArrayAtToken,
        /// `}` closing a parameter expansion.
        ClosingBrace,
        /// `]` closing a subscript or legacy `$[...]` arithmetic.
        ClosingBracket,
        /// `)` closing a substitution, group, or case pattern.
        ClosingParen,
        /// `))` closing arithmetic.
        ClosingDoubleParen,
        /// `<<`.
        HeredocArrow,
        /// `<<-`; the body may be indented with tabs.
        HeredocArrowDash,
        /// `#` prefix-removal operator inside `${...}`.
        HashPattern,
        /// `##` longest-prefix-removal operator inside `${...}`.
        DoubleHashPattern,
        /// Marker before the pattern of `${var/pat/repl}`.
        PatternStart,
        /// Marker before the pattern of `${var#pat}` / `${var%pat}`.
        PatternSuffixStart,
        /// A run of newlines acting as a statement separator.
        Newline,
        /// `(`.
        OpeningParen,
        /// `((` opening arithmetic.
        DoubleOpeningParen,
        /// `[`, including legacy `$[...]` arithmetic.
        OpeningBracket,
        /// `[[`.
        TestCommandStart,
        /// `]]`.
        TestCommandEnd,
        /// The `esac` keyword; only ever a boundary, never emitted.
        Esac,
        /// `(#flags)` glob qualifier prefix.
        ZshExtendedGlobFlags,
        /// Signal from the parser that it is recovering from an error; the
        /// scanner declines speculative work while this is in the set.
        ErrorRecovery,
    }
}

/// The set of terminals acceptable at one parser position.
pub type TokenSet = FlagSet<TokenType>;

impl TokenType {
    /// Terminals that may be emitted without consuming input: the structure
    /// markers, plus the body-beginning token when a here-document opens
    /// directly with an expansion.  Everything else strictly advances the
    /// cursor when emitted.
    pub fn zero_width() -> TokenSet {
        TokenType::Concat
            | TokenType::EmptyValue
            | TokenType::PeekBareDollar
            | TokenType::PatternStart
            | TokenType::PatternSuffixStart
            | TokenType::HeredocBodyBeginning
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenSet, TokenType};

    #[test]
    fn namespace_is_closed() {
        assert_eq!(TokenSet::full().into_iter().count(), 43);
    }

    #[test]
    fn zero_width_markers_are_terminals() {
        for token in TokenType::zero_width() {
            assert!(TokenSet::full().contains(token));
        }
    }
}
