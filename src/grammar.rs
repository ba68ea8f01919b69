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

//! The contract between the grammar's productions and the scanner.
//!
//! The declarative grammar is compiled into parse tables by the parser
//! generator, and at runtime the parser derives, from its current states,
//! the set of external terminals it could shift next.  That set is the only
//! thing the scanner ever learns about the grammar.  This module records the
//! sets the productions actually produce, one function per parser position,
//! so the scanner can be driven and tested without the generated tables: a
//! test plays the parser by walking positions and handing each one's set to
//! [`Scanner::scan`](crate::lex::Scanner::scan).
//!
//! Each function documents the production shape that puts those terminals
//! in the set.  Terminals the grammar lexes internally (plain words, `=`,
//! `;`, `=~`, the `/` between a substitution's pattern and replacement) are
//! absent by construction: when the scanner declines, the parser falls back
//! to its context-free lexer.
//!
//! A generalized parser explores alternatives in parallel, and each fork
//! asks with its own set; a driver emulating it picks the fork that
//! survives.  That is why there are two name positions below: a fork that
//! expects `${name operator ...}` offers [`expansion_operator_name`], while
//! the plain `${name}` fork offers [`expansion_name`].

use crate::lex::{TokenSet, TokenType};

/// Statement start: `_statement: choice(command, variable_assignment,
/// redirected_statement, test_command, subshell, ...)` behind optional
/// `_terminator newline*`.
pub fn statement() -> TokenSet {
    TokenType::Newline
        | TokenType::VariableName
        | TokenType::FileDescriptor
        | TokenType::HeredocArrow
        | TokenType::HeredocArrowDash
        | TokenType::TestCommandStart
        | TokenType::OpeningParen
        | TokenType::BareDollar
}

/// Between the parts of one word: `_concat: seq(part, repeat1(seq(CONCAT,
/// part)))`.
pub fn word_join() -> TokenSet {
    TokenType::Concat.into()
}

/// A word part in argument position: `_literal: choice(expansion,
/// command_substitution, brace_range, word, ...)`.
pub fn word() -> TokenSet {
    TokenType::BareDollar | TokenType::RawDollar | TokenType::BraceStart
}

/// Directly after a consumed `$`: `expansion: seq($, choice(brace_start,
/// simple_variable_name, special_variable_name))`, `command_substitution:
/// seq($, '(', ...)`, `arithmetic_expansion: seq($, choice('((', '['),
/// ...)`.
pub fn dollar_suffix() -> TokenSet {
    TokenType::BraceStart
        | TokenType::SimpleVariableName
        | TokenType::SpecialVariableName
        | TokenType::OpeningParen
        | TokenType::DoubleOpeningParen
        | TokenType::OpeningBracket
}

/// The name inside `${...}` when nothing but `}` or a subscript follows:
/// `expansion: seq(brace_start, choice(simple_variable_name,
/// special_variable_name, variable_name), ...)`.
pub fn expansion_name() -> TokenSet {
    TokenType::SimpleVariableName | TokenType::VariableName | TokenType::SpecialVariableName
}

/// The name inside `${...}` on the fork where an operator follows:
/// `seq(brace_start, variable_name, expansion_operator, ...)`.  The plain
/// identifier terminal is absent so the name binds together with its
/// operator successor.
pub fn expansion_operator_name() -> TokenSet {
    TokenType::VariableName | TokenType::SpecialVariableName
}

/// Operator position after the name inside `${...}` on the forks that do
/// not involve pattern removal: subscripts, defaults, and the plain close.
pub fn expansion_operator() -> TokenSet {
    TokenType::ImmediateDoubleHash
        | TokenType::OpeningBracket
        | TokenType::EmptyValue
        | TokenType::ClosingBrace
}

/// The fork where the name is followed by prefix removal: `seq(name,
/// choice(hash_pattern, double_hash_pattern), ...)`.
pub fn expansion_hash_operator() -> TokenSet {
    TokenType::HashPattern | TokenType::DoubleHashPattern
}

/// The marker position after the grammar has shifted a substitution `/`:
/// `seq(name, '/', pattern_start, repeat(expansion_word), ...)`.
pub fn expansion_pattern_marker() -> TokenSet {
    TokenType::PatternStart.into()
}

/// The marker position after a prefix/suffix operator, before its pattern.
pub fn expansion_suffix_marker() -> TokenSet {
    TokenType::PatternSuffixStart.into()
}

/// Pattern material inside `${...}` up to the closing brace:
/// `seq(pattern_marker, repeat(expansion_word), closing_brace)`.
pub fn expansion_pattern() -> TokenSet {
    TokenType::ExpansionWord | TokenType::ClosingBrace
}

/// Inside `name[...]`: `subscript: seq('[', choice(array_star, array_at,
/// _expression), ']')`.
pub fn subscript() -> TokenSet {
    TokenType::ArrayStarToken | TokenType::ArrayAtToken | TokenType::ClosingBracket
}

/// Inside `[[ ... ]]`: unary test expressions and the closing delimiter.
/// The expansion fork, where `$` introduces a parameter.
pub fn test_expression() -> TokenSet {
    TokenType::TestOperator
        | TokenType::BareDollar
        | TokenType::RawDollar
        | TokenType::TestCommandEnd
}

/// The `[[ ... ]]` fork where a `$` can only stand alone as a literal.
pub fn test_literal_dollar() -> TokenSet {
    TokenType::TestOperator | TokenType::RawDollar | TokenType::TestCommandEnd
}

/// The right-hand side of `name=`: an array opener or nothing at all.
pub fn array_value() -> TokenSet {
    TokenType::OpeningParen | TokenType::EmptyValue
}

/// The right operand of `=~`: a regex that may not contain unquoted
/// whitespace.
pub fn test_regex() -> TokenSet {
    TokenType::RegexNoSpace.into()
}

/// The delimiter word after `<<`/`<<-` on the operator line:
/// `heredoc_redirect: seq(heredoc_arrow, heredoc_start)`.
pub fn heredoc_redirect() -> TokenSet {
    TokenType::HeredocStart.into()
}

/// The first body request after the operator line's newline.
pub fn heredoc_body_start() -> TokenSet {
    TokenType::HeredocBodyBeginning | TokenType::SimpleHeredocBody
}

/// Body continuation after an embedded expansion.
pub fn heredoc_line() -> TokenSet {
    TokenType::HeredocContent | TokenType::HeredocEnd
}

/// A case-item pattern before its `)`: `case_item:
/// seq(choice(extglob_pattern, glob_flags, _literal), ')', ...)`.
pub fn case_pattern() -> TokenSet {
    TokenType::ExtglobPattern | TokenType::ZshExtendedGlobFlags
}

/// Inside `$((...))`, `((...))`, or `$[...]`: the closers plus nested
/// expansion starts.
pub fn arithmetic() -> TokenSet {
    TokenType::ClosingDoubleParen
        | TokenType::ClosingParen
        | TokenType::ClosingBracket
        | TokenType::BareDollar
}

/// The same position while the parser recovers from an error; the scanner
/// sees the flag and stops speculating.
pub fn with_error_recovery(base: TokenSet) -> TokenSet {
    base | TokenType::ErrorRecovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::TokenSet;

    #[test]
    fn positions_are_subsets_of_the_namespace() {
        for set in [
            statement(),
            word_join(),
            word(),
            dollar_suffix(),
            expansion_name(),
            expansion_operator_name(),
            expansion_operator(),
            expansion_hash_operator(),
            expansion_pattern_marker(),
            expansion_suffix_marker(),
            expansion_pattern(),
            subscript(),
            test_expression(),
            test_literal_dollar(),
            array_value(),
            test_regex(),
            heredoc_redirect(),
            heredoc_body_start(),
            heredoc_line(),
            case_pattern(),
            arithmetic(),
        ] {
            assert!(!set.is_empty());
            assert!(TokenSet::full().contains(set));
        }
    }

    #[test]
    fn operator_name_fork_drops_the_plain_identifier() {
        assert!(expansion_name().contains(TokenType::SimpleVariableName));
        assert!(!expansion_operator_name().contains(TokenType::SimpleVariableName));
    }

    #[test]
    fn recovery_adds_only_the_flag() {
        let base = statement();
        let recovering = with_error_recovery(base);
        assert!(recovering.contains(TokenType::ErrorRecovery));
        assert_eq!(recovering & !TokenType::ErrorRecovery, base);
    }

    #[test]
    fn no_position_offers_the_recovery_flag_itself() {
        for set in [statement(), word(), expansion_operator(), case_pattern()] {
            assert!(!set.contains(TokenType::ErrorRecovery));
        }
    }
}
