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

//! # Z shell syntax for incremental parsers
//!
//! This crate is the language-specific half of a Z shell concrete-syntax-tree
//! pipeline: a generalized (GLR) parser drives the declarative grammar, and
//! whenever context-free lookahead cannot decide what the next terminal is,
//! it calls into the hand-written scanner implemented here.
//!
//! Most of zsh cannot be tokenized context-freely.  Whether `#` is an
//! operator or pattern text depends on whether the scanner is inside
//! `${...}`; whether `)` closes arithmetic, a command substitution, or a case
//! pattern depends on which opener produced it; here-document bodies are
//! delimited by a word that was read many tokens earlier.  The
//! [`lex::Scanner`] owns exactly that state - a context stack, a queue of
//! pending here-documents, and one token of history - and resolves one
//! terminal per call from the set the parser says is currently acceptable.
//!
//! The crate has two public layers:
//!
//! - [`lex`] - the scanner: terminal namespace, host cursor interface,
//!   context stack, here-document machinery, and state (de)serialization for
//!   incremental reparsing.
//!
//! - [`grammar`] - the contract between the grammar's productions and the
//!   scanner: for each parser position that can request an external
//!   terminal, the set of terminals the productions make acceptable there.
//!   This is what lets the scanner be exercised without a full parser
//!   runtime.
//!
//! The parser generator itself, editor bindings, highlight queries, and the
//! corpus-test harness live with their hosts and are out of scope for this
//! crate.

pub mod grammar;
pub mod lex;
