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

//! Nested lexical contexts.
//!
//! Tokenization rules change inside `${...}`, `$((...))`, `$(...)`,
//! `[[ ... ]]`, and the pattern positions of a parameter expansion.  The
//! scanner tracks where it is with a stack of [`Context`] tags; the openers
//! push, the matching closers pop, and the two pattern markers rewrite the
//! top.  Predicates over the top tag are the only way the dispatcher asks
//! "where am I".

use smallvec::SmallVec;
use tracing::trace;

/// One lexical scope tag.
///
/// The numeric values are the serialization tags; they must not be
/// renumbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Context {
    /// Top level; also what [`ContextStack::top`] reports for an empty stack.
    None = 0,
    /// Inside `${...}`.
    Parameter = 1,
    /// Inside `$((...))`, `((...))`, or legacy `$[...]`.
    Arithmetic = 2,
    /// Inside `$(...)`.
    Command = 3,
    /// Inside `[[ ... ]]`.
    Test = 4,
    /// Inside `{a..b}`.  The grammar owns both braces of a range, so the
    /// dispatcher never pushes this tag, but it is legal in restored state.
    BraceExpansion = 5,
    /// Inside the pattern of `${var#pat}` / `${var%pat}`.
    ParamPatternSuffix = 6,
    /// Inside the pattern of `${var/pat/repl}`.
    ParamPatternSubstitute = 7,
}

impl Context {
    /// Returns the context for a serialization tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::None,
            1 => Self::Parameter,
            2 => Self::Arithmetic,
            3 => Self::Command,
            4 => Self::Test,
            5 => Self::BraceExpansion,
            6 => Self::ParamPatternSuffix,
            7 => Self::ParamPatternSubstitute,
            _ => return None,
        })
    }

    /// Returns the serialization tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// True for the three tags that mean "somewhere inside `${...}`".
    pub fn is_parameter_expansion(self) -> bool {
        matches!(
            self,
            Self::Parameter | Self::ParamPatternSuffix | Self::ParamPatternSubstitute
        )
    }
}

/// LIFO stack of lexical scopes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextStack(SmallVec<[Context; 8]>);

impl ContextStack {
    /// Returns an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `context`.
    pub fn push(&mut self, context: Context) {
        trace!(?context, depth = self.0.len(), "enter context");
        self.0.push(context);
    }

    /// Leaves the context that should be `expected`.
    ///
    /// A mismatched top is discarded anyway: a stuck context would wedge
    /// every later token, while one bad pop is locally recoverable.
    pub fn pop_expected(&mut self, expected: Context) {
        match self.0.pop() {
            Some(popped) if popped == expected => {
                trace!(context = ?popped, "exit context");
            }
            Some(popped) => {
                trace!(?expected, actual = ?popped, "exit mismatched context");
            }
            None => {
                trace!(?expected, "exit on empty context stack");
            }
        }
    }

    /// Rewrites the top tag in place, for the `${var/...}` and `${var#...}`
    /// transitions where the scope does not nest.
    pub fn replace_top(&mut self, context: Context) {
        if let Some(top) = self.0.last_mut() {
            trace!(from = ?*top, to = ?context, "replace context");
            *top = context;
        } else {
            self.push(context);
        }
    }

    /// Returns the active context, [`Context::None`] when the stack is
    /// empty.
    pub fn top(&self) -> Context {
        self.0.last().copied().unwrap_or(Context::None)
    }

    /// Returns the nesting depth.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no context is open.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Forgets all open contexts.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterates bottom to top, for serialization.
    pub fn iter(&self) -> impl Iterator<Item = Context> + '_ {
        self.0.iter().copied()
    }

    /// True when the active context is anywhere inside `${...}`.
    pub fn in_parameter_expansion(&self) -> bool {
        self.top().is_parameter_expansion()
    }

    /// True when the active context is a `[[ ... ]]` test command.
    pub fn in_test(&self) -> bool {
        self.top() == Context::Test
    }

    /// True when a bare `/` ends the current pattern, i.e. inside the
    /// pattern half of `${var/pat/repl}`.
    pub fn should_break_on_slash(&self) -> bool {
        self.top() == Context::ParamPatternSubstitute
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, ContextStack};

    #[test]
    fn top_of_empty_stack_is_none() {
        let stack = ContextStack::new();
        assert_eq!(stack.top(), Context::None);
        assert!(!stack.in_parameter_expansion());
    }

    #[test]
    fn mismatched_pop_still_pops() {
        let mut stack = ContextStack::new();
        stack.push(Context::Parameter);
        stack.push(Context::Test);
        stack.pop_expected(Context::Arithmetic);
        assert_eq!(stack.top(), Context::Parameter);
    }

    #[test]
    fn replace_top_rewrites_in_place() {
        let mut stack = ContextStack::new();
        stack.push(Context::Parameter);
        stack.replace_top(Context::ParamPatternSubstitute);
        assert_eq!(stack.depth(), 1);
        assert!(stack.should_break_on_slash());
        assert!(stack.in_parameter_expansion());
    }

    #[test]
    fn tags_round_trip() {
        for tag in 0..=7 {
            assert_eq!(Context::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(Context::from_tag(8), None);
    }
}
