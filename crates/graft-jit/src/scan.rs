//! Balanced-parenthesis scanning for `new` argument lists.
//!
//! The scanner is fed code chunks in order. Strings and comments never reach
//! it: they are separate nodes and the caller skips them.

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Waiting for the `(` that opens the argument list.
    ScanningCall,
    /// Inside the argument list, `n` brackets deep.
    InArgsDepth(usize),
    /// The argument list has been closed.
    Closed,
    /// The statement ended, or brackets mismatched, before the list closed.
    Unbalanced,
}

/// Tracks bracket depth from a call's opening paren across chunks.
#[derive(Debug, Clone, Copy)]
pub struct BalanceScanner {
    state: ScanState,
}

impl Default for BalanceScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceScanner {
    /// Scanner positioned before the opening paren.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ScanState::ScanningCall,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Whether scanning has reached a final state.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self.state, ScanState::Closed | ScanState::Unbalanced)
    }

    /// Feed the next chunk of code.
    ///
    /// Returns the offset of the closing paren when the list closes inside
    /// this chunk.
    pub fn feed(&mut self, chunk: &str) -> Option<usize> {
        for (i, b) in chunk.bytes().enumerate() {
            self.state = match (self.state, b) {
                (ScanState::Closed | ScanState::Unbalanced, _) => return None,
                (ScanState::ScanningCall, b'(') => ScanState::InArgsDepth(1),
                (ScanState::ScanningCall, b) if b.is_ascii_whitespace() => ScanState::ScanningCall,
                (ScanState::ScanningCall, _) => ScanState::Unbalanced,
                (ScanState::InArgsDepth(_), b';') => ScanState::Unbalanced,
                (ScanState::InArgsDepth(n), b'(' | b'[' | b'{') => ScanState::InArgsDepth(n + 1),
                (ScanState::InArgsDepth(1), b')') => {
                    self.state = ScanState::Closed;
                    return Some(i);
                }
                (ScanState::InArgsDepth(1), b']' | b'}') => ScanState::Unbalanced,
                (ScanState::InArgsDepth(n), b')' | b']' | b'}') => ScanState::InArgsDepth(n - 1),
                (state, _) => state,
            };
        }
        None
    }

    /// Give up on the scan.
    pub fn abandon(&mut self) {
        if self.state != ScanState::Closed {
            self.state = ScanState::Unbalanced;
        }
    }
}
