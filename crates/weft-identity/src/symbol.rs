// symbol.rs
//
// Unique identifier for interned strings.

/// Unique identifier for symbols (interned strings).
///
/// Symbols issued by one `Interner` compare across every snapshot of the
/// same program, which is what makes reference names and path segments cheap
/// to compare without resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Create a Symbol from a raw index. Only the interner should use this.
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the underlying index.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Create a Symbol with an arbitrary index in test code.
    #[cfg(any(test, feature = "testing"))]
    pub fn new_for_test(index: u32) -> Self {
        Self(index)
    }
}
