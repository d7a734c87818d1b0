use std::fmt;

/// Empty value, can be used for indexing entries that have a key but
/// no value.
#[derive(Copy, Clone, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Empty;

impl fmt::Debug for Empty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Empty")
    }
}
