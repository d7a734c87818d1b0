use std::{error, fmt};

/// Error variants that can be returned while validating a tree. All
/// regular operations on this package's collections are total, absence
/// of a key or an empty reduction is reported as `None`, never as error.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// A red node has a red child, path is `(parent, child)` keys.
    ConsecutiveReds(String, String),
    /// Left and right subtree of a node count different number of
    /// black nodes.
    UnbalancedBlacks(usize, usize),
    /// Keys are not in strict ascending order, `(parent, child)` keys.
    SortError(String, String),
    /// A double-black marker survived outside of a delete operation.
    DoubleBlackRemnant,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConsecutiveReds(p, c) => {
                write!(f, "consecutive red nodes {} -> {}", p, c)
            }
            Error::UnbalancedBlacks(l, r) => {
                write!(f, "unbalanced blacks left:{} right:{}", l, r)
            }
            Error::SortError(p, c) => write!(f, "sort error {} >= {}", p, c),
            Error::DoubleBlackRemnant => write!(f, "double-black remnant"),
        }
    }
}

impl error::Error for Error {}

/// Short form for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
