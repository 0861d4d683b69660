//! Operation, comparator, and per-item status codes.
//!
//! All three enums have stable `u8` tags: they appear in message headers and
//! per-item records on the wire.

/// The operation carried by a bulk message or reported on a result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Store a triple.
    Put = 0,
    /// Fetch the object stored under `(subject, predicate)`.
    Get = 1,
    /// Ranged fetch driven by a comparator and a record limit.
    GetOp = 2,
    /// Best-effort delete of `(subject, predicate)`.
    Delete = 3,
    /// Snapshot a named histogram.
    Histogram = 4,
    /// Flush, persist, and rendezvous. Never travels as a bulk message.
    Sync = 5,
}

impl Operation {
    /// Decodes an operation from its stable tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Operation::Put,
            1 => Operation::Get,
            2 => Operation::GetOp,
            3 => Operation::Delete,
            4 => Operation::Histogram,
            5 => Operation::Sync,
            _ => return None,
        })
    }

    /// The stable tag for this operation.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The comparison predicate attached to each GETOP item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Comparator {
    /// Only the exact key.
    Eq = 0,
    /// Every key except the exact one, ascending from the keyspace start.
    Ne = 1,
    /// Descend from the seek position, excluding the exact key.
    Lt = 2,
    /// Descend from the seek position, including the exact key.
    Le = 3,
    /// Ascend from the seek position, excluding the exact key.
    Gt = 4,
    /// Ascend from the seek position, including the exact key.
    Ge = 5,
    /// Alias for descending past the exact key.
    Before = 6,
    /// Alias for ascending past the exact key.
    After = 7,
    /// The lowest keys of the datastore; the seed predicate is ignored.
    First = 8,
    /// The highest keys of the datastore; the seed predicate is ignored.
    Last = 9,
}

impl Comparator {
    /// Decodes a comparator from its stable tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Comparator::Eq,
            1 => Comparator::Ne,
            2 => Comparator::Lt,
            3 => Comparator::Le,
            4 => Comparator::Gt,
            5 => Comparator::Ge,
            6 => Comparator::Before,
            7 => Comparator::After,
            8 => Comparator::First,
            9 => Comparator::Last,
            _ => return None,
        })
    }

    /// The stable tag for this comparator.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The per-item outcome recorded on every response item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// The item was applied.
    Ok = 0,
    /// The key (or histogram name) does not exist.
    NotFound = 1,
    /// The storage engine failed on this item.
    EngineError = 2,
    /// The stored kind disagrees with the requested kind.
    KindMismatch = 3,
    /// The flush deadline expired before a response arrived.
    Timeout = 4,
    /// The message carrying this item failed in transit.
    TransportError = 5,
}

impl Status {
    /// Decodes a status from its stable tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Status::Ok,
            1 => Status::NotFound,
            2 => Status::EngineError,
            3 => Status::KindMismatch,
            4 => Status::Timeout,
            5 => Status::TransportError,
            _ => return None,
        })
    }

    /// The stable tag for this status.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
