/// Caller-chosen identifier naming a class of time events for joint triggering.
///
/// The clock imposes no relationship between ids beyond equality. Reusing an
/// id while an earlier registration for it is still outstanding leaves the
/// earlier registration owning the id; unregister before reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// Lets integer literals be passed directly as ids. Negative values wrap
// within 32 bits rather than sign-extending across the u64 space.
impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        Self(u64::from(id as u32))
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_conversions_stay_in_32_bits() {
        assert_eq!(EventId::from(7i32), EventId(7));
        assert_eq!(EventId::from(-1i32), EventId(u64::from(u32::MAX)));
        assert_eq!(EventId::from(u64::MAX), EventId(u64::MAX));
    }
}
