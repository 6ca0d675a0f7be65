//! The per-key unit of truth, held in the master map and copied into every
//! transaction's private snapshot at `begin`.

/// A record for a single key: its current value (or the absence marker,
/// `None`) plus the timestamps of the most recent committed write and read.
///
/// Copied by value into snapshots, so that later mutations of the master
/// record can never reach back into a transaction that already took its copy.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ValueRecord<V> {
    value: Option<V>,
    last_written: Option<u64>,
    last_read: Option<u64>,
}

impl<V> ValueRecord<V> {
    /// A record for a key that has never been written: no value, no
    /// timestamps. This is what `read` installs into a transaction's
    /// snapshot when the key is missing from master.
    pub fn absent() -> Self {
        Self { value: None, last_written: None, last_read: None }
    }

    pub fn new(value: Option<V>, last_written: Option<u64>, last_read: Option<u64>) -> Self {
        Self { value, last_written, last_read }
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<V> {
        self.value
    }

    pub fn last_written(&self) -> Option<u64> {
        self.last_written
    }

    pub fn last_read(&self) -> Option<u64> {
        self.last_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_has_no_value_or_timestamps() {
        let r: ValueRecord<i64> = ValueRecord::absent();
        assert_eq!(r.value(), None);
        assert_eq!(r.last_written(), None);
        assert_eq!(r.last_read(), None);
    }

    #[test]
    fn new_preserves_fields() {
        let r = ValueRecord::new(Some(42), Some(3), Some(5));
        assert_eq!(r.value(), Some(&42));
        assert_eq!(r.last_written(), Some(3));
        assert_eq!(r.last_read(), Some(5));
        assert_eq!(r.into_value(), Some(42));
    }
}
