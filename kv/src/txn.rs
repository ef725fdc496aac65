//! The single-client transaction buffer.
//!
//! A transaction never touches the keyspace directly; it accumulates an ordered sequence
//! of [`Intent`]s and replays them against the keyspace (and the durability log) only at
//! COMMIT. Reads made while a transaction is open must see a consistent "buffer overlaid
//! on committed state" view, which is what the scan helpers below provide.

/// One buffered operation, carrying everything needed both to apply it at commit time and
/// to answer overlay reads without re-parsing anything.
#[derive(Clone, Debug)]
pub enum Intent {
    /// A buffered SET. `carried_deadline` is `None` unless the SET itself supplied a TTL;
    /// like a direct SET, an absent deadline preserves whatever the key already had.
    Set {
        key: String,
        value: String,
        carried_deadline: Option<i64>,
    },
    Del { key: String },
    /// A buffered EXPIRE. `relative_ms` is the caller's original token, kept verbatim so
    /// that a TTL read against the open transaction and the eventual log line both
    /// reproduce exactly what was typed.
    Expire { key: String, relative_ms: String },
}

impl Intent {
    pub fn key(&self) -> &str {
        match self {
            Intent::Set { key, .. } | Intent::Del { key } | Intent::Expire { key, .. } => key,
        }
    }
}

#[derive(Default)]
pub struct TransactionBuffer {
    intents: Vec<Intent>,
}

impl TransactionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// The first intent touching `key`, scanning from the most recently buffered backward.
    /// Used by TTL, which (per the source) never skips over any intent kind.
    pub fn latest_touch(&self, key: &str) -> Option<&Intent> {
        self.intents.iter().rev().find(|i| i.key() == key)
    }

    /// The first SET or DEL touching `key`, scanning backward and skipping over any EXPIRE
    /// in between. GET and EXISTS use this; it mirrors the source exactly, which only ever
    /// special-cases SET and DEL in those two lookups and simply keeps scanning past an
    /// EXPIRE entry rather than stopping at it.
    pub fn latest_set_or_del(&self, key: &str) -> Option<&Intent> {
        self.intents
            .iter()
            .rev()
            .filter(|i| i.key() == key)
            .find(|i| !matches!(i, Intent::Expire { .. }))
    }

    /// The most recently buffered SET's value for `key`, ignoring any DEL/EXPIRE intents
    /// that might sit between it and the end of the buffer. PERSIST uses this to recover
    /// the value it should re-SET with a cleared deadline.
    pub fn latest_set_value(&self, key: &str) -> Option<&str> {
        self.intents.iter().rev().find_map(|i| match i {
            Intent::Set { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn into_intents(self) -> Vec<Intent> {
        self.intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_touch_sees_every_kind() {
        let mut buf = TransactionBuffer::new();
        buf.push(Intent::Set { key: "a".into(), value: "1".into(), carried_deadline: None });
        buf.push(Intent::Expire { key: "a".into(), relative_ms: "500".into() });
        assert!(matches!(buf.latest_touch("a"), Some(Intent::Expire { .. })));
    }

    #[test]
    fn set_or_del_skips_over_expire() {
        let mut buf = TransactionBuffer::new();
        buf.push(Intent::Set { key: "a".into(), value: "1".into(), carried_deadline: None });
        buf.push(Intent::Expire { key: "a".into(), relative_ms: "500".into() });
        match buf.latest_set_or_del("a") {
            Some(Intent::Set { value, .. }) => assert_eq!(value, "1"),
            other => panic!("expected to skip past EXPIRE to the SET, got {other:?}"),
        }
    }

    #[test]
    fn latest_set_value_ignores_unrelated_keys() {
        let mut buf = TransactionBuffer::new();
        buf.push(Intent::Set { key: "a".into(), value: "1".into(), carried_deadline: None });
        buf.push(Intent::Set { key: "b".into(), value: "2".into(), carried_deadline: None });
        assert_eq!(buf.latest_set_value("a"), Some("1"));
    }
}
