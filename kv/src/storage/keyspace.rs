use crate::storage::record::Record;
use crate::storage::Status;

/// An ordered collection of [`Record`]s, kept sorted by key in a plain `Vec`.
///
/// A sorted vector with binary search is adequate at the scale this engine targets; see the
/// re-architecture notes for when a balanced tree or skiplist would be worth the complexity.
/// Every observation here is responsible for lazily purging its own expired records — there
/// is no background sweeper.
#[derive(Default)]
pub struct Keyspace {
    records: Vec<Record>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    fn find(&self, key: &str) -> Result<usize, usize> {
        self.records.binary_search_by(|r| r.key.as_str().cmp(key))
    }

    /// Finds a key's index, purging it first if its deadline has passed.
    fn find_live(&mut self, key: &str, now_ms: i64) -> Option<usize> {
        let idx = self.find(key).ok()?;
        if self.records[idx].is_expired_at(now_ms) {
            self.records.remove(idx);
            None
        } else {
            Some(idx)
        }
    }

    /// Reads a live record, purging it first if expired.
    pub fn get(&mut self, key: &str, now_ms: i64) -> Option<&Record> {
        let idx = self.find_live(key, now_ms)?;
        Some(&self.records[idx])
    }

    pub fn exists(&mut self, key: &str, now_ms: i64) -> bool {
        self.find_live(key, now_ms).is_some()
    }

    /// The effective deadline of a live key: `None` if absent, `Some(None)` if present with
    /// no expiration, `Some(Some(deadline))` if present and due to expire.
    pub fn deadline_of(&mut self, key: &str, now_ms: i64) -> Option<Option<i64>> {
        self.get(key, now_ms).map(|r| r.deadline)
    }

    /// A key's deadline by presence alone, without purging it if it has already expired.
    /// Used to snapshot a key's deadline at the moment a SET is buffered inside a
    /// transaction, which the source does against raw committed state, not the live view.
    pub fn raw_deadline(&self, key: &str) -> Option<Option<i64>> {
        self.find(key).ok().map(|idx| self.records[idx].deadline)
    }

    /// Inserts or replaces a record. An absent `deadline` preserves whatever deadline the
    /// existing record had (or leaves a freshly-inserted record with no deadline); a present
    /// `deadline` always overwrites. This is the rule that makes a plain SET of an existing
    /// key never clear a prior expiration.
    pub fn upsert(&mut self, key: &str, value: String, deadline: Option<i64>) {
        match self.find(key) {
            Ok(idx) => {
                let record = &mut self.records[idx];
                record.value = value;
                if deadline.is_some() {
                    record.deadline = deadline;
                }
            }
            Err(pos) => {
                self.records.insert(pos, Record::new(key.to_string(), value, deadline));
            }
        }
    }

    /// Removes a key unconditionally (even if already past its deadline). Reports whether
    /// anything was actually removed.
    pub fn erase(&mut self, key: &str) -> bool {
        match self.find(key) {
            Ok(idx) => {
                self.records.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Arms an absolute deadline on a key found by presence alone, ignoring whether it has
    /// already logically expired. This matches EXPIRE's source behavior: it does not purge
    /// before arming, so it can re-arm a key that technically expired but wasn't yet purged.
    pub fn arm_deadline(&mut self, key: &str, deadline: i64) -> bool {
        match self.find(key) {
            Ok(idx) => {
                self.records[idx].deadline = Some(deadline);
                true
            }
            Err(_) => false,
        }
    }

    /// Clears a live key's deadline unconditionally. Returns `true` if a deadline was cleared.
    pub fn persist(&mut self, key: &str, now_ms: i64) -> bool {
        match self.find_live(key, now_ms) {
            Some(idx) if self.records[idx].deadline.is_some() => {
                self.records[idx].deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Keys in `[lo, hi]` (an empty bound string means unbounded on that side), ascending,
    /// purging any expired records encountered along the way.
    pub fn range(&mut self, lo: &str, hi: &str, now_ms: i64) -> Vec<String> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.records.len() {
            let expired = self.records[i].is_expired_at(now_ms);
            if expired {
                self.records.remove(i);
                continue;
            }
            let key = self.records[i].key.as_str();
            if (!lo.is_empty() && key < lo) || (!hi.is_empty() && key > hi) {
                i += 1;
                continue;
            }
            out.push(self.records[i].key.clone());
            i += 1;
        }
        out
    }

    pub fn status(&self) -> Status {
        Status {
            keys: self.records.len() as u64,
            size: self
                .records
                .iter()
                .fold(0u64, |acc, r| acc + r.key.len() as u64 + r.value.len() as u64),
        }
    }
}
