use std::collections::HashMap;
use std::sync::Arc;

use self::dev::{Field, StatusRecord, StatusSnapshot};

pub mod dev;

/// Live status of every known device, keyed by serial.
///
/// Records are created once and never removed, so the map itself needs no
/// lock; all mutation goes through the per-field atomics of each record.
pub struct StatusTable {
    serials: Vec<String>,
    records: HashMap<String, Arc<StatusRecord>>,
}

impl StatusTable {
    /// `serials` in display order, assumed unique
    pub fn new<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let serials: Vec<String> = serials.into_iter().map(Into::into).collect();
        let records = serials.iter()
            .map(|s| (s.clone(), Arc::new(StatusRecord::default())))
            .collect();
        Self{ serials, records }
    }

    pub fn serials(&self) -> &[String] {
        &self.serials
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }

    pub fn record(&self, serial: &str) -> Option<Arc<StatusRecord>> {
        self.records.get(serial).cloned()
    }

    pub fn get(&self, serial: &str) -> Option<StatusSnapshot> {
        self.records.get(serial).map(|r| r.snapshot())
    }

    /// false if the serial is unknown
    pub fn set_field(&self, serial: &str, field: Field) -> bool {
        match self.records.get(serial) {
            Some(r) => {
                r.set(field);
                true
            }
            None => false,
        }
    }

    pub fn snapshot_all(&self) -> Vec<(String, StatusSnapshot)> {
        self.serials.iter()
            .filter_map(|s| self.get(s).map(|snap| (s.clone(), snap)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::StatusTable;
    use super::dev::{Field, Mode};

    #[test]
    fn test_table_order_and_fields() {
        let table = StatusTable::new(vec!["C", "A", "B"]);
        assert_eq!(table.len(),3);
        assert!(table.set_field("A", Field::Mode(Mode::Read)));
        assert!(table.set_field("A", Field::Loop(3)));
        assert!(!table.set_field("Z", Field::Loop(3)));
        assert!(table.get("Z").is_none());

        let all = table.snapshot_all();
        let order: Vec<&str> = all.iter().map(|(s,_)| s.as_str()).collect();
        assert_eq!(order,vec!["C","A","B"]);
        assert_eq!(all[1].1.mode,Mode::Read);
        assert_eq!(all[1].1.loops,3);
        assert_eq!(all[0].1.mode,Mode::Idle);
    }
}
