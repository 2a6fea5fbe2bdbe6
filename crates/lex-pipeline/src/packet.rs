//! The data packet flowing through the pipe.

use crate::schema::TableSchema;
use crate::types::{Shape, StageRecord};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Dataset plus cross-filter metadata and execution history.
///
/// A packet is never mutated in place by a filter. Filters derive a new
/// packet from their input with [`DataPacket::with_table`]; the polars frame
/// shares column buffers with its predecessor, so unchanged columns are not
/// copied. Only the executor appends to `history`.
#[derive(Debug, Clone)]
pub struct DataPacket {
    table: DataFrame,
    metadata: BTreeMap<String, serde_json::Value>,
    history: Vec<StageRecord>,
}

impl DataPacket {
    /// Wrap an uploaded dataset. Metadata and history start empty.
    pub fn new(table: DataFrame) -> Self {
        Self {
            table,
            metadata: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    pub fn shape(&self) -> Shape {
        Shape::of(&self.table)
    }

    pub fn schema(&self) -> PolarsResult<TableSchema> {
        TableSchema::from_frame(&self.table)
    }

    /// Derive a packet carrying `table`, keeping this packet's metadata and history.
    pub fn with_table(&self, table: DataFrame) -> Self {
        Self {
            table,
            metadata: self.metadata.clone(),
            history: self.history.clone(),
        }
    }

    /// Set a metadata entry on a derived packet.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Statistics a filter recorded under `<kind>.stats`.
    pub fn stats_for(&self, kind: &str) -> Option<&serde_json::Value> {
        self.metadata.get(&stats_key(kind))
    }

    /// Take the final table out of the packet.
    pub fn into_table(self) -> DataFrame {
        self.table
    }

    pub(crate) fn record_stage(&mut self, record: StageRecord) {
        self.history.push(record);
    }
}

/// Metadata key under which a filter kind stores its statistics.
pub fn stats_key(kind: &str) -> String {
    format!("{kind}.stats")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_table_keeps_metadata_and_leaves_source_untouched() {
        let source = DataPacket::new(df!("a" => [1.0, 2.0]).unwrap())
            .with_metadata("origin", "upload");
        let derived = source
            .with_table(df!("b" => [3.0, 4.0, 5.0]).unwrap())
            .with_metadata(stats_key("scale"), json!({"method": "standard"}));

        assert_eq!(source.shape(), Shape::new(2, 1));
        assert_eq!(derived.shape(), Shape::new(3, 1));
        assert_eq!(derived.metadata()["origin"], "upload");
        assert!(source.stats_for("scale").is_none());
        assert_eq!(derived.stats_for("scale").unwrap()["method"], "standard");
    }
}
