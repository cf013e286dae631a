use serde::Serialize;

use crate::error::StoreError;
use crate::reading::{RawRecord, Reading, ReadingField, parse_number};

/// Ordered readings of the current import. Rows are addressed by position and
/// never reordered; edits mutate in place.
#[derive(Clone, Debug, Default)]
pub struct ReadingStore {
    readings: Vec<Reading>,
}

/// One display row of the readings table.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub index: usize,
    pub unit: String,
    pub previous_reading: f64,
    pub current_reading: f64,
    /// Consumption rendered with three decimals.
    pub consumption: String,
    pub negative: bool,
    pub is_common_area: bool,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every reading with the normalized `rows`, keeping their order.
    pub fn replace_all(&mut self, rows: &[RawRecord]) {
        self.readings = rows.iter().map(Reading::from_record).collect();
    }

    pub fn get(&self, index: usize) -> Result<&Reading, StoreError> {
        self.readings.get(index).ok_or(StoreError::IndexOutOfRange {
            index,
            len: self.readings.len(),
        })
    }

    /// Stores `raw_text` parsed as a number (0 when it is not one) and returns
    /// the updated reading.
    pub fn set_field(
        &mut self,
        index: usize,
        field: ReadingField,
        raw_text: &str,
    ) -> Result<&Reading, StoreError> {
        let reading = self.get_mut(index)?;
        reading.set(field, parse_number(raw_text));
        Ok(reading)
    }

    pub fn set_common_area(&mut self, index: usize, checked: bool) -> Result<(), StoreError> {
        self.get_mut(index)?.is_common_area = checked;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn all(&self) -> &[Reading] {
        &self.readings
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn rows(&self) -> Vec<TableRow> {
        self.readings
            .iter()
            .enumerate()
            .map(|(index, reading)| TableRow {
                index,
                unit: reading.unit.clone(),
                previous_reading: reading.previous_reading,
                current_reading: reading.current_reading,
                consumption: format_consumption(reading.consumption()),
                negative: reading.has_negative_consumption(),
                is_common_area: reading.is_common_area,
            })
            .collect()
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Reading, StoreError> {
        let len = self.readings.len();
        self.readings
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })
    }
}

pub fn format_consumption(consumption: f64) -> String {
    format!("{:.3}", consumption)
}
