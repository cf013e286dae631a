use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::store::ReadingStore;

/// Billing parameters typed next to the readings table.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub period_from: String,
    pub period_to: String,
    pub next_reading: String,
    pub energy_tariff: String,
    pub management_fee: String,
    pub common_area_apportionment: bool,
}

/// Names of the form fields that can be edited one at a time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    PeriodFrom,
    PeriodTo,
    NextReading,
    EnergyTariff,
    ManagementFee,
    CommonAreaApportionment,
}

impl FormField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace(&['-', '_'][..], "").as_str() {
            "periodfrom" | "from" => Some(FormField::PeriodFrom),
            "periodto" | "to" => Some(FormField::PeriodTo),
            "nextreading" | "next" => Some(FormField::NextReading),
            "energytariff" | "tariff" => Some(FormField::EnergyTariff),
            "managementfee" | "fee" => Some(FormField::ManagementFee),
            "commonareaapportionment" | "apportionment" => {
                Some(FormField::CommonAreaApportionment)
            }
            _ => None,
        }
    }
}

impl FormFields {
    /// Sets one field from its text form. The apportionment flag accepts the
    /// usual truthy words ("true", "on", "1", "yes", "sim").
    pub fn set(&mut self, field: FormField, value: &str) {
        match field {
            FormField::PeriodFrom => self.period_from = value.to_string(),
            FormField::PeriodTo => self.period_to = value.to_string(),
            FormField::NextReading => self.next_reading = value.to_string(),
            FormField::EnergyTariff => self.energy_tariff = value.to_string(),
            FormField::ManagementFee => self.management_fee = value.to_string(),
            FormField::CommonAreaApportionment => {
                self.common_area_apportionment = matches!(
                    value.trim().to_lowercase().as_str(),
                    "true" | "on" | "1" | "yes" | "sim"
                )
            }
        }
    }

    /// Sets the billing period to the whole month containing `today`.
    pub fn reset_period(&mut self, today: NaiveDate) {
        let (first, last) = month_bounds(today);
        self.period_from = first.format("%Y-%m-%d").to_string();
        self.period_to = last.format("%Y-%m-%d").to_string();
    }
}

/// Whether preview and process may run. Only presence is checked: no numeric
/// ranges and no date ordering.
pub fn can_submit(store: &ReadingStore, fields: &FormFields) -> bool {
    !store.is_empty()
        && is_filled(&fields.period_from)
        && is_filled(&fields.period_to)
        && is_filled(&fields.energy_tariff)
}

fn is_filled(value: &str) -> bool {
    !value.trim().is_empty()
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next_month = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    (first, last)
}
