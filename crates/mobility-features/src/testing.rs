//! Panel row fixtures for unit tests.

use mobility_data::panel::{movement_index, ratio};
use mobility_data::{Month, MonthlyPanelRow};

/// A panel row with an even student/adult split and no biometric data.
pub(crate) fn row(
    state: &str,
    district: &str,
    index: u32,
    total: i64,
    pop: Option<i64>,
) -> MonthlyPanelRow {
    let month = Month::new(2024 + (index / 12) as i32, index % 12 + 1).unwrap();
    let student = total / 2;
    MonthlyPanelRow {
        district_key: format!("{state}_{district}"),
        state: state.to_string(),
        district: district.to_string(),
        month,
        month_index: index,
        month_num: month.month_num(),
        quarter: month.quarter(),
        student_updates: student,
        adult_updates: total - student,
        total_demo: total,
        student_ratio: ratio(student, total),
        adult_ratio: ratio(total - student, total),
        bio_student: None,
        bio_adult: None,
        age_0_5: None,
        age_5_17: None,
        pop_adult: pop,
        movement_index: movement_index(total, pop),
    }
}
