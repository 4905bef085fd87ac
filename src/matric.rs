//! Matriculation number generation.
//!
//! A matriculation number is a fixed-width identifier: two zero-padded
//! digits for the cohort number followed by three zero-padded digits for the
//! participant's 1-based index within that cohort. Index assignment is
//! serialized per cohort by the enrollment transaction, so numbers are
//! unique within a cohort.

/// Builds the matriculation number for the given cohort and 1-based index.
pub fn generate_matric_number(cohort_number: i32, participant_index: i64) -> String {
    format!("{:02}{:03}", cohort_number, participant_index)
}
