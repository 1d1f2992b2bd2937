//! Prompt templates.

use medhist_common::PatientId;

use crate::profile::VisitSchedule;

pub const QUERY_SYSTEM_PROMPT: &str = "You are a medical history assistant.";

pub const PROFILE_SYSTEM_PROMPT: &str =
    "You are a data generation AI that creates realistic patient profiles and medical histories.";

pub const CONTEXT_LABEL: &str = "Relevant past medical history:";

/// Query used to summarize a profile that only exists in memory.
pub const PROFILE_SUMMARY_QUERY: &str = "Provide the Summary of patient profile";

/// Context label, rendered memories, then the patient's question.
pub fn build_query_prompt(rendered_memories: &str, query: &str) -> String {
    format!("{CONTEXT_LABEL}\n{rendered_memories}\nPatient: {query}\nMedical Assistant:")
}

pub fn build_profile_prompt(patient: &PatientId, schedule: &VisitSchedule) -> String {
    format!(
        "Generate a detailed patient profile and medical history for a patient with ID {patient}. Include:
1. Patient name, age, and basic info
2. Last visit date ({last_visit}) and purpose
3. Next scheduled appointment ({next_appointment})
4. List of ongoing medications and dosages
5. Medical conditions diagnosed in the past year
6. Any allergies and emergency contacts
7. Brief summary of the patient's lifestyle and habits
8. Any additional relevant information
",
        last_visit = schedule.last_visit_display(),
        next_appointment = schedule.next_appointment_display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn query_prompt_orders_context_then_question() {
        let prompt = build_query_prompt("- (user) migraine last spring", "headache");
        assert_eq!(
            prompt,
            "Relevant past medical history:\n- (user) migraine last spring\nPatient: headache\nMedical Assistant:"
        );
    }

    #[test]
    fn profile_prompt_mentions_patient_and_dates() {
        let patient = PatientId::require("PAT-12345").unwrap();
        let schedule =
            VisitSchedule::around(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        let prompt = build_profile_prompt(&patient, &schedule);

        assert!(prompt.contains("patient with ID PAT-12345"));
        assert!(prompt.contains("Last visit date (February 13, 2026)"));
        assert!(prompt.contains("Next scheduled appointment (April 14, 2026)"));
        assert!(prompt.contains("8. Any additional relevant information"));
    }
}
