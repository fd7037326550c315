//! Built-in sample records used when the backing store cannot be read.

use chrono::{Duration, NaiveDate};

use crate::models::Column;
use crate::schema::{RawTable, RawValue};

struct Sample {
    practitioner: &'static str,
    client_id: &'static str,
    days_ago: i64,
    age: i64,
    sex: &'static str,
    focus_area: &'static str,
    chemical: &'static str,
    dosage_mg: i64,
    intake_form: &'static str,
    protocol: &'static str,
    rating: i64,
    results: &'static str,
    next_steps: &'static str,
}

const SAMPLES: [Sample; 4] = [
    Sample {
        practitioner: "Dr. A. Smith",
        client_id: "P-1024",
        days_ago: 30,
        age: 34,
        sex: "F",
        focus_area: "PTSD",
        chemical: "Ketamine",
        dosage_mg: 85,
        intake_form: "Injected",
        protocol: "Used a monitored ketamine session with guided imagery and integration.",
        rating: 4,
        results: "Patient reported fewer intrusive thoughts and improved sleep over the next week.",
        next_steps: "Follow up in 2 weeks.",
    },
    Sample {
        practitioner: "Clinician B. Jones",
        client_id: "P-3921",
        days_ago: 90,
        age: 52,
        sex: "M",
        focus_area: "Addiction",
        chemical: "Psilocybin",
        dosage_mg: 25,
        intake_form: "Eaten",
        protocol: "Used a supervised session with a structured preparation and integration plan.",
        rating: 5,
        results: "Patient reported lower cravings and stronger commitment to a relapse prevention plan.",
        next_steps: "Integration therapy scheduled.",
    },
    Sample {
        practitioner: "Dr. L. Patel",
        client_id: "P-7712",
        days_ago: 14,
        age: 41,
        sex: "Non-Binary",
        focus_area: "General Personal Health",
        chemical: "Other",
        dosage_mg: 40,
        intake_form: "Topical",
        protocol: "Used a structured session with symptom tracking and follow up coaching.",
        rating: 3,
        results: "Patient reported some stress reduction but had trouble focusing during the session.",
        next_steps: "Reassess in 3 weeks.",
    },
    Sample {
        practitioner: "Clinician D. Allen",
        client_id: "P-6603",
        days_ago: 7,
        age: 29,
        sex: "F",
        focus_area: "Spirituality",
        chemical: "DMT",
        dosage_mg: 18,
        intake_form: "Inhaled",
        protocol: "Used a brief inhalation session with grounding and a short integration debrief.",
        rating: 2,
        results: "Patient reported anxiety during the peak and needed extra grounding afterward.",
        next_steps: "Pause and review readiness before next session.",
    },
];

/// Four illustrative records, one per focus area, dated relative to `today`.
///
/// Returned raw so it passes through normalization like a real load.
pub fn fallback_table(today: NaiveDate) -> RawTable {
    let headers = Column::ALL.iter().map(|c| c.header().to_string()).collect();
    let rows = SAMPLES
        .iter()
        .map(|s| {
            let date = today - Duration::days(s.days_ago);
            vec![
                s.practitioner.into(),
                s.client_id.into(),
                RawValue::Text(date.to_string()),
                s.age.into(),
                s.sex.into(),
                s.focus_area.into(),
                s.chemical.into(),
                s.dosage_mg.into(),
                s.intake_form.into(),
                s.protocol.into(),
                s.rating.into(),
                s.results.into(),
                s.next_steps.into(),
            ]
        })
        .collect();

    RawTable::from_rows(headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FOCUS_AREAS;
    use crate::schema::normalize;

    #[test]
    fn test_fallback_covers_every_focus_area() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let normalized = normalize(&fallback_table(today));

        assert!(normalized.is_clean());
        assert_eq!(normalized.dataset.len(), 4);
        for area in FOCUS_AREAS {
            assert!(normalized.dataset.iter().any(|r| r.focus_area == area));
        }
    }

    #[test]
    fn test_fallback_dates_are_relative() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let ds = normalize(&fallback_table(today)).dataset;

        assert_eq!(ds.records()[0].treatment_date, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(ds.records()[3].treatment_date, NaiveDate::from_ymd_opt(2024, 5, 25));
    }
}
