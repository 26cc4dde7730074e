//! Human and machine renderings of a screening result.

use crate::pipeline::{RiskDecision, Screening};
use serde::Serialize;

/// Shown with every result.
pub const ADVISORY: &str =
    "The result is for screening purposes only and does not provide a medical diagnosis.";

/// Shown instead of a result when scoring fails. Never carries a probability.
pub const FAILURE_NOTICE: &str =
    "Risk could not be estimated. Please check the entered values and try again.";

pub fn format_probability(probability: f64) -> String {
    format!("{probability:.2}")
}

pub fn decision_label(decision: RiskDecision) -> &'static str {
    match decision {
        RiskDecision::ScreenPositive => "High risk of diabetes (screen-positive)",
        RiskDecision::ScreenNegative => "Low risk of diabetes (screen-negative)",
    }
}

/// The text block printed for one patient.
pub fn render_screening(screening: &Screening) -> String {
    format!(
        "{ADVISORY}\n\nEstimated probability of diabetes: {}\n{}\n",
        format_probability(screening.probability),
        decision_label(screening.decision)
    )
}

pub fn render_failure() -> String {
    format!("{ADVISORY}\n\n{FAILURE_NOTICE}\n")
}

#[derive(Serialize)]
struct JsonReport<'a> {
    probability: f64,
    probability_display: String,
    decision: RiskDecision,
    label: &'static str,
    threshold: f64,
    advisory: &'a str,
}

pub fn to_json(screening: &Screening) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        probability: screening.probability,
        probability_display: format_probability(screening.probability),
        decision: screening.decision,
        label: decision_label(screening.decision),
        threshold: screening.threshold,
        advisory: ADVISORY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screening(probability: f64, threshold: f64) -> Screening {
        Screening {
            probability,
            decision: RiskDecision::from_probability(probability, threshold),
            threshold,
        }
    }

    #[test]
    fn probability_has_two_decimals() {
        assert_eq!(format_probability(0.6506), "0.65");
        assert_eq!(format_probability(0.0), "0.00");
        assert_eq!(format_probability(1.0), "1.00");
    }

    #[test]
    fn positive_result_text() {
        let text = render_screening(&screening(0.6506, 0.3));
        assert!(text.starts_with(ADVISORY));
        assert!(text.contains("Estimated probability of diabetes: 0.65"));
        assert!(text.contains("High risk of diabetes (screen-positive)"));
    }

    #[test]
    fn negative_result_text() {
        let text = render_screening(&screening(0.12, 0.3));
        assert!(text.contains("Estimated probability of diabetes: 0.12"));
        assert!(text.contains("Low risk of diabetes (screen-negative)"));
    }

    #[test]
    fn failure_text_has_no_probability() {
        let text = render_failure();
        assert!(text.contains(FAILURE_NOTICE));
        assert!(text.contains(ADVISORY));
        assert!(!text.contains("Estimated probability"));
    }

    #[test]
    fn json_carries_decision_and_advisory() {
        let json = to_json(&screening(0.3, 0.3)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["decision"], "screen-positive");
        assert_eq!(value["probability_display"], "0.30");
        assert_eq!(value["threshold"], 0.3);
        assert_eq!(value["advisory"], ADVISORY);
    }
}
