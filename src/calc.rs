use serde::Serialize;
use serde_json::{json, Value};

/// One subject and the score it was recorded with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectScore {
    pub subject: String,
    /// The number exactly as stored, so `85` stays `85` rather than `85.0`.
    pub score: Value,
}

impl SubjectScore {
    fn none() -> Self {
        Self {
            subject: "N/A".to_string(),
            score: json!(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarksSummary {
    pub subject_count: usize,
    pub overall_average: f64,
    pub lowest: Option<SubjectScore>,
    pub highest: Option<SubjectScore>,
}

impl MarksSummary {
    /// One-decimal display form used on dashboards and reports.
    pub fn overall_average_display(&self) -> String {
        format_average(self.overall_average)
    }

    /// The displayed average read back as a number; rankings compare this, not the raw mean.
    pub fn ranking_average(&self) -> f64 {
        self.overall_average_display().parse().unwrap_or(0.0)
    }

    pub fn lowest_or_none(&self) -> SubjectScore {
        self.lowest.clone().unwrap_or_else(SubjectScore::none)
    }

    pub fn highest_or_none(&self) -> SubjectScore {
        self.highest.clone().unwrap_or_else(SubjectScore::none)
    }
}

pub fn format_average(avg: f64) -> String {
    format!("{:.1}", avg)
}

/// Averages a `subject -> score` mapping and finds its extremes.
///
/// Entries whose value is not a number are skipped. On ties the subject that
/// appears first in the mapping wins, for both the lowest and the highest.
pub fn summarize_marks(marks: Option<&Value>) -> MarksSummary {
    let entries: Vec<(&String, &Value, f64)> = marks
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_f64().map(|f| (k, v, f)))
                .collect()
        })
        .unwrap_or_default();

    if entries.is_empty() {
        return MarksSummary {
            subject_count: 0,
            overall_average: 0.0,
            lowest: None,
            highest: None,
        };
    }

    let sum: f64 = entries.iter().map(|(_, _, f)| f).sum();
    let mut lo = &entries[0];
    let mut hi = &entries[0];
    for e in entries.iter().skip(1) {
        if e.2 < lo.2 {
            lo = e;
        }
        if e.2 > hi.2 {
            hi = e;
        }
    }

    MarksSummary {
        subject_count: entries.len(),
        overall_average: sum / entries.len() as f64,
        lowest: Some(SubjectScore {
            subject: lo.0.clone(),
            score: lo.1.clone(),
        }),
        highest: Some(SubjectScore {
            subject: hi.0.clone(),
            score: hi.1.clone(),
        }),
    }
}

/// Index of the highest-ranked candidate; the earliest wins a tie.
pub fn topper_index<I>(averages: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, avg) in averages.into_iter().enumerate() {
        match best {
            Some((_, b)) if avg <= b => {}
            _ => best = Some((i, avg)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_student_summary() {
        let marks = json!({"Math": 85, "Science": 72, "English": 90, "History": 78, "Arts": 95});
        let s = summarize_marks(Some(&marks));
        assert_eq!(s.subject_count, 5);
        assert_eq!(s.overall_average_display(), "84.0");
        assert_eq!(
            s.lowest_or_none(),
            SubjectScore {
                subject: "Science".into(),
                score: json!(72)
            }
        );
        assert_eq!(s.highest_or_none().subject, "Arts");
        assert_eq!(s.highest_or_none().score, json!(95));
    }

    #[test]
    fn empty_or_missing_marks_report_na() {
        for marks in [None, Some(json!({})), Some(json!(null)), Some(json!([1, 2]))] {
            let s = summarize_marks(marks.as_ref());
            assert_eq!(s.overall_average_display(), "0.0");
            assert_eq!(s.lowest_or_none().subject, "N/A");
            assert_eq!(s.highest_or_none().score, json!(0));
        }
    }

    #[test]
    fn ties_keep_first_subject_in_key_order() {
        let marks = json!({"Zoology": 70, "Art": 70, "Math": 90, "Biology": 90});
        let s = summarize_marks(Some(&marks));
        assert_eq!(s.lowest_or_none().subject, "Zoology");
        assert_eq!(s.highest_or_none().subject, "Math");
    }

    #[test]
    fn non_numeric_scores_are_skipped() {
        let marks = json!({"Math": "absent", "Science": 60, "Arts": 80.6});
        let s = summarize_marks(Some(&marks));
        assert_eq!(s.subject_count, 2);
        assert_eq!(s.overall_average_display(), "70.3");
        assert_eq!(s.highest_or_none().score, json!(80.6));
    }

    #[test]
    fn ranking_uses_displayed_precision() {
        let a = summarize_marks(Some(&json!({"x": 84.04})));
        let b = summarize_marks(Some(&json!({"x": 84.01})));
        assert_eq!(a.ranking_average(), b.ranking_average());
        assert_eq!(topper_index([a.ranking_average(), b.ranking_average()]), Some(0));
    }

    #[test]
    fn topper_picks_highest_and_first_on_tie() {
        assert_eq!(topper_index(Vec::<f64>::new()), None);
        assert_eq!(topper_index([84.0, 66.0, 94.8, 75.6, 84.6]), Some(2));
        assert_eq!(topper_index([90.0, 95.0, 95.0]), Some(1));
    }
}
