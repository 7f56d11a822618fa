use serde::Deserialize;
use serde::Serialize;

/// Response body of a predictor's `:predict` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<Prediction>,
}

impl PredictionResult {
    /// Index of the highest score of the first instance.
    pub fn top_class(&self) -> Option<usize> {
        self.predictions.first().and_then(Prediction::top_class)
    }
}

/// Per-instance output of a classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Prediction {
    /// Argmax over `scores`. The first index wins on ties; a NaN score
    /// compares above everything, so the first NaN wins if there is one.
    pub fn top_class(&self) -> Option<usize> {
        if let Some(index) = self.scores.iter().position(|score| score.is_nan()) {
            return Some(index);
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, &score) in self.scores.iter().enumerate() {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn prediction(scores: &[f64]) -> Prediction {
        Prediction {
            scores: scores.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn top_class_picks_highest_score() {
        assert_eq!(prediction(&[0.1, 0.7, 0.2]).top_class(), Some(1));
        assert_eq!(prediction(&[0.99, 0.0, 0.01]).top_class(), Some(0));
    }

    #[test]
    fn top_class_prefers_first_on_ties() {
        assert_eq!(prediction(&[0.4, 0.4, 0.2]).top_class(), Some(0));
    }

    #[test]
    fn top_class_returns_first_nan() {
        assert_eq!(prediction(&[0.3, f64::NAN, 0.6, f64::NAN]).top_class(), Some(1));
        assert_eq!(prediction(&[f64::NAN]).top_class(), Some(0));
        assert_eq!(prediction(&[0.9, 0.1, f64::NAN]).top_class(), Some(2));
    }

    #[test]
    fn top_class_of_empty_result() {
        assert_eq!(prediction(&[]).top_class(), None);
        assert_eq!(PredictionResult::default().top_class(), None);
    }

    #[test]
    fn parses_tensorflow_classifier_response() {
        let result: PredictionResult = serde_json::from_value(json!({
            "predictions": [
                {
                    "scores": [0.999114931, 9.20987877e-05, 0.000136786213, 0.000337257545, 0.000300532585, 1.84813616e-05],
                    "prediction": 0,
                    "key": "   1"
                }
            ]
        }))
        .expect("parse");

        assert_eq!(result.top_class(), Some(0));
        assert_eq!(result.predictions[0].key.as_deref(), Some("   1"));
    }
}
