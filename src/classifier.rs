// 🏷️ Classifiers - per-item outcome for the batch runner
//
// The runner never decides outcomes itself. Anything implementing
// `Classifier<T>` can drive it: deterministic stubs in tests, a weighted
// coin flip for the demo front ends.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Category tag; must be one of the runner's configured categories
    pub category: String,

    /// Optional auxiliary output (e.g. a rewritten form of the item)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl ClassificationResult {
    pub fn new(category: impl Into<String>) -> Self {
        ClassificationResult {
            category: category.into(),
            payload: None,
        }
    }

    pub fn with_payload(category: impl Into<String>, payload: impl Into<String>) -> Self {
        ClassificationResult {
            category: category.into(),
            payload: Some(payload.into()),
        }
    }
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

pub trait Classifier<T>: Send + 'static {
    fn classify(&mut self, item: &T) -> Result<ClassificationResult>;
}

/// Adapter so plain closures can be used as classifiers
pub struct FnClassifier<F>(pub F);

impl<T, F> Classifier<T> for FnClassifier<F>
where
    F: FnMut(&T) -> Result<ClassificationResult> + Send + 'static,
{
    fn classify(&mut self, item: &T) -> Result<ClassificationResult> {
        (self.0)(item)
    }
}

/// Wrap an infallible closure
pub fn classifier_fn<T, F>(mut f: F) -> FnClassifier<impl FnMut(&T) -> Result<ClassificationResult> + Send + 'static>
where
    T: 'static,
    F: FnMut(&T) -> ClassificationResult + Send + 'static,
{
    FnClassifier(move |item: &T| -> Result<ClassificationResult> { Ok(f(item)) })
}

// ============================================================================
// WEIGHTED CLASSIFIER
// ============================================================================

/// Independent coin flip per item: `hit` with probability `p`, else `miss`
pub struct WeightedClassifier {
    probability: f64,
    hit: String,
    miss: String,
    rng: StdRng,
}

impl WeightedClassifier {
    pub fn new(probability: f64, hit: impl Into<String>, miss: impl Into<String>) -> Self {
        Self::with_rng(probability, hit, miss, StdRng::from_os_rng())
    }

    /// Reproducible sequence for a given seed
    pub fn seeded(probability: f64, hit: impl Into<String>, miss: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(probability, hit, miss, StdRng::seed_from_u64(seed))
    }

    fn with_rng(probability: f64, hit: impl Into<String>, miss: impl Into<String>, rng: StdRng) -> Self {
        // NaN passes through clamp and would panic in random_bool
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else if probability == f64::INFINITY {
            1.0
        } else {
            0.0
        };
        WeightedClassifier {
            probability,
            hit: hit.into(),
            miss: miss.into(),
            rng,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// The two tags this classifier can emit, hit first
    pub fn categories(&self) -> Vec<String> {
        vec![self.hit.clone(), self.miss.clone()]
    }
}

impl<T: Send + 'static> Classifier<T> for WeightedClassifier {
    fn classify(&mut self, _item: &T) -> Result<ClassificationResult> {
        let tag = if self.rng.random_bool(self.probability) {
            &self.hit
        } else {
            &self.miss
        };
        Ok(ClassificationResult::new(tag.clone()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_classifier() {
        let mut classifier = classifier_fn(|item: &String| {
            if item.starts_with('a') {
                ClassificationResult::with_payload("accepted", item.to_uppercase())
            } else {
                ClassificationResult::new("rejected")
            }
        });

        let result = classifier.classify(&"abc".to_string()).unwrap();
        assert_eq!(result.category, "accepted");
        assert_eq!(result.payload.as_deref(), Some("ABC"));

        let result = classifier.classify(&"xyz".to_string()).unwrap();
        assert_eq!(result, ClassificationResult::new("rejected"));
    }

    #[test]
    fn test_fallible_closure_classifier() {
        let mut classifier = FnClassifier(|item: &u32| {
            if *item == 0 {
                anyhow::bail!("zero not allowed");
            }
            Ok(ClassificationResult::new("ok"))
        });

        assert!(classifier.classify(&1).is_ok());
        assert!(classifier.classify(&0).is_err());
    }

    #[test]
    fn test_weighted_extremes() {
        let mut always = WeightedClassifier::seeded(1.0, "hit", "miss", 7);
        let mut never = WeightedClassifier::seeded(0.0, "hit", "miss", 7);

        for i in 0..50u32 {
            assert_eq!(always.classify(&i).unwrap().category, "hit");
            assert_eq!(never.classify(&i).unwrap().category, "miss");
        }
    }

    #[test]
    fn test_weighted_is_reproducible_and_roughly_fair() {
        let mut a = WeightedClassifier::seeded(0.3, "hit", "miss", 42);
        let mut b = WeightedClassifier::seeded(0.3, "hit", "miss", 42);

        let mut hits = 0;
        for i in 0..2000u32 {
            let ra = a.classify(&i).unwrap();
            let rb = b.classify(&i).unwrap();
            assert_eq!(ra, rb);
            if ra.category == "hit" {
                hits += 1;
            }
        }

        // 0.3 * 2000 = 600; generous band
        assert!(hits > 450 && hits < 750, "hits = {}", hits);
    }

    #[test]
    fn test_probability_is_clamped() {
        assert_eq!(WeightedClassifier::seeded(1.5, "h", "m", 1).probability(), 1.0);
        assert_eq!(WeightedClassifier::seeded(-0.2, "h", "m", 1).probability(), 0.0);
        assert_eq!(
            WeightedClassifier::seeded(0.5, "h", "m", 1).categories(),
            vec!["h".to_string(), "m".to_string()]
        );
    }

    #[test]
    fn test_non_finite_probability() {
        let mut nan = WeightedClassifier::seeded(f64::NAN, "h", "m", 1);
        assert_eq!(nan.probability(), 0.0);
        for i in 0..20 {
            assert_eq!(nan.classify(&i).unwrap().category, "m");
        }

        assert_eq!(WeightedClassifier::seeded(f64::INFINITY, "h", "m", 1).probability(), 1.0);
        assert_eq!(WeightedClassifier::seeded(f64::NEG_INFINITY, "h", "m", 1).probability(), 0.0);
    }
}
