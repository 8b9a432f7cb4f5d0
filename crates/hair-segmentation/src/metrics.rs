use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
	pub true_positive: u64,
	pub false_positive: u64,
	pub false_negative: u64,
}

impl ConfusionCounts {
	/// 2TP / (2TP + FP + FN), 0 when the class was never seen nor predicted.
	pub fn f1(&self) -> f64 {
		let denominator = 2 * self.true_positive + self.false_positive + self.false_negative;
		if denominator == 0 {
			return 0.0;
		}

		(2 * self.true_positive) as f64 / denominator as f64
	}

	pub fn precision(&self) -> f64 {
		ratio(self.true_positive, self.true_positive + self.false_positive)
	}

	pub fn recall(&self) -> f64 {
		ratio(self.true_positive, self.true_positive + self.false_negative)
	}
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
	if denominator == 0 {
		0.0
	} else {
		numerator as f64 / denominator as f64
	}
}

/// Per-class pixel confusion counts. Class `i` of `classes` is label `i + 1`,
/// label 0 is background.
#[derive(Debug, Clone)]
pub struct AccuracyScore {
	classes: Vec<String>,
	counts: Vec<ConfusionCounts>,
}

impl AccuracyScore {
	pub fn new<S: AsRef<str>>(classes: &[S]) -> Self {
		Self {
			classes: classes.iter().map(|c| c.as_ref().to_string()).collect(),
			counts: vec![ConfusionCounts::default(); classes.len()],
		}
	}

	pub fn collect(&mut self, ground_truth: &[i64], prediction: &[i64]) {
		assert_eq!(
			ground_truth.len(),
			prediction.len(),
			"ground truth and prediction must cover the same pixels"
		);

		for (&gt, &pred) in ground_truth.iter().zip(prediction) {
			if gt == pred {
				if let Some(counts) = self.class_counts(gt) {
					counts.true_positive += 1;
				}
				continue;
			}

			if let Some(counts) = self.class_counts(pred) {
				counts.false_positive += 1;
			}
			if let Some(counts) = self.class_counts(gt) {
				counts.false_negative += 1;
			}
		}
	}

	fn class_counts(&mut self, label: i64) -> Option<&mut ConfusionCounts> {
		if label < 1 {
			return None;
		}
		self.counts.get_mut(label as usize - 1)
	}

	pub fn counts(&self, class: &str) -> Option<ConfusionCounts> {
		self.classes
			.iter()
			.position(|c| c == class)
			.map(|i| self.counts[i])
	}

	pub fn f1(&self, class: &str) -> Option<f64> {
		self.counts(class).map(|counts| counts.f1())
	}

	pub fn f1_results(&self) -> BTreeMap<String, f64> {
		self.classes
			.iter()
			.cloned()
			.zip(self.counts.iter().map(ConfusionCounts::f1))
			.collect()
	}

	pub fn reset(&mut self) {
		self.counts.fill(ConfusionCounts::default());
	}
}

/// Latest value and running average of a duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageMeter {
	pub val: f64,
	pub sum: f64,
	pub count: usize,
}

impl AverageMeter {
	pub fn update(&mut self, elapsed: Duration) {
		self.val = elapsed.as_secs_f64();
		self.sum += self.val;
		self.count += 1;
	}

	pub fn avg(&self) -> f64 {
		if self.count == 0 {
			0.0
		} else {
			self.sum / self.count as f64
		}
	}
}
