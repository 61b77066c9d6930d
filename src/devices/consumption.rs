//! Repeating power-versus-time curves for appliances.

use serde_json::Value;

use crate::error::ConsumptionModelError;

/// One segment of a pattern: `value + slope * offset` for `duration` ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub value: f64,
    pub duration: u64,
    pub slope: f64,
}

impl Step {
    pub fn new(value: f64, duration: u64, slope: f64) -> Self {
        Self {
            value,
            duration,
            slope,
        }
    }

    fn power_at(&self, offset: u64) -> f64 {
        self.value + self.slope * offset as f64
    }
}

/// A sequence of steps repeated `repeat` times.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub repeat: u64,
    pub steps: Vec<Step>,
}

impl Pattern {
    pub fn new(repeat: u64, steps: Vec<Step>) -> Self {
        Self { repeat, steps }
    }

    /// Length of a single pass through the steps.
    pub fn duration(&self) -> u64 {
        self.steps.iter().map(|s| s.duration).sum()
    }

    fn power_at(&self, offset: u64) -> f64 {
        let mut remaining = offset;
        for step in &self.steps {
            if remaining < step.duration {
                return step.power_at(remaining);
            }
            remaining -= step.duration;
        }
        0.0
    }
}

/// Decoded appliance power curve.
///
/// The patterns are played back in order, each `repeat` times, and the whole
/// sequence is replayed `outer_repeat` times. An `outer_repeat` of zero loops
/// forever; past the last replay the appliance draws nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionModel {
    outer_repeat: u64,
    patterns: Vec<Pattern>,
    total_duration: u64,
}

impl ConsumptionModel {
    pub fn new(outer_repeat: u64, patterns: Vec<Pattern>) -> Self {
        let total_duration = patterns
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.repeat.saturating_mul(p.duration())));
        Self {
            outer_repeat,
            patterns,
            total_duration,
        }
    }

    /// A flat, endlessly looping curve of `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(0, vec![Pattern::new(1, vec![Step::new(value, 1, 0.0)])])
    }

    /// A curve that never draws power.
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// Decodes a JSON description of the form
    /// `{"n": 0, "params": [{"n": 1, "values": [{"p": 140, "d": 20, "s": 0}]}]}`.
    ///
    /// # Errors
    ///
    /// Returns a `ConsumptionModelError` naming the offending field when the
    /// text is not JSON, a field is absent, or a field has the wrong type.
    pub fn from_json(text: &str) -> Result<Self, ConsumptionModelError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Decodes an already parsed description; see [`ConsumptionModel::from_json`].
    ///
    /// # Errors
    ///
    /// Same as [`ConsumptionModel::from_json`].
    pub fn from_value(value: &Value) -> Result<Self, ConsumptionModelError> {
        let outer_repeat = read_count(value, "n", "model")?;
        let params = read_array(value, "params", "model")?;

        let mut patterns = Vec::with_capacity(params.len());
        for (i, raw_pattern) in params.iter().enumerate() {
            let path = format!("params[{i}]");
            let repeat = read_count(raw_pattern, "n", &path)?;
            let raw_steps = read_array(raw_pattern, "values", &path)?;

            let mut steps = Vec::with_capacity(raw_steps.len());
            for (j, raw_step) in raw_steps.iter().enumerate() {
                let step_path = format!("{path}.values[{j}]");
                steps.push(Step::new(
                    read_number(raw_step, "p", &step_path)?,
                    read_count(raw_step, "d", &step_path)?,
                    read_number(raw_step, "s", &step_path)?,
                ));
            }
            patterns.push(Pattern::new(repeat, steps));
        }

        Ok(Self::new(outer_repeat, patterns))
    }

    pub fn outer_repeat(&self) -> u64 {
        self.outer_repeat
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Length of one full pass through all patterns.
    pub fn total_duration(&self) -> u64 {
        self.total_duration
    }

    /// Power drawn `elapsed` ticks after switch-on.
    pub fn power(&self, elapsed: u64) -> f64 {
        if self.total_duration == 0 {
            return 0.0;
        }
        // An overflowing span never ends within a u64 timeline.
        if let Some(span) = self.outer_repeat.checked_mul(self.total_duration) {
            if self.outer_repeat > 0 && elapsed >= span {
                return 0.0;
            }
        }

        let mut remaining = elapsed % self.total_duration;
        for pattern in &self.patterns {
            let pattern_duration = pattern.duration();
            let span = pattern.repeat.saturating_mul(pattern_duration);
            if remaining < span {
                return pattern.power_at(remaining % pattern_duration);
            }
            remaining -= span;
        }
        0.0
    }

    /// Fully expanded minute-by-minute curve.
    ///
    /// A repeat count of zero, at either level, expands to exactly two
    /// passes.
    pub fn consumption_vector(&self) -> Vec<f64> {
        let outer = if self.outer_repeat == 0 { 2 } else { self.outer_repeat };
        let mut out = Vec::new();
        for _ in 0..outer {
            for pattern in &self.patterns {
                let inner = if pattern.repeat == 0 { 2 } else { pattern.repeat };
                for _ in 0..inner {
                    for step in &pattern.steps {
                        out.extend((0..step.duration).map(|k| step.power_at(k)));
                    }
                }
            }
        }
        out
    }

    /// `true` when every expanded minute draws the same power.
    ///
    /// Decided from the steps alone, so huge repeat counts are never expanded.
    pub fn is_static_consumption(&self) -> bool {
        let mut values = self
            .patterns
            .iter()
            .flat_map(|p| &p.steps)
            .filter(|s| s.duration > 0)
            .flat_map(|s| [s.power_at(0), s.power_at(s.duration - 1)]);
        match values.next() {
            Some(first) => values.all(|v| v == first),
            None => true,
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) if n.is_f64() => format!("float {n}"),
        Value::Number(n) if n.is_i64() => format!("negative integer {n}"),
        Value::Number(n) => format!("integer {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

fn field<'a>(
    value: &'a Value,
    field: &'static str,
    path: &str,
) -> Result<&'a Value, ConsumptionModelError> {
    value
        .get(field)
        .ok_or_else(|| ConsumptionModelError::MissingField {
            field,
            path: path.to_string(),
        })
}

fn read_count(value: &Value, name: &'static str, path: &str) -> Result<u64, ConsumptionModelError> {
    let raw = field(value, name, path)?;
    raw.as_u64().ok_or_else(|| ConsumptionModelError::WrongType {
        field: name,
        path: path.to_string(),
        expected: "a non-negative integer",
        found: describe(raw),
    })
}

fn read_number(value: &Value, name: &'static str, path: &str) -> Result<f64, ConsumptionModelError> {
    let raw = field(value, name, path)?;
    raw.as_f64().ok_or_else(|| ConsumptionModelError::WrongType {
        field: name,
        path: path.to_string(),
        expected: "a number",
        found: describe(raw),
    })
}

fn read_array<'a>(
    value: &'a Value,
    name: &'static str,
    path: &str,
) -> Result<&'a Vec<Value>, ConsumptionModelError> {
    let raw = field(value, name, path)?;
    raw.as_array().ok_or_else(|| ConsumptionModelError::WrongType {
        field: name,
        path: path.to_string(),
        expected: "an array",
        found: describe(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const WASHER: &str = r#"{"n": 1, "params": [
        {"n": 1, "values": [{"p": 2000, "d": 10, "s": 0}, {"p": 200, "d": 20, "s": 0}]},
        {"n": 2, "values": [{"p": 500, "d": 5, "s": 0}]}
    ]}"#;

    #[test]
    fn constant_model_is_static_and_flat() {
        let model = ConsumptionModel::new(0, vec![Pattern::new(1, vec![Step::new(75.0, 30, 0.0)])]);
        assert!(model.is_static_consumption());
        for t in [0, 1, 29, 30, 1_000, 100_000] {
            assert_eq!(model.power(t), 75.0);
        }
    }

    #[rstest]
    #[case(0, 2000.0)]
    #[case(9, 2000.0)]
    #[case(10, 200.0)]
    #[case(29, 200.0)]
    #[case(30, 500.0)]
    #[case(39, 500.0)]
    #[case(40, 0.0)]
    #[case(400, 0.0)]
    fn finite_cycle_ends_in_zero(#[case] t: u64, #[case] expected: f64) {
        let model = ConsumptionModel::from_json(WASHER).unwrap();
        assert_eq!(model.total_duration(), 40);
        assert_eq!(model.power(t), expected);
    }

    #[test]
    fn looping_model_wraps_around() {
        let model = ConsumptionModel::new(
            0,
            vec![Pattern::new(1, vec![Step::new(120.0, 15, 0.0), Step::new(5.0, 25, 0.0)])],
        );
        assert_eq!(model.power(14), 120.0);
        assert_eq!(model.power(15), 5.0);
        assert_eq!(model.power(40), 120.0);
        assert!(!model.is_static_consumption());
    }

    #[test]
    fn slope_ramps_within_a_step() {
        let model = ConsumptionModel::new(1, vec![Pattern::new(1, vec![Step::new(100.0, 5, -10.0)])]);
        assert_eq!(model.power(0), 100.0);
        assert_eq!(model.power(4), 60.0);
    }

    #[test]
    fn zero_repeats_expand_twice() {
        let model = ConsumptionModel::new(0, vec![Pattern::new(0, vec![Step::new(1.0, 3, 0.0)])]);
        // Two outer passes of two inner passes of three minutes.
        assert_eq!(model.consumption_vector().len(), 12);
    }

    #[test]
    fn vector_matches_power_for_finite_model() {
        let model = ConsumptionModel::from_json(WASHER).unwrap();
        let vector = model.consumption_vector();
        assert_eq!(vector.len(), 40);
        for (t, p) in vector.iter().enumerate() {
            assert_eq!(*p, model.power(t as u64));
        }
    }

    #[test]
    fn missing_slope_names_its_position() {
        let err = ConsumptionModel::from_json(r#"{"n":0,"params":[{"n":1,"values":[{"p":1,"d":2}]}]}"#)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`s`"), "{message}");
        assert!(message.contains("params[0].values[0]"), "{message}");
    }

    #[test]
    fn fractional_duration_is_rejected() {
        let err = ConsumptionModel::from_json(r#"{"n":0,"params":[{"n":1,"values":[{"p":1,"d":2.5,"s":0}]}]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsumptionModelError::WrongType { field: "d", .. }
        ));
        assert!(err.to_string().contains("float 2.5"));
    }

    #[test]
    fn string_value_is_rejected() {
        let err = ConsumptionModel::from_json(r#"{"n":0,"params":[{"n":1,"values":[{"p":"hot","d":2,"s":0}]}]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsumptionModelError::WrongType { field: "p", .. }
        ));
    }

    #[test]
    fn missing_params_is_rejected() {
        let err = ConsumptionModel::from_json(r#"{"n":0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConsumptionModelError::MissingField { field: "params", .. }
        ));
    }

    #[test]
    fn huge_repeat_counts_behave_as_endless_loops() {
        let model = ConsumptionModel::from_json(
            r#"{"n": 18446744073709551615, "params": [{"n": 1, "values": [{"p": 40, "d": 10, "s": 0}]}]}"#,
        )
        .unwrap();
        assert_eq!(model.power(0), 40.0);
        assert_eq!(model.power(u64::MAX - 1), 40.0);
        assert!(model.is_static_consumption());

        let inner = ConsumptionModel::new(1, vec![Pattern::new(u64::MAX, vec![Step::new(7.0, 3, 0.0)])]);
        assert_eq!(inner.total_duration(), u64::MAX);
        assert_eq!(inner.power(1_000_000), 7.0);
    }
}
