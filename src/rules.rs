use std::sync::OnceLock;
use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use evalexpr::{
    ContextWithMutableVariables, EvalexprError, HashMapContext, Value as EvalValue,
    eval_with_context,
};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricSet;

/// Recommendation shown when no rule fires; a report always carries at
/// least one recommendation.
pub const FALLBACK_RECOMMENDATION: &str =
    "Metrics look stable; maintain the current budget allocation and keep monitoring.";

// Thresholds are written as floats because metrics are bound as floats.
const BUILT_IN_RULES: &[(&str, &str)] = &[
    (
        "ctr < 0.01",
        "Click-through rate is below 1%; refresh the ad creatives and A/B test new variants.",
    ),
    (
        "ctr >= 0.05",
        "Click-through rate is strong; increase budget allocation to the top performing rows.",
    ),
    (
        "conversion_rate < 0.02",
        "Conversion rate is under 2%; optimize the landing page before scaling spend.",
    ),
    (
        "cost_per_conversion > 50.0",
        "Cost per conversion reached {cost_per_conversion}; rebalance budget toward rows that convert cheaper.",
    ),
    (
        "missing_conversions > 0.0",
        "Conversion tracking has {missing_conversions} gap(s); verify the export before acting on conversion metrics.",
    ),
];

/// One recommendation rule: a boolean condition over metric names plus the
/// sentence it contributes when the condition holds. `{metric_name}`
/// placeholders in the sentence are replaced with the metric's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub when: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::built_in()
    }
}

impl RuleSet {
    pub fn built_in() -> Self {
        Self {
            rules: BUILT_IN_RULES
                .iter()
                .map(|(when, text)| Rule {
                    when: (*when).to_string(),
                    text: (*text).to_string(),
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening rules file {path:?}"))?;
        let reader = BufReader::new(file);
        let rules: Vec<Rule> = serde_yaml::from_reader(reader).context("Parsing rules YAML")?;
        let set = Self { rules };
        set.validate()?;
        Ok(set)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every rule against the computed metrics, in rule order.
    /// Rules naming a metric absent from this report do not fire; any other
    /// evaluation failure logs a warning and skips the rule. Never fails.
    pub fn evaluate(&self, metrics: &MetricSet) -> Vec<String> {
        let context = metric_context(metrics);
        let mut texts = Vec::new();
        for rule in &self.rules {
            match eval_with_context(&rule.when, &context) {
                Ok(value) => {
                    if eval_value_truthy(value) {
                        texts.push(render_text(&rule.text, metrics));
                    }
                }
                Err(EvalexprError::VariableIdentifierNotFound(name)) => {
                    debug!("Rule '{}' skipped: no metric named '{name}'", rule.when);
                }
                Err(err) => {
                    warn!("Rule '{}' skipped: {err}", rule.when);
                }
            }
        }
        texts
    }

    fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            if rule.when.trim().is_empty() {
                bail!("Rule '{}' has an empty condition", rule.text);
            }
            if rule.text.trim().is_empty() {
                bail!("Rule '{}' has an empty recommendation text", rule.when);
            }
            check_expression(&rule.when)
                .with_context(|| format!("Rule condition '{}'", rule.when))?;
        }
        Ok(())
    }
}

/// Syntax check for a rule condition. Unknown identifiers are expected at
/// load time (metrics do not exist yet); only parse failures are fatal.
fn check_expression(expr: &str) -> Result<()> {
    let context: HashMapContext = HashMapContext::new();
    match eval_with_context(expr, &context) {
        Ok(_) => Ok(()),
        Err(EvalexprError::VariableIdentifierNotFound(_)) => Ok(()),
        Err(EvalexprError::FunctionIdentifierNotFound(_)) => Ok(()),
        Err(err) => Err(anyhow!("{err}")),
    }
}

// Metrics are bound as floats so thresholds compare uniformly whether the
// report serialized the value as an integer or a float.
fn metric_context(metrics: &MetricSet) -> HashMapContext {
    let mut context = HashMapContext::new();
    for metric in metrics.iter() {
        if let Err(err) =
            context.set_value(metric.name.clone(), EvalValue::Float(metric.value.as_f64()))
        {
            warn!("Skipping metric '{}' in rule context: {err}", metric.name);
        }
    }
    context
}

fn render_text(text: &str, metrics: &MetricSet) -> String {
    placeholder_regex()
        .replace_all(text, |captures: &regex::Captures<'_>| {
            match metrics.get(&captures[1]) {
                Some(value) => value.to_string(),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("placeholder pattern is valid"))
}

fn eval_value_truthy(value: EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => b,
        EvalValue::Int(i) => i != 0,
        EvalValue::Float(f) => f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.into_iter().any(eval_value_truthy),
        EvalValue::Empty => false,
    }
}
