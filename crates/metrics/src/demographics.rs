//! Demographic summary over generated entity profiles

use std::collections::BTreeMap;

use panelsim_core::EntityProfile;
use serde_json::Value;

use crate::models::{DemographicSummary, NumericSummary};

/// Look up a profile attribute at the top level or under `demographics`
fn attribute<'a>(profile: &'a Value, key: &str) -> Option<&'a Value> {
    profile
        .get(key)
        .or_else(|| profile.get("demographics").and_then(|d| d.get(key)))
}

/// Numbers, or strings like `"$52,000"` / `"34 years"`
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
                .filter(|c| *c != ',')
                .collect();
            digits.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn summarize(mut values: Vec<f64>) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();
    let average = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    Some(NumericSummary {
        count,
        average,
        median,
        min: values[0],
        max: values[count - 1],
    })
}

/// Summarize ages, incomes and gender across all profiles, degraded ones included
pub fn summarize_demographics(entities: &[EntityProfile]) -> DemographicSummary {
    let mut ages = Vec::new();
    let mut incomes = Vec::new();
    let mut gender_distribution: BTreeMap<String, usize> = BTreeMap::new();

    for entity in entities {
        if let Some(age) = attribute(&entity.profile, "age").and_then(numeric) {
            ages.push(age);
        }
        let income = attribute(&entity.profile, "income_annual_usd")
            .or_else(|| attribute(&entity.profile, "income"))
            .and_then(numeric);
        if let Some(income) = income {
            incomes.push(income);
        }
        let gender = attribute(&entity.profile, "gender")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "unspecified".to_string());
        *gender_distribution.entry(gender).or_insert(0) += 1;
    }

    DemographicSummary {
        entity_count: entities.len(),
        degraded_profiles: entities.iter().filter(|e| e.degraded).count(),
        age: summarize(ages),
        income: summarize(incomes),
        gender_distribution,
    }
}
