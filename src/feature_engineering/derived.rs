//! Derived academic and financial indicators

use crate::error::{PipelineError, Result};
use crate::utils::data_loader::numeric_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Names of the derived columns, in the order they are appended
pub const DERIVED_FEATURES: [&str; 9] = [
    "sem1_approval_rate",
    "sem2_approval_rate",
    "total_approval_rate",
    "avg_grade",
    "grade_improvement",
    "total_credited",
    "evaluation_efficiency",
    "financial_stress",
    "age_deviation",
];

/// Source column names read by [`FeatureEngineer`].
///
/// Defaults match the headers of the UCI "Predict Students' Dropout and
/// Academic Success" table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceColumns {
    pub sem1_enrolled: String,
    pub sem1_approved: String,
    pub sem1_grade: String,
    pub sem1_credited: String,
    pub sem1_evaluations: String,
    pub sem2_enrolled: String,
    pub sem2_approved: String,
    pub sem2_grade: String,
    pub sem2_credited: String,
    pub sem2_evaluations: String,
    pub debtor: String,
    pub tuition_up_to_date: String,
    pub age_at_enrollment: String,
}

impl Default for SourceColumns {
    fn default() -> Self {
        let unit = |sem: &str, what: &str| format!("Curricular units {} sem ({})", sem, what);
        Self {
            sem1_enrolled: unit("1st", "enrolled"),
            sem1_approved: unit("1st", "approved"),
            sem1_grade: unit("1st", "grade"),
            sem1_credited: unit("1st", "credited"),
            sem1_evaluations: unit("1st", "evaluations"),
            sem2_enrolled: unit("2nd", "enrolled"),
            sem2_approved: unit("2nd", "approved"),
            sem2_grade: unit("2nd", "grade"),
            sem2_credited: unit("2nd", "credited"),
            sem2_evaluations: unit("2nd", "evaluations"),
            debtor: "Debtor".to_string(),
            tuition_up_to_date: "Tuition fees up to date".to_string(),
            age_at_enrollment: "Age at enrollment".to_string(),
        }
    }
}

/// `num / den`, or 0 when the denominator is 0
#[inline]
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Appends the derived columns to a frame.
///
/// A null in any input of a formula makes that derived cell null.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    columns: SourceColumns,
    reference_age: f64,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(SourceColumns::default())
    }
}

impl FeatureEngineer {
    /// Create a new engineer reading the given source columns
    pub fn new(columns: SourceColumns) -> Self {
        Self {
            columns,
            reference_age: 19.0,
        }
    }

    /// Set the age subtracted for `age_deviation`
    pub fn with_reference_age(mut self, age: f64) -> Self {
        self.reference_age = age;
        self
    }

    /// Return a copy of `df` with the derived columns appended
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let c = &self.columns;
        let col = |name: &str| -> Result<Vec<Option<f64>>> {
            numeric_column(df, name).map_err(|e| match e {
                PipelineError::FeatureNotFound(_) => PipelineError::FeatureNotFound(name.to_string()),
                other => other,
            })
        };

        let enr1 = col(&c.sem1_enrolled)?;
        let app1 = col(&c.sem1_approved)?;
        let grd1 = col(&c.sem1_grade)?;
        let cre1 = col(&c.sem1_credited)?;
        let eva1 = col(&c.sem1_evaluations)?;
        let enr2 = col(&c.sem2_enrolled)?;
        let app2 = col(&c.sem2_approved)?;
        let grd2 = col(&c.sem2_grade)?;
        let cre2 = col(&c.sem2_credited)?;
        let eva2 = col(&c.sem2_evaluations)?;
        let debtor = col(&c.debtor)?;
        let tuition = col(&c.tuition_up_to_date)?;
        let age = col(&c.age_at_enrollment)?;

        let n = df.height();
        let mut derived: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(n); DERIVED_FEATURES.len()];

        for i in 0..n {
            let sem1_rate = app1[i].zip(enr1[i]).map(|(a, e)| safe_ratio(a, e));
            let sem2_rate = app2[i].zip(enr2[i]).map(|(a, e)| safe_ratio(a, e));
            let approved = app1[i].zip(app2[i]).map(|(a, b)| a + b);
            let enrolled = enr1[i].zip(enr2[i]).map(|(a, b)| a + b);
            let evaluations = eva1[i].zip(eva2[i]).map(|(a, b)| a + b);

            let row = [
                sem1_rate,
                sem2_rate,
                approved.zip(enrolled).map(|(a, e)| safe_ratio(a, e)),
                grd1[i].zip(grd2[i]).map(|(g1, g2)| (g1 + g2) / 2.0),
                grd1[i].zip(grd2[i]).map(|(g1, g2)| g2 - g1),
                cre1[i].zip(cre2[i]).map(|(a, b)| a + b),
                approved.zip(evaluations).map(|(a, e)| safe_ratio(a, e)),
                debtor[i].zip(tuition[i]).map(|(d, t)| d + (1.0 - t)),
                age[i].map(|a| a - self.reference_age),
            ];
            for (out, value) in derived.iter_mut().zip(row) {
                out.push(value);
            }
        }

        let mut result = df.clone();
        for (name, values) in DERIVED_FEATURES.iter().zip(derived) {
            result.with_column(Series::new((*name).into(), values))?;
        }

        info!(
            added = DERIVED_FEATURES.len(),
            total_columns = result.width(),
            "derived features appended"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        let c = SourceColumns::default();
        DataFrame::new(vec![
            Series::new(c.sem1_enrolled.as_str().into(), &[6i64, 0]).into(),
            Series::new(c.sem1_approved.as_str().into(), &[3i64, 0]).into(),
            Series::new(c.sem1_grade.as_str().into(), &[12.0, 0.0]).into(),
            Series::new(c.sem1_credited.as_str().into(), &[1i64, 0]).into(),
            Series::new(c.sem1_evaluations.as_str().into(), &[8i64, 0]).into(),
            Series::new(c.sem2_enrolled.as_str().into(), &[6i64, 0]).into(),
            Series::new(c.sem2_approved.as_str().into(), &[6i64, 0]).into(),
            Series::new(c.sem2_grade.as_str().into(), &[14.0, 0.0]).into(),
            Series::new(c.sem2_credited.as_str().into(), &[2i64, 0]).into(),
            Series::new(c.sem2_evaluations.as_str().into(), &[10i64, 0]).into(),
            Series::new(c.debtor.as_str().into(), &[1i64, 0]).into(),
            Series::new(c.tuition_up_to_date.as_str().into(), &[0i64, 1]).into(),
            Series::new(c.age_at_enrollment.as_str().into(), &[23i64, 18]).into(),
        ])
        .unwrap()
    }

    fn values(df: &DataFrame, name: &str) -> Vec<f64> {
        numeric_column(df, name)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_derived_values() {
        let out = FeatureEngineer::default().transform(&sample_frame()).unwrap();

        assert_eq!(out.width(), 13 + DERIVED_FEATURES.len());
        assert_eq!(values(&out, "sem1_approval_rate")[0], 0.5);
        assert_eq!(values(&out, "sem2_approval_rate")[0], 1.0);
        assert_eq!(values(&out, "total_approval_rate")[0], 0.75);
        assert_eq!(values(&out, "avg_grade")[0], 13.0);
        assert_eq!(values(&out, "grade_improvement")[0], 2.0);
        assert_eq!(values(&out, "total_credited")[0], 3.0);
        assert_eq!(values(&out, "evaluation_efficiency")[0], 0.5);
        assert_eq!(values(&out, "financial_stress")[0], 2.0);
        assert_eq!(values(&out, "age_deviation")[0], 4.0);
    }

    #[test]
    fn test_zero_denominators_give_zero() {
        let out = FeatureEngineer::default().transform(&sample_frame()).unwrap();

        for name in ["sem1_approval_rate", "sem2_approval_rate", "total_approval_rate", "evaluation_efficiency"] {
            let v = values(&out, name)[1];
            assert_eq!(v, 0.0, "{}", name);
        }
        assert_eq!(values(&out, "financial_stress")[1], 0.0);
        assert_eq!(values(&out, "age_deviation")[1], -1.0);
    }

    #[test]
    fn test_reference_age() {
        let out = FeatureEngineer::default()
            .with_reference_age(18.0)
            .transform(&sample_frame())
            .unwrap();
        assert_eq!(values(&out, "age_deviation"), vec![5.0, 0.0]);
    }

    #[test]
    fn test_missing_source_column() {
        let df = sample_frame().drop("Debtor").unwrap();
        let result = FeatureEngineer::default().transform(&df);
        match result {
            Err(PipelineError::FeatureNotFound(name)) => assert_eq!(name, "Debtor"),
            other => panic!("expected FeatureNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(3.0, 0.0), 0.0);
        assert_eq!(safe_ratio(3.0, 4.0), 0.75);
    }
}
