use polars::prelude::*;
use tracing::info;

use crate::countries::{apply_name_map, resolve_names};
use crate::error::PanelError;
use crate::model::{distinct_strings, keep_first};
use crate::schema::{health, obesity};

/// Parse the leading numeric of a confidence-interval string, e.g.
/// `"10.0 [7.7-12.8]"` → `10.0`.
fn leading_numeric(text: &str) -> Option<f64> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse().ok()
}

/// Reduce the raw health-indicator export to the `(country, iso3, year,
/// obesity_pct)` table.
///
/// Keeps the adult both-sexes BMI≥30 prevalence rows, resolves country
/// names against the reference set (the FAO population countries), and
/// keeps the first occurrence per (country, year).
pub fn clean_obesity(
    df: DataFrame,
    reference_countries: &[String],
) -> Result<DataFrame, PanelError> {
    let has_dim2 = df.schema().contains(health::DIM2);
    let has_fact_value = df.schema().contains(health::FACT_VALUE);

    let mut lazy = df
        .lazy()
        .filter(
            col(health::INDICATOR)
                .str()
                .contains(lit("(?i)obesity"), false)
                .and(col(health::INDICATOR).str().contains(lit("(?i)bmi"), false)),
        )
        .filter(col(health::DIM1).eq(lit("Both sexes")));

    if has_dim2 {
        lazy = lazy.filter(
            col(health::DIM2)
                .str()
                .contains(lit("18"), false)
                .or(col(health::DIM2).str().contains(lit("(?i)adult"), false)),
        );
    }

    let value_expr = if has_fact_value {
        col(health::FACT_VALUE).cast(DataType::Float64)
    } else {
        // numeric is re-parsed from the display value below
        col(health::VALUE).cast(DataType::String)
    };

    let mut out = lazy
        .select([
            col(health::LOCATION)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .alias(obesity::COUNTRY),
            col(health::SPATIAL_CODE).alias(obesity::ISO3),
            col(health::PERIOD).cast(DataType::Int64).alias(obesity::YEAR),
            value_expr.alias(obesity::OBESITY_PCT),
        ])
        .collect()?;

    if !has_fact_value {
        let parsed: Vec<Option<f64>> = out
            .column(obesity::OBESITY_PCT)?
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|value| value.and_then(leading_numeric))
            .collect();
        out.with_column(Series::new(obesity::OBESITY_PCT.into(), parsed))?;
    }

    let mut out = out
        .lazy()
        .filter(
            col(obesity::COUNTRY)
                .is_not_null()
                .and(col(obesity::ISO3).is_not_null())
                .and(col(obesity::YEAR).is_not_null())
                .and(col(obesity::OBESITY_PCT).is_not_null()),
        )
        .collect()?;

    let raw_countries = distinct_strings(&out, obesity::COUNTRY)?;
    let matches = resolve_names(&raw_countries, reference_countries);
    let resolved = matches.iter().filter(|m| m.is_resolved()).count();
    info!(
        "resolved {} of {} obesity country names against the reference set",
        resolved,
        matches.len()
    );
    apply_name_map(&mut out, obesity::COUNTRY, &matches)?;

    let (deduped, removed) = keep_first(&out, &[obesity::COUNTRY, obesity::YEAR])?;
    if removed > 0 {
        info!("removed {} duplicate obesity rows", removed);
    }

    Ok(deduped)
}
