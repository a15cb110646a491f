use polars::prelude::*;
use tracing::{debug, info};

use crate::error::PanelError;
use crate::population::PopulationLookup;
use crate::schema::{balance, nutrient, unit};

/// Canonical interpretation of a reported unit label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Already kilocalories per capita per day.
    PerCapitaKcal,
    /// Already grams per capita per day.
    PerCapitaGrams,
    /// Kilograms per capita per year.
    KgPerCapitaYear,
    /// Aggregate mass in tonnes; needs a population to become per-capita.
    AggregateTonnes,
    /// Aggregate energy in kcal, possibly millions; needs a population.
    AggregateKcal,
}

/// One row of the classification table: the lower-cased unit text must
/// contain every token in `all` and none of the tokens in `none`.
struct UnitRule {
    all: &'static [&'static str],
    none: &'static [&'static str],
    kind: UnitKind,
}

/// Ordered rule table, first match wins. The per-capita-gram rule excludes
/// `kg` so kilogram-per-year labels fall through to their own rule.
const UNIT_RULES: &[UnitRule] = &[
    UnitRule {
        all: &["kcal", "cap"],
        none: &[],
        kind: UnitKind::PerCapitaKcal,
    },
    UnitRule {
        all: &["g/cap"],
        none: &["kg"],
        kind: UnitKind::PerCapitaGrams,
    },
    UnitRule {
        all: &["kg", "cap", "yr"],
        none: &[],
        kind: UnitKind::KgPerCapitaYear,
    },
    UnitRule {
        all: &["kg", "cap", "year"],
        none: &[],
        kind: UnitKind::KgPerCapitaYear,
    },
    UnitRule {
        all: &["tonnes"],
        none: &[],
        kind: UnitKind::AggregateTonnes,
    },
    UnitRule {
        all: &["(t)"],
        none: &[],
        kind: UnitKind::AggregateTonnes,
    },
    UnitRule {
        all: &["kcal"],
        none: &["cap"],
        kind: UnitKind::AggregateKcal,
    },
];

/// Classify a reported unit label. `None` means no recognized pattern;
/// such rows are removed by the allow-list filter downstream.
pub fn classify_unit(unit_text: &str) -> Option<UnitKind> {
    let lowered = unit_text.to_lowercase();
    UNIT_RULES
        .iter()
        .find(|rule| {
            rule.all.iter().all(|token| lowered.contains(token))
                && rule.none.iter().all(|token| !lowered.contains(token))
        })
        .map(|rule| rule.kind)
}

/// Rewrite every nutrient-supply row into one of the two canonical
/// per-capita-per-day units, then drop everything that did not land on
/// the allow-list.
///
/// Requires `Unit` (str), `Value` (f64), `country` (str) and `Year` (i64)
/// columns. Aggregate quantities need a positive population for the
/// record's (country, year); rows without one keep their original unit
/// text and are removed by the final filter. A 365-day year is used
/// throughout.
pub fn standardize_units(
    df: DataFrame,
    populations: &PopulationLookup,
) -> Result<DataFrame, PanelError> {
    let height = df.height();
    let unit_col = df
        .column(balance::UNIT)?
        .as_materialized_series()
        .str()?
        .clone();
    let value_col = df
        .column(balance::VALUE)?
        .as_materialized_series()
        .f64()?
        .clone();
    let country_col = df
        .column(nutrient::COUNTRY)?
        .as_materialized_series()
        .str()?
        .clone();
    let year_col = df
        .column(balance::YEAR)?
        .as_materialized_series()
        .i64()?
        .clone();

    let mut unit_standard: Vec<Option<String>> = Vec::with_capacity(height);
    let mut value_standard: Vec<Option<f64>> = Vec::with_capacity(height);

    let mut converted_mass = 0usize;
    let mut converted_energy = 0usize;
    let mut missing_population = 0usize;

    for i in 0..height {
        let unit_text = unit_col.get(i).unwrap_or("");
        let value = value_col.get(i);
        let population = match (country_col.get(i), year_col.get(i)) {
            (Some(country), Some(year)) => {
                populations.get(country, year).filter(|p| *p > 0)
            }
            _ => None,
        };

        let outcome: Option<(&str, f64)> = match (classify_unit(unit_text), value) {
            (Some(UnitKind::PerCapitaKcal), Some(v)) => Some((unit::KCAL_PER_CAPITA_DAY, v)),
            (Some(UnitKind::PerCapitaGrams), Some(v)) => Some((unit::G_PER_CAPITA_DAY, v)),
            (Some(UnitKind::KgPerCapitaYear), Some(v)) => {
                Some((unit::G_PER_CAPITA_DAY, v * 1000.0 / 365.0))
            }
            (Some(UnitKind::AggregateTonnes), Some(v)) => match population {
                Some(p) => {
                    converted_mass += 1;
                    Some((unit::G_PER_CAPITA_DAY, (v * 1_000_000.0 / p as f64) / 365.0))
                }
                None => {
                    missing_population += 1;
                    None
                }
            },
            (Some(UnitKind::AggregateKcal), Some(v)) => match population {
                Some(p) => {
                    let total = if unit_text.to_lowercase().contains("million") {
                        v * 1_000_000.0
                    } else {
                        v
                    };
                    converted_energy += 1;
                    Some((unit::KCAL_PER_CAPITA_DAY, (total / p as f64) / 365.0))
                }
                None => {
                    missing_population += 1;
                    None
                }
            },
            _ => None,
        };

        match outcome {
            Some((new_unit, new_value)) => {
                unit_standard.push(Some(new_unit.to_string()));
                value_standard.push(Some(new_value));
            }
            None => {
                // unchanged; fails the allow-list below
                unit_standard.push(Some(unit_text.to_string()));
                value_standard.push(value);
            }
        }
    }

    let keep: Vec<bool> = unit_standard
        .iter()
        .map(|u| {
            matches!(
                u.as_deref(),
                Some(unit::KCAL_PER_CAPITA_DAY) | Some(unit::G_PER_CAPITA_DAY)
            )
        })
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mut out = df;
    let mut original = unit_col.into_series();
    original.rename(nutrient::UNIT_ORIGINAL.into());
    out.with_column(original)?;
    out.with_column(Series::new(nutrient::UNIT_STANDARD.into(), unit_standard))?;
    out.with_column(Series::new(nutrient::VALUE_STANDARD.into(), value_standard))?;

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let out = out.filter(&mask)?;

    info!(
        "standardized units: {} aggregate-mass and {} aggregate-energy conversions",
        converted_mass, converted_energy
    );
    if missing_population > 0 {
        debug!(
            "skipped {} aggregate conversions with no population entry",
            missing_population
        );
    }
    if dropped > 0 {
        debug!("dropped {} rows outside the canonical units", dropped);
    }

    Ok(out)
}
