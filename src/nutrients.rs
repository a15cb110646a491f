use polars::prelude::*;
use tracing::info;

use crate::error::PanelError;
use crate::model::keep_first;
use crate::schema::{balance, element, nutrient};

/// Element-description patterns that identify nutrient-supply rows. Both
/// the per-capita variants and the aggregate variants are kept; the
/// aggregates are converted downstream using the population table.
pub const NUTRIENT_ELEMENT_PATTERNS: &[&str] = &[
    r"Food supply.*kcal/capita/day",
    r"Food supply.*kcal",
    r"Protein supply.*g/capita/day",
    r"Protein supply.*\(t\)",
    r"Fat supply.*g/capita/day",
    r"Fat supply.*\(t\)",
    r"Sugar supply.*g/capita/day",
    r"Sugar supply.*\(t\)",
];

/// Mask matching nutrient-supply rows in the raw balance sheet.
pub fn nutrient_element_mask() -> Expr {
    let pattern = format!("(?i)({})", NUTRIENT_ELEMENT_PATTERNS.join("|"));
    col(balance::ELEMENT).str().contains(lit(pattern), false)
}

/// Ordered element-description → canonical nutrient mapping. The first
/// matching substring wins; anything else passes through literally so an
/// unanticipated label is surfaced rather than silently dropped.
const ELEMENT_MAP: &[(&str, &str)] = &[
    ("Food supply (kcal/capita/day)", element::ENERGY_KCAL_DAY),
    ("Food supply (kcal)", element::ENERGY_KCAL_DAY),
    ("Protein supply quantity (g/capita/day)", element::PROTEIN_G_DAY),
    ("Protein supply (g/capita/day)", element::PROTEIN_G_DAY),
    ("Protein supply quantity (t)", element::PROTEIN_G_DAY),
    ("Fat supply quantity (g/capita/day)", element::FAT_G_DAY),
    ("Fat supply (g/capita/day)", element::FAT_G_DAY),
    ("Fat supply quantity (t)", element::FAT_G_DAY),
    ("Sugar supply quantity (g/capita/day)", element::SUGAR_G_DAY),
    ("Sugar supply (g/capita/day)", element::SUGAR_G_DAY),
    ("Sugar supply quantity (t)", element::SUGAR_G_DAY),
];

pub fn map_element_name(element_text: &str) -> String {
    ELEMENT_MAP
        .iter()
        .find(|(label, _)| element_text.contains(label))
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| element_text.to_string())
}

/// Add the canonical `element` column derived from the raw `Element`
/// descriptions.
pub fn map_elements(df: &mut DataFrame) -> Result<(), PanelError> {
    let mapped: Vec<Option<String>> = df
        .column(balance::ELEMENT)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| value.map(map_element_name))
        .collect();
    df.with_column(Series::new(nutrient::ELEMENT.into(), mapped))?;
    Ok(())
}

/// Produce the final nutrient table: canonical column set with a null
/// `food_group` placeholder, rows missing a required field dropped, and
/// one row per (country, year, item, element) with the first occurrence
/// kept.
pub fn build_nutrient_table(df: DataFrame) -> Result<DataFrame, PanelError> {
    let selected = df
        .lazy()
        .select([
            col(nutrient::COUNTRY),
            col(balance::YEAR).alias(nutrient::YEAR),
            col(balance::ITEM).alias(nutrient::ITEM),
            col(balance::ITEM_CODE).alias(nutrient::ITEM_CODE),
            lit(NULL).cast(DataType::String).alias(nutrient::FOOD_GROUP),
            col(nutrient::ELEMENT),
            col(balance::ELEMENT_CODE).alias(nutrient::ELEMENT_CODE),
            col(nutrient::UNIT_STANDARD),
            col(nutrient::VALUE_STANDARD),
            col(nutrient::UNIT_ORIGINAL),
            col(balance::FLAG).alias(nutrient::FLAG),
        ])
        .filter(
            col(nutrient::COUNTRY)
                .is_not_null()
                .and(col(nutrient::YEAR).is_not_null())
                .and(col(nutrient::ELEMENT).is_not_null())
                .and(col(nutrient::VALUE_STANDARD).is_not_null()),
        )
        .collect()?;

    let (deduped, removed) = keep_first(
        &selected,
        &[
            nutrient::COUNTRY,
            nutrient::YEAR,
            nutrient::ITEM,
            nutrient::ELEMENT,
        ],
    )?;
    if removed > 0 {
        info!("removed {} duplicate nutrient rows", removed);
    }
    info!("final nutrient table: {} rows", deduped.height());

    Ok(deduped)
}
