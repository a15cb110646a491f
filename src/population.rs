use std::collections::HashMap;

use polars::prelude::*;
use tracing::info;

use crate::error::PanelError;
use crate::model::keep_first;
use crate::schema::{balance, population};

/// Element label that identifies population-count rows in the balance
/// sheet.
pub const POPULATION_ELEMENT: &str = "Total Population - Both sexes";

/// Mask matching population rows. The same mask removes them from the
/// nutrient stream, so the two outputs partition the raw frame.
pub fn population_mask() -> Expr {
    col(balance::ELEMENT)
        .str()
        .contains(lit(format!("(?i){}", POPULATION_ELEMENT)), false)
}

/// Extract the `(country, year, population)` table from the raw balance
/// sheet.
///
/// Values reported in thousands ("1000 No") are scaled to head counts.
/// The area-code metadata name wins over the raw `Area` text wherever the
/// code is known. Rows missing any required field are dropped, population
/// must be positive, and the first occurrence per (country, year) in
/// source order is kept.
pub fn extract_population(
    balance_df: &DataFrame,
    area_codes: &DataFrame,
) -> Result<DataFrame, PanelError> {
    let meta = area_codes.clone().lazy().select([
        col(balance::AREA_CODE).cast(DataType::Int64),
        col(balance::AREA).alias("__meta_name"),
    ]);

    let raw = balance_df
        .clone()
        .lazy()
        .filter(population_mask())
        .with_columns([
            col(balance::VALUE).cast(DataType::Float64),
            col(balance::AREA_CODE).cast(DataType::Int64),
            col(balance::YEAR).cast(DataType::Int64),
        ])
        .with_column(
            when(
                col(balance::UNIT)
                    .str()
                    .contains(lit("1000"), false)
                    .fill_null(lit(false)),
            )
            .then(col(balance::VALUE) * lit(1000.0))
            .otherwise(col(balance::VALUE))
            .alias(population::POPULATION),
        )
        .join(
            meta,
            [col(balance::AREA_CODE)],
            [col(balance::AREA_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .select([
            col("__meta_name")
                .fill_null(col(balance::AREA))
                .alias(population::COUNTRY),
            col(balance::YEAR).alias(population::YEAR),
            col(population::POPULATION).cast(DataType::Int64),
        ])
        .filter(
            col(population::COUNTRY)
                .is_not_null()
                .and(col(population::YEAR).is_not_null())
                .and(col(population::POPULATION).is_not_null()),
        )
        .filter(col(population::POPULATION).gt(lit(0)))
        .collect()?;

    let (deduped, removed) = keep_first(
        &raw,
        &[population::COUNTRY, population::YEAR],
    )?;
    if removed > 0 {
        info!("removed {} duplicate population rows", removed);
    }
    info!("extracted {} population rows", deduped.height());

    Ok(deduped)
}

/// Read-only (country, year) → population lookup, built once from the
/// finished population table and never mutated afterwards.
pub struct PopulationLookup {
    entries: HashMap<(String, i64), i64>,
}

impl PopulationLookup {
    pub fn from_frame(df: &DataFrame) -> Result<Self, PanelError> {
        let country = df
            .column(population::COUNTRY)?
            .as_materialized_series()
            .str()?
            .clone();
        let year = df
            .column(population::YEAR)?
            .as_materialized_series()
            .i64()?
            .clone();
        let pop = df
            .column(population::POPULATION)?
            .as_materialized_series()
            .i64()?
            .clone();

        let mut entries = HashMap::with_capacity(df.height());
        for i in 0..df.height() {
            if let (Some(c), Some(y), Some(p)) = (country.get(i), year.get(i), pop.get(i)) {
                entries.entry((c.to_string(), y)).or_insert(p);
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, country: &str, year: i64) -> Option<i64> {
        self.entries.get(&(country.to_string(), year)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::population as pop;

    fn area_codes() -> DataFrame {
        polars::df!(
            "Area Code" => ["39"],
            "Area" => ["Chad"]
        )
        .unwrap()
    }

    #[test]
    fn thousands_unit_scales_to_head_count() {
        let raw = polars::df!(
            "Area" => ["Tchad"],
            "Area Code" => ["39"],
            "Element" => ["Total Population - Both sexes"],
            "Unit" => ["1000 No"],
            "Year" => ["2010"],
            "Value" => ["11000"]
        )
        .unwrap();

        let out = extract_population(&raw, &area_codes()).unwrap();
        assert_eq!(out.height(), 1);

        let country = out.column(pop::COUNTRY).unwrap();
        let country = country.as_materialized_series().str().unwrap();
        // metadata name overrides the raw freeform text
        assert_eq!(country.get(0), Some("Chad"));

        let year = out.column(pop::YEAR).unwrap();
        assert_eq!(year.as_materialized_series().i64().unwrap().get(0), Some(2010));

        let population = out.column(pop::POPULATION).unwrap();
        assert_eq!(
            population.as_materialized_series().i64().unwrap().get(0),
            Some(11_000_000)
        );
    }

    #[test]
    fn plain_unit_is_taken_as_is() {
        let raw = polars::df!(
            "Area" => ["Chad"],
            "Area Code" => ["39"],
            "Element" => ["Total Population - Both sexes"],
            "Unit" => ["No"],
            "Year" => ["2010"],
            "Value" => ["11000000"]
        )
        .unwrap();

        let out = extract_population(&raw, &area_codes()).unwrap();
        let population = out.column(pop::POPULATION).unwrap();
        assert_eq!(
            population.as_materialized_series().i64().unwrap().get(0),
            Some(11_000_000)
        );
    }

    #[test]
    fn incomplete_and_nonpositive_rows_are_dropped() {
        let raw = polars::df!(
            "Area" => ["Chad", "Chad", "Chad"],
            "Area Code" => ["39", "39", "39"],
            "Element" => [
                "Total Population - Both sexes",
                "Total Population - Both sexes",
                "Total Population - Both sexes"
            ],
            "Unit" => ["1000 No", "1000 No", "1000 No"],
            "Year" => ["2010", "2011", "2012"],
            "Value" => ["not a number", "0", "1"]
        )
        .unwrap();

        let out = extract_population(&raw, &area_codes()).unwrap();
        assert_eq!(out.height(), 1);
        let year = out.column(pop::YEAR).unwrap();
        assert_eq!(year.as_materialized_series().i64().unwrap().get(0), Some(2012));
    }

    #[test]
    fn first_country_year_occurrence_wins() {
        let raw = polars::df!(
            "Area" => ["Chad", "Chad"],
            "Area Code" => ["39", "39"],
            "Element" => [
                "Total Population - Both sexes",
                "Total Population - Both sexes"
            ],
            "Unit" => ["1000 No", "1000 No"],
            "Year" => ["2010", "2010"],
            "Value" => ["11000", "99999"]
        )
        .unwrap();

        let out = extract_population(&raw, &area_codes()).unwrap();
        assert_eq!(out.height(), 1);
        let population = out.column(pop::POPULATION).unwrap();
        assert_eq!(
            population.as_materialized_series().i64().unwrap().get(0),
            Some(11_000_000)
        );
    }

    #[test]
    fn non_population_rows_are_ignored() {
        let raw = polars::df!(
            "Area" => ["Chad"],
            "Area Code" => ["39"],
            "Element" => ["Food supply (kcal/capita/day)"],
            "Unit" => ["kcal/capita/day"],
            "Year" => ["2010"],
            "Value" => ["450"]
        )
        .unwrap();

        let out = extract_population(&raw, &area_codes()).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn lookup_round_trip() {
        let table = polars::df!(
            "country" => ["Chad"],
            "year" => [2010i64],
            "population" => [11_000_000i64]
        )
        .unwrap();

        let lookup = PopulationLookup::from_frame(&table).unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get("Chad", 2010), Some(11_000_000));
        assert_eq!(lookup.get("Chad", 2011), None);
        assert_eq!(lookup.get("Mali", 2010), None);
    }
}
