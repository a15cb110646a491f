use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::error::PanelError;
use crate::food_groups;
use crate::nutrients;
use crate::obesity;
use crate::population::{self, PopulationLookup};
use crate::schema::{balance, health, nutrient, population as pop_schema};
use crate::units;

/// File names of the raw food-balance corpus.
pub const BALANCE_SHEET_FILE: &str = "FoodBalanceSheets_E_All_Data_(Normalized).csv";
pub const AREA_CODES_FILE: &str = "FoodBalanceSheets_E_AreaCodes.csv";
pub const ITEM_CODES_FILE: &str = "FoodBalanceSheets_E_ItemCodes.csv";
pub const ELEMENT_CODES_FILE: &str = "FoodBalanceSheets_E_Elements.csv";

/// Output snapshot names.
pub const POPULATION_OUT: &str = "Cleaned_FAO_Population.csv";
pub const NUTRIENTS_OUT: &str = "Cleaned_FAO_Nutrients.csv";
pub const FOOD_GROUPS_OUT: &str = "Item_to_FoodGroup.csv";
pub const OBESITY_OUT: &str = "Cleaned_Obesity.csv";

/// The four cleaned tables a full pipeline run produces.
pub struct PipelineOutputs {
    pub population: DataFrame,
    pub nutrients: DataFrame,
    pub food_groups: DataFrame,
    pub obesity: DataFrame,
}

pub struct PanelModel {
    base_path: PathBuf,
    balance: Option<DataFrame>,
    area_codes: Option<DataFrame>,
    item_codes: Option<DataFrame>,
    element_codes: Option<DataFrame>,
}

impl PanelModel {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            balance: None,
            area_codes: None,
            item_codes: None,
            element_codes: None,
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the balance sheet and the three code-metadata tables under the
    /// default corpus file names.
    pub fn load_sources(&mut self) -> Result<(), PanelError> {
        self.load_balance_sheet(BALANCE_SHEET_FILE)?;
        self.load_area_codes(AREA_CODES_FILE)?;
        self.load_item_codes(ITEM_CODES_FILE)?;
        self.load_element_codes(ELEMENT_CODES_FILE)?;
        Ok(())
    }

    /// Load the raw balance sheet. All columns come in as strings; the
    /// freeform text columns are trimmed.
    pub fn load_balance_sheet(&mut self, filename: &str) -> Result<(), PanelError> {
        let raw = self.read_csv_as_strings(filename)?;
        require_columns(
            &raw,
            &[
                balance::AREA,
                balance::AREA_CODE,
                balance::ITEM,
                balance::ITEM_CODE,
                balance::ELEMENT,
                balance::ELEMENT_CODE,
                balance::UNIT,
                balance::YEAR,
                balance::VALUE,
                balance::FLAG,
            ],
        )?;

        let df = raw
            .lazy()
            .with_columns(
                [
                    balance::AREA,
                    balance::ITEM,
                    balance::ELEMENT,
                    balance::UNIT,
                    balance::FLAG,
                ]
                .map(|name| col(name).str().strip_chars(lit(" \t\r\n"))),
            )
            .collect()?;

        info!("loaded {} balance-sheet rows", df.height());
        self.balance = Some(df);
        Ok(())
    }

    pub fn load_area_codes(&mut self, filename: &str) -> Result<(), PanelError> {
        let df = self.load_code_table(filename, balance::AREA_CODE, balance::AREA)?;
        info!("loaded {} unique area codes", df.height());
        self.area_codes = Some(df);
        Ok(())
    }

    pub fn load_item_codes(&mut self, filename: &str) -> Result<(), PanelError> {
        let df = self.load_code_table(filename, balance::ITEM_CODE, balance::ITEM)?;
        info!("loaded {} unique item codes", df.height());
        self.item_codes = Some(df);
        Ok(())
    }

    pub fn load_element_codes(&mut self, filename: &str) -> Result<(), PanelError> {
        let df = self.load_code_table(filename, balance::ELEMENT_CODE, balance::ELEMENT)?;
        info!("loaded {} unique element codes", df.height());
        self.element_codes = Some(df);
        Ok(())
    }

    /// Read a `{code, name}` metadata table: numeric code, trimmed and
    /// de-quoted name, first row per code kept.
    fn load_code_table(
        &self,
        filename: &str,
        code_col: &str,
        name_col: &str,
    ) -> Result<DataFrame, PanelError> {
        let raw = self.read_csv_as_strings(filename)?;
        require_columns(&raw, &[code_col, name_col])?;

        let df = raw
            .lazy()
            .with_columns([
                col(code_col).cast(DataType::Int64),
                col(name_col)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .str()
                    .replace_all(lit("\""), lit(""), true),
            ])
            .collect()?;

        let (deduped, _) = keep_first(&df, &[code_col])?;
        Ok(deduped)
    }

    /// Read a CSV file with all columns as String dtype and trimmed
    /// column names.
    fn read_csv_as_strings(&self, filename: &str) -> Result<DataFrame, PanelError> {
        read_csv_path(&self.base_path.join(filename))
    }

    fn balance(&self) -> Result<&DataFrame, PanelError> {
        self.balance
            .as_ref()
            .ok_or_else(|| PanelError::NotLoaded("balance sheet".into()))
    }

    fn area_codes(&self) -> Result<&DataFrame, PanelError> {
        self.area_codes
            .as_ref()
            .ok_or_else(|| PanelError::NotLoaded("area codes".into()))
    }

    fn item_codes(&self) -> Result<&DataFrame, PanelError> {
        self.item_codes
            .as_ref()
            .ok_or_else(|| PanelError::NotLoaded("item codes".into()))
    }

    fn element_codes(&self) -> Result<&DataFrame, PanelError> {
        self.element_codes
            .as_ref()
            .ok_or_else(|| PanelError::NotLoaded("element codes".into()))
    }

    // ── Stages ──────────────────────────────────────────────────────────────

    /// Population table from the loaded balance sheet. The same element
    /// mask excludes these rows from the nutrient stream, so the two
    /// outputs partition the raw frame.
    pub fn extract_population(&self) -> Result<DataFrame, PanelError> {
        population::extract_population(self.balance()?, self.area_codes()?)
    }

    /// The cleaned nutrient table: population rows out, supply elements
    /// in, metadata names over raw text, canonical units and elements,
    /// one row per (country, year, item, element).
    pub fn build_nutrient_table(
        &self,
        populations: &PopulationLookup,
    ) -> Result<DataFrame, PanelError> {
        let df = self
            .balance()?
            .clone()
            .lazy()
            .filter(population::population_mask().fill_null(lit(false)).not())
            .filter(nutrients::nutrient_element_mask())
            .with_columns([
                col(balance::AREA_CODE).cast(DataType::Int64),
                col(balance::ITEM_CODE).cast(DataType::Int64),
                col(balance::ELEMENT_CODE).cast(DataType::Int64),
                col(balance::YEAR).cast(DataType::Int64),
                col(balance::VALUE).cast(DataType::Float64),
            ])
            .collect()?;
        info!("filtered to {} nutrient-supply rows", df.height());

        let df = attach_metadata(
            df,
            balance::ITEM_CODE,
            balance::ITEM,
            balance::ITEM,
            self.item_codes()?,
            balance::ITEM,
        )?;
        let df = attach_metadata(
            df,
            balance::ELEMENT_CODE,
            balance::ELEMENT,
            balance::ELEMENT,
            self.element_codes()?,
            balance::ELEMENT,
        )?;
        let df = attach_metadata(
            df,
            balance::AREA_CODE,
            balance::AREA,
            nutrient::COUNTRY,
            self.area_codes()?,
            balance::AREA,
        )?;

        let mut df = units::standardize_units(df, populations)?;
        nutrients::map_elements(&mut df)?;
        nutrients::build_nutrient_table(df)
    }

    /// Item → food-group mapping over the nutrient vocabulary.
    pub fn build_food_group_mapping(
        &self,
        nutrients_df: &DataFrame,
    ) -> Result<DataFrame, PanelError> {
        let items = distinct_item_pairs(nutrients_df, nutrient::ITEM, nutrient::ITEM_CODE)?;
        let code_names = code_name_map(self.item_codes()?, balance::ITEM_CODE, balance::ITEM)?;
        let rows = food_groups::build_mapping(&items, &code_names);
        info!("mapped {} items to food groups", rows.len());
        food_groups::mapping_to_frame(&rows)
    }

    /// Obesity table from a health-indicator export, with country names
    /// resolved against the population table's countries.
    pub fn clean_obesity_file(
        &self,
        path: &Path,
        population_df: &DataFrame,
    ) -> Result<DataFrame, PanelError> {
        let raw = read_csv_path(path)?;
        require_columns(
            &raw,
            &[
                health::INDICATOR,
                health::DIM1,
                health::LOCATION,
                health::SPATIAL_CODE,
                health::PERIOD,
            ],
        )?;
        info!("loaded {} health-indicator rows", raw.height());

        let reference = distinct_strings(population_df, pop_schema::COUNTRY)?;
        obesity::clean_obesity(raw, &reference)
    }

    /// Run the whole pipeline and write the four snapshots to `out_dir`.
    pub fn run(
        &mut self,
        health_file: &Path,
        out_dir: &Path,
    ) -> Result<PipelineOutputs, PanelError> {
        self.load_sources()?;

        let mut population_df = self.extract_population()?;
        let populations = PopulationLookup::from_frame(&population_df)?;
        info!(
            "population lookup covers {} (country, year) pairs",
            populations.len()
        );

        let mut nutrients_df = self.build_nutrient_table(&populations)?;
        let mut food_groups_df = self.build_food_group_mapping(&nutrients_df)?;
        let mut obesity_df = self.clean_obesity_file(health_file, &population_df)?;

        std::fs::create_dir_all(out_dir)?;
        write_csv(&mut population_df, &out_dir.join(POPULATION_OUT))?;
        write_csv(&mut nutrients_df, &out_dir.join(NUTRIENTS_OUT))?;
        write_csv(&mut food_groups_df, &out_dir.join(FOOD_GROUPS_OUT))?;
        write_csv(&mut obesity_df, &out_dir.join(OBESITY_OUT))?;

        Ok(PipelineOutputs {
            population: population_df,
            nutrients: nutrients_df,
            food_groups: food_groups_df,
            obesity: obesity_df,
        })
    }
}

// ── Table helpers ───────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype. A missing file is
/// the pipeline's only fatal input condition.
pub(crate) fn read_csv_path(path: &Path) -> Result<DataFrame, PanelError> {
    if !path.is_file() {
        return Err(PanelError::SourceNotFound(path.to_path_buf()));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    // Trim whitespace from column names
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), PanelError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(PanelError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Write a CSV snapshot, creating or truncating the file.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), PanelError> {
    let file = File::create(path)?;
    CsvWriter::new(file).finish(df)?;
    Ok(())
}

/// Keep the first row per key in source order. Returns the filtered
/// frame and the number of removed rows.
pub(crate) fn keep_first(
    df: &DataFrame,
    subset: &[&str],
) -> Result<(DataFrame, usize), PanelError> {
    let mut key_columns = Vec::with_capacity(subset.len());
    for name in subset {
        key_columns.push(df.column(name)?);
    }

    let mut seen = HashSet::with_capacity(df.height());
    let mut keep = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut key = String::new();
        for column in &key_columns {
            let value = column.get(i)?;
            key.push_str(&format!("{value}"));
            key.push('\u{1}');
        }
        keep.push(seen.insert(key));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?;
    let removed = df.height() - filtered.height();
    Ok((filtered, removed))
}

/// Distinct non-null values of a string column, in first-seen order.
pub(crate) fn distinct_strings(df: &DataFrame, column: &str) -> Result<Vec<String>, PanelError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in df
        .column(column)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .flatten()
    {
        if seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    Ok(out)
}

/// Distinct (name, code) pairs keyed by name, in first-seen order.
pub(crate) fn distinct_item_pairs(
    df: &DataFrame,
    item_col: &str,
    code_col: &str,
) -> Result<Vec<(String, Option<i64>)>, PanelError> {
    let items = df
        .column(item_col)?
        .as_materialized_series()
        .str()?
        .clone();
    let codes = df
        .column(code_col)?
        .as_materialized_series()
        .i64()?
        .clone();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for i in 0..df.height() {
        if let Some(item) = items.get(i) {
            if seen.insert(item.to_string()) {
                out.push((item.to_string(), codes.get(i)));
            }
        }
    }
    Ok(out)
}

/// code → name lookup from a metadata table, first entry per code.
pub(crate) fn code_name_map(
    meta: &DataFrame,
    code_col: &str,
    name_col: &str,
) -> Result<HashMap<i64, String>, PanelError> {
    let codes = meta
        .column(code_col)?
        .as_materialized_series()
        .i64()?
        .clone();
    let names = meta
        .column(name_col)?
        .as_materialized_series()
        .str()?
        .clone();

    let mut map = HashMap::with_capacity(meta.height());
    for i in 0..meta.height() {
        if let (Some(code), Some(name)) = (codes.get(i), names.get(i)) {
            map.entry(code).or_insert_with(|| name.to_string());
        }
    }
    Ok(map)
}

/// Left-join a `{code, name}` metadata table and prefer the metadata name
/// over the raw text wherever the code is known; the raw text is the
/// fallback, never the reverse.
fn attach_metadata(
    df: DataFrame,
    code_col: &str,
    raw_name_col: &str,
    out_col: &str,
    meta: &DataFrame,
    meta_name_col: &str,
) -> Result<DataFrame, PanelError> {
    let meta_lazy = meta
        .clone()
        .lazy()
        .select([col(code_col), col(meta_name_col).alias("__meta_name")]);

    let mut out = df
        .lazy()
        .join(
            meta_lazy,
            [col(code_col)],
            [col(code_col)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col("__meta_name").fill_null(col(raw_name_col)).alias(out_col))
        .collect()?;
    out.drop_in_place("__meta_name")?;

    Ok(out)
}
