/// Column-name and canonical-value constants for the nutripanel tables.
/// Single source of truth for every pipeline stage.

// ── Raw food-balance columns ────────────────────────────────────────────────
pub mod balance {
    pub const AREA: &str = "Area";
    pub const AREA_CODE: &str = "Area Code";
    pub const ITEM: &str = "Item";
    pub const ITEM_CODE: &str = "Item Code";
    pub const ELEMENT: &str = "Element";
    pub const ELEMENT_CODE: &str = "Element Code";
    pub const UNIT: &str = "Unit";
    pub const YEAR: &str = "Year";
    pub const VALUE: &str = "Value";
    pub const FLAG: &str = "Flag";
}

// ── Raw health-indicator columns ────────────────────────────────────────────
pub mod health {
    pub const INDICATOR: &str = "Indicator";
    pub const DIM1: &str = "Dim1";
    pub const DIM2: &str = "Dim2";
    pub const LOCATION: &str = "Location";
    pub const SPATIAL_CODE: &str = "SpatialDimValueCode";
    pub const PERIOD: &str = "Period";
    pub const FACT_VALUE: &str = "FactValueNumeric";
    pub const VALUE: &str = "Value";
}

// ── Population table ────────────────────────────────────────────────────────
pub mod population {
    pub const COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const POPULATION: &str = "population";
}

// ── Nutrient table ──────────────────────────────────────────────────────────
pub mod nutrient {
    pub const COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const ITEM: &str = "item";
    pub const ITEM_CODE: &str = "item_code";
    pub const FOOD_GROUP: &str = "food_group";
    pub const ELEMENT: &str = "element";
    pub const ELEMENT_CODE: &str = "element_code";
    pub const UNIT_STANDARD: &str = "unit_standard";
    pub const VALUE_STANDARD: &str = "value_standard";
    pub const UNIT_ORIGINAL: &str = "unit_original";
    pub const FLAG: &str = "flag";
}

// ── Obesity table ───────────────────────────────────────────────────────────
pub mod obesity {
    pub const COUNTRY: &str = "country";
    pub const ISO3: &str = "iso3";
    pub const YEAR: &str = "year";
    pub const OBESITY_PCT: &str = "obesity_pct";
}

// ── Canonical units ─────────────────────────────────────────────────────────
pub mod unit {
    pub const KCAL_PER_CAPITA_DAY: &str = "kcal/capita/day";
    pub const G_PER_CAPITA_DAY: &str = "g/capita/day";
}

// ── Canonical nutrient elements ─────────────────────────────────────────────
pub mod element {
    pub const ENERGY_KCAL_DAY: &str = "energy_kcal_day";
    pub const PROTEIN_G_DAY: &str = "protein_g_day";
    pub const FAT_G_DAY: &str = "fat_g_day";
    pub const SUGAR_G_DAY: &str = "sugar_g_day";
}
