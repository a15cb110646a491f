use std::collections::{HashMap, HashSet};

use polars::prelude::*;

use crate::error::PanelError;
use crate::schema::nutrient;

/// The closed set of food groups.
pub mod group {
    pub const CEREALS: &str = "Cereals";
    pub const PULSES: &str = "Pulses";
    pub const STARCHY_ROOTS: &str = "Starchy Roots";
    pub const SUGAR: &str = "Sugar";
    pub const OILS_FATS: &str = "Oils & Fats";
    pub const MEAT: &str = "Meat";
    pub const DAIRY_EGGS: &str = "Dairy & Eggs";
    pub const FRUIT_VEG: &str = "Fruit and Vegetables";
    pub const ALCOHOL: &str = "Alcoholic Beverages";
    pub const AQUATIC: &str = "Aquatic Products";
    pub const NUTS_SEEDS: &str = "Nuts & Seeds";
    pub const SPICES_HERBS: &str = "Spices & Herbs";
    pub const BEVERAGES: &str = "Beverages";
    pub const OTHER: &str = "Other";
}

/// Keyword table scanned in order after the special cases; the first
/// group with a keyword present in the lower-cased item name wins.
const KEYWORD_RULES: &[(&str, &[&str])] = &[
    (
        group::CEREALS,
        &[
            "cereal", "wheat", "rice", "maize", "corn", "barley", "oats", "rye", "millet",
            "sorghum", "quinoa", "buckwheat", "grain", "flour",
        ],
    ),
    (
        group::PULSES,
        &[
            "pulse", "bean", "lentil", "pea", "chickpea", "legume", "soybean", "groundnut",
            "peanut",
        ],
    ),
    (
        group::STARCHY_ROOTS,
        &["potato", "cassava", "yam", "sweet potato", "taro", "root", "tuber"],
    ),
    (
        group::SUGAR,
        &[
            "sugar", "sweetener", "honey", "syrup", "molasses", "sugarcane", "sugar beet",
            "fructose", "glucose",
        ],
    ),
    (
        group::OILS_FATS,
        &[
            "oil", "fat", "butter", "ghee", "margarine", "lard", "shortening", "coconut oil",
            "palm oil", "sunflower oil", "olive oil", "soybean oil", "rapeseed oil",
            "cottonseed oil", "groundnut oil", "sesame oil",
        ],
    ),
    (
        group::MEAT,
        &[
            "meat", "beef", "pork", "chicken", "poultry", "lamb", "mutton", "goat", "turkey",
            "duck", "bovine", "sheep", "game",
        ],
    ),
    (
        group::DAIRY_EGGS,
        &["milk", "cheese", "yogurt", "yoghurt", "cream", "butter", "egg", "dairy", "whey"],
    ),
    (
        group::FRUIT_VEG,
        &[
            "fruit", "vegetable", "apple", "banana", "orange", "citrus", "tomato", "onion",
            "carrot", "cabbage", "lettuce", "spinach", "pepper", "cucumber", "melon", "berry",
            "grape", "date", "fig", "mango", "pineapple", "avocado", "broccoli", "cauliflower",
        ],
    ),
    (
        group::ALCOHOL,
        &[
            "beer", "wine", "alcohol", "spirit", "beverage alcoholic", "whiskey", "vodka", "rum",
            "gin",
        ],
    ),
    (
        group::AQUATIC,
        &[
            "fish", "seafood", "aquatic", "salmon", "tuna", "sardine", "mackerel", "shrimp",
            "crab", "lobster", "mollusc", "cephalopod", "crustacean",
        ],
    ),
    (
        group::NUTS_SEEDS,
        &["nut", "almond", "walnut", "cashew", "pistachio", "hazelnut", "seed"],
    ),
    (
        group::SPICES_HERBS,
        &[
            "spice", "herb", "pepper", "cinnamon", "clove", "ginger", "turmeric", "cumin",
            "coriander", "cardamom",
        ],
    ),
    (
        group::BEVERAGES,
        &["coffee", "tea", "cocoa", "chocolate", "beverage", "juice", "soda"],
    ),
    (group::OTHER, &["other", "miscellaneous", "residual"]),
];

/// Parent-group hints for "X, other"-style residual items.
const OTHER_PARENT_HINTS: &[(&str, &str)] = &[
    ("aquatic", group::AQUATIC),
    ("fish", group::AQUATIC),
    ("marine", group::AQUATIC),
    ("seafood", group::AQUATIC),
    ("mollusc", group::AQUATIC),
    ("citrus", group::FRUIT_VEG),
    ("fruit", group::FRUIT_VEG),
    ("vegetable", group::FRUIT_VEG),
    ("cereal", group::CEREALS),
    ("meat", group::MEAT),
    ("oil", group::OILS_FATS),
    ("pulse", group::PULSES),
    ("root", group::STARCHY_ROOTS),
    ("spice", group::SPICES_HERBS),
    ("sweetener", group::SUGAR),
];

/// Conflict-resolution priority: when one item lands in two groups, the
/// lower value survives.
fn group_priority(food_group: &str) -> u32 {
    match food_group {
        group::CEREALS => 1,
        group::DAIRY_EGGS
        | group::MEAT
        | group::OILS_FATS
        | group::SUGAR
        | group::STARCHY_ROOTS
        | group::PULSES => 2,
        group::FRUIT_VEG => 3,
        group::ALCOHOL => 4,
        group::AQUATIC => 5,
        group::NUTS_SEEDS => 6,
        group::SPICES_HERBS => 7,
        group::BEVERAGES => 8,
        _ => 999,
    }
}

/// Normalize an item label: drop a trailing parenthetical, drop anything
/// after the last comma, collapse runs of whitespace.
pub fn clean_item_name(item: &str) -> String {
    let mut name = item.trim().to_string();
    if name.ends_with(')') {
        if let Some(open) = name.rfind('(') {
            name.truncate(open);
        }
    }
    if let Some(comma) = name.rfind(',') {
        name.truncate(comma);
    }
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify a cleaned item name into a food group. `None` marks
/// grand-total/summary rows, which get no group at all.
pub fn classify_item(item: &str) -> Option<&'static str> {
    let lowered = item.to_lowercase();

    if lowered.contains("grand total") || lowered == "total" {
        return None;
    }

    // Known ambiguous labels, resolved ahead of the keyword scan.
    if lowered.contains("butter") || lowered.contains("ghee") {
        return Some(if lowered.contains("oil") {
            group::OILS_FATS
        } else {
            group::DAIRY_EGGS
        });
    }
    if lowered.contains("offal") {
        return Some(group::MEAT);
    }
    if lowered.contains("fish") && lowered.contains("oil") {
        return Some(group::OILS_FATS);
    }
    if lowered.contains("milk") {
        return Some(group::DAIRY_EGGS);
    }
    // "excl wine" labels contain both tokens, so the exclusion wins.
    if lowered.contains("grape") && lowered.contains("excl") {
        return Some(group::FRUIT_VEG);
    }
    if lowered.contains("grape") && lowered.contains("wine") {
        return Some(group::ALCOHOL);
    }
    if lowered.contains("olive") {
        return Some(if lowered.contains("oil") {
            group::OILS_FATS
        } else {
            group::FRUIT_VEG
        });
    }
    if lowered.contains("beverage") {
        return Some(
            if lowered.contains("alcohol") || lowered.contains("fermented") {
                group::ALCOHOL
            } else {
                group::BEVERAGES
            },
        );
    }

    for &(food_group, keywords) in KEYWORD_RULES {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return Some(food_group);
        }
    }

    // Generic category fallbacks.
    if lowered.contains("animal product") {
        return Some(if lowered.contains("fat") {
            group::OILS_FATS
        } else {
            group::MEAT
        });
    }
    if lowered.contains("vegetal product") {
        return Some(group::FRUIT_VEG);
    }

    // Residual items inherit the parent category when one co-occurs.
    if lowered.contains("other") {
        for &(hint, food_group) in OTHER_PARENT_HINTS {
            if lowered.contains(hint) {
                return Some(food_group);
            }
        }
    }

    Some(group::OTHER)
}

/// One row of the item → food-group mapping.
#[derive(Debug, Clone)]
pub struct FoodGroupRow {
    pub item: String,
    pub item_code: Option<i64>,
    pub food_group: &'static str,
}

const SIMILARITY_STOPWORDS: &[&str] = &["other", "others", "products", "including"];

fn significant_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| word.len() > 3 && !SIMILARITY_STOPWORDS.contains(word))
        .map(|word| word.to_string())
        .collect()
}

/// Significant-word overlap against already-mapped items. Weak on
/// purpose; used only for vocabulary stragglers the primary pass never
/// saw under that name.
fn find_similar_food_group(item: &str, mapped: &[FoodGroupRow]) -> Option<&'static str> {
    let words = significant_words(item);
    if words.is_empty() {
        return None;
    }
    for row in mapped {
        let mapped_words = significant_words(&row.item);
        if words.intersection(&mapped_words).next().is_some() {
            return Some(row.food_group);
        }
    }
    None
}

/// Build the item → food-group mapping from the distinct nutrient
/// vocabulary. The item-code metadata name is authoritative where the
/// code is known; totals are excluded; raw names the metadata renamed
/// away are recovered by similarity before re-running the cascade; and
/// each item keeps exactly one group, chosen by the fixed priority.
pub fn build_mapping(
    items: &[(String, Option<i64>)],
    code_names: &HashMap<i64, String>,
) -> Vec<FoodGroupRow> {
    let mut rows: Vec<FoodGroupRow> = Vec::new();
    let mut mapped_names: HashSet<String> = HashSet::new();

    for (raw_item, code) in items {
        let name = code
            .and_then(|c| code_names.get(&c))
            .map(|s| s.as_str())
            .unwrap_or(raw_item);
        let name = clean_item_name(name);
        if name.is_empty() {
            continue;
        }
        if let Some(food_group) = classify_item(&name) {
            mapped_names.insert(name.clone());
            rows.push(FoodGroupRow {
                item: name,
                item_code: *code,
                food_group,
            });
        }
    }

    // Raw names the metadata override renamed away.
    for (raw_item, code) in items {
        let name = clean_item_name(raw_item);
        if name.is_empty() || mapped_names.contains(&name) {
            continue;
        }
        let lowered = name.to_lowercase();
        if lowered.contains("grand total") || lowered == "total" {
            continue;
        }
        let food_group =
            find_similar_food_group(&name, &rows).or_else(|| classify_item(&name));
        if let Some(food_group) = food_group {
            mapped_names.insert(name.clone());
            rows.push(FoodGroupRow {
                item: name,
                item_code: *code,
                food_group,
            });
        }
    }

    // One surviving group per item name.
    let mut best: Vec<FoodGroupRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.item) {
            Some(&i) => {
                if group_priority(row.food_group) < group_priority(best[i].food_group) {
                    best[i] = row;
                }
            }
            None => {
                index.insert(row.item.clone(), best.len());
                best.push(row);
            }
        }
    }

    best.sort_by(|a, b| {
        (a.food_group, a.item.as_str()).cmp(&(b.food_group, b.item.as_str()))
    });
    best
}

/// Materialize the mapping as the `{item, item_code, food_group}` table.
pub fn mapping_to_frame(rows: &[FoodGroupRow]) -> Result<DataFrame, PanelError> {
    let items: Vec<&str> = rows.iter().map(|r| r.item.as_str()).collect();
    let codes: Vec<Option<i64>> = rows.iter().map(|r| r.item_code).collect();
    let groups: Vec<&str> = rows.iter().map(|r| r.food_group).collect();

    Ok(DataFrame::new(vec![
        Series::new(nutrient::ITEM.into(), items).into(),
        Series::new(nutrient::ITEM_CODE.into(), codes).into(),
        Series::new(nutrient::FOOD_GROUP.into(), groups).into(),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_strips_parenthetical_and_comma_tail() {
        assert_eq!(clean_item_name("Rice (Milled Equivalent)"), "Rice");
        assert_eq!(clean_item_name("Marine Fish, Other"), "Marine Fish");
        assert_eq!(clean_item_name("  Wheat   and  products "), "Wheat and products");
    }

    #[test]
    fn special_cases_beat_the_keyword_scan() {
        assert_eq!(classify_item("Butter"), Some(group::DAIRY_EGGS));
        assert_eq!(classify_item("Butter oil"), Some(group::OILS_FATS));
        assert_eq!(classify_item("Ghee"), Some(group::DAIRY_EGGS));
        assert_eq!(classify_item("Offals"), Some(group::MEAT));
        assert_eq!(classify_item("Fish liver oil"), Some(group::OILS_FATS));
        assert_eq!(classify_item("Milk - Excluding Butter"), Some(group::DAIRY_EGGS));
        assert_eq!(classify_item("Grape wine"), Some(group::ALCOHOL));
        assert_eq!(
            classify_item("Grapes and products (excl wine)"),
            Some(group::FRUIT_VEG)
        );
        assert_eq!(classify_item("Olives"), Some(group::FRUIT_VEG));
        assert_eq!(classify_item("Beverages fermented"), Some(group::ALCOHOL));
        assert_eq!(classify_item("Beverages"), Some(group::BEVERAGES));
    }

    #[test]
    fn keyword_scan_maps_common_items() {
        assert_eq!(classify_item("Wheat and products"), Some(group::CEREALS));
        assert_eq!(classify_item("Pelagic Fish"), Some(group::AQUATIC));
        assert_eq!(classify_item("Sugar & Sweeteners"), Some(group::SUGAR));
        assert_eq!(classify_item("Eggs"), Some(group::DAIRY_EGGS));
        assert_eq!(classify_item("Treenuts"), Some(group::NUTS_SEEDS));
        assert_eq!(classify_item("Pimento"), Some(group::OTHER));
    }

    #[test]
    fn generic_category_fallbacks() {
        assert_eq!(classify_item("Animal Products"), Some(group::MEAT));
        assert_eq!(classify_item("Animal fats products"), Some(group::OILS_FATS));
        assert_eq!(classify_item("Vegetal Products"), Some(group::FRUIT_VEG));
    }

    #[test]
    fn totals_get_no_food_group() {
        assert_eq!(classify_item("Grand Total"), None);
        assert_eq!(classify_item("Total"), None);
        assert_eq!(classify_item("total"), None);
    }

    #[test]
    fn mapping_excludes_totals_and_covers_everything_else() {
        let items = vec![
            ("Wheat and products".to_string(), Some(2511i64)),
            ("Grand Total".to_string(), Some(2901i64)),
            ("Pelagic Fish".to_string(), Some(2763i64)),
            ("Pimento".to_string(), Some(2640i64)),
        ];
        let rows = build_mapping(&items, &HashMap::new());

        assert!(rows.iter().all(|r| r.item != "Grand Total"));
        for (item, _) in &items {
            if item == "Grand Total" {
                continue;
            }
            let cleaned = clean_item_name(item);
            assert!(
                rows.iter().any(|r| r.item == cleaned),
                "missing mapping for {item}"
            );
        }
    }

    #[test]
    fn metadata_name_overrides_raw_item() {
        let items = vec![("Wheat nd prdcts".to_string(), Some(2511i64))];
        let mut code_names = HashMap::new();
        code_names.insert(2511i64, "Wheat and products".to_string());

        let rows = build_mapping(&items, &code_names);
        assert_eq!(rows[0].item, "Wheat and products");
        assert_eq!(rows[0].food_group, group::CEREALS);
    }

    #[test]
    fn renamed_raw_items_are_recovered_by_similarity() {
        let items = vec![("Rice paddy blend".to_string(), Some(2805i64))];
        let mut code_names = HashMap::new();
        code_names.insert(2805i64, "Rice and products".to_string());

        let rows = build_mapping(&items, &code_names);
        // both the metadata name and the raw vocabulary name survive
        assert!(rows.iter().any(|r| r.item == "Rice and products"));
        let raw = rows.iter().find(|r| r.item == "Rice paddy blend").unwrap();
        assert_eq!(raw.food_group, group::CEREALS);
    }

    #[test]
    fn duplicate_vocabulary_entries_collapse_to_one_row() {
        let items = vec![
            ("Wheat beer mix".to_string(), None),
            ("Wheat beer mix ".to_string(), None),
        ];
        let rows = build_mapping(&items, &HashMap::new());
        assert_eq!(rows.len(), 1);
        // keyword scan order: the cereal keyword fires before the beer one
        assert_eq!(rows[0].food_group, group::CEREALS);
    }

    #[test]
    fn output_is_sorted_by_group_then_item() {
        let items = vec![
            ("Pelagic Fish".to_string(), None),
            ("Wheat and products".to_string(), None),
            ("Barley and products".to_string(), None),
        ];
        let rows = build_mapping(&items, &HashMap::new());
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.food_group, r.item.as_str()))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }
}
