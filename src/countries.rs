use std::collections::HashMap;

use polars::prelude::*;

use crate::error::PanelError;

/// How a raw location name was resolved against the reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Lower-cased, trimmed equality.
    Exact,
    /// Substring match in either direction, both names longer than the floor.
    Fuzzy,
    /// No match; the raw name passes through unchanged.
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct NameMatch {
    pub raw: String,
    pub canonical: String,
    pub resolution: Resolution,
}

impl NameMatch {
    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unmatched
    }
}

/// Minimum name length for the substring fallback. Short tokens like
/// "Chad" would otherwise match inside unrelated names.
const FUZZY_LENGTH_FLOOR: usize = 5;

/// Resolve raw location names against a reference set of canonical names.
///
/// Pass 1 is exact equality on lower-cased, trimmed names. Pass 2 accepts
/// a substring match in either direction when both compared names have
/// more than [`FUZZY_LENGTH_FLOOR`] characters; the reference set is
/// scanned in lexicographic order so the first qualifying candidate is
/// stable across runs. Names with no match of either kind map to
/// themselves.
pub fn resolve_names(raw_names: &[String], reference: &[String]) -> Vec<NameMatch> {
    let mut ordered: Vec<String> = reference.to_vec();
    ordered.sort();
    resolve_names_in_order(raw_names, &ordered)
}

/// Like [`resolve_names`], but the substring pass scans the reference set
/// in exactly the order given. The first qualifying candidate wins, so
/// the order is the tie-break for collision-prone names ("Sudan" inside
/// "Sudan (former)" versus "South Sudan").
pub fn resolve_names_in_order(raw_names: &[String], reference: &[String]) -> Vec<NameMatch> {
    let candidates: Vec<(String, &String)> = reference
        .iter()
        .map(|name| (name.trim().to_lowercase(), name))
        .collect();

    let exact: HashMap<&str, &String> = candidates
        .iter()
        .map(|(lowered, name)| (lowered.as_str(), *name))
        .collect();

    raw_names
        .iter()
        .map(|raw| {
            let lowered = raw.trim().to_lowercase();
            if let Some(name) = exact.get(lowered.as_str()) {
                return NameMatch {
                    raw: raw.clone(),
                    canonical: (*name).clone(),
                    resolution: Resolution::Exact,
                };
            }
            if lowered.len() > FUZZY_LENGTH_FLOOR {
                for (cand_lowered, name) in &candidates {
                    if cand_lowered.len() > FUZZY_LENGTH_FLOOR
                        && (lowered.contains(cand_lowered.as_str())
                            || cand_lowered.contains(lowered.as_str()))
                    {
                        return NameMatch {
                            raw: raw.clone(),
                            canonical: (*name).clone(),
                            resolution: Resolution::Fuzzy,
                        };
                    }
                }
            }
            NameMatch {
                raw: raw.clone(),
                canonical: raw.clone(),
                resolution: Resolution::Unmatched,
            }
        })
        .collect()
}

/// Rewrite a string column through a resolved name map. Values absent from
/// the map (and nulls) are left as they are.
pub fn apply_name_map(
    df: &mut DataFrame,
    column: &str,
    matches: &[NameMatch],
) -> Result<(), PanelError> {
    let map: HashMap<&str, &str> = matches
        .iter()
        .map(|m| (m.raw.as_str(), m.canonical.as_str()))
        .collect();

    let resolved: Vec<Option<String>> = df
        .column(column)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| {
            value.map(|raw| {
                map.get(raw)
                    .map(|canonical| (*canonical).to_string())
                    .unwrap_or_else(|| raw.to_string())
            })
        })
        .collect();

    df.with_column(Series::new(column.into(), resolved))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn exact_match_ignores_case_and_whitespace() {
        let matches = resolve_names(&names(&["  chad "]), &names(&["Chad"]));
        assert_eq!(matches[0].canonical, "Chad");
        assert_eq!(matches[0].resolution, Resolution::Exact);
    }

    #[test]
    fn substring_match_works_in_both_directions() {
        let reference = names(&["Bolivia (Plurinational State of)", "United Kingdom"]);
        let matches = resolve_names(
            &names(&["Bolivia (Plurinational", "United Kingdom of Great Britain"]),
            &reference,
        );
        assert_eq!(matches[0].canonical, "Bolivia (Plurinational State of)");
        assert_eq!(matches[0].resolution, Resolution::Fuzzy);
        assert_eq!(matches[1].canonical, "United Kingdom");
        assert_eq!(matches[1].resolution, Resolution::Fuzzy);
    }

    #[test]
    fn short_names_never_fuzzy_match() {
        // "Chad" is under the length floor; "Ch" must not resolve to it.
        let matches = resolve_names(&names(&["Ch"]), &names(&["Chad"]));
        assert_eq!(matches[0].resolution, Resolution::Unmatched);
        assert_eq!(matches[0].canonical, "Ch");
    }

    #[test]
    fn unmatched_names_pass_through() {
        let matches = resolve_names(&names(&["Atlantis"]), &names(&["Chad"]));
        assert_eq!(matches[0].canonical, "Atlantis");
        assert_eq!(matches[0].resolution, Resolution::Unmatched);
    }

    #[test]
    fn resolving_canonical_names_is_identity() {
        let reference = names(&["Chad", "South Sudan", "Sudan"]);
        for m in resolve_names(&reference, &reference) {
            assert_eq!(m.raw, m.canonical);
            assert_eq!(m.resolution, Resolution::Exact);
        }
    }

    #[test]
    fn sudan_exact_match_beats_south_sudan_substring() {
        let reference = names(&["South Sudan", "Sudan"]);
        let matches = resolve_names(&names(&["Sudan"]), &reference);
        assert_eq!(matches[0].canonical, "Sudan");
        assert_eq!(matches[0].resolution, Resolution::Exact);
    }

    #[test]
    fn sudan_former_passes_through_under_the_length_floor() {
        // "Sudan" has exactly five characters, so the substring pass never
        // considers it; "South Sudan" is not a substring either way. The
        // name falls back to identity instead of guessing.
        let reference = names(&["South Sudan", "Sudan"]);
        let matches = resolve_names(&names(&["Sudan (former)"]), &reference);
        assert_eq!(matches[0].canonical, "Sudan (former)");
        assert_eq!(matches[0].resolution, Resolution::Unmatched);
    }

    #[test]
    fn scan_order_is_the_tie_break_for_ambiguous_substrings() {
        // Both candidates sit inside "Guinea-Bissau"; whichever the caller
        // lists first wins the fuzzy pass, and resolve_names pins the
        // lexicographic order.
        let raw = names(&["Guinea-Bissau"]);
        let forward = resolve_names_in_order(&raw, &names(&["Bissau", "Guinea"]));
        assert_eq!(forward[0].canonical, "Bissau");

        let reversed = resolve_names_in_order(&raw, &names(&["Guinea", "Bissau"]));
        assert_eq!(reversed[0].canonical, "Guinea");

        let pinned = resolve_names(&raw, &names(&["Guinea", "Bissau"]));
        assert_eq!(pinned[0].canonical, "Bissau");
    }

    #[test]
    fn apply_name_map_rewrites_column() {
        let mut df = polars::df!(
            "country" => ["Viet Nam", "Atlantis"]
        )
        .unwrap();
        let matches = vec![NameMatch {
            raw: "Viet Nam".to_string(),
            canonical: "Vietnam".to_string(),
            resolution: Resolution::Exact,
        }];
        apply_name_map(&mut df, "country", &matches).unwrap();

        let col = df.column("country").unwrap();
        let col = col.as_materialized_series().str().unwrap();
        assert_eq!(col.get(0), Some("Vietnam"));
        assert_eq!(col.get(1), Some("Atlantis"));
    }
}
