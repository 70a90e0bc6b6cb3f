use pretty_assertions::assert_eq;

use tagfill::matcher::{similarity, MatchKind};
use tagfill::{normalize, FieldMapping, FieldMatcher, NameNormalizer};

mod common;

fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
    pairs.iter().copied().collect()
}

#[test]
fn test_normalization_is_idempotent() {
    common::setup();
    let samples = [
        "Project_Name",
        "PROJECT NAME",
        "Desc",
        "description",
        "Addr.",
        "Drawing No",
        "num_no_desc",
        "Projectproject",
        "noaddrdesc",
        "Стадия",
        "",
        "___",
        "Power_kW",
        "no.no.no",
    ];
    for s in samples {
        let once = normalize(s);
        assert_eq!(normalize(&once), once, "normalizing {s:?} twice");
    }
}

#[test]
fn test_all_exact_after_normalization() {
    let matcher = FieldMatcher::new(70);
    let result = matcher.auto_map(
        &["Project_Name", "Address", "Power_kW"],
        &["PROJECTNAME", "ADDRESS", "POWER_KW"],
    );
    assert_eq!(
        result,
        mapping(&[
            ("Project_Name", "PROJECTNAME"),
            ("Address", "ADDRESS"),
            ("Power_kW", "POWER_KW"),
        ])
    );
}

#[test]
fn test_synonym_makes_abbreviated_tag_exact() {
    let matcher = FieldMatcher::default();
    let result = matcher.auto_map(&["Description"], &["DESC"]);
    assert_eq!(result, mapping(&[("Description", "DESC")]));

    let explained = matcher.explain(&["Description"], &["DESC"]);
    assert_eq!(
        explained[0].kind,
        MatchKind::Exact {
            tag: "DESC".to_string()
        }
    );
}

#[test]
fn test_power_column_binds_kw_tag() {
    let matcher = FieldMatcher::default();
    let explained = matcher.explain(&["Power"], &["VOLTAGE", "KW"]);
    assert_eq!(
        explained[0].kind,
        MatchKind::Exact {
            tag: "KW".to_string()
        }
    );
}

#[test]
fn test_prefix_abbreviation_binds_at_default_threshold() {
    // lcs 4 over 11 characters: 72.7
    let matcher = FieldMatcher::default();
    let result = matcher.auto_map(&["Voltage"], &["VOLT", "DATE"]);
    assert_eq!(result.get("Voltage"), Some("VOLT"));

    let explained = matcher.explain(&["Sheet_No"], &["SHEET"]);
    assert!(matches!(
        explained[0].kind,
        MatchKind::Unmatched { best: Some((ref tag, score)) } if tag == "SHEET" && score == 62.5
    ));
}

#[test]
fn test_exact_match_beats_earlier_fuzzy_candidate() {
    // "ADDRES" scores high against "address" but is listed first; "ADDR"
    // expands to "address" and must win.
    let matcher = FieldMatcher::new(0);
    let result = matcher.auto_map(&["Address"], &["ADDRES", "ADDR"]);
    assert_eq!(result.get("Address"), Some("ADDR"));
}

#[test]
fn test_threshold_boundary() {
    assert_eq!(similarity("abcd", "abce"), 75.0);

    let at = FieldMatcher::new(75).auto_map(&["abcd"], &["abce"]);
    assert_eq!(at.get("abcd"), Some("abce"));

    let above = FieldMatcher::new(76).auto_map(&["abcd"], &["abce"]);
    assert!(above.is_empty());

    let explained = FieldMatcher::new(76).explain(&["abcd"], &["abce"]);
    assert_eq!(
        explained[0].kind,
        MatchKind::Unmatched {
            best: Some(("abce".to_string(), 75.0))
        }
    );
}

#[test]
fn test_tie_goes_to_first_tag() {
    let matcher = FieldMatcher::new(50);
    assert_eq!(
        matcher.auto_map(&["abcx"], &["abcd", "abce"]).get("abcx"),
        Some("abcd")
    );
    assert_eq!(
        matcher.auto_map(&["abcx"], &["abce", "abcd"]).get("abcx"),
        Some("abce")
    );
}

#[test]
fn test_columns_are_keys_at_most_once() {
    let matcher = FieldMatcher::default();
    let result = matcher.auto_map(&["Name", "Name", "Addr", "Address"], &["NAME", "ADDRESS"]);
    assert_eq!(result.len(), 3);
    assert_eq!(result.get("Name"), Some("NAME"));

    // two columns on one tag is allowed, and reported
    assert_eq!(result.get("Addr"), Some("ADDRESS"));
    assert_eq!(result.get("Address"), Some("ADDRESS"));
    assert_eq!(result.ambiguous_tags()["ADDRESS"], vec!["Addr", "Address"]);
}

#[test]
fn test_mapping_follows_column_order() {
    let matcher = FieldMatcher::default();
    let result = matcher.auto_map(&["Date", "Project"], &["PROJECTNAME", "DATE"]);
    let columns: Vec<&str> = result.iter().map(|(c, _)| c).collect();
    assert_eq!(columns, ["Date", "Project"]);
}

#[test]
fn test_unrelated_column_is_left_out() {
    let matcher = FieldMatcher::default();
    let result = matcher.auto_map(&["Inverter"], &["PROJECTNAME", "DATE"]);
    assert!(result.is_empty());
}

#[test]
fn test_custom_synonym_table() {
    let normalizer = NameNormalizer::with_synonyms([("qty", "quantity")]);
    let matcher = FieldMatcher::default().with_normalizer(normalizer);
    let result = matcher.auto_map(&["Quantity"], &["QTY"]);
    assert_eq!(result.get("Quantity"), Some("QTY"));

    // the default table is not consulted any more
    assert!(matcher.auto_map(&["Description"], &["DESC"]).is_empty());
}

#[test]
fn test_explain_serializes_with_kind() {
    let matcher = FieldMatcher::default();
    let explained = matcher.explain(&["Project_Name"], &["PROJECTNAME"]);
    let json = serde_json::to_value(&explained[0]).unwrap();
    assert_eq!(json["kind"], "exact");
    assert_eq!(json["tag"], "PROJECTNAME");
    assert_eq!(json["normalized"], "projectname");
}
