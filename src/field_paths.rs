//! Flattening of MARC records into field-path maps.
//!
//! This module is the MARC half of the field extraction engine: it walks one
//! [`Record`]'s field/subfield tree and produces a flat [`FieldMap`] keyed by
//! **field path** — `"{tag}${code}"` for ordinary subfields, the bare tag for
//! control fields and for the compound person/corporate/keyword fields.
//!
//! Compound rules:
//! - person fields (100, 600, 700) compose `info: name (dates) [role]: "title"`
//!   from subfields `i`, `a`, `d`, `e`, `t`
//! - the corporate field (710) composes `unit [sub-unit]` from `a`, `b`
//! - keyword fields (650, 651, 655) compose `keyword [authority-id]` from
//!   `a` and the linked-authority subfield `0`
//!
//! Every emitted value passes a generic cleanup (trailing punctuation, one
//! layer of an unbalanced bracket). Repeated emissions to the same path are
//! joined with `"; "` in source encounter order, and the finished map is
//! sorted by the numeric prefix of the path.
//!
//! # Examples
//!
//! ```
//! use oaitab::field_paths::{parse, ParseOptions};
//! use oaitab::record::{Field, Record};
//!
//! let mut record = Record::new();
//! let mut field = Field::new("100".to_string(), '1', ' ');
//! field.add_subfield('a', "Tammsaare, A. H.,".to_string());
//! field.add_subfield('d', "1878-1940.".to_string());
//! field.add_subfield('e', "autor.".to_string());
//! record.add_field(field);
//!
//! let paths = parse(&record, &ParseOptions::default());
//! assert_eq!(paths["100"], "Tammsaare, A. H. (1878-1940) [autor]");
//! ```

use indexmap::IndexMap;

use crate::record::{Field, Record};

/// Flat field-path -> value mapping extracted from one record.
pub type FieldMap = IndexMap<String, String>;

/// Separator used when a source field repeats.
pub const DUPLICATE_FIELD_SEP: &str = "; ";

/// Person fields composed with the `info: name (dates) [role]: "title"` rule.
const PERSON_TAGS: [&str; 3] = ["100", "600", "700"];
/// Corporate name field composed as `unit [sub-unit]`.
const CORPORATE_TAGS: [&str; 1] = ["710"];
/// Keyword fields composed as `keyword [authority-id]`.
const KEYWORD_TAGS: [&str; 3] = ["650", "651", "655"];

/// Punctuation trimmed from the end of ordinary values.
const VALUE_TRIM: &[char] = &[' ', ',', ':', '.', ';', '/'];
/// Punctuation trimmed from compound-field components, except that a period
/// closing a single-letter initial is handled separately.
const SOFT_TRIM: &[char] = &[' ', ',', ':', ';'];

/// Options controlling the flattening pass.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Whether control fields (001-009) are emitted. Defaults to `true`.
    pub keep_control_fields: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            keep_control_fields: true,
        }
    }
}

/// Flatten one MARC record into a [`FieldMap`].
///
/// State-free per record. Fields whose tag begins with `9` (local,
/// non-transferable fields) are skipped. A malformed individual subfield
/// never aborts the record; at worst its value is dropped.
#[must_use]
pub fn parse(record: &Record, options: &ParseOptions) -> FieldMap {
    let mut paths = FieldMap::new();

    if options.keep_control_fields {
        for (tag, value) in record.control_fields_iter() {
            if tag.starts_with('9') {
                continue;
            }
            append_path(&mut paths, tag.to_string(), value);
        }
    }

    for field in record.data_fields() {
        let tag = field.tag.as_str();
        if tag.starts_with('9') {
            continue;
        }

        if PERSON_TAGS.contains(&tag) {
            append_path(&mut paths, tag.to_string(), &compose_person(field));
        } else if CORPORATE_TAGS.contains(&tag) {
            append_path(&mut paths, tag.to_string(), &compose_corporate(field));
        } else if KEYWORD_TAGS.contains(&tag) {
            if let Some(keyword) = compose_keyword(field) {
                append_path(&mut paths, tag.to_string(), &keyword);
            }
        } else {
            for subfield in &field.subfields {
                let path = format!("{tag}${}", subfield.code);
                append_path(&mut paths, path, &subfield.value);
            }
        }
    }

    sort_by_tag(paths)
}

/// Clean a value and append it at `path`, joining repeats with `"; "`.
fn append_path(paths: &mut FieldMap, path: String, value: &str) {
    let cleaned = clean_value(value);
    match paths.entry(path) {
        indexmap::map::Entry::Occupied(mut entry) => {
            let joined = entry.get_mut();
            joined.push_str(DUPLICATE_FIELD_SEP);
            joined.push_str(&cleaned);
        }
        indexmap::map::Entry::Vacant(entry) => {
            entry.insert(cleaned);
        }
    }
}

/// Generic cleanup applied to every emitted value.
///
/// URLs only lose trailing periods. Everything else loses trailing
/// punctuation, then one layer of an *unbalanced* enclosing bracket or
/// parenthesis; a balanced pair is never stripped. When an opening bracket
/// of one type and a closing bracket of a different type are both present,
/// each pair is considered independently, in `()` then `[]` order.
fn clean_value(value: &str) -> String {
    if value.starts_with("http") {
        return value.trim_end_matches('.').to_string();
    }

    let mut cleaned = value.trim_end_matches(VALUE_TRIM);
    for (opening, closing) in [('(', ')'), ('[', ']')] {
        if cleaned.ends_with(closing) && !cleaned.contains(opening) {
            cleaned = &cleaned[..cleaned.len() - closing.len_utf8()];
        } else if cleaned.starts_with(opening) && !cleaned.contains(closing) {
            cleaned = &cleaned[opening.len_utf8()..];
        }
    }
    cleaned.to_string()
}

/// Trim trailing punctuation from a compound-field component.
///
/// A period that closes a single-letter initial ("Tammsaare, A. H.")
/// belongs to the name, not to the cataloguing punctuation, and is kept.
fn trim_component(value: &str) -> &str {
    let value = value.trim_end_matches(SOFT_TRIM);
    if let Some(stripped) = value.strip_suffix('.') {
        if !ends_with_initial(stripped) {
            return stripped.trim_end_matches(SOFT_TRIM);
        }
    }
    value
}

/// True when the string ends in a single uppercase letter preceded by a
/// space (or standing alone), i.e. an abbreviated name initial.
fn ends_with_initial(prefix: &str) -> bool {
    let mut chars = prefix.chars().rev();
    match chars.next() {
        Some(c) if c.is_uppercase() => matches!(chars.next(), None | Some(' ')),
        _ => false,
    }
}

/// Last-wins map of subfield code -> value, mirroring how repeated codes
/// within one field shadow each other in the source system.
fn subfield_map(field: &Field) -> IndexMap<char, &str> {
    let mut map = IndexMap::new();
    for sf in &field.subfields {
        map.insert(sf.code, sf.value.as_str());
    }
    map
}

/// Compose the subfields of a person field into one string:
/// `info: name (dates) [role]: "title"`, each component present only when
/// its subfield exists.
fn compose_person(field: &Field) -> String {
    let subfields = subfield_map(field);
    let trim = |code: char| subfields.get(&code).map(|v| trim_component(v));

    let mut out = String::new();
    if let Some(info) = trim('i') {
        out.push_str(info);
        out.push_str(": ");
    }
    if let Some(name) = trim('a') {
        out.push_str(name);
    }
    if let Some(dates) = trim('d') {
        out.push_str(" (");
        out.push_str(dates);
        out.push(')');
    }
    if let Some(role) = trim('e') {
        out.push_str(" [");
        out.push_str(role);
        out.push(']');
    }
    if let Some(title) = trim('t') {
        out.push_str(": \"");
        out.push_str(title);
        out.push('"');
    }
    out
}

/// Compose a corporate name field as `unit [sub-unit]`.
fn compose_corporate(field: &Field) -> String {
    let subfields = subfield_map(field);
    let mut out = String::new();
    if let Some(unit) = subfields.get(&'a') {
        out.push_str(trim_component(unit));
    }
    if let Some(sub_unit) = subfields.get(&'b') {
        out.push_str(" [");
        out.push_str(trim_component(sub_unit));
        out.push(']');
    }
    out
}

/// Compose a keyword field as `keyword [authority-id]`.
///
/// The id is the last path segment after `"id/"` of the linked-authority
/// subfield `0`, the link shape used by the national thesaurus. A field
/// without subfield `a` yields nothing.
fn compose_keyword(field: &Field) -> Option<String> {
    let subfields = subfield_map(field);
    let keyword = subfields.get(&'a')?.trim_matches('.');

    match subfields.get(&'0') {
        Some(&link) => {
            let id = link.rsplit("id/").next().unwrap_or(link).trim_matches('.');
            Some(format!("{keyword} [{id}]"))
        }
        None => Some(keyword.to_string()),
    }
}

/// Sort a finished map by the numeric prefix of each path, ascending.
/// Paths sharing a numeric prefix keep their relative insertion order.
fn sort_by_tag(paths: FieldMap) -> FieldMap {
    let mut entries: Vec<(String, String)> = paths.into_iter().collect();
    entries.sort_by_key(|(path, _)| {
        path.split('$')
            .next()
            .and_then(|tag| tag.parse::<u32>().ok())
            .unwrap_or(0)
    });
    entries.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_field(tag: &str, pairs: &[(char, &str)]) -> Field {
        let mut field = Field::new(tag.to_string(), '1', ' ');
        for (code, value) in pairs {
            field.add_subfield(*code, (*value).to_string());
        }
        field
    }

    #[test]
    fn test_person_field_composition() {
        let mut record = Record::new();
        record.add_field(person_field(
            "100",
            &[
                ('a', "Tammsaare, A. H."),
                ('d', "1878-1940"),
                ('e', "autor"),
            ],
        ));

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["100"], "Tammsaare, A. H. (1878-1940) [autor]");
    }

    #[test]
    fn test_person_field_with_info_and_title() {
        let mut record = Record::new();
        record.add_field(person_field(
            "700",
            &[
                ('i', "Sisaldab:"),
                ('a', "Under, Marie,"),
                ('d', "1883-1980."),
                ('t', "Sonetid."),
            ],
        ));

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(
            paths["700"],
            "Sisaldab: Under, Marie (1883-1980): \"Sonetid\""
        );
    }

    #[test]
    fn test_generic_field_split_with_trailing_punctuation() {
        let mut record = Record::new();
        let mut field = Field::new("300".to_string(), ' ', ' ');
        field.add_subfield('a', "240 lk.".to_string());
        field.add_subfield('b', "ill.".to_string());
        record.add_field(field);

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["300$a"], "240 lk");
        assert_eq!(paths["300$b"], "ill");
    }

    #[test]
    fn test_repeated_field_join_in_encounter_order() {
        let mut record = Record::new();
        for term in ["Luule", "Eesti kirjandus"] {
            let mut field = Field::new("653".to_string(), ' ', ' ');
            field.add_subfield('a', term.to_string());
            record.add_field(field);
        }

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["653$a"], "Luule; Eesti kirjandus");
    }

    #[test]
    fn test_keyword_field_with_authority_link() {
        let mut record = Record::new();
        let mut field = Field::new("650".to_string(), ' ', '4');
        field.add_subfield('a', "luule.".to_string());
        field.add_subfield('0', "https://ems.elnet.ee/id/EMS012345".to_string());
        record.add_field(field);

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["650"], "luule [EMS012345]");
    }

    #[test]
    fn test_keyword_field_without_link_joins_plain() {
        let mut record = Record::new();
        for term in ["Luule", "Eesti kirjandus"] {
            let mut field = Field::new("650".to_string(), ' ', '4');
            field.add_subfield('a', term.to_string());
            record.add_field(field);
        }

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["650"], "Luule; Eesti kirjandus");
    }

    #[test]
    fn test_corporate_field_composition() {
        let mut record = Record::new();
        let mut field = Field::new("710".to_string(), '2', ' ');
        field.add_subfield('a', "Eesti Rahvusraamatukogu,".to_string());
        field.add_subfield('b', "digitaalarhiiv.".to_string());
        record.add_field(field);

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["710"], "Eesti Rahvusraamatukogu [digitaalarhiiv]");
    }

    #[test]
    fn test_local_9xx_fields_skipped() {
        let mut record = Record::new();
        let mut field = Field::new("907".to_string(), ' ', ' ');
        field.add_subfield('a', "local".to_string());
        record.add_field(field);
        record.add_control_field("901".to_string(), "local control".to_string());

        let paths = parse(&record, &ParseOptions::default());
        assert!(paths.is_empty());
    }

    #[test]
    fn test_control_field_retention_flag() {
        let mut record = Record::new();
        record.add_control_field("008".to_string(), "920219s1990".to_string());

        let kept = parse(&record, &ParseOptions::default());
        assert_eq!(kept["008"], "920219s1990");

        let dropped = parse(
            &record,
            &ParseOptions {
                keep_control_fields: false,
            },
        );
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_url_value_keeps_slashes() {
        let mut record = Record::new();
        let mut field = Field::new("856".to_string(), '4', '0');
        field.add_subfield('u', "http://www.digar.ee/id/nlib-digar:100.".to_string());
        record.add_field(field);

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["856$u"], "http://www.digar.ee/id/nlib-digar:100");
    }

    #[test]
    fn test_unbalanced_brackets_trimmed_one_layer() {
        assert_eq!(clean_value("Tallinn)"), "Tallinn");
        assert_eq!(clean_value("(Tallinn"), "Tallinn");
        assert_eq!(clean_value("[Tartu"), "Tartu");
        // A balanced pair is never stripped.
        assert_eq!(clean_value("(Tallinn)"), "(Tallinn)");
        assert_eq!(clean_value("kaart [digitaalne]"), "kaart [digitaalne]");
    }

    #[test]
    fn test_output_sorted_by_numeric_tag() {
        let mut record = Record::new();
        let mut subject = Field::new("650".to_string(), ' ', '4');
        subject.add_subfield('a', "luule".to_string());
        record.add_field(subject);
        let mut title = Field::new("245".to_string(), '1', '0');
        title.add_subfield('a', "Kogutud teosed".to_string());
        record.add_field(title);
        record.add_control_field("001".to_string(), "b123".to_string());

        let paths = parse(&record, &ParseOptions::default());
        let keys: Vec<&str> = paths.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["001", "245$a", "650"]);
    }

    #[test]
    fn test_person_initials_keep_their_period() {
        // Cataloguing punctuation goes, the abbreviation period of an
        // initial stays.
        assert_eq!(trim_component("Tammsaare, A. H.,"), "Tammsaare, A. H.");
        assert_eq!(trim_component("Under, Marie,"), "Under, Marie");
        assert_eq!(trim_component("autor."), "autor");
        assert_eq!(trim_component("1878-1940."), "1878-1940");
    }

    #[test]
    fn test_repeated_subfield_code_last_wins_in_compound() {
        let mut record = Record::new();
        let mut field = Field::new("100".to_string(), '1', ' ');
        field.add_subfield('a', "Wrong, Name".to_string());
        field.add_subfield('a', "Right, Name".to_string());
        record.add_field(field);

        let paths = parse(&record, &ParseOptions::default());
        assert_eq!(paths["100"], "Right, Name");
    }
}
