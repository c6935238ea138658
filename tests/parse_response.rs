// tests/parse_response.rs
use synapsed_content::parse::{ParseError, ParseMode, ResponseParser};
use synapsed_content::schema::{dynamic_labels, DYNAMIC_FIELD_COUNT};

const WELL_FORMED: &str = include_str!("fixtures/response_well_formed.txt");

fn content_parser(mode: ParseMode) -> ResponseParser {
    ResponseParser::content_schema(mode).expect("schema parser")
}

#[test]
fn fixture_yields_all_sixteen_fields_in_order() {
    let out = content_parser(ParseMode::Sequential)
        .parse(WELL_FORMED)
        .expect("well-formed response parses");

    assert_eq!(out.len(), DYNAMIC_FIELD_COUNT);
    let names: Vec<String> = out.fields.iter().map(|f| f.name.clone()).collect();
    assert_eq!(names, dynamic_labels());

    assert_eq!(
        out.get("REMINDER"),
        Some("Remember the banks waiting for certainty, and the skills quietly going obsolete?")
    );
    // fenced value: fences removed, then trimmed
    assert_eq!(
        out.get("DEMAND"),
        Some("Demand is signalling through every rerouted container. Most companies are still reading their own forecasts.")
    );
    assert!(out.fields.iter().all(|f| !f.value.contains("```")));
}

#[test]
fn values_equal_trimmed_substrings_between_labels() {
    let labels = dynamic_labels();
    let mut raw = String::new();
    let mut expected = Vec::new();
    for (i, l) in labels.iter().enumerate() {
        // varied padding and multi-line bodies
        let body = format!("{}line one for {l}\nline two  ", " ".repeat(i % 3));
        raw.push_str(&format!("{l}:{body}\n\n"));
        expected.push(body.trim().to_string());
    }

    let out = content_parser(ParseMode::Sequential).parse(&raw).unwrap();
    for (field, want) in out.fields.iter().zip(expected) {
        assert_eq!(field.value, want, "label {}", field.name);
    }
}

#[test]
fn dropping_any_label_fails_the_whole_parse() {
    let parser = content_parser(ParseMode::Sequential);
    for missing in dynamic_labels() {
        let raw: String = WELL_FORMED
            .split("\n\n")
            .filter(|block| !block.starts_with(&format!("{missing}:")))
            .collect::<Vec<_>>()
            .join("\n\n");
        match parser.parse(&raw) {
            Err(ParseError::MissingLabel { label, .. }) => assert_eq!(label, missing),
            other => panic!("expected MissingLabel({missing}), got {other:?}"),
        }
    }
}

#[test]
fn two_label_example_parses() {
    let p = ResponseParser::new(&["L1", "L2"], ParseMode::Sequential).unwrap();
    let out = p.parse("L1: hello\nL2: world").unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.get("L1"), Some("hello"));
    assert_eq!(out.get("L2"), Some("world"));
}

#[test]
fn truncated_two_label_example_fails() {
    let p = ResponseParser::new(&["L1", "L2"], ParseMode::Sequential).unwrap();
    let err = p.parse("L1: hello").unwrap_err();
    assert_eq!(
        err,
        ParseError::MissingLabel {
            label: "L2".into(),
            hint: None
        }
    );
}

#[test]
fn tolerant_mode_accepts_reordered_sections() {
    let mut blocks: Vec<&str> = WELL_FORMED.trim().split("\n\n").collect();
    blocks.swap(0, 15);
    blocks.swap(3, 7);
    let reordered = blocks.join("\n\n");

    assert!(content_parser(ParseMode::Sequential).parse(&reordered).is_err());

    let tolerant = content_parser(ParseMode::Tolerant).parse(&reordered).unwrap();
    let sequential = content_parser(ParseMode::Sequential).parse(WELL_FORMED).unwrap();
    assert_eq!(tolerant, sequential);
}

#[test]
fn preamble_before_first_label_is_ignored() {
    let raw = format!("Here is today's copy.\n\n{WELL_FORMED}");
    let out = content_parser(ParseMode::Sequential).parse(&raw).unwrap();
    assert!(out.get("INSIGHT").unwrap().starts_with("Central banks"));
}
