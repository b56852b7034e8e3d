use pretty_assertions::assert_eq;

use crate::engine::{Engine, EngineError, Severity};
use crate::plugins::{Recognizer, bbcodes};
use crate::schema::{AttrConfig, LimitAction, Schema, TagConfig};
use crate::serializer::extract_text;
use crate::{PatternMatch, TagEvent, TagKind, parse};

fn assert_round_trip(input: &str) {
    let out = parse(input).unwrap();
    assert_eq!(extract_text(&out.to_xml()), input, "round trip failed for {input:?}");
}

/// Every END in the output must close the innermost open START with the same
/// name and suffix; spans must be non-decreasing and non-overlapping.
fn assert_well_formed(tags: &[TagEvent]) {
    let mut stack: Vec<(&str, &str)> = Vec::new();
    let mut last_end = 0usize;

    for tag in tags {
        assert!(tag.pos >= last_end, "overlapping spans at {}", tag.pos);
        last_end = tag.end_pos();

        match (tag.is_start_tag(), tag.is_end_tag()) {
            (true, true) => {}
            (true, false) => stack.push((&tag.name, &tag.suffix)),
            (false, true) => {
                let top = stack.pop().expect("END without any open START");
                assert_eq!(top, (tag.name.as_str(), tag.suffix.as_str()), "mismatched END");
            }
            (false, false) => panic!("event with no kind bits"),
        }
    }
}

// --- Concrete scenarios -------------------------------------------------------

#[test]
fn autolink_strips_trailing_dot_but_keeps_balanced_paren() {
    let input = "Visit http://en.wikipedia.org/wiki/Mars_(disambiguation).";
    let out = parse(input).unwrap();

    let start = out.tags.iter().find(|t| t.name == "URL" && t.is_start_tag()).unwrap();
    assert_eq!(
        start.attrs.get("url").map(String::as_str),
        Some("http://en.wikipedia.org/wiki/Mars_(disambiguation)")
    );
    // The stripped dot stays ordinary text.
    assert!(out.to_xml().ends_with(".</rt>"));
    assert_well_formed(&out.tags);
    assert_round_trip(input);
}

#[test]
fn nested_quote_list_and_emoticon() {
    let input = "[list][*][quote]\n[*][quote]test[/quote][/quote]:)[/list]";
    let out = parse(input).unwrap();

    // The second [*] cannot open under QUOTE and is reported.
    assert!(out.log.contains(Severity::Error, "Tag requires LIST as parent"));

    // The still-open [*] is auto-closed by [/list] with a zero-length END.
    let li_end = out.tags.iter().find(|t| t.name == "LI" && t.is_end_tag()).unwrap();
    assert_eq!(li_end.len, 0);

    assert_eq!(
        out.to_xml(),
        "<rt><LIST><st>[list]</st><LI><st>[*]</st><QUOTE><st>[quote]</st><i>\n</i>[*]\
         <QUOTE><st>[quote]</st>test<et>[/quote]</et></QUOTE><et>[/quote]</et></QUOTE>\
         <E>:)</E></LI><et>[/list]</et></LIST></rt>"
    );
    assert_well_formed(&out.tags);
    assert_round_trip(input);
}

#[test]
fn url_with_disallowed_scheme_is_dropped() {
    let input = "[url=javascript:alert(1)]x[/url]";
    let out = parse(input).unwrap();

    assert!(out.tags.is_empty());
    assert_eq!(out.to_xml(), "<pt>[url=javascript:alert(1)]x[/url]</pt>");
    assert!(out.log.contains(Severity::Error, "URL scheme javascript is not allowed"));
    // The orphaned end tag is dropped quietly.
    assert!(out.log.contains(Severity::Debug, "Unmatched end tag"));
}

#[test]
fn range_attribute_is_clamped_with_a_warning() {
    let out = parse("[size=42]big[/size]").unwrap();

    let start = out.tags.iter().find(|t| t.name == "SIZE" && t.is_start_tag()).unwrap();
    assert_eq!(start.attrs.get("size").map(String::as_str), Some("20"));
    assert!(out.log.contains(Severity::Warning, "Maximum range value adjusted to 20"));
}

#[test]
fn html_entity_becomes_a_self_closing_tag() {
    let input = "A &amp; B";
    let out = parse(input).unwrap();

    assert_eq!(out.tags.len(), 1);
    let he = &out.tags[0];
    assert_eq!((he.pos, he.len), (2, 5));
    assert_eq!(he.kind, TagKind::SELF_CLOSING);
    assert_eq!(he.attrs.get("char").map(String::as_str), Some("&"));
    assert_eq!(out.to_xml(), "<rt>A <HE char=\"&amp;\">&amp;amp;</HE> B</rt>");
    assert_round_trip(input);
}

#[test]
fn regexp_limit_abort_fails_the_parse() {
    let schema = Schema::new()
        .tag("b", TagConfig::new())
        .plugin(bbcodes::plugin_config().regexp_limit(1).limit_action(LimitAction::Abort));
    let engine = Engine::new(schema);

    let err = engine.parse("[b]x[/b]").unwrap_err();
    assert_eq!(err, EngineError::RegexpLimitExceeded { plugin: "BBCodes".to_string(), limit: 1 });
}

// --- Boundary cases -----------------------------------------------------------

#[test]
fn empty_and_whitespace_inputs_are_plain() {
    for input in ["", "   ", " \n\t "] {
        let out = parse(input).unwrap();
        assert!(out.tags.is_empty());
        assert_round_trip(input);
    }
}

#[test]
fn unclosed_start_is_left_open_and_serializes_well_formed() {
    let input = "[b]never closed";
    let out = parse(input).unwrap();
    assert_eq!(out.tags.len(), 1);
    assert_eq!(out.to_xml(), "<rt><B><st>[b]</st>never closed</B></rt>");
    assert_round_trip(input);
}

#[test]
fn end_without_start_is_dropped() {
    let out = parse("no [/b] here").unwrap();
    assert!(out.tags.is_empty());
    assert!(out.log.contains(Severity::Debug, "Unmatched end tag"));
}

#[test]
fn unknown_tags_are_removed_at_debug() {
    let out = parse("[xyz]hi[/xyz]").unwrap();
    assert!(out.tags.is_empty());
    assert!(out.log.contains(Severity::Debug, "Unknown tag removed (origin: BBCodes)"));
}

#[test]
fn nesting_limit_drops_the_inner_instance_but_not_its_children() {
    let schema = Schema::new()
        .tag("b", TagConfig::new().nesting_limit(1))
        .tag("i", TagConfig::new())
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let out = engine.parse("[b]a[b][i]x[/i][/b]c[/b]").unwrap();
    let names: Vec<(&str, TagKind)> =
        out.tags.iter().map(|t| (t.name.as_str(), t.kind)).collect();
    // The inner [b] vanishes silently; [i] still parses; the first [/b]
    // closes the outer instance and the last [/b] is unmatched.
    assert_eq!(
        names,
        [
            ("B", TagKind::START),
            ("I", TagKind::START),
            ("I", TagKind::END),
            ("B", TagKind::END),
        ]
    );
    assert_well_formed(&out.tags);
}

#[test]
fn tag_limit_caps_total_occurrences() {
    let schema = Schema::new()
        .tag("b", TagConfig::new().tag_limit(1))
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let out = engine.parse("[b]a[/b][b]c[/b]").unwrap();
    assert_eq!(out.tags.len(), 2);
    assert_well_formed(&out.tags);
}

#[test]
fn allow_set_restricts_descendants_transitively() {
    let schema = Schema::new()
        .tag("code", TagConfig::new().allow_only(["code"]))
        .tag("b", TagConfig::new())
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let out = engine.parse("[code][b]x[/b][/code]").unwrap();
    assert!(out.tags.iter().all(|t| t.name == "CODE"));
    assert!(out.log.contains(Severity::Debug, "Tag is not allowed in this context"));
    assert_well_formed(&out.tags);
}

#[test]
fn require_ascendant_checks_the_whole_chain() {
    let schema = Schema::new()
        .tag("table", TagConfig::new())
        .tag("tr", TagConfig::new())
        .tag("td", TagConfig::new().require_ascendant(["table"]))
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let stray = engine.parse("[td]x[/td]").unwrap();
    assert!(stray.tags.is_empty());
    assert!(stray.log.contains(Severity::Debug, "Tag requires TABLE as ascendant"));

    let nested = engine.parse("[table][tr][td]x[/td][/tr][/table]").unwrap();
    assert_eq!(nested.tags.len(), 6);
    assert_well_formed(&nested.tags);
}

#[test]
fn close_parent_lets_list_items_follow_each_other() {
    let input = "[list][*]a[*]b[/list]";
    let out = parse(input).unwrap();

    // The second [*] closes the first via a zero-length END.
    let ends: Vec<&TagEvent> =
        out.tags.iter().filter(|t| t.name == "LI" && t.is_end_tag()).collect();
    assert_eq!(ends.len(), 2);
    assert_eq!(ends[0].len, 0);
    assert_eq!(ends[0].pos, 10);
    assert_well_formed(&out.tags);
    assert_round_trip(input);
}

#[test]
fn explicit_suffixes_pair_starts_with_their_own_ends() {
    let input = "[b:1][b:2]x[/b:1]";
    let out = parse(input).unwrap();

    // [/b:1] must not close [b:2]; the inner instance is auto-closed first.
    let auto = out.tags.iter().find(|t| t.suffix == ":2" && t.is_end_tag()).unwrap();
    assert_eq!(auto.len, 0);
    assert_well_formed(&out.tags);
    assert_round_trip(input);

    let mismatched = parse("[b]x[/b:9]").unwrap();
    assert_eq!(mismatched.tags.len(), 1);
    assert!(mismatched.log.contains(Severity::Debug, "Unmatched end tag"));
}

#[test]
fn regexp_attribute_with_whole_match_replacement() {
    let schema = Schema::new()
        .tag(
            "v",
            TagConfig::new().attr(
                "v",
                AttrConfig::new("regexp")
                    .regexp(regex::Regex::new(r"^(\d+)$").unwrap())
                    .replace("rev-$0"),
            ),
        )
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let out = engine.parse("[v=42]x[/v]").unwrap();
    let start = out.tags.iter().find(|t| t.is_start_tag()).unwrap();
    assert_eq!(start.attrs.get("v").map(String::as_str), Some("rev-42"));
}

// --- Attribute pipeline -------------------------------------------------------

#[test]
fn missing_required_attribute_drops_the_tag() {
    let out = parse("[url]x[/url]").unwrap();
    assert!(out.tags.is_empty());
    assert!(out.log.contains(Severity::Error, "Missing required attribute"));
}

#[test]
fn invalid_value_falls_back_to_the_default() {
    let schema = Schema::new()
        .tag(
            "t",
            TagConfig::new().attr("x", AttrConfig::new("int").default_value("5")),
        )
        .plugin(bbcodes::plugin_config());
    let engine = Engine::new(schema);

    let out = engine.parse("[t x=abc]v[/t]").unwrap();
    let start = out.tags.iter().find(|t| t.is_start_tag()).unwrap();
    assert_eq!(start.attrs.get("x").map(String::as_str), Some("5"));
    assert!(out.log.contains(Severity::Debug, "Using default value"));
    assert!(out.log.has_errors());
}

#[test]
fn canonicalization_is_logged_when_the_value_changes() {
    let out = parse("[size=009]x[/size]").unwrap();
    let start = out.tags.iter().find(|t| t.is_start_tag()).unwrap();
    assert_eq!(start.attrs.get("size").map(String::as_str), Some("9"));
    assert!(out.log.contains(Severity::Debug, "Attribute value was altered by the filter"));
}

#[test]
fn undeclared_attributes_never_reach_the_output() {
    let out = parse("[b foo=bar]x[/b]").unwrap();
    let start = out.tags.iter().find(|t| t.is_start_tag()).unwrap();
    assert!(start.attrs.is_empty());
    assert!(out.log.contains(Severity::Debug, "Undeclared attribute removed"));
}

// --- Whitespace trimming ------------------------------------------------------

#[test]
fn adjacent_tags_never_claim_the_same_whitespace() {
    let input = "[quote]a[/quote] [quote]b[/quote]";
    let out = parse(input).unwrap();

    let first_end = out.tags.iter().find(|t| t.is_end_tag()).unwrap();
    assert_eq!(first_end.trim_after, 1);
    let second_start =
        out.tags.iter().filter(|t| t.is_start_tag()).nth(1).unwrap();
    assert_eq!(second_start.trim_before, 0);
    assert_round_trip(input);
}

#[test]
fn surrounding_whitespace_is_absorbed_and_reemitted() {
    let input = "x [quote] y [/quote] z";
    let out = parse(input).unwrap();

    let start = &out.tags[0];
    assert_eq!(start.trim_before, 1);
    assert_eq!(start.trim_after, 1);
    let end = &out.tags[1];
    assert_eq!(end.trim_before, 1);
    assert_eq!(end.trim_after, 1);

    assert_eq!(
        out.to_xml(),
        "<rt>x<i> </i><QUOTE><st>[quote]</st><i> </i>y<i> </i><et>[/quote]</et></QUOTE><i> </i>z</rt>"
    );
    assert_round_trip(input);
}

// --- Overlap, ordering, custom recognizers ------------------------------------

struct DoubleBold;

impl Recognizer for DoubleBold {
    fn get_tags(&self, _text: &str, _matches: &[Vec<PatternMatch>]) -> Vec<TagEvent> {
        vec![
            TagEvent::start("B", 0, 3),
            TagEvent::start("B", 0, 3),
            TagEvent::end("B", 4, 4),
        ]
    }
}

#[test]
fn duplicate_events_are_skipped_by_the_cursor() {
    let schema = Schema::new()
        .tag("b", TagConfig::new())
        .plugin(crate::schema::PluginConfig::new(
            "Custom",
            regex::Regex::new(r"\[b\]").unwrap(),
        ));
    let engine = Engine::new(schema).with_recognizer("Custom", Box::new(DoubleBold));

    let out = engine.parse("[b]x[/b]").unwrap();
    assert_eq!(out.tags.len(), 2);
    assert!(out.log.contains(Severity::Debug, "Tag skipped"));
    assert_well_formed(&out.tags);
}

#[test]
fn ends_at_the_same_position_sort_by_plugin_name() {
    // The zero-length autolink END and [/b] meet at the same offset; the
    // autolink END must come first for the tree to nest.
    let input = "[b]http://x[/b]";
    let out = parse(input).unwrap();
    assert_eq!(
        out.to_xml(),
        "<rt><B><st>[b]</st><URL url=\"http://x\">http://x</URL><et>[/b]</et></B></rt>"
    );
    assert_well_formed(&out.tags);
    assert_round_trip(input);
}

// --- Properties over an adversarial corpus ------------------------------------

#[test]
fn parse_is_total_and_lossless() {
    let cases = [
        "",
        "   ",
        "[",
        "[/",
        "[]",
        "[b",
        "[b]",
        "[/b]",
        "[b][/i]",
        "]]][[[",
        "[url=]x[/url]",
        "[quote=\"unterminated]",
        "&amp &nope; &amp;",
        ":):):)",
        "[list][*][*][/list]",
        "[list][*]a[list][*]b[/list][/list]",
        "[b:1][b:2]x[/b:1]",
        "h\u{e9}llo [b]w\u{f6}rld[/b]",
        "[size=abc]x[/size]",
        "[b]http://x.example/(a)b).[/b] :) &#65;",
        "[quote]\n\n[/quote]",
        "[url=https://ok.example]ok[/url] [url=javascript:x]no[/url]",
    ];

    for input in cases {
        let out = parse(input).unwrap();
        assert_well_formed(&out.tags);
        assert_eq!(extract_text(&out.to_xml()), input, "lossless failed for {input:?}");
    }
}

#[test]
fn engine_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
}
