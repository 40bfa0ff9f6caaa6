//! Unit tests for the stream processor.

use futures::executor::block_on;
use futures::stream;
use rstest::{fixture, rstest};

use verbatim_types::{ChunkPayload, Event, Fragment, Passage, Usage};

use super::*;

#[fixture]
fn passages() -> Vec<Passage> {
    vec![
        Passage::new("1.1", "Ra: I am Ra. Example.", "u"),
        Passage::new("2.4", "One. Two. Three.", "v"),
    ]
}

fn run(fragments: &[&str], passages: &[Passage]) -> Vec<Event> {
    let mut events = Vec::new();
    let mut processor = StreamProcessor::new(passages);
    for fragment in fragments {
        processor.push(Fragment::text(*fragment), &mut events);
    }
    processor.finish(&mut events);
    events
}

fn quote_reference(event: &Event) -> Option<&str> {
    match event {
        Event::Chunk(ChunkPayload::Quote { reference, .. }) => Some(reference),
        _ => None,
    }
}

#[rstest]
fn emits_text_quote_text_for_split_marker(passages: Vec<Passage>) {
    let events = run(&["Here: ", "{{QUOTE:", "1}}", " end."], &passages[..1]);
    assert_eq!(
        events,
        vec![
            Event::text("Here: "),
            Event::quote("Ra: I am Ra. Example.", "1.1", "u"),
            Event::text(" end."),
        ]
    );
}

#[rstest]
fn out_of_range_marker_alone_emits_nothing(passages: Vec<Passage>) {
    let events = run(&["{{QUOTE:99}}"], &passages[..1]);
    assert!(events.is_empty(), "unexpected events: {events:?}");
}

#[rstest]
#[case("{{QUOTE:0}}")]
#[case("{{QUOTE:3}}")]
#[case("{{CITE:1}}")]
fn unresolvable_markers_keep_surrounding_text_joined(
    passages: Vec<Passage>,
    #[case] marker: &str,
) {
    let events = run(&["before ", marker, " after"], &passages);
    assert_eq!(events, vec![Event::text("before  after")]);
}

#[rstest]
fn index_one_resolves_to_first_passage(passages: Vec<Passage>) {
    let events = run(&["{{QUOTE:1}}{{QUOTE:2}}"], &passages);
    let references: Vec<_> = events.iter().filter_map(quote_reference).collect();
    assert_eq!(references, vec!["1.1", "2.4"]);
}

#[rstest]
fn sentence_range_trims_quote(passages: Vec<Passage>) {
    let events = run(&["{{QUOTE:2:s2:s3}}"], &passages);
    assert_eq!(events, vec![Event::quote("Two. Three.", "2.4", "v")]);
}

#[rstest]
fn blank_text_between_quotes_is_not_emitted(passages: Vec<Passage>) {
    let events = run(&["{{QUOTE:1}}", "  \n ", "{{QUOTE:2}}", "\t"], &passages);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| quote_reference(event).is_some()));
}

#[rstest]
fn prose_batches_into_one_chunk_per_marker_boundary(passages: Vec<Passage>) {
    let events = run(&["a", "b", "c", "{{QUOTE:1}}", "d", "e"], &passages);
    assert_eq!(
        events,
        vec![
            Event::text("abc"),
            Event::quote("Ra: I am Ra. Example.", "1.1", "u"),
            Event::text("de"),
        ]
    );
}

#[rstest]
#[case("{{QUOTE:1")]
#[case("{{QUO")]
#[case("{")]
fn truncated_marker_at_end_is_flushed_as_text(passages: Vec<Passage>, #[case] tail: &str) {
    let events = run(&["text ", tail], &passages);
    assert_eq!(events, vec![Event::text(format!("text {tail}"))]);
}

#[rstest]
fn malformed_marker_degrades_to_text(passages: Vec<Passage>) {
    let events = run(&["{{QUOTE:", "x}} ok"], &passages);
    assert_eq!(events, vec![Event::text("{{QUOTE:x}} ok")]);
}

#[rstest]
fn every_split_point_yields_identical_events(passages: Vec<Passage>) {
    let text = "Intro {{QUOTE:2:s1:s2}} middle {{QUOTE:1}} outro";
    let expected = run(&[text], &passages);
    assert_eq!(expected.len(), 5);

    for (split, _) in text.char_indices().skip(1) {
        let (head, tail) = text.split_at(split);
        assert_eq!(run(&[head, tail], &passages), expected, "split at {split}");
    }
}

#[rstest]
fn character_by_character_matches_unsplit(passages: Vec<Passage>) {
    let text = "é {{{QUOTE:1}} {{QUOTE:9}}{{QUOTE:2}}";
    let pieces: Vec<String> = text.chars().map(String::from).collect();
    let fragments: Vec<&str> = pieces.iter().map(String::as_str).collect();
    assert_eq!(run(&fragments, &passages), run(&[text], &passages));
}

#[rstest]
fn outcome_keeps_raw_output_and_last_usage(passages: Vec<Passage>) {
    let first = Usage {
        prompt_tokens: 10,
        completion_tokens: 1,
        total_tokens: 11,
    };
    let last = Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    };
    let fragments = vec![
        Ok::<_, ()>(Fragment::text("A {{QUOTE:1}}").with_usage(first)),
        Ok(Fragment::text(" B")),
        Ok(Fragment::default().with_usage(last)),
    ];
    let mut events = Vec::new();
    let outcome =
        block_on(process(stream::iter(fragments), &passages, &mut events)).expect("process");
    assert_eq!(outcome.full_output, "A {{QUOTE:1}} B");
    assert_eq!(outcome.usage, Some(last));
    assert_eq!(events.len(), 3);
}

#[rstest]
fn upstream_error_flushes_pending_then_propagates(passages: Vec<Passage>) {
    let fragments = vec![Ok(Fragment::text("partial {{QUO")), Err("upstream closed")];
    let mut events = Vec::new();
    let result = block_on(process(stream::iter(fragments), &passages, &mut events));
    assert_eq!(result, Err("upstream closed"));
    assert_eq!(events, vec![Event::text("partial {{QUO")]);
}

#[rstest]
fn empty_stream_emits_nothing(passages: Vec<Passage>) {
    let mut events = Vec::new();
    let outcome = block_on(process(
        stream::empty::<Result<Fragment, ()>>(),
        &passages,
        &mut events,
    ))
    .expect("process");
    assert!(events.is_empty());
    assert_eq!(outcome, StreamOutcome::default());
}
