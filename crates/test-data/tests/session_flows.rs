//! Session behavior across search, selection and notices, driven by
//! scripted providers on tokio's paused clock.

use std::time::Duration;

use gpx_creator::models::SearchResult;
use gpx_creator::selection::Collapse;
use gpx_creator::{GpxCreatorError, NoticeCode, SelectionMode, Severity};
use test_data::prelude::*;

fn results(prefix: &str, count: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| {
            SearchResult::named(
                format!("{prefix} {i}"),
                "Bay Area",
                Coordinate::new(37.5 + i as f64 * 0.01, -122.2),
            )
        })
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_searches_once() {
    let services = ScriptedServices::new()
        .with_search(ScriptedSearch::new().with_results("Ferry Bu", results("Ferry", 2)));
    let session = Session::new(SessionConfig::default(), services.providers());

    for text in ["F", "Fe", "Ferry", "Ferry Bu"] {
        session.text_changed(Field::Start, text);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }
    settle().await;

    assert_eq!(services.search.queries(), vec!["Ferry Bu".to_string()]);
    assert_eq!(session.snapshot().start_field.results.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_search_bias_follows_start_point() {
    let services = ScriptedServices::new();
    let session = Session::new(SessionConfig::default(), services.providers());

    session.text_changed(Field::End, "cafe");
    settle().await;
    assert_eq!(
        services.search.last_region(),
        Some(SessionConfig::default().fallback_region)
    );

    let click = session.handle_map_click(Place::SAN_FRANCISCO).unwrap();
    assert!(click.geocode.is_some());
    session.text_changed(Field::End, "cafe near");
    settle().await;

    let region = services.search.last_region().unwrap();
    assert_eq!(region.center, Place::SAN_FRANCISCO);
    assert_eq!(region.span.latitude_delta, 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_truncation_and_failure_notices() {
    let services = ScriptedServices::new()
        .with_search(ScriptedSearch::new().with_results("park", results("Park", 9)));
    let session = Session::new(SessionConfig::default(), services.providers());
    let mut notices = session.subscribe();

    session.text_changed(Field::Start, "park");
    settle().await;
    assert_eq!(session.snapshot().start_field.results.len(), 5);
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.code, NoticeCode::ResultsTruncated);
    assert_eq!(notice.severity, Severity::Warning);

    // Warnings expire after three seconds.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(session.active_notices().is_empty());

    let failing = ScriptedServices::new().with_search(ScriptedSearch::new().failing("offline"));
    let session = Session::new(SessionConfig::default(), failing.providers());
    session.text_changed(Field::Start, "park");
    settle().await;

    let active = session.active_notices();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, NoticeCode::SearchFailed);
    session.dismiss_error();
    assert!(session.active_notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_search_superseded_by_newer_text() {
    let services = ScriptedServices::new().with_search(
        ScriptedSearch::new()
            .with_results("old", results("Old", 1))
            .with_results("new", results("New", 1))
            .with_delay(Duration::from_secs(2)),
    );
    let session = Session::new(SessionConfig::default(), services.providers());

    session.text_changed(Field::End, "old");
    tokio::time::sleep(Duration::from_millis(800)).await;
    session.text_changed(Field::End, "new");
    tokio::time::sleep(Duration::from_secs(5)).await;

    let field = session.snapshot().end_field;
    assert_eq!(field.results.len(), 1);
    assert_eq!(field.results[0].label(), "New 0");
}

#[tokio::test(start_paused = true)]
async fn test_selecting_results_builds_a_pair() {
    let services = ScriptedServices::new().with_search(
        ScriptedSearch::new()
            .with_results("sf", vec![SearchResult::named("San Francisco", "CA", Place::SAN_FRANCISCO)])
            .with_results("sj", vec![SearchResult::named("San Jose", "CA", Place::SAN_JOSE)]),
    );
    let session = Session::new(SessionConfig::default(), services.providers());

    session.text_changed(Field::Start, "sf");
    session.text_changed(Field::End, "sj");
    settle().await;

    session.select_result(Field::Start, 0).unwrap().unwrap();
    assert_eq!(session.snapshot().selection.mode(), SelectionMode::Single);
    session.select_result(Field::End, 0).unwrap().unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.selection.mode(), SelectionMode::Two);
    assert_eq!(snapshot.start_field.query, "San Francisco");
    assert_eq!(snapshot.end_field.query, "San Jose");
    assert!(session.can_calculate_route());

    // The UI echoes the written label back; that must not search.
    session.text_changed(Field::Start, "San Francisco");
    settle().await;
    assert_eq!(services.search.queries().len(), 2);
}

#[tokio::test]
async fn test_toggle_twice_after_collapse() {
    let services = ScriptedServices::new().with_geocoder(
        ScriptedGeocoder::new()
            .with_name(Place::SAN_FRANCISCO, "San Francisco")
            .with_name(Place::SAN_JOSE, "San Jose"),
    );
    let session = Session::new(SessionConfig::default(), services.providers());

    for place in [Place::SAN_FRANCISCO, Place::SAN_JOSE] {
        if let Some(geocode) = session.handle_map_click(place).unwrap().geocode {
            geocode.await.unwrap();
        }
    }
    session.calculate_route().await.unwrap();

    let first = session.toggle_mode();
    assert_eq!(first.collapse, Some(Collapse::KeptEnd(Place::SAN_JOSE)));
    let second = session.toggle_mode();
    assert_eq!(second.mode, SelectionMode::Two);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.selection.start(), Some(Place::SAN_JOSE));
    assert_eq!(snapshot.selection.end(), None);
    assert_eq!(snapshot.start_field.query, "San Jose");
    assert!(snapshot.selection.route().is_none());

    // Two-field mode with an empty end field cannot export.
    let err = session.export_waypoint().unwrap_err();
    assert!(matches!(err, GpxCreatorError::MissingAddress { .. }));
}

#[tokio::test]
async fn test_geocode_cache_limits_lookups() {
    let services = ScriptedServices::new()
        .with_geocoder(ScriptedGeocoder::new().with_name(Place::OAKLAND, "Oakland"));
    let session = Session::new(SessionConfig::default(), services.providers());

    for _ in 0..3 {
        if let Some(geocode) = session.handle_map_click(Place::OAKLAND).unwrap().geocode {
            geocode.await.unwrap();
        }
        assert_eq!(session.field_text(Field::Start), "Oakland");
        session.clear();
    }
    assert_eq!(services.geocoder.call_count(), 1);

    // Unknown addresses are not cached and keep the placeholder.
    let click = session.handle_map_click(Place::SAN_JOSE).unwrap();
    click.geocode.unwrap().await.unwrap();
    assert_eq!(session.field_text(Field::Start), "37.3382, -121.8863");
    assert!(session.active_notices().is_empty());
}

#[tokio::test]
async fn test_route_failure_keeps_selection() {
    let services = ScriptedServices::new()
        .with_directions(ScriptedDirections::new().failing("No route found"))
        .with_geocoder(
            ScriptedGeocoder::new()
                .with_name(Place::SAN_FRANCISCO, "San Francisco")
                .with_name(Place::OAKLAND, "Oakland"),
        );
    let session = Session::new(SessionConfig::default(), services.providers());

    for place in [Place::SAN_FRANCISCO, Place::OAKLAND] {
        if let Some(geocode) = session.handle_map_click(place).unwrap().geocode {
            geocode.await.unwrap();
        }
    }
    let before = session.snapshot().selection;

    let err = session.calculate_route().await.unwrap_err();
    assert_eq!(err.to_string(), "Route calculation failed: No route found");
    assert_eq!(session.snapshot().selection, before);
    assert!(session.can_calculate_route());
}
