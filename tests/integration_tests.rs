mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use ride_locator::{
    models::AddressSource, providers::ScriptedProvider, selection::RESOLVING_PLACEHOLDER,
    AddressField, FormSurface, GpsError, MarkerSlot, ProviderErrorKind, SearchOutcome,
    SelectionSlot,
};

use common::{coordinate, suggestion, TestSession};

#[tokio::test]
async fn test_pickup_then_dropoff_with_unreachable_providers() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim").failing(ProviderErrorKind::Unreachable),
        ScriptedProvider::new("photon").failing(ProviderErrorKind::Unreachable),
    );
    assert_eq!(app.session.armed_slot(), SelectionSlot::Pickup);

    let pickup = app.session.on_click(coordinate(55.6050, 13.0038)).await;
    assert_eq!(pickup.slot, SelectionSlot::Pickup);
    assert_eq!(app.form.field(AddressField::Pickup), "📍 55.6050, 13.0038");
    assert_eq!(app.session.armed_slot(), SelectionSlot::Dropoff);

    let dropoff = app.session.on_click(coordinate(55.5900, 13.0200)).await;
    assert_eq!(dropoff.slot, SelectionSlot::Dropoff);
    assert_eq!(app.form.field(AddressField::Dropoff), "📍 55.5900, 13.0200");
    assert_eq!(app.session.armed_slot(), SelectionSlot::Pickup);

    let slots: Vec<_> = app.map.markers().into_iter().map(|m| m.slot).collect();
    assert_eq!(slots, vec![MarkerSlot::Pickup, MarkerSlot::Dropoff]);
}

#[tokio::test]
async fn test_pickup_then_dropoff_with_resolved_addresses() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim")
            .then_address("Stortorget 1, Malmö", Duration::ZERO)
            .then_address("Bergsgatan 20, Malmö", Duration::ZERO),
        ScriptedProvider::new("photon"),
    );

    let pickup = app.session.on_click(coordinate(55.6050, 13.0038)).await;
    let dropoff = app.session.on_click(coordinate(55.5900, 13.0200)).await;

    assert_eq!(pickup.address.source, AddressSource::ProviderPrimary);
    assert_eq!(dropoff.address.source, AddressSource::ProviderPrimary);
    assert_eq!(
        app.form.snapshot(),
        vec![
            (AddressField::Pickup, "Stortorget 1, Malmö".to_string()),
            (AddressField::Dropoff, "Bergsgatan 20, Malmö".to_string()),
        ]
    );
    assert_eq!(app.backup.reverse_calls(), 0);
}

#[tokio::test]
async fn test_backup_answers_when_primary_times_out() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim").failing(ProviderErrorKind::Timeout),
        ScriptedProvider::new("photon").with_address("Södra Förstadsgatan 2, Malmö"),
    );

    let result = app.session.on_click(coordinate(55.6, 13.0)).await;

    assert_eq!(result.address.source, AddressSource::ProviderBackup);
    assert_eq!(app.primary.reverse_calls(), 1);
    assert_eq!(app.backup.reverse_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_field_shows_placeholder_before_address() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim")
            .with_address("Stortorget 1, Malmö")
            .with_reverse_latency(Duration::from_secs(1)),
        ScriptedProvider::new("photon"),
    );

    app.session.on_click(coordinate(55.6050, 13.0038)).await;

    let writes = app.form.writes();
    assert_eq!(
        writes,
        vec![
            (AddressField::Pickup, RESOLVING_PLACEHOLDER.to_string()),
            (AddressField::Pickup, "Stortorget 1, Malmö".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_reset_clears_selection_but_keeps_gps_marker() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim").with_address("Stortorget 1, Malmö"),
        ScriptedProvider::new("photon"),
    );

    app.session.on_fix_acquired(coordinate(55.60, 13.00)).await;
    app.session.on_click(coordinate(55.59, 13.02)).await;
    app.session.on_click(coordinate(55.61, 13.01)).await;

    app.session.reset();
    app.session.reset();

    assert_eq!(app.session.armed_slot(), SelectionSlot::Pickup);
    assert_eq!(app.form.field(AddressField::Pickup), "");
    assert_eq!(app.form.field(AddressField::Dropoff), "");
    let slots: Vec<_> = app.map.markers().into_iter().map(|m| m.slot).collect();
    assert_eq!(slots, vec![MarkerSlot::Current]);
}

#[tokio::test]
async fn test_gps_fix_fills_empty_pickup_and_recenters_once() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim").with_address("Davidshallstorg 5, Malmö"),
        ScriptedProvider::new("photon"),
    );

    let first = app.session.on_fix_acquired(coordinate(55.597, 13.002)).await;
    assert_matches!(first, Some(ref r) if r.applied);
    let second = app.session.on_fix_acquired(coordinate(55.598, 13.003)).await;
    assert!(second.is_none());

    assert_eq!(app.form.field(AddressField::Pickup), "Davidshallstorg 5, Malmö");
    assert_eq!(app.map.recenters().len(), 1);
    assert_eq!(app.map.recenters()[0].1, 15);
    assert_eq!(app.session.armed_slot(), SelectionSlot::Pickup);
}

#[test]
fn test_gps_failure_guidance_is_actionable() {
    let app = TestSession::new(ScriptedProvider::new("nominatim"), ScriptedProvider::new("photon"));
    for error in [GpsError::PermissionDenied, GpsError::Unavailable, GpsError::Timeout] {
        let text = app.session.on_fix_failed(error);
        assert!(text.contains("pickup"), "{error:?}: {text}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_typed_dropoff_selected_from_suggestions() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim").with_address("Stortorget 1, Malmö"),
        ScriptedProvider::new("photon").with_results(
            "Malmö C",
            vec![
                suggestion("Malmö C", 55.6094, 13.0001),
                suggestion("Malmö C Nedre", 55.6090, 13.0005),
            ],
        ),
    );

    app.session.on_click(coordinate(55.6050, 13.0038)).await;
    assert_eq!(app.session.armed_slot(), SelectionSlot::Dropoff);

    let outcome = app.session.type_query(AddressField::Dropoff, "Malmö C").await;
    assert_matches!(outcome, SearchOutcome::Applied(ref list) if list.len() == 2);
    assert_eq!(app.backup.search_calls(), 1);
    assert_eq!(app.primary.search_calls(), 0);

    let chosen = app.session.choose_suggestion(AddressField::Dropoff, 0).unwrap();
    assert_eq!(chosen.short_label, "Malmö C");
    assert_eq!(app.form.field(AddressField::Dropoff), "Malmö C, Malmö, Sverige");
    assert!(app.session.autocomplete(AddressField::Dropoff).suggestions().is_empty());
    assert_eq!(app.map.marker(MarkerSlot::Dropoff).unwrap().label, "Malmö C");
    assert_eq!(app.session.armed_slot(), SelectionSlot::Dropoff);
}

#[tokio::test(start_paused = true)]
async fn test_suggestion_beats_slow_click_resolution() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim")
            .with_address("Clicked 1, Malmö")
            .with_reverse_latency(Duration::from_secs(3)),
        ScriptedProvider::new("photon").with_results("Lilla", vec![suggestion("Lilla Torg", 55.6049, 12.9986)]),
    );

    let (click, _) = tokio::join!(app.session.on_click(coordinate(55.60, 13.00)), async {
        app.session.type_query(AddressField::Pickup, "Lilla").await;
        app.session.choose_suggestion(AddressField::Pickup, 0);
    });

    assert!(!click.applied);
    assert_eq!(app.form.field(AddressField::Pickup), "Lilla Torg, Malmö, Sverige");
    assert_eq!(app.map.marker(MarkerSlot::Pickup).unwrap().label, "Lilla Torg");
}

#[tokio::test(start_paused = true)]
async fn test_keystrokes_within_debounce_reach_provider_once() {
    let app = TestSession::new(
        ScriptedProvider::new("nominatim"),
        ScriptedProvider::new("photon").with_results("Mal", vec![suggestion("Malmövägen", 55.6, 13.0)]),
    );

    let (first, second, short) = tokio::join!(
        app.session.type_query(AddressField::Pickup, "Ma"),
        async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            app.session.type_query(AddressField::Pickup, "Mal").await
        },
        app.session.type_query(AddressField::Dropoff, "M"),
    );

    assert!(first.is_superseded());
    assert_matches!(second, SearchOutcome::Applied(_));
    assert_eq!(short, SearchOutcome::Applied(Vec::new()));
    assert_eq!(app.backup.search_calls(), 1);
}
