//! Property-based tests for the location resolution engine.
//!
//! Each case builds a fresh runtime and session, so the case counts are kept
//! modest.

mod common;

use proptest::prelude::*;
use ride_locator::{
    providers::ScriptedProvider, AddressField, Coordinate, FormSurface, MarkerSlot,
    ProviderErrorKind, SelectionSlot,
};

use common::TestSession;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn malmo_coordinate() -> impl Strategy<Value = (f64, f64)> {
    (55.50f64..55.66, 12.85f64..13.15)
}

fn any_coordinate() -> impl Strategy<Value = (f64, f64)> {
    (-90.0f64..=90.0, -180.0f64..=180.0)
}

#[derive(Debug, Clone)]
enum Action {
    Click(f64, f64),
    Reset,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => malmo_coordinate().prop_map(|(lat, lng)| Action::Click(lat, lng)),
        1 => Just(Action::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn degraded_text_always_carries_rounded_coordinate((lat, lng) in any_coordinate()) {
        let rt = runtime();
        let app = TestSession::new(
            ScriptedProvider::new("nominatim").failing(ProviderErrorKind::Timeout),
            ScriptedProvider::new("photon").failing(ProviderErrorKind::BadResponse),
        );

        let result = rt.block_on(app.session.on_click(Coordinate::new(lat, lng).unwrap()));
        let expected = format!("📍 {:.4}, {:.4}", lat, lng);
        prop_assert_eq!(result.address.text, expected.clone());
        prop_assert_eq!(app.form.field(AddressField::Pickup), expected);
    }

    #[test]
    fn armed_slot_follows_clicks_and_resets(actions in prop::collection::vec(action_strategy(), 1..16)) {
        let rt = runtime();
        let app = TestSession::new(
            ScriptedProvider::new("nominatim").with_address("Stortorget 1, Malmö"),
            ScriptedProvider::new("photon"),
        );

        let mut expected = SelectionSlot::Pickup;
        for action in actions {
            match action {
                Action::Click(lat, lng) => {
                    let result = rt.block_on(app.session.on_click(Coordinate::new(lat, lng).unwrap()));
                    prop_assert_eq!(result.slot, expected);
                    expected = expected.next();
                }
                Action::Reset => {
                    app.session.reset();
                    expected = SelectionSlot::Pickup;
                    prop_assert_eq!(app.form.field(AddressField::Pickup), "");
                    prop_assert_eq!(app.form.field(AddressField::Dropoff), "");
                    prop_assert!(app.map.marker(MarkerSlot::Pickup).is_none());
                    prop_assert!(app.map.marker(MarkerSlot::Dropoff).is_none());
                }
            }
            prop_assert_eq!(app.session.armed_slot(), expected);
        }
    }

    #[test]
    fn short_queries_never_reach_provider(query in "\\PC{0,1}") {
        let rt = runtime();
        let app = TestSession::new(
            ScriptedProvider::new("nominatim"),
            ScriptedProvider::new("photon"),
        );

        rt.block_on(app.session.type_query(AddressField::Pickup, &query));
        prop_assert_eq!(app.backup.search_calls(), 0);
        prop_assert_eq!(app.primary.search_calls(), 0);
    }
}
