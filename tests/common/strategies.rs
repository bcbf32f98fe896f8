use proptest::prelude::*;

/// Strategy for generating valid 5-field cron expressions
pub fn cron_expression_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("*".to_string()), (0u32..60).prop_map(|m| m.to_string())],
        prop_oneof![Just("*".to_string()), (0u32..24).prop_map(|h| h.to_string())],
        prop_oneof![Just("*".to_string()), (1u32..29).prop_map(|d| d.to_string())],
        prop_oneof![Just("*".to_string()), (1u32..13).prop_map(|m| m.to_string())],
        prop_oneof![
            Just("*".to_string()),
            (0u32..8).prop_map(|d| d.to_string()),
            (0u32..8, 0u32..8).prop_map(|(a, b)| format!("{}-{}", a.min(b), a.max(b))),
        ],
    )
        .prop_map(|(minute, hour, day, month, weekday)| {
            format!("{minute} {hour} {day} {month} {weekday}")
        })
}

/// Strategy for generating strings that are not cron expressions
pub fn invalid_cron_expression_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,12}",
        Just("* * *".to_string()),
        Just("* * * * * * *".to_string()),
        (60u32..100).prop_map(|minute| format!("{minute} * * * *")),
        (24u32..40).prop_map(|hour| format!("0 {hour} * * *")),
    ]
}

/// Strategy for generating step lists: (description, can_be_skipped, skip_reason)
pub fn steps_strategy() -> impl Strategy<Value = Vec<(String, bool, String)>> {
    prop::collection::vec(
        ("[A-Z][a-z ]{2,20}", any::<bool>(), "[A-Za-z][A-Za-z ]{0,19}"),
        0..8,
    )
}
