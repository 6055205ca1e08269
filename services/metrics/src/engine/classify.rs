/// Contact lifecycle stages in funnel order.
pub const LIFECYCLE_STAGES: &[&str] = &[
    "subscriber",
    "lead",
    "marketingqualifiedlead",
    "salesqualifiedlead",
    "opportunity",
    "customer",
    "evangelist",
    "other",
];

/// Default sales pipeline stages in funnel order.
pub const DEAL_STAGES: &[&str] = &[
    "appointmentscheduled",
    "qualifiedtobuy",
    "presentationscheduled",
    "decisionmakerboughtin",
    "contractsent",
    "closedwon",
    "closedlost",
];

/// Bucket for a null or unrecognized value. Always reported, last.
pub const UNKNOWN_BUCKET: &str = "unknown";

pub const CUSTOMER_STAGE: &str = "customer";
pub const CLOSED_WON_STAGE: &str = "closedwon";

fn bucket(known: &'static [&'static str], value: Option<&str>) -> &'static str {
    value
        .map(|v| v.trim().to_ascii_lowercase())
        .and_then(|v| known.iter().copied().find(|k| *k == v))
        .unwrap_or(UNKNOWN_BUCKET)
}

pub fn lifecycle_bucket(stage: Option<&str>) -> &'static str {
    bucket(LIFECYCLE_STAGES, stage)
}

pub fn deal_stage_bucket(stage: Option<&str>) -> &'static str {
    bucket(DEAL_STAGES, stage)
}

pub fn is_closed_won(stage: Option<&str>) -> bool {
    deal_stage_bucket(stage) == CLOSED_WON_STAGE
}

pub fn is_customer(stage: Option<&str>) -> bool {
    lifecycle_bucket(stage) == CUSTOMER_STAGE
}
