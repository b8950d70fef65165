//! Cross-module workflow invariants exercised through the public API of
//! the library: request/quote/job state rules, room keys and tier math.

use uuid::Uuid;

use tecnicoya_backend::domain::jobs::{JobStatus, TransitionActor};
use tecnicoya_backend::domain::memberships::{effective_radius_km, MembershipTier};
use tecnicoya_backend::domain::messages::{direct_room_key, job_room_key, user_room_key};
use tecnicoya_backend::domain::quotes::{LineItem, SubmitQuoteRequest};
use tecnicoya_backend::domain::requests::RequestStatus;
use tecnicoya_backend::services::matching::haversine_km;

#[test]
fn request_quote_window_closes_on_acceptance() {
    // pending and quoted accept quotes, acceptance closes the window
    assert!(RequestStatus::Pending.accepts_quotes());
    assert!(RequestStatus::Quoted.accepts_quotes());
    assert!(!RequestStatus::Accepted.accepts_quotes());
    assert!(!RequestStatus::InProgress.accepts_quotes());
    assert!(!RequestStatus::Completed.accepts_quotes());
    assert!(!RequestStatus::Cancelled.accepts_quotes());
}

#[test]
fn job_happy_path_alternates_actors() {
    // technician drives the work, client confirms completion
    assert_eq!(
        JobStatus::transition_actor(JobStatus::Scheduled, JobStatus::EnRoute),
        Some(TransitionActor::Technician)
    );
    assert_eq!(
        JobStatus::transition_actor(JobStatus::EnRoute, JobStatus::InProgress),
        Some(TransitionActor::Technician)
    );
    assert_eq!(
        JobStatus::transition_actor(JobStatus::InProgress, JobStatus::Completed),
        Some(TransitionActor::Client)
    );
}

#[test]
fn repeated_completion_is_not_a_valid_edge() {
    // a second completion signal must surface as a conflict, not a replay
    assert!(JobStatus::transition_actor(JobStatus::Completed, JobStatus::Completed).is_none());
}

#[test]
fn work_in_progress_cannot_be_cancelled() {
    assert!(JobStatus::transition_actor(JobStatus::InProgress, JobStatus::Cancelled).is_none());
    // disputing is the escape hatch once work started
    assert!(JobStatus::transition_actor(JobStatus::InProgress, JobStatus::Disputed).is_some());
}

#[test]
fn request_cancellation_window_matches_job_cancel_edges() {
    // While the request is still cancellable the job can be at most
    // scheduled or en_route, both of which the cancel sweep covers.
    assert!(RequestStatus::Accepted.cancellable());
    assert!(JobStatus::transition_actor(JobStatus::Scheduled, JobStatus::Cancelled).is_some());
    assert!(JobStatus::transition_actor(JobStatus::EnRoute, JobStatus::Cancelled).is_some());

    // Once work starts the request can no longer swerve to cancelled while
    // the client drives the job to completed; the two machines agree.
    assert!(!RequestStatus::InProgress.cancellable());
    assert!(JobStatus::transition_actor(JobStatus::InProgress, JobStatus::Completed).is_some());
    assert!(JobStatus::transition_actor(JobStatus::InProgress, JobStatus::Cancelled).is_none());
}

#[test]
fn quote_total_is_the_sum_of_line_items() {
    let quote = SubmitQuoteRequest {
        line_items: vec![
            LineItem {
                description: "Parts".to_string(),
                amount_cents: 12_000,
            },
            LineItem {
                description: "Labour".to_string(),
                amount_cents: 25_000,
            },
        ],
        estimated_hours: 3.5,
        warranty_days: Some(90),
        notes: None,
    };
    assert!(quote.validate().is_ok());
    assert_eq!(quote.total_cents(), 37_000);
}

#[test]
fn room_keys_are_stable_and_distinct() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let job = Uuid::new_v4();

    assert_eq!(direct_room_key(a, b), direct_room_key(b, a));
    assert_ne!(direct_room_key(a, b), user_room_key(a));
    assert_ne!(job_room_key(job), user_room_key(job));
    assert!(job_room_key(job).starts_with("job:"));
    assert!(user_room_key(a).starts_with("user:"));
}

#[test]
fn membership_bonus_feeds_effective_radius() {
    let base = 8.0;
    assert_eq!(effective_radius_km(base, MembershipTier::Free), 8.0);
    assert_eq!(effective_radius_km(base, MembershipTier::Plus), 13.0);
    assert_eq!(effective_radius_km(base, MembershipTier::Pro), 23.0);
}

#[test]
fn pro_radius_covers_points_free_does_not() {
    // Two points roughly 14 km apart in Lima
    let (tech_lat, tech_lng) = (-12.0464, -77.0428);
    let (req_lat, req_lng) = (-12.0667, -77.1536);
    let distance = haversine_km(tech_lat, tech_lng, req_lat, req_lng);

    let base = 10.0;
    assert!(distance > effective_radius_km(base, MembershipTier::Free));
    assert!(distance < effective_radius_km(base, MembershipTier::Pro));
}
