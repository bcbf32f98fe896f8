//! Integration tests for the two instance search shapes.

mod common;

use chrono::Duration;
use common::builders::{start_request, DescriptionBuilder};
use common::{actor_identity, grid_access_provider, TestContext, HOST_NAME};
use process_manager::database::{ActorActivitySearch, OrchestrationInstanceSearch};
use process_manager::models::{ActorNumber, ActorRole, OrchestrationDescription};
use process_manager::state_machine::{
    OrchestrationInstanceLifecycleState, OrchestrationInstanceTerminationState,
};

async fn register(context: &TestContext, description: &OrchestrationDescription) {
    context
        .register(false)
        .register_or_update(description, HOST_NAME)
        .await
        .unwrap();
}

fn brs_021() -> OrchestrationDescription {
    DescriptionBuilder::new("BRS_021_ForwardMeteredData")
        .schedulable()
        .with_step("Validate metered data")
        .build()
}

#[tokio::test]
async fn test_activity_window_matches_queued_or_scheduled_time() {
    let context = TestContext::new();
    let description = brs_021();
    register(&context, &description).await;
    let manager = context.manager();
    let window_start = context.clock_now();

    let queued = manager
        .start_new_orchestration_instance(start_request(&description, grid_access_provider()))
        .await
        .unwrap();
    let scheduled = manager
        .schedule_new_orchestration_instance(
            start_request(&description, grid_access_provider()),
            window_start + Duration::minutes(1),
        )
        .await
        .unwrap();
    let outside = manager
        .schedule_new_orchestration_instance(
            start_request(&description, grid_access_provider()),
            window_start + Duration::minutes(10),
        )
        .await
        .unwrap();

    let criteria = ActorActivitySearch::new(
        [description.unique_name().name()],
        window_start,
        window_start + Duration::minutes(2),
    );
    let found: Vec<_> = context
        .repository()
        .search_actor_activity(&criteria)
        .await
        .unwrap()
        .iter()
        .map(|instance| instance.id())
        .collect();

    assert_eq!(found.len(), 2);
    assert!(found.contains(&queued));
    assert!(found.contains(&scheduled));
    assert!(!found.contains(&outside));
}

#[tokio::test]
async fn test_activity_search_filters_by_creating_actor() {
    let context = TestContext::new();
    let description = brs_021();
    register(&context, &description).await;
    let manager = context.manager();
    let supplier = actor_identity("5790000000002", ActorRole::EnergySupplier);

    let by_grid_access_provider = manager
        .start_new_orchestration_instance(start_request(&description, grid_access_provider()))
        .await
        .unwrap();
    manager
        .start_new_orchestration_instance(start_request(&description, supplier))
        .await
        .unwrap();

    let criteria = ActorActivitySearch::new(
        [description.unique_name().name()],
        context.clock_now() - Duration::minutes(1),
        context.clock_now() + Duration::minutes(1),
    )
    .with_created_by_actor_number(ActorNumber::new("5790000000001").unwrap())
    .with_created_by_actor_role(ActorRole::GridAccessProvider);

    let found = context
        .repository()
        .search_actor_activity(&criteria)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), by_grid_access_provider);
}

#[tokio::test]
async fn test_search_combines_filters_conjunctively() {
    let context = TestContext::new();
    let description = brs_021();
    let other = DescriptionBuilder::new("BRS_026").with_step("Validate").build();
    register(&context, &description).await;
    register(&context, &other).await;
    let manager = context.manager();
    let progress = context.progress();

    let succeeded = manager
        .start_new_orchestration_instance(start_request(&description, grid_access_provider()))
        .await
        .unwrap();
    progress.start_instance_if_queued(succeeded).await.unwrap();
    context.clock.advance(Duration::minutes(5));
    progress
        .terminate_instance_and_commit(succeeded, OrchestrationInstanceTerminationState::Succeeded)
        .await
        .unwrap();

    let running = manager
        .start_new_orchestration_instance(start_request(&description, grid_access_provider()))
        .await
        .unwrap();
    progress.start_instance_if_queued(running).await.unwrap();

    manager
        .start_new_orchestration_instance(start_request(&other, grid_access_provider()))
        .await
        .unwrap();

    let repository = context.repository();
    let by_name = repository
        .search(&OrchestrationInstanceSearch::new(description.unique_name().name()))
        .await
        .unwrap();
    assert_eq!(by_name.len(), 2);

    let terminated = repository
        .search(
            &OrchestrationInstanceSearch::new(description.unique_name().name())
                .with_version(1)
                .with_lifecycle_states([OrchestrationInstanceLifecycleState::Terminated])
                .with_termination_state(OrchestrationInstanceTerminationState::Succeeded),
        )
        .await
        .unwrap();
    assert_eq!(terminated.len(), 1);
    assert_eq!(terminated[0].id(), succeeded);

    let terminated_early = repository
        .search(
            &OrchestrationInstanceSearch::new(description.unique_name().name())
                .with_terminated_at_or_earlier(context.clock_now() - Duration::minutes(1)),
        )
        .await
        .unwrap();
    assert!(terminated_early.is_empty());

    let started_late = repository
        .search(
            &OrchestrationInstanceSearch::new(description.unique_name().name())
                .with_started_at_or_later(context.clock_now()),
        )
        .await
        .unwrap();
    assert_eq!(started_late.len(), 1);
    assert_eq!(started_late[0].id(), running);

    let wrong_version = repository
        .search(&OrchestrationInstanceSearch::new(description.unique_name().name()).with_version(2))
        .await
        .unwrap();
    assert!(wrong_version.is_empty());
}
