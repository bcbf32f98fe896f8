//! Integration tests for scheduled and recurring orchestration instances.

mod common;

use chrono::Duration;
use common::builders::{start_request, DescriptionBuilder};
use common::{grid_access_provider, TestContext, HOST_NAME};
use process_manager::config::SchedulerConfig;
use process_manager::models::{ActorRole, IdempotencyKey, OrchestrationDescription};
use process_manager::orchestration::RecurringInstancePlanner;
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

fn brs_023_027() -> OrchestrationDescription {
    DescriptionBuilder::new("BRS_023_027_Calculation")
        .schedulable()
        .with_step("Calculate")
        .with_skippable_step("Enqueue messages", "Internal calculation")
        .build()
}

#[tokio::test]
async fn test_scheduled_instance_is_dispatched_once_due() {
    let context = TestContext::new();
    let description = brs_023_027();
    register(&context, &description).await;

    let run_at = context.clock_now() + Duration::hours(1);
    let id = context
        .manager()
        .schedule_new_orchestration_instance(
            start_request(&description, grid_access_provider()),
            run_at,
        )
        .await
        .unwrap();
    let dispatcher = context.dispatcher();

    assert!(dispatcher.dispatch_due_instances().await.unwrap().queued.is_empty());
    assert!(context.repository().find_scheduled(run_at).await.unwrap().len() == 1);

    context.clock.set(run_at);
    let summary = dispatcher.dispatch_due_instances().await.unwrap();

    assert_eq!(summary.queued, vec![id]);
    let instance = context.repository().get(id).await.unwrap();
    assert_eq!(instance.lifecycle().state(), OrchestrationInstanceLifecycleState::Queued);
    assert_eq!(instance.lifecycle().queued_at(), Some(run_at));
    assert_eq!(context.engine.started()[0].function_name, description.function_name());
    assert!(context.repository().find_scheduled(run_at).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_canceled_instance_is_never_dispatched() {
    let context = TestContext::new();
    let description = brs_023_027();
    register(&context, &description).await;
    let manager = context.manager();

    let run_at = context.clock_now() + Duration::minutes(30);
    let id = manager
        .schedule_new_orchestration_instance(
            start_request(&description, grid_access_provider()),
            run_at,
        )
        .await
        .unwrap();
    manager
        .cancel_scheduled_orchestration_instance(id, grid_access_provider())
        .await
        .unwrap();

    context.clock.set(run_at + Duration::minutes(1));
    let summary = context.dispatcher().dispatch_due_instances().await.unwrap();

    assert!(summary.queued.is_empty());
    assert!(!context.engine.has_started(id));
    let instance = context.repository().get(id).await.unwrap();
    assert_eq!(
        instance.lifecycle().termination_state(),
        Some(OrchestrationInstanceTerminationState::UserCanceled)
    );
}

#[tokio::test]
async fn test_started_instance_cannot_be_canceled() {
    let context = TestContext::new();
    let description = brs_023_027();
    register(&context, &description).await;
    let manager = context.manager();

    let id = manager
        .start_new_orchestration_instance(start_request(&description, grid_access_provider()))
        .await
        .unwrap();

    let err = manager
        .cancel_scheduled_orchestration_instance(id, grid_access_provider())
        .await
        .unwrap_err();

    assert!(err.is_invalid_operation());
}

#[tokio::test]
async fn test_scheduling_is_idempotent_per_key() {
    let context = TestContext::new();
    let description = brs_023_027();
    register(&context, &description).await;
    let manager = context.manager();
    let request = start_request(&description, grid_access_provider())
        .with_idempotency_key(IdempotencyKey::new("schedule-1").unwrap());
    let run_at = context.clock_now() + Duration::days(1);

    let first = manager
        .schedule_new_orchestration_instance(request.clone(), run_at)
        .await
        .unwrap();
    let second = manager
        .schedule_new_orchestration_instance(request, run_at + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(context.store.instance_count(), 1);
}

#[tokio::test]
async fn test_recurring_descriptions_are_planned_and_dispatched() {
    let context = TestContext::new();
    let description = DescriptionBuilder::new("BRS_045_MissingMeasurementsLog")
        .schedulable()
        .with_step("Find missing measurements")
        .with_cron("0 * * * *")
        .build();
    register(&context, &description).await;

    let planner = RecurringInstancePlanner::from_config(
        context.store(),
        context.clock.clone(),
        &SchedulerConfig {
            recurring_planning_window_hours: 3,
            ..SchedulerConfig::default()
        },
    );
    let planned = planner.plan_recurring_instances().await.unwrap();
    assert_eq!(planned.scheduled.len(), 3);

    let replanned = context.planner(Duration::hours(3)).plan_recurring_instances().await.unwrap();
    assert!(replanned.scheduled.is_empty());
    assert_eq!(replanned.already_planned, 3);

    context.clock.advance(Duration::minutes(90));
    let summary = context.dispatcher().dispatch_due_instances().await.unwrap();
    assert_eq!(summary.queued.len(), 1);

    let instance = context.repository().get(summary.queued[0]).await.unwrap();
    assert_eq!(
        instance.lifecycle().created_by().acting_actor().role,
        ActorRole::DataHubAdministrator
    );
}

#[tokio::test]
async fn test_disabled_recurring_description_is_not_planned() {
    let context = TestContext::new();
    let description = DescriptionBuilder::new("BRS_045_MissingMeasurementsLog")
        .schedulable()
        .with_step("Find missing measurements")
        .with_cron("0 * * * *")
        .build();
    register(&context, &description).await;
    context.register(false).deregister(&description).await.unwrap();

    let planned = context
        .planner(Duration::hours(3))
        .plan_recurring_instances()
        .await
        .unwrap();

    assert!(planned.scheduled.is_empty());
    assert!(planned.failed.is_empty());
}
