//! Registries, typed registrations and payload conversion at the workflow edge.

use std::collections::HashMap;

use duroflow::error::ConversionDirection;
use duroflow::{
    ActivityOptions, ActivityRegistry, Payload, RegistryError, WorkflowError, WorkflowRegistry,
};

mod common;
use common::*;

fn shared_activities() -> ActivityRegistry {
    ActivityRegistry::builder()
        .register_typed("Greet", |_ctx, name: String| async move { Ok(format!("hello {name}")) })
        .register_typed("Add", |_ctx, (a, b): (i64, i64)| async move { Ok(a + b) })
        .build()
}

#[tokio::test]
async fn typed_workflow_and_activities_round_trip_values() {
    let workflows = WorkflowRegistry::builder()
        .register_typed("Welcome", |ctx, (name, a, b): (String, i64, i64)| async move {
            let opts = ActivityOptions::default();
            let greeting: String = ctx.execute_activity(&opts, "Greet", (name,)).get().await?;
            let sum: i64 = ctx.execute_activity(&opts, "Add", (a, b)).get().await?;
            Ok(format!("{greeting} #{sum}"))
        })
        .build();

    let mut host = TestHost::new(workflows, shared_activities());
    host.start("Welcome", json(("ada", 2, 3)));
    let result = host.run().await.unwrap();

    assert_eq!(output::<String>(&result), "hello ada #5");
}

#[tokio::test]
async fn unregistered_activity_surfaces_as_activity_failure() {
    let workflows = WorkflowRegistry::builder()
        .register("CallsGhost", |ctx, _input| async move {
            ctx.execute_activity(&ActivityOptions::default(), "Ghost", ()).result().await
        })
        .build();

    let mut host = TestHost::new(workflows, shared_activities());
    host.start("CallsGhost", Payload::empty());
    let result = host.run().await.unwrap();

    match result.output {
        Some(Err(WorkflowError::Activity { name, event_id, message })) => {
            assert_eq!(name, "Ghost");
            assert_eq!(event_id, 0);
            assert_eq!(message, "activity 'Ghost' is not registered");
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn unconvertible_arguments_produce_no_command() {
    let workflows = WorkflowRegistry::builder()
        .register("BadArgs", |ctx, _input| async move {
            let mut by_pair = HashMap::new();
            by_pair.insert((1, 2), 3);
            ctx.execute_activity(&ActivityOptions::default(), "Add", (by_pair,))
                .result()
                .await
        })
        .build();

    let result = replay(&workflows, vec![started("BadArgs", ())]).unwrap();

    assert!(result.commands.is_empty());
    match result.output {
        Some(Err(WorkflowError::Conversion { operation, source })) => {
            assert_eq!(operation, "execute_activity");
            assert_eq!(source.direction, ConversionDirection::ToPayload);
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn undecodable_workflow_input_fails_the_workflow() {
    let workflows = WorkflowRegistry::builder()
        .register_typed("Typed", |_ctx, n: i64| async move { Ok(n) })
        .build();

    let result = replay(&workflows, vec![started("Typed", "not a number")]).unwrap();

    assert!(result.completed);
    assert!(matches!(
        result.output,
        Some(Err(WorkflowError::Conversion {
            operation: "decode_input",
            ..
        }))
    ));
}

#[test]
fn application_errors_are_workflow_output() {
    let workflows = WorkflowRegistry::builder()
        .register_typed("Refuses", |_ctx, _: ()| async move {
            Err::<(), _>(WorkflowError::application("order rejected"))
        })
        .build();

    let result = replay(&workflows, vec![started("Refuses", ())]).unwrap();

    assert_eq!(
        result.output,
        Some(Err(WorkflowError::Application("order rejected".to_string())))
    );
}

#[test]
fn registries_compose_through_merge() {
    let extra = ActivityRegistry::builder()
        .register("Ping", |_ctx, _inputs| async { Ok(Payload::empty()) })
        .build();
    let merged = ActivityRegistry::builder_from(&shared_activities())
        .merge(extra.clone())
        .build_result()
        .unwrap();
    assert_eq!(merged.names(), vec!["Add", "Greet", "Ping"]);

    let conflict = ActivityRegistry::builder_from(&merged).merge(extra).build_result();
    assert_eq!(
        conflict.err(),
        Some(RegistryError::Registration("duplicate activity in merge: Ping".to_string()))
    );
}
