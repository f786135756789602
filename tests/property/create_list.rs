//! Property tests for the in-memory task service.
//!
//! Uses proptest to verify:
//! 1. Creating a task and listing the owner's tasks yields the trimmed text,
//!    not completed, owned by that owner.
//! 2. Blank text is always rejected and never stored.
//! 3. Listing never returns another owner's tasks.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use tasklist::service::memory::InMemoryTaskService;
use tasklist::service::{ServiceError, TaskService};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Text with at least one non-whitespace character, padded with whitespace.
fn arb_padded_text() -> impl Strategy<Value = (String, String)> {
    ("[ \t]{0,4}", "[a-zA-Z0-9][a-zA-Z0-9 ]{0,40}", "[ \t\n]{0,4}").prop_map(
        |(lead, body, trail)| {
            let raw = format!("{lead}{body}{trail}");
            let trimmed = raw.trim().to_string();
            (raw, trimmed)
        },
    )
}

fn arb_owner() -> impl Strategy<Value = String> {
    "u-[a-z0-9]{1,12}"
}

proptest! {
    #[test]
    fn create_then_list_contains_trimmed_text(
        owner in arb_owner(),
        (raw, trimmed) in arb_padded_text(),
    ) {
        let rt = runtime();
        let service = InMemoryTaskService::new();
        let id = rt.block_on(service.create(&owner, &raw)).unwrap();
        let tasks = rt.block_on(service.list_for_owner(&owner)).unwrap();

        let task = tasks.iter().find(|t| t.id == id).unwrap();
        prop_assert_eq!(&task.text, &trimmed);
        prop_assert!(!task.completed);
        prop_assert_eq!(&task.owner_id, &owner);
    }

    #[test]
    fn blank_text_is_rejected(owner in arb_owner(), blank in "[ \t\n]{0,8}") {
        let rt = runtime();
        let service = InMemoryTaskService::new();
        let result = rt.block_on(service.create(&owner, &blank));
        prop_assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
        prop_assert!(rt.block_on(service.list_for_owner(&owner)).unwrap().is_empty());
    }

    #[test]
    fn list_is_scoped_to_owner(
        texts in prop::collection::vec(("[ab]", arb_padded_text()), 1..12),
    ) {
        let rt = runtime();
        let service = InMemoryTaskService::new();
        for (who, (raw, _)) in &texts {
            rt.block_on(service.create(&format!("u-{who}"), raw)).unwrap();
        }

        for who in ["a", "b"] {
            let owner = format!("u-{who}");
            let tasks = rt.block_on(service.list_for_owner(&owner)).unwrap();
            let expected = texts.iter().filter(|(w, _)| w == who).count();
            prop_assert_eq!(tasks.len(), expected);
            prop_assert!(tasks.iter().all(|t| t.owner_id == owner));
            prop_assert!(tasks.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        }
    }
}
