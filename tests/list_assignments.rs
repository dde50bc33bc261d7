pub mod common;

use assignment_review::api::{self, user::Role};

#[tokio::test]
async fn lists_newest_first() {
    let (admin, admin_email) = common::account(Role::Admin, "Alice").await;
    let (user, _) = common::account(Role::User, "Bob").await;
    let admin_id = user.admin_id(&admin_email).await.to_string();

    for task in ["Task number 1", "Task number 2", "Task number 3"] {
        user.upload(task, &admin_id).await.unwrap();
    }
    let accepted = admin.admin_assignments().await.unwrap()[1].id;
    admin.accept(accepted).await.unwrap();

    let assignments = admin.admin_assignments().await.unwrap();
    match assignments.as_slice() {
        [first, second, third] => {
            assert_eq!(first.task, "Task number 3");
            assert_eq!(first.status, api::assignment::Status::Pending);
            assert_eq!(first.user.name, "Bob");
            assert_eq!(first.admin.name, "Alice");

            assert_eq!(second.id, accepted);
            assert_eq!(second.task, "Task number 2");
            assert_eq!(second.status, api::assignment::Status::Accepted);

            assert_eq!(third.task, "Task number 1");
            assert_eq!(third.status, api::assignment::Status::Pending);

            assert!(first.created_at >= second.created_at);
            assert!(second.created_at >= third.created_at);
        }
        found => panic!("expected three assignments, found {found:?}"),
    }
}

#[tokio::test]
async fn lists_only_own_assignments() {
    let (admin, admin_email) = common::account(Role::Admin, "Alice").await;
    let (other, _) = common::account(Role::Admin, "Carol").await;
    let (user, _) = common::account(Role::User, "Bob").await;
    let admin_id = user.admin_id(&admin_email).await;

    user.upload("Write a report", &admin_id.to_string())
        .await
        .unwrap();

    assert_eq!(admin.admin_assignments().await.unwrap().len(), 1);
    assert!(other.admin_assignments().await.unwrap().is_empty());
}

#[tokio::test]
async fn lists_submitted_assignments() {
    let (_, admin_email) = common::account(Role::Admin, "Alice").await;
    let (user, _) = common::account(Role::User, "Bob").await;
    let (stranger, _) = common::account(Role::User, "Dave").await;
    let admin_id = user.admin_id(&admin_email).await.to_string();

    user.upload("First report", &admin_id).await.unwrap();
    user.upload("Second report", &admin_id).await.unwrap();

    let assignments = user.user_assignments().await.unwrap();
    let tasks = assignments
        .iter()
        .map(|assignment| assignment.task.as_str())
        .collect::<Vec<_>>();
    assert_eq!(tasks, ["Second report", "First report"]);
    assert!(assignments
        .iter()
        .all(|assignment| assignment.admin.name == "Alice"));

    assert!(stranger.user_assignments().await.unwrap().is_empty());
}
