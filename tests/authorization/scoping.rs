//! List endpoints only return records owned by the caller.

use racine::Role;
use serde_json::json;

use super::harness::App;

#[tokio::test]
async fn each_resource_list_is_scoped_to_its_owner() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Editor]).await;
    let bob = app.user("bob", &[Role::Editor]).await;

    let tree = app.tree(&alice, "Alice's").await;
    let member = app.member(&alice, &tree, "Ann").await;
    let update = app
        .post(
            "/api/updates",
            &alice,
            json!({ "member": member, "content": "Born" }),
        )
        .await;
    assert_eq!(update.status, 201, "{update:?}");
    let event = app
        .post(
            "/api/historyevents",
            &alice,
            json!({ "member": member, "event_type": "Birth", "date": "1990-05-01" }),
        )
        .await;
    assert_eq!(event.status, 201, "{event:?}");
    let profile = app
        .post("/api/userprofiles", &alice, json!({ "nickname": "Al" }))
        .await;
    assert_eq!(profile.status, 201, "{profile:?}");

    for path in [
        "/api/trees",
        "/api/members",
        "/api/updates",
        "/api/historyevents",
        "/api/notifications",
        "/api/userprofiles",
    ] {
        let mine = app.get(path, &alice).await;
        assert_eq!(mine.status, 200, "{path}");
        assert_eq!(mine.len(), 1, "{path}: {mine:?}");

        let theirs = app.get(path, &bob).await;
        assert_eq!(theirs.status, 200, "{path}");
        assert_eq!(theirs.len(), 0, "{path}: {theirs:?}");
    }

    app.shutdown().await;
}

#[tokio::test]
async fn staff_lists_everything() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Editor]).await;
    let bob = app.user("bob", &[Role::Editor]).await;
    let root = app.staff("root").await;
    app.tree(&alice, "A").await;
    app.tree(&bob, "B").await;

    assert_eq!(app.get("/api/trees", &root).await.len(), 2);
    app.shutdown().await;
}

#[tokio::test]
async fn search_and_ordering_apply_within_scope() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Editor]).await;
    let bob = app.user("bob", &[Role::Editor]).await;
    app.tree(&alice, "Windsor").await;
    app.tree(&alice, "Bourbon").await;
    app.tree(&bob, "Bonaparte").await;

    let found = app.get("/api/trees?search=bo", &alice).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found.body[0]["name"], "Bourbon");
    assert_eq!(app.get("/api/trees?search=_", &alice).await.len(), 0);
    assert_eq!(app.get("/api/trees?search=%25", &alice).await.len(), 0);

    let ordered = app.get("/api/trees?ordering=-name", &alice).await;
    let names: Vec<&str> = ordered
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, ["Windsor", "Bourbon"]);

    let bad = app.get("/api/trees?ordering=created_by", &alice).await;
    assert_eq!(bad.status, 400);

    app.shutdown().await;
}

#[tokio::test]
async fn tree_members_route_checks_the_tree() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Editor]).await;
    let bob = app.user("bob", &[Role::Editor]).await;
    let tree = app.tree(&alice, "Alice's").await;
    app.member(&alice, &tree, "Ann").await;
    app.member(&alice, &tree, "Abe").await;

    let path = format!("/api/trees/{tree}/members");
    let mine = app.get(&path, &alice).await;
    assert_eq!(mine.status, 200);
    assert_eq!(mine.len(), 2);

    let theirs = app.get(&path, &bob).await;
    assert_eq!(theirs.status, 403);

    app.shutdown().await;
}
