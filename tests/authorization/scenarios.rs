//! The role and ownership scenarios every deployment must satisfy.

use racine::Role;
use serde_json::json;

use super::harness::App;

#[tokio::test]
async fn viewer_lists_only_owned_and_cannot_create() {
    let app = App::start().await;
    let owner = app.user("owner", &[Role::Admin]).await;
    let viewer = app.user("viewer", &[Role::Viewer]).await;
    app.tree(&owner, "Someone else's").await;

    let list = app.get("/api/trees", &viewer).await;
    assert_eq!(list.status, 200);
    assert_eq!(list.len(), 0);

    let create = app.post("/api/trees", &viewer, json!({ "name": "Mine" })).await;
    assert_eq!(create.status, 403);
    assert_eq!(create.error(), "Forbidden: role does not permit create");

    app.shutdown().await;
}

#[tokio::test]
async fn editor_creates_but_cannot_delete_own_tree() {
    let app = App::start().await;
    let editor = app.user("editor", &[Role::Editor]).await;

    let created = app
        .post("/api/trees", &editor, json!({ "name": "Doe" }))
        .await;
    assert_eq!(created.status, 201);
    assert_eq!(created.body["created_by"], editor.id.to_string());

    let path = format!("/api/trees/{}", created.id());
    let deleted = app.delete(&path, &editor).await;
    assert_eq!(deleted.status, 403);
    assert_eq!(deleted.error(), "Forbidden: role does not permit delete");

    assert_eq!(app.get(&path, &editor).await.status, 200);
    app.shutdown().await;
}

#[tokio::test]
async fn admin_deletes_own_tree() {
    let app = App::start().await;
    let admin = app.user("admin", &[Role::Admin]).await;
    let tree = app.tree(&admin, "Doe").await;

    let path = format!("/api/trees/{tree}");
    let deleted = app.delete(&path, &admin).await;
    assert_eq!(deleted.status, 204);
    assert_eq!(app.get(&path, &admin).await.status, 404);

    app.shutdown().await;
}

#[tokio::test]
async fn non_owner_is_denied_whatever_the_role() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Admin]).await;
    let bob = app.user("bob", &[Role::Admin]).await;
    let tree = app.tree(&alice, "Alice's").await;
    let path = format!("/api/trees/{tree}");

    let detail = app.get(&path, &bob).await;
    let patch = app.patch(&path, &bob, json!({ "name": "Bob's now" })).await;
    let delete = app.delete(&path, &bob).await;
    for reply in [&detail, &patch, &delete] {
        assert_eq!(reply.status, 403, "{reply:?}");
        assert_eq!(reply.error(), "Forbidden: not the owner of this tree");
    }

    let still = app.get(&path, &alice).await;
    assert_eq!(still.body["name"], "Alice's");
    app.shutdown().await;
}

#[tokio::test]
async fn staff_without_roles_deletes_anything() {
    let app = App::start().await;
    let alice = app.user("alice", &[Role::Editor]).await;
    let root = app.staff("root").await;
    let tree = app.tree(&alice, "Alice's").await;

    let deleted = app.delete(&format!("/api/trees/{tree}"), &root).await;
    assert_eq!(deleted.status, 204);
    assert_eq!(app.get("/api/trees", &alice).await.len(), 0);

    app.shutdown().await;
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let app = App::start().await;
    for (method, path) in [
        ("GET", "/api/trees"),
        ("POST", "/api/trees"),
        ("GET", "/api/members"),
        ("GET", "/api/notifications"),
        ("GET", "/api/auth/me"),
    ] {
        let reply = app.request(method, path, None, None).await;
        assert_eq!(reply.status, 401, "{method} {path}: {reply:?}");
    }
    app.shutdown().await;
}

#[tokio::test]
async fn role_less_user_gets_editor_actions() {
    let app = App::start().await;
    let plain = app.user("plain", &[]).await;

    let tree = app.tree(&plain, "Default").await;
    let path = format!("/api/trees/{tree}");
    let renamed = app.patch(&path, &plain, json!({ "name": "Renamed" })).await;
    assert_eq!(renamed.status, 200);

    assert_eq!(app.delete(&path, &plain).await.status, 403);
    app.shutdown().await;
}

#[tokio::test]
async fn roles_combine_as_a_union() {
    let app = App::start().await;
    let both = app.user("both", &[Role::Viewer, Role::Admin]).await;
    let tree = app.tree(&both, "Union").await;

    let deleted = app.delete(&format!("/api/trees/{tree}"), &both).await;
    assert_eq!(deleted.status, 204);
    app.shutdown().await;
}
