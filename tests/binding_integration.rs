mod helpers;

use axum::http::StatusCode;

use helpers::ADMIN;

#[tokio::test]
async fn attach_is_additive_without_dedup() {
    let app = helpers::test_app();
    let id = helpers::add_project(&app.router, "api", "master").await;
    let path = format!("/api/projects/{id}/servers");

    for _ in 0..2 {
        let (status, body) = helpers::post_json(
            &app.router,
            ADMIN,
            &path,
            serde_json::json!({ "serverIds": [4] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    }

    let (_, servers) = helpers::get_json(&app.router, ADMIN, &path).await;
    assert_eq!(servers["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_attach_changes_nothing() {
    let app = helpers::test_app();
    let id = helpers::add_project(&app.router, "api", "master").await;

    let (status, body) = helpers::post_json(
        &app.router,
        ADMIN,
        &format!("/api/projects/{id}/users"),
        serde_json::json!({ "userIds": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    let (_, users) =
        helpers::get_json(&app.router, ADMIN, &format!("/api/projects/{id}/users")).await;
    assert!(users["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn attach_to_missing_project_not_found() {
    let app = helpers::test_app();
    let (status, body) = helpers::post_json(
        &app.router,
        ADMIN,
        "/api/projects/404/servers",
        serde_json::json!({ "serverIds": [1] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn detach_removes_exactly_one_binding() {
    let app = helpers::test_app();
    let id = helpers::add_project(&app.router, "api", "master").await;
    let (_, attached) = helpers::post_json(
        &app.router,
        ADMIN,
        &format!("/api/projects/{id}/servers"),
        serde_json::json!({ "serverIds": [1, 2, 3] }),
    )
    .await;
    let binding_id = attached["data"]["items"][1]["id"].as_i64().unwrap();

    let (status, _) =
        helpers::delete_json(&app.router, ADMIN, &format!("/api/project-servers/{binding_id}"))
            .await;
    assert_eq!(status, StatusCode::OK);

    let (_, servers) =
        helpers::get_json(&app.router, ADMIN, &format!("/api/projects/{id}/servers")).await;
    let remaining: Vec<i64> = servers["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["serverId"].as_i64().unwrap())
        .collect();
    assert_eq!(remaining, [1, 3]);
}

#[tokio::test]
async fn detach_unknown_binding_not_found_and_others_untouched() {
    let app = helpers::test_app();
    let id = helpers::add_project(&app.router, "api", "master").await;
    helpers::post_json(
        &app.router,
        ADMIN,
        &format!("/api/projects/{id}/users"),
        serde_json::json!({ "userIds": [7, 8] }),
    )
    .await;

    let (status, body) =
        helpers::delete_json(&app.router, ADMIN, "/api/project-users/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1);

    let (status, _) =
        helpers::delete_json(&app.router, ADMIN, "/api/project-servers/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, users) =
        helpers::get_json(&app.router, ADMIN, &format!("/api/projects/{id}/users")).await;
    assert_eq!(users["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bindings_of_missing_project_not_found() {
    let app = helpers::test_app();
    let (status, _) = helpers::get_json(&app.router, ADMIN, "/api/projects/77/users").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attach_with_wrong_id_type_gets_deny_envelope() {
    let app = helpers::test_app();
    let id = helpers::add_project(&app.router, "api", "master").await;

    let (status, body) = helpers::post_json(
        &app.router,
        ADMIN,
        &format!("/api/projects/{id}/users"),
        serde_json::json!({ "userIds": ["seven"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);

    let (status, body) = helpers::delete_json(&app.router, ADMIN, "/api/project-users/x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
}
