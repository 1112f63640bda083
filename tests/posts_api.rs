mod common;

use axum::http::{Method, StatusCode, header};
use blog_backend::cache::KeyValueStore;
use common::{MultipartBody, TestApp};
use serde_json::Value;

fn titles(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn seven_posts_split_across_two_pages_newest_first() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    for i in 1..=7 {
        app.seed_post(&author, &format!("Post number {}", i)).await;
    }

    let first = app.get("/api/posts?page=1&pageSize=6", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(titles(&first.body).len(), 6);
    assert_eq!(titles(&first.body)[0], "Post number 7");
    assert_eq!(first.body["pagination"]["total"], 7);
    assert_eq!(first.body["pagination"]["totalPages"], 2);
    assert_eq!(first.body["pagination"]["currentPage"], 1);
    assert!(first.body.get("user").is_none());

    let second = app.get("/api/posts?page=2&pageSize=6", None).await;
    assert_eq!(titles(&second.body), vec!["Post number 1"]);
    assert_eq!(second.body["pagination"]["currentPage"], 2);
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    app.seed_post(&author, "Cached post").await;

    let first = app.get("/api/posts?page=1&pageSize=6", None).await;
    let reads = app.posts.read_count();
    let second = app.get("/api/posts?page=1&pageSize=6", None).await;

    assert_eq!(app.posts.read_count(), reads);
    assert_eq!(first.body, second.body);

    // limit 与 pageSize 指向同一个缓存项
    app.get("/api/posts?page=1&limit=6", None).await;
    assert_eq!(app.posts.read_count(), reads);
}

#[tokio::test]
async fn invalid_paging_params_fall_back_to_defaults() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    app.seed_post(&author, "Only post").await;

    let res = app.get("/api/posts?page=-3&pageSize=abc", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["pagination"]["currentPage"], 1);
    assert_eq!(res.body["pagination"]["totalPages"], 1);

    let res = app.get("/api/posts?page=9", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(titles(&res.body).is_empty());
    assert_eq!(res.body["pagination"]["total"], 1);
}

#[tokio::test]
async fn creating_a_post_invalidates_cached_pages() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    app.seed_post(&author, "Older post").await;

    let before = app.get("/api/posts", None).await;
    assert_eq!(titles(&before.body), vec!["Older post"]);

    let created = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&author.token),
            MultipartBody::post("Brand new post", "Fresh content for the feed"),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["authorId"], author.id.to_string());
    assert!(created.body["imageUrl"].is_null());

    let after = app.get("/api/posts", None).await;
    assert_eq!(titles(&after.body), vec!["Brand new post", "Older post"]);
}

#[tokio::test]
async fn deleting_the_newest_post_shrinks_the_pages() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    let mut newest = None;
    for i in 1..=7 {
        newest = Some(app.seed_post(&author, &format!("Post number {}", i)).await);
    }
    let newest = newest.unwrap();

    let page_two = app.get("/api/posts?page=2&pageSize=6", None).await;
    assert_eq!(titles(&page_two.body).len(), 1);

    let deleted = app
        .delete(&format!("/api/posts/{}", newest.id), Some(&author.token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "Post deleted successfully");

    let page_two = app.get("/api/posts?page=2&pageSize=6", None).await;
    assert!(titles(&page_two.body).is_empty());
    assert_eq!(page_two.body["pagination"]["total"], 6);
    assert_eq!(page_two.body["pagination"]["totalPages"], 1);

    let gone = app.get(&format!("/api/posts/{}", newest.id), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_by_one_author_leave_other_authors_pages_cached() {
    let app = TestApp::new();
    let alice = app.author("alice").await;
    let bob = app.author("bobby").await;
    app.seed_post(&alice, "Alice first").await;
    app.seed_post(&bob, "Bob first").await;

    let mine = app.get("/api/users/me/posts", Some(&alice.token)).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(titles(&mine.body), vec!["Alice first"]);
    assert_eq!(mine.body["user"]["username"], "alice");
    app.get("/api/users/me/posts", Some(&bob.token)).await;
    app.get("/api/posts", None).await;

    let alice_key = format!("blogs:user:{}:page=1:limit=6", alice.id);
    let bob_key = format!("blogs:user:{}:page=1:limit=6", bob.id);
    let public_key = "blogs:public:page=1:limit=6".to_string();
    let keys = app.kv.live_keys().await;
    assert!(keys.contains(&alice_key));
    assert!(keys.contains(&bob_key));
    assert!(keys.contains(&public_key));

    let created = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&alice.token),
            MultipartBody::post("Alice second", "Another long enough body"),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let keys = app.kv.live_keys().await;
    assert!(!keys.contains(&alice_key));
    assert!(!keys.contains(&public_key));
    assert!(keys.contains(&bob_key));

    let mine = app.get("/api/users/me/posts", Some(&alice.token)).await;
    assert_eq!(titles(&mine.body), vec!["Alice second", "Alice first"]);
}

#[tokio::test]
async fn invisible_update_keeps_the_public_feed_cached() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    let post = app.seed_post(&author, "Steady title").await;
    app.get("/api/posts", None).await;

    // 空字段保留原值，可见内容没有变化
    let res = app
        .send_form(
            Method::PATCH,
            &format!("/api/posts/{}", post.id),
            Some(&author.token),
            MultipartBody::new().text("title", "  "),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["title"], "Steady title");

    let keys = app.kv.live_keys().await;
    assert!(keys.contains(&"blogs:public:page=1:limit=6".to_string()));

    let res = app
        .send_form(
            Method::PATCH,
            &format!("/api/posts/{}", post.id),
            Some(&author.token),
            MultipartBody::new().text("title", "Edited title"),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["content"], post.content);

    let feed = app.get("/api/posts", None).await;
    assert_eq!(titles(&feed.body), vec!["Edited title"]);
}

#[tokio::test]
async fn image_uploads_are_stored_and_replaced() {
    let app = TestApp::new();
    let author = app.author("writer").await;

    let created = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&author.token),
            MultipartBody::post("Post with image", "Look at this picture")
                .file("image", "cover.png", "image/png", b"\x89PNG fake"),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let first_url = created.body["imageUrl"].as_str().unwrap().to_string();
    assert!(first_url.ends_with(".png"));
    assert_eq!(app.images.object_names().await.len(), 1);

    let id = created.body["id"].as_str().unwrap().to_string();
    let updated = app
        .send_form(
            Method::PATCH,
            &format!("/api/posts/{}", id),
            Some(&author.token),
            MultipartBody::new().file("image", "new.jpg", "image/jpeg", b"jpeg bytes"),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let names = app.images.object_names().await;
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".jpg"));
    assert_ne!(updated.body["imageUrl"], first_url.as_str());

    app.delete(&format!("/api/posts/{}", id), Some(&author.token))
        .await;
    assert!(app.images.object_names().await.is_empty());
}

#[tokio::test]
async fn empty_file_part_counts_as_no_image() {
    let app = TestApp::new();
    let author = app.author("writer").await;

    let created = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&author.token),
            MultipartBody::post("No picture here", "Text only post body")
                .file("image", "", "application/octet-stream", b""),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(created.body["imageUrl"].is_null());
    assert!(app.images.object_names().await.is_empty());
}

#[tokio::test]
async fn invalid_posts_are_rejected_with_field_errors() {
    let app = TestApp::new();
    let author = app.author("writer").await;

    let res = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&author.token),
            MultipartBody::post("Hi", "<b>bold</b> content")
                .file("image", "doc.pdf", "application/pdf", b"%PDF"),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], 1000);
    assert!(res.body["errors"]["title"].is_string());
    assert!(res.body["errors"]["content"].is_string());
    assert!(res.body["errors"]["image"].is_string());
    assert!(app.images.object_names().await.is_empty());
    assert_eq!(app.posts.read_count(), 0);
}

#[tokio::test]
async fn writes_require_a_valid_session() {
    let app = TestApp::new();

    let res = app
        .send_form(
            Method::POST,
            "/api/posts",
            None,
            MultipartBody::post("Anonymous post", "Should never be stored"),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], 1002);

    let res = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some("not-a-jwt"),
            MultipartBody::post("Forged post", "Should never be stored"),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/api/users/me/posts", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn own_posts_need_an_existing_account() {
    let app = TestApp::new();
    let ghost = uuid::Uuid::new_v4();
    let (token, _) =
        blog_backend::utils::generate_token(ghost, "ghost@example.com", &app.config).unwrap();

    let res = app.get("/api/users/me/posts", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], 1002);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    app.seed_post(&author, "Cookie post").await;

    let request = axum::http::Request::builder()
        .uri("/api/users/me/posts")
        .header(header::COOKIE, format!("theme=dark; token={}", author.token))
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(titles(&res.body), vec!["Cookie post"]);
}

#[tokio::test]
async fn only_the_author_may_change_a_post() {
    let app = TestApp::new();
    let owner = app.author("owner").await;
    let intruder = app.author("intruder").await;
    let post = app.seed_post(&owner, "Owned post").await;

    let res = app
        .send_form(
            Method::PATCH,
            &format!("/api/posts/{}", post.id),
            Some(&intruder.token),
            MultipartBody::new().text("title", "Hijacked title"),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], 1003);

    let res = app
        .delete(&format!("/api/posts/{}", post.id), Some(&intruder.token))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get(&format!("/api/posts/{}", post.id), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["title"], "Owned post");
}

#[tokio::test]
async fn unknown_posts_return_not_found() {
    let app = TestApp::new();
    let author = app.author("writer").await;

    let res = app
        .get(&format!("/api/posts/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["code"], 1004);

    let res = app.get("/api/posts/not-a-uuid", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .delete(
            &format!("/api/posts/{}", uuid::Uuid::new_v4()),
            Some(&author.token),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn database_outage_surfaces_as_internal_error() {
    let app = TestApp::new();
    app.posts.set_offline(true);

    let res = app.get("/api/posts", None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["code"], 5000);
    assert_eq!(res.body["message"], "Internal server error");
}

#[tokio::test]
async fn cache_outage_falls_back_to_the_database() {
    let app = TestApp::new();
    let author = app.author("writer").await;
    app.seed_post(&author, "Still readable").await;
    app.kv.set_offline(true);

    let res = app.get("/api/posts", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(titles(&res.body), vec!["Still readable"]);

    let res = app
        .send_form(
            Method::POST,
            "/api/posts",
            Some(&author.token),
            MultipartBody::post("Written offline", "Cache is down but writes work"),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    app.kv.set_offline(false);
    assert!(app.kv.get("blogs:public:page=1:limit=6").await.unwrap().is_none());
}

#[tokio::test]
async fn requests_over_the_limit_are_throttled() {
    let mut config = common::test_config();
    config.rate_limit_requests = 2;
    let app = TestApp::with_config(config);

    assert_eq!(app.get("/api/posts", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/api/posts", None).await.status, StatusCode::OK);
    let res = app.get("/api/posts", None).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["code"], 1005);
}
