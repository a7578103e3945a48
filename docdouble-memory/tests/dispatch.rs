use serde_json::{Value, json};

use docdouble_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::StoreError,
    request::{Request, Response},
};
use docdouble_memory::InMemoryStore;

async fn create(store: &InMemoryStore, class_name: &str, fields: Value) -> String {
    let response = store.dispatch(Request::create(class_name, fields)).await.unwrap();
    assert_eq!(response.status, 201);

    response.body["objectId"].as_str().unwrap().to_string()
}

async fn fetch(store: &InMemoryStore, class_name: &str, object_id: &str) -> Response {
    store.dispatch(Request::get(class_name, object_id)).await.unwrap()
}

async fn find(store: &InMemoryStore, class_name: &str, params: Value) -> Vec<Value> {
    let response = store.dispatch(Request::query(class_name, params)).await.unwrap();
    assert_eq!(response.status, 200);

    response.body["results"].as_array().unwrap().clone()
}

fn pointer(class_name: &str, object_id: &str) -> Value {
    json!({"__type": "Pointer", "className": class_name, "objectId": object_id})
}

#[tokio::test]
async fn created_records_read_back_with_identity() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"name": "lamp", "price": 30, "objectId": "forged"})).await;

    assert_eq!(id.len(), 10);
    assert_ne!(id, "forged");

    let fetched = fetch(&store, "Item", &id).await;
    assert_eq!(fetched.status, 200);

    let mut body = fetched.body.as_object().unwrap().clone();
    assert_eq!(body["createdAt"], body["updatedAt"]);
    assert_eq!(body.remove("objectId"), Some(json!(id)));
    body.remove("createdAt");
    body.remove("updatedAt");
    assert_eq!(Value::Object(body), json!({"name": "lamp", "price": 30}));
}

#[tokio::test]
async fn updates_preserve_identity() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"price": 30})).await;
    let before = fetch(&store, "Item", &id).await.body;

    let updated = store
        .dispatch(Request::update("Item", &id, json!({"price": 25, "createdAt": "1999-01-01T00:00:00.000Z"})))
        .await
        .unwrap();
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["price"], json!(25));
    assert!(updated.body.get("objectId").is_none());
    assert!(updated.body.get("createdAt").is_none());

    let after = fetch(&store, "Item", &id).await.body;
    assert_eq!(after["objectId"], json!(id));
    assert_eq!(after["createdAt"], before["createdAt"]);
    assert!(after["updatedAt"].as_str().unwrap() >= after["createdAt"].as_str().unwrap());
}

#[tokio::test]
async fn missing_records_answer_not_found() {
    let store = InMemoryStore::new();
    let not_found = json!({"code": 101, "error": "Object not found."});

    for request in [
        Request::get("Ghost", "nope"),
        Request::update("Ghost", "nope", json!({"a": 1})),
        Request::delete("Ghost", "nope"),
    ] {
        let response = store.dispatch(request).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, not_found);
    }

    assert!(find(&store, "Ghost", json!({})).await.is_empty());
}

#[tokio::test]
async fn deletes_erase_records() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"price": 1})).await;

    let response = store.dispatch(Request::delete("Item", &id)).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({}));

    assert!(fetch(&store, "Item", &id).await.is_not_found());
}

#[tokio::test]
async fn equality_and_comparisons_select_by_price() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"price": 30})).await;
    create(&store, "Item", json!({"price": 20})).await;

    let exact = find(&store, "Item", json!({"where": {"price": 30}})).await;
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0]["objectId"], json!(id));

    assert!(find(&store, "Item", json!({"where": {"price": 25}})).await.is_empty());
    assert_eq!(find(&store, "Item", json!({"where": {"price": {"$gt": 20}}})).await.len(), 1);
    assert_eq!(find(&store, "Item", json!({"where": {"price": {"$gte": 20}}})).await.len(), 2);
    assert_eq!(find(&store, "Item", json!({"where": {"price": {"$lt": 20}}})).await.len(), 0);
    assert_eq!(find(&store, "Item", json!({"where": {"price": {"$lte": 20}}})).await.len(), 1);
    assert_eq!(find(&store, "Item", json!({"where": {"price": {"$nin": []}}})).await.len(), 2);
    assert_eq!(
        find(&store, "Item", json!({"where": r#"{"price": {"$in": [20, 30]}}"#})).await.len(),
        2
    );
}

#[tokio::test]
async fn or_clauses_and_regexes_combine() {
    let store = InMemoryStore::new();
    create(&store, "Item", json!({"name": "Desk Lamp", "price": 30})).await;
    create(&store, "Item", json!({"name": "chair", "price": 80})).await;
    create(&store, "Item", json!({"name": "table", "price": 120})).await;

    let found = find(
        &store,
        "Item",
        json!({"where": {"$or": [
            {"name": {"$regex": "^desk", "$options": "i"}},
            {"price": {"$gt": 100}},
        ]}}),
    )
    .await;

    let names = found.iter().map(|item| item["name"].clone()).collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Desk Lamp"), json!("table")]);
}

#[tokio::test]
async fn increments_start_from_zero() {
    let store = InMemoryStore::new();
    let id = create(
        &store,
        "Counter",
        json!({"score": 30, "reset": null, "visits": {"__op": "Increment", "amount": 2}}),
    )
    .await;

    store
        .dispatch(Request::update(
            "Counter",
            &id,
            json!({
                "score": {"__op": "Increment", "amount": -5},
                "fresh": {"__op": "Increment", "amount": 3},
                "reset": {"__op": "Increment", "amount": 4},
            }),
        ))
        .await
        .unwrap();

    let counter = fetch(&store, "Counter", &id).await.body;
    assert_eq!(counter["score"], json!(25));
    assert_eq!(counter["fresh"], json!(3));
    assert_eq!(counter["visits"], json!(2));
    assert_eq!(counter["reset"], json!(4));
}

#[tokio::test]
async fn array_operators_follow_list_semantics() {
    let store = InMemoryStore::new();
    let id = create(&store, "Bag", json!({"tags": [1]})).await;

    for op in [
        json!({"tags": {"__op": "Add", "objects": [1, 1]}}),
        json!({"tags": {"__op": "AddUnique", "objects": [1, 2]}}),
    ] {
        store.dispatch(Request::update("Bag", &id, op)).await.unwrap();
    }
    assert_eq!(fetch(&store, "Bag", &id).await.body["tags"], json!([1, 1, 1, 2]));

    store
        .dispatch(Request::update(
            "Bag",
            &id,
            json!({"tags": {"__op": "Remove", "objects": [1]}, "gone": {"__op": "Delete"}}),
        ))
        .await
        .unwrap();
    assert_eq!(fetch(&store, "Bag", &id).await.body["tags"], json!([2]));
}

#[tokio::test]
async fn failed_updates_leave_records_untouched() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"name": "lamp", "tags": "solo"})).await;
    let before = fetch(&store, "Item", &id).await.body;

    let err = store
        .dispatch(Request::update(
            "Item",
            &id,
            json!({"name": "renamed", "price": {"__op": "Frobnicate"}}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownOperator(op) if op == "Frobnicate"));

    let err = store
        .dispatch(Request::update(
            "Item",
            &id,
            json!({"name": "renamed", "tags": {"__op": "Add", "objects": [1]}}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MalformedArrayOp { field } if field == "tags"));

    assert_eq!(fetch(&store, "Item", &id).await.body, before);
}

#[tokio::test]
async fn relation_fields_stay_hidden() {
    let store = InMemoryStore::new();
    let player = create(&store, "Player", json!({"name": "ann"})).await;
    let team = create(&store, "Team", json!({"name": "red"})).await;

    let response = store
        .dispatch(Request::update(
            "Team",
            &team,
            json!({"members": {"__op": "AddRelation", "objects": [pointer("Player", &player)]}}),
        ))
        .await
        .unwrap();
    assert!(response.body.get("members").is_none());

    store
        .dispatch(Request::update("Team", &team, json!({"name": "blue"})))
        .await
        .unwrap();

    let fetched = fetch(&store, "Team", &team).await.body;
    assert_eq!(fetched["name"], json!("blue"));
    assert!(fetched.get("members").is_none());
    assert!(find(&store, "Team", json!({})).await[0].get("members").is_none());

    let related = find(
        &store,
        "Player",
        json!({"where": {"$relatedTo": {"object": pointer("Team", &team), "key": "members"}}}),
    )
    .await;
    assert_eq!(related.len(), 1);
    assert_eq!(related[0]["objectId"], json!(player));
}

#[tokio::test]
async fn redirected_queries_target_the_related_class() {
    let store = InMemoryStore::new();
    let player = create(&store, "Player", json!({"name": "ann"})).await;
    create(&store, "Player", json!({"name": "bob"})).await;
    let team = create(
        &store,
        "Team",
        json!({"members": {"__op": "AddRelation", "objects": [pointer("Player", &player)]}}),
    )
    .await;

    let response = store
        .dispatch(Request::query(
            "Team",
            json!({
                "redirectClassNameForKey": "members",
                "where": {"$relatedTo": {"object": pointer("Team", &team), "key": "members"}},
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.body["className"], json!("Player"));
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], json!("ann"));
}

#[tokio::test]
async fn includes_expand_pointers() {
    let store = InMemoryStore::new();
    let team = create(&store, "Team", json!({"name": "red"})).await;
    let author = create(&store, "Player", json!({"name": "ann", "team": pointer("Team", &team)})).await;
    let post = create(&store, "Post", json!({"author": pointer("Player", &author)})).await;

    let fetched = store
        .dispatch(Request::new(
            docdouble_core::request::Operation::Read,
            "Post",
            Some(post.clone()),
            json!({"include": "author.team"}),
        ))
        .await
        .unwrap();
    assert_eq!(fetched.body["author"]["__type"], json!("Object"));
    assert_eq!(fetched.body["author"]["className"], json!("Player"));
    assert_eq!(fetched.body["author"]["team"]["name"], json!("red"));

    // stored pointers are untouched
    let plain = fetch(&store, "Post", &post).await.body;
    assert_eq!(plain["author"], pointer("Player", &author));
}

#[tokio::test]
async fn shared_include_prefixes_compose() {
    let store = InMemoryStore::new();
    let team = create(&store, "Team", json!({"name": "red"})).await;
    let city = create(&store, "City", json!({"name": "oslo"})).await;
    let author = create(
        &store,
        "Player",
        json!({"name": "ann", "team": pointer("Team", &team), "city": pointer("City", &city)}),
    )
    .await;
    create(&store, "Post", json!({"author": pointer("Player", &author)})).await;

    let posts = find(&store, "Post", json!({"include": "author.team,author.city"})).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["author"]["name"], json!("ann"));
    assert_eq!(posts[0]["author"]["team"]["name"], json!("red"));
    assert_eq!(posts[0]["author"]["city"]["name"], json!("oslo"));
}

#[tokio::test]
async fn dangling_includes_leave_the_field_absent() {
    let store = InMemoryStore::new();
    let author = create(&store, "Player", json!({"name": "ann"})).await;
    create(&store, "Post", json!({"title": "hi", "author": pointer("Player", &author)})).await;
    store.dispatch(Request::delete("Player", &author)).await.unwrap();

    let posts = find(&store, "Post", json!({"include": "author,author.team"})).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], json!("hi"));
    assert!(posts[0].get("author").is_none());
}

#[tokio::test]
async fn pages_follow_creation_order() {
    let store = InMemoryStore::new();
    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(create(&store, "Item", json!({"n": n})).await);
    }

    let page = find(&store, "Item", json!({"limit": 1, "skip": 1})).await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["objectId"], json!(ids[1]));

    let page = find(&store, "Item", json!({"limit": "2", "skip": "2"})).await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["objectId"], json!(ids[2]));
}

#[tokio::test]
async fn page_size_is_bounded_by_configuration() {
    let store = InMemoryStore::builder()
        .default_limit(2)
        .max_limit(3)
        .build()
        .await
        .unwrap();
    for n in 0..5 {
        create(&store, "Item", json!({"n": n})).await;
    }

    assert_eq!(find(&store, "Item", json!({})).await.len(), 2);
    assert_eq!(find(&store, "Item", json!({"limit": 100})).await.len(), 3);
}

#[tokio::test]
async fn invalid_configuration_fails_to_build() {
    let err = InMemoryStore::builder().object_id_length(0).build().await.unwrap_err();
    assert!(matches!(err, StoreError::Initialization(_)));
}

#[tokio::test]
async fn order_sorts_by_several_keys() {
    let store = InMemoryStore::new();
    for (name, price) in [("b", 10), ("a", 10), ("c", 5), ("d", 20)] {
        create(&store, "Item", json!({"name": name, "price": price})).await;
    }

    let names = find(&store, "Item", json!({"order": "-price,name"}))
        .await
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["d", "a", "b", "c"]);
}

#[tokio::test]
async fn counts_collapse_results() {
    let store = InMemoryStore::new();
    for price in [5, 15, 25] {
        create(&store, "Item", json!({"price": price})).await;
    }

    let response = store
        .dispatch(Request::query(
            "Item",
            json!({"count": 1, "limit": 1, "where": {"price": {"$gt": 10}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.body, json!({"results": [], "count": 2}));
}

#[tokio::test]
async fn clearing_is_idempotent() {
    let store = InMemoryStore::new();
    let id = create(&store, "Item", json!({"price": 1})).await;

    store.clear().await.unwrap();
    store.clear().await.unwrap();

    assert!(fetch(&store, "Item", &id).await.is_not_found());
    assert!(find(&store, "Item", json!({})).await.is_empty());
}

#[tokio::test]
async fn clones_share_state() {
    let store = InMemoryStore::new();
    let other = store.clone();
    let id = create(&store, "Item", json!({"price": 1})).await;

    assert_eq!(fetch(&other, "Item", &id).await.status, 200);
}
