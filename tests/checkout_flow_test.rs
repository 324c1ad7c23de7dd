mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::{json, Value};
use storefront_api::entities::{product, Order, Product};

use common::{expect_status, TestApp};

fn delivery_form(client_secret: &str) -> Value {
    json!({
        "full_name": "Ada Lovelace",
        "email": "ada@example.com",
        "phone_number": "+15550100",
        "country": "US",
        "postcode": "02139",
        "town_or_city": "Cambridge",
        "street_address1": "1 Main St",
        "client_secret": client_secret
    })
}

#[tokio::test]
async fn empty_bag_cannot_start_checkout() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(json!({})), Some("visitor-1"))
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn start_checkout_sizes_the_intent_and_stamps_metadata() {
    let app = TestApp::new().await;
    let product = app.seed_product("hat-101", dec!(10.00), false).await;

    app.request(
        Method::POST,
        "/api/v1/bag/items",
        Some(json!({"product_id": product.id, "quantity": 2})),
        Some("visitor-1"),
    )
    .await;

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(json!({})), Some("visitor-1"))
        .await;
    let body = expect_status(response, StatusCode::OK).await;

    let intent_id = body["payment_intent_id"].as_str().unwrap().to_string();
    assert!(body["client_secret"].as_str().unwrap().contains("_secret"));
    assert_eq!(body["snapshot"]["grand_total"], "22.00");

    let (bag, save_info, username) = app
        .gateway
        .metadata_for(&intent_id)
        .expect("metadata stamped on the intent");
    assert_eq!(bag, format!(r#"{{"{}":2}}"#, product.id));
    assert!(!save_info);
    assert_eq!(username, "anonymous");
}

#[tokio::test]
async fn completing_checkout_creates_the_order_and_clears_the_bag() {
    let app = TestApp::new().await;
    let product = app.seed_product("hat-102", dec!(10.00), false).await;

    app.request(
        Method::POST,
        "/api/v1/bag/items",
        Some(json!({"product_id": product.id, "quantity": 2})),
        Some("visitor-1"),
    )
    .await;

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(json!({})), Some("visitor-1"))
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let client_secret = body["client_secret"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/complete",
            Some(delivery_form(&client_secret)),
            Some("visitor-1"),
        )
        .await;
    let order = expect_status(response, StatusCode::CREATED).await;

    let order_number = order["order_number"].as_str().unwrap();
    assert_eq!(order_number.len(), 32);
    assert_eq!(order["order_total"], "20.00");
    assert_eq!(order["delivery_cost"], "2.00");
    assert_eq!(order["grand_total"], "22.00");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    // The bag is gone after checkout.
    let response = app
        .request(Method::GET, "/api/v1/bag", None, Some("visitor-1"))
        .await;
    let bag = expect_status(response, StatusCode::OK).await;
    assert!(bag["items"].as_array().unwrap().is_empty());

    // The confirmation view finds the order by number.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_number),
            None,
            None,
        )
        .await;
    let fetched = expect_status(response, StatusCode::OK).await;
    assert_eq!(fetched["order_number"], order_number);
    assert_eq!(fetched["grand_total"], "22.00");
}

#[tokio::test]
async fn invalid_form_leaves_the_bag_intact() {
    let app = TestApp::new().await;
    let product = app.seed_product("hat-103", dec!(10.00), false).await;

    app.request(
        Method::POST,
        "/api/v1/bag/items",
        Some(json!({"product_id": product.id, "quantity": 1})),
        Some("visitor-1"),
    )
    .await;

    let mut form = delivery_form("pi_test_secret_abc");
    form["email"] = json!("not-an-email");

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/complete",
            Some(form),
            Some("visitor-1"),
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    let response = app
        .request(Method::GET, "/api/v1/bag", None, Some("visitor-1"))
        .await;
    let bag = expect_status(response, StatusCode::OK).await;
    assert_eq!(bag["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn vanished_product_rolls_back_checkout_and_keeps_the_bag() {
    let app = TestApp::new().await;
    let hat = app.seed_product("hat-105", dec!(10.00), false).await;

    app.request(
        Method::POST,
        "/api/v1/bag/items",
        Some(json!({"product_id": hat.id, "quantity": 1})),
        Some("visitor-1"),
    )
    .await;

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(json!({})), Some("visitor-1"))
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let client_secret = body["client_secret"].as_str().unwrap().to_string();

    // The product disappears between starting and completing checkout.
    Product::delete_by_id(hat.id)
        .exec(&*app.state.db)
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/complete",
            Some(delivery_form(&client_secret)),
            Some("visitor-1"),
        )
        .await;
    expect_status(response, StatusCode::NOT_FOUND).await;

    // Nothing was persisted.
    let orders = Order::find().count(&*app.state.db).await.unwrap();
    assert_eq!(orders, 0);

    // Restoring the product shows the bag line survived for a retry.
    product::ActiveModel {
        id: Set(hat.id),
        sku: Set(hat.sku.clone()),
        name: Set(hat.name.clone()),
        description: Set(hat.description.clone()),
        price: Set(hat.price),
        has_sizes: Set(hat.has_sizes),
        image_url: Set(hat.image_url.clone()),
        rating: Set(hat.rating),
        created_at: Set(hat.created_at),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let response = app
        .request(Method::GET, "/api/v1/bag", None, Some("visitor-1"))
        .await;
    let bag = expect_status(response, StatusCode::OK).await;
    assert_eq!(bag["items"].as_array().unwrap().len(), 1);
    assert_eq!(bag["items"][0]["quantity"], 1);
}

#[tokio::test]
async fn save_info_writes_profile_defaults() {
    let app = TestApp::new().await;
    let product = app.seed_product("hat-104", dec!(10.00), false).await;

    app.request(
        Method::POST,
        "/api/v1/bag/items",
        Some(json!({"product_id": product.id, "quantity": 1})),
        Some("visitor-1"),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({"username": "ada", "save_info": true})),
            Some("visitor-1"),
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let client_secret = body["client_secret"].as_str().unwrap().to_string();

    let mut form = delivery_form(&client_secret);
    form["save_info"] = json!(true);
    form["username"] = json!("ada");

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/complete",
            Some(form),
            Some("visitor-1"),
        )
        .await;
    expect_status(response, StatusCode::CREATED).await;

    let response = app
        .request(Method::GET, "/api/v1/profiles/ada", None, None)
        .await;
    let profile = expect_status(response, StatusCode::OK).await;

    assert_eq!(profile["default_phone_number"], "+15550100");
    assert_eq!(profile["default_town_or_city"], "Cambridge");
    assert_eq!(profile["default_country"], "US");
    assert_eq!(profile["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn profile_defaults_can_be_updated_directly() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/grace",
            Some(json!({"default_town_or_city": "London", "default_country": "GB"})),
            None,
        )
        .await;
    let profile = expect_status(response, StatusCode::OK).await;

    assert_eq!(profile["username"], "grace");
    assert_eq!(profile["default_town_or_city"], "London");
    assert_eq!(profile["default_country"], "GB");
    assert_eq!(profile["default_phone_number"], Value::Null);
}

#[tokio::test]
async fn missing_order_lookup_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders/DOESNOTEXIST00000000000000000000",
            None,
            None,
        )
        .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}
