//! Database-backed flows through the router.
//!
//! These tests require a running PostgreSQL server and `DATABASE_URL` pointing
//! at a role that may create databases. `#[sqlx::test]` gives every test its
//! own database with `./migrations` applied.

mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use common::{app, bearer, bearer_for, request, send};
use marketplace_api::auth::codes::{hash_otp, MAX_OTP_ATTEMPTS};
use marketplace_api::auth::TokenKeys;
use marketplace_api::domain::value_objects::Role;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_user(pool: &PgPool, role: Option<Role>) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, 'Test', $2, 'unused', $3)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    match role {
        Some(Role::Buyer) => {
            sqlx::query("INSERT INTO buyers (user_id) VALUES ($1)").bind(id).execute(pool).await.unwrap();
        }
        Some(Role::Seller) => {
            sqlx::query("INSERT INTO sellers (user_id, store_name) VALUES ($1, $2)")
                .bind(id)
                .bind(format!("Store {id}"))
                .execute(pool)
                .await
                .unwrap();
        }
        _ => {}
    }
    id
}

/// An approved product in the OTHER category.
async fn seed_product(pool: &PgPool, seller_id: Uuid, price: i64, stock: i32) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO products (id, seller_id, name, category, price, stock, status)
         VALUES ($1, $2, 'Mug', 'OTHER', $3, $4, 'APPROVED')",
    )
    .bind(id)
    .bind(seller_id)
    .bind(Decimal::new(price, 0))
    .bind(stock)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1").bind(product_id).fetch_one(pool).await.unwrap()
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

struct Shopper {
    app: Router,
    tokens: TokenKeys,
    buyer_id: Uuid,
    auth: String,
}

async fn shopper(pool: &PgPool) -> Shopper {
    let (app, tokens) = app(pool.clone());
    let buyer_id = seed_user(pool, Some(Role::Buyer)).await;
    let auth = bearer_for(&tokens, buyer_id, Some(Role::Buyer));
    Shopper { app, tokens, buyer_id, auth }
}

impl Shopper {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, request(method, uri, Some(&self.auth), body)).await
    }

    async fn add_to_cart(&self, product_id: Uuid, quantity: u32) -> (StatusCode, Value) {
        self.call(Method::POST, "/api/v1/cart/items", Some(json!({ "product_id": product_id, "quantity": quantity })))
            .await
    }

    async fn add_address(&self) {
        let body = json!({
            "full_name": "Ada Buyer",
            "phone": "+1 555-0100",
            "line1": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "postal_code": "62701",
            "country": "US"
        });
        let (status, _) = self.call(Method::POST, "/api/v1/addresses", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_registration_conflicts(pool: PgPool) {
    let (app, _) = app(pool);
    let body = json!({ "name": "Ada", "email": "ada@example.com", "password": "correct horse" });
    let (status, response) = send(&app, request(Method::POST, "/api/v1/users/register", None, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["user"]["email"], "ada@example.com");

    let again = json!({ "name": "Ada", "email": "ADA@example.com", "password": "correct horse" });
    let (status, response) = send(&app, request(Method::POST, "/api/v1/users/register", None, Some(again))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(response["error"]["code"], "conflict");
}

#[sqlx::test(migrations = "./migrations")]
async fn first_add_creates_cart(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;

    let (status, cart) = shopper.call(Method::GET, "/api/v1/cart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"], json!([]));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM carts").await, 0);

    let (status, cart) = shopper.add_to_cart(product, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cart["item_count"], 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM carts").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM cart_items").await, 1);

    // Same line again merges.
    let (status, cart) = shopper.add_to_cart(product, 1).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 3);

    let (status, _) = shopper.add_to_cart(product, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let quantity: i32 = sqlx::query_scalar("SELECT quantity FROM cart_items").fetch_one(&pool).await.unwrap();
    assert_eq!(quantity, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn short_stock_checkout_changes_nothing(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;
    shopper.add_address().await;
    shopper.add_to_cart(product, 3).await;
    sqlx::query("UPDATE products SET stock = 2 WHERE id = $1").bind(product).execute(&pool).await.unwrap();

    let (status, response) = shopper.call(Method::POST, "/api/v1/cart/checkout", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(response["error"]["details"]["items"][0]["reason"], "insufficient_stock");
    assert_eq!(response["error"]["details"]["items"][0]["available"], 2);

    assert_eq!(stock_of(&pool, product).await, 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM cart_items").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orders").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn malformed_checkout_body_places_nothing(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;
    shopper.add_address().await;
    shopper.add_to_cart(product, 1).await;

    let (status, _) = shopper.call(Method::POST, "/api/v1/cart/checkout", Some(json!({ "address_id": "oops" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orders").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM cart_items").await, 1);
    assert_eq!(stock_of(&pool, product).await, 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_splits_by_seller_and_cancel_restores_stock(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let first_seller = seed_user(&pool, Some(Role::Seller)).await;
    let second_seller = seed_user(&pool, Some(Role::Seller)).await;
    let mug = seed_product(&pool, first_seller, 10, 5).await;
    let lamp = seed_product(&pool, second_seller, 25, 4).await;
    shopper.add_address().await;
    shopper.add_to_cart(mug, 2).await;
    shopper.add_to_cart(lamp, 1).await;

    let (status, receipt) = shopper.call(Method::POST, "/api/v1/cart/checkout", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let orders = receipt["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o["checkout_id"] == receipt["checkout_id"]));
    let grand_total: Decimal = receipt["grand_total"]["amount"].as_str().unwrap().parse().unwrap();
    assert_eq!(grand_total, Decimal::new(45, 0));
    assert_eq!(stock_of(&pool, mug).await, 3);
    assert_eq!(stock_of(&pool, lamp).await, 3);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM cart_items").await, 0);

    let mug_order = orders.iter().find(|o| o["seller_id"] == json!(first_seller)).unwrap();
    let uri = format!("/api/v1/orders/{}/cancel", mug_order["id"].as_str().unwrap());
    let (status, cancelled) = shopper.call(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(stock_of(&pool, mug).await, 5);
    assert_eq!(stock_of(&pool, lamp).await, 3);

    let (status, _) = shopper.call(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(stock_of(&pool, mug).await, 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn wrong_otp_counts_attempts_then_discards(pool: PgPool) {
    let (app, tokens) = app(pool.clone());
    let user_id = seed_user(&pool, None).await;
    let auth = bearer_for(&tokens, user_id, None);

    let (status, _) =
        send(&app, request(Method::POST, "/api/v1/users/role/otp", Some(&auth), Some(json!({ "role": "BUYER" })))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    sqlx::query("UPDATE otps SET code_hash = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(hash_otp(user_id, "123456"))
        .execute(&pool)
        .await
        .unwrap();

    let wrong = json!({ "code": "654321", "role": "BUYER" });
    for attempt in 1..=MAX_OTP_ATTEMPTS {
        let (status, _) = send(&app, request(Method::POST, "/api/v1/users/role/verify", Some(&auth), Some(wrong.clone()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let attempts: i32 =
            sqlx::query_scalar("SELECT attempts FROM otps WHERE user_id = $1").bind(user_id).fetch_one(&pool).await.unwrap();
        assert_eq!(attempts, attempt);
    }

    // Out of attempts: even the right code is refused and the OTP is gone.
    let right = json!({ "code": "123456", "role": "BUYER" });
    let (status, _) = send(&app, request(Method::POST, "/api/v1/users/role/verify", Some(&auth), Some(right))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM otps").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buyers").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn correct_otp_assigns_role(pool: PgPool) {
    let (app, tokens) = app(pool.clone());
    let user_id = seed_user(&pool, None).await;
    let auth = bearer_for(&tokens, user_id, None);

    send(&app, request(Method::POST, "/api/v1/users/role/otp", Some(&auth), Some(json!({ "role": "SELLER" })))).await;
    sqlx::query("UPDATE otps SET code_hash = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(hash_otp(user_id, "123456"))
        .execute(&pool)
        .await
        .unwrap();

    let body = json!({ "code": "123456", "role": "SELLER", "store_name": "Corner Shop" });
    let (status, response) = send(&app, request(Method::POST, "/api/v1/users/role/verify", Some(&auth), Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["user"]["role"], "SELLER");
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM sellers").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM otps").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn product_rating_matches_review_summary(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;

    let review = json!({ "rating": 4, "title": "Solid" });
    let (status, _) = shopper.call(Method::POST, &format!("/api/v1/products/{product}/reviews"), Some(review)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) = send(&shopper.app, request(Method::GET, &format!("/api/v1/products/{product}"), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["rating"], json!({ "average": "4.0", "count": 1, "histogram": [0, 0, 0, 1, 0] }));

    let (status, listing) = send(&shopper.app, request(Method::GET, "/api/v1/products", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["data"][0]["rating"], detail["rating"]);

    let uri = format!("/api/v1/products/{product}/reviews");
    let (status, reviews) = send(&shopper.app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviews["summary"], detail["rating"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn wishlist_hides_products_off_sale(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;

    let (status, _) = shopper.call(Method::POST, "/api/v1/wishlist", Some(json!({ "product_id": product }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, listed) = shopper.call(Method::GET, "/api/v1/wishlist", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    sqlx::query("UPDATE products SET status = 'PENDING' WHERE id = $1").bind(product).execute(&pool).await.unwrap();
    let (status, listed) = shopper.call(Method::GET, "/api/v1/wishlist", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[sqlx::test(migrations = "./migrations")]
async fn other_buyer_cannot_see_order(pool: PgPool) {
    let shopper = shopper(&pool).await;
    let seller = seed_user(&pool, Some(Role::Seller)).await;
    let product = seed_product(&pool, seller, 10, 5).await;
    shopper.add_address().await;
    shopper.add_to_cart(product, 1).await;
    let (_, receipt) = shopper.call(Method::POST, "/api/v1/cart/checkout", None).await;
    let uri = format!("/api/v1/orders/{}", receipt["orders"][0]["id"].as_str().unwrap());

    let (status, order) = shopper.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["buyer_id"], json!(shopper.buyer_id));

    let stranger = bearer(&shopper.tokens, Some(Role::Buyer));
    let (status, _) = send(&shopper.app, request(Method::GET, &uri, Some(&stranger), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let seller_auth = bearer_for(&shopper.tokens, seller, Some(Role::Seller));
    let (status, _) = send(&shopper.app, request(Method::GET, &uri, Some(&seller_auth), None)).await;
    assert_eq!(status, StatusCode::OK);
}
