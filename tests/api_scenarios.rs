use bookrent_lib::config::Settings;
use chrono::{DateTime, Months, Utc};
use bookrent_lib::db::Store;
use bookrent_lib::{bootstrap, router};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

struct TestServer {
    base: String,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let settings = Settings {
            bcrypt_cost: 4,
            token_secret: "scenario-secret".to_string(),
            ..Settings::default()
        };
        let store = Store::in_memory().expect("store");
        let state = bootstrap(store, &settings).expect("bootstrap");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.expect("serve");
        });
        Self {
            base: format!("http://{addr}/api"),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("send");
        let status = response.status();
        (status, response.json().await.expect("json body"))
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("send");
        let status = response.status();
        (status, response.json().await.expect("json body"))
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post("/login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().expect("token").to_string()
    }

    async fn register_and_login(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .post(
                "/register",
                None,
                json!({ "name": name, "email": email, "password": "pw123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        self.login(email, "pw123").await
    }
}

#[tokio::test]
async fn rent_shows_up_in_my_rentals() {
    let server = TestServer::start().await;
    let token = server.register_and_login("Ann", "ann@example.com").await;

    let (status, body) = server
        .post("/rent", Some(&token), json!({ "bookId": 1, "period": "1m" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Аренда оформлена успешно");

    let (status, body) = server.get("/my/rentals", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let rentals = body.as_array().expect("array");
    assert_eq!(rentals.len(), 1);
    assert_eq!(rentals[0]["type"], "rent");
    assert_eq!(rentals[0]["period"], "1m");
    assert_eq!(rentals[0]["price"], 200.0);
    assert_eq!(rentals[0]["current_status"], "active");
    assert_eq!(rentals[0]["title"], "Три товарища");

    let instant = |field: &str| {
        DateTime::parse_from_rfc3339(rentals[0][field].as_str().expect(field))
            .expect("rfc3339")
            .with_timezone(&Utc)
    };
    let start = instant("start_date");
    assert_eq!(
        instant("end_date"),
        start.checked_add_months(Months::new(1)).expect("in range")
    );
    assert_eq!(rentals[0]["days_left"].as_i64().map(|days| days >= 28), Some(true));
}

#[tokio::test]
async fn purchase_is_completed_immediately() {
    let server = TestServer::start().await;
    let token = server.register_and_login("Bob", "bob@example.com").await;

    let (status, body) = server.post("/buy", Some(&token), json!({ "bookId": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Покупка оформлена успешно");

    let (_, body) = server.get("/my/rentals", Some(&token)).await;
    assert_eq!(body[0]["type"], "buy");
    assert_eq!(body[0]["status"], "completed");
    assert_eq!(body[0]["price"], 600.0);
    assert!(body[0]["end_date"].is_null());
}

#[tokio::test]
async fn buying_without_a_token_is_unauthorized() {
    let server = TestServer::start().await;
    let (status, body) = server.post("/buy", None, json!({ "bookId": 1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Нет токена");

    let (status, body) = server
        .post("/buy", Some("not-a-token"), json!({ "bookId": 1 }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Неверный токен");
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let server = TestServer::start().await;
    let token = server.register_and_login("Ann", "ann@example.com").await;
    let (status, body) = server.get("/admin/books", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Доступ запрещен");
}

#[tokio::test]
async fn admin_creates_book_with_defaults() {
    let server = TestServer::start().await;
    let token = server.login("admin@admin.com", "admin123").await;

    let (status, body) = server
        .post(
            "/admin/books",
            Some(&token),
            json!({
                "title": "Пикник на обочине",
                "author": "Стругацкие",
                "category": "Фантастика",
                "price_rent_2w": 90,
                "price_rent_1m": 0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    let id = body["id"].as_i64().expect("id");

    let (status, book) = server.get(&format!("/books/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["status"], "available");
    assert_eq!(book["price_buy"], 0.0);
    assert_eq!(book["price_rent_2w"], 90.0);
    assert!(book["price_rent_1m"].is_null());
    assert!(book["year"].is_null());

    let (_, all) = server.get("/admin/books", Some(&token)).await;
    assert_eq!(all.as_array().expect("array").len(), 4);
}

#[tokio::test]
async fn admin_list_returns_every_field_as_created() {
    let server = TestServer::start().await;
    let token = server.login("admin@admin.com", "admin123").await;
    let input = json!({
        "title": "Понедельник начинается в субботу",
        "author": "Стругацкие",
        "category": "Фантастика",
        "year": 1965,
        "description": "Сказка для научных сотрудников младшего возраста.",
        "cover_url": "https://covers.example.com/monday.jpg",
        "price_buy": 520.5,
        "price_rent_2w": 110.0,
        "price_rent_1m": 170.0,
        "price_rent_3m": 240.0,
        "status": "out_of_stock"
    });

    let (status, body) = server.post("/admin/books", Some(&token), input.clone()).await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    let id = body["id"].as_i64().expect("id");

    let (status, all) = server.get("/admin/books", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let book = all
        .as_array()
        .expect("array")
        .iter()
        .find(|book| book["id"] == id)
        .expect("created book listed");

    let mut expected = input;
    expected["id"] = json!(id);
    assert_eq!(book, &expected);
}

#[tokio::test]
async fn admin_can_take_a_book_off_sale() {
    let server = TestServer::start().await;
    let admin = server.login("admin@admin.com", "admin123").await;
    let user = server.register_and_login("Ann", "ann@example.com").await;

    let response = server
        .client
        .patch(server.url("/admin/books/3/status"))
        .bearer_auth(&admin)
        .json(&json!({ "status": "out_of_stock" }))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["updated"], 1);

    let (status, body) = server.post("/buy", Some(&user), json!({ "bookId": 3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Книга недоступна для покупки");

    let response = server
        .client
        .patch(server.url("/admin/books/3/status"))
        .bearer_auth(&admin)
        .json(&json!({ "status": "sold" }))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn admin_sees_every_rental_with_email() {
    let server = TestServer::start().await;
    let admin = server.login("admin@admin.com", "admin123").await;
    let user = server.register_and_login("Ann", "ann@example.com").await;
    server
        .post("/rent", Some(&user), json!({ "bookId": 2, "period": "2w" }))
        .await;

    let (status, body) = server.get("/admin/rentals", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["email"], "ann@example.com");
    assert_eq!(body[0]["title"], "Мастер и Маргарита");
    assert_eq!(body[0]["price"], 180.0);
}

#[tokio::test]
async fn duplicate_registration_reports_error_key() {
    let server = TestServer::start().await;
    server.register_and_login("Ann", "ann@example.com").await;
    let (status, body) = server
        .post(
            "/register",
            None,
            json!({ "name": "Ann", "email": "ann@example.com", "password": "other" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let server = TestServer::start().await;
    server.register_and_login("Ann", "ann@example.com").await;

    let (status, body) = server
        .post("/login", None, json!({ "email": "nobody@example.com", "password": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Пользователь не найден");

    let (status, body) = server
        .post("/login", None, json!({ "email": "ann@example.com", "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Неверный пароль");
}

#[tokio::test]
async fn unknown_book_is_not_found() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/books/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Книга не найдена");
}

#[tokio::test]
async fn unknown_period_is_rejected() {
    let server = TestServer::start().await;
    let token = server.register_and_login("Ann", "ann@example.com").await;
    let (status, body) = server
        .post("/rent", Some(&token), json!({ "bookId": 1, "period": "6m" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Неверный период аренды");
}

#[tokio::test]
async fn storefront_filters_and_sorts() {
    let server = TestServer::start().await;
    let (_, body) = server.get("/books?category=Роман&sortBy=year", None).await;
    let titles: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|book| book["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Мастер и Маргарита", "Три товарища"]);

    let (status, body) = server.get("/books?year=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
