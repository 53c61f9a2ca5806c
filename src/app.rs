use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::AppConfig;
use crate::images::services::MAX_UPLOAD_BYTES;
use crate::state::AppState;
use crate::{auth, categories, external, images, ingredients, recipes, web};

/// Room for the image plus the other form fields; the image limit is checked separately.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 3 * 1024 * 1024;

pub fn build_app(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(recipes::handlers::recipe_routes())
                .merge(categories::handlers::category_routes())
                .merge(ingredients::handlers::ingredient_routes())
                .merge(images::handlers::upload_routes())
                .merge(external::handlers::external_routes())
                .route("/health", get(|| async { "ok" })),
        )
        .merge(web::router())
        .fallback_service(ServeDir::new(public_dir))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{
        claims::Identity,
        jwt::{tests::identity, JwtKeys},
        repo_types::Role,
    };
    use axum::extract::FromRef;

    fn bearer(state: &AppState, who: &Identity) -> String {
        let token = JwtKeys::from_ref(state).issue(who).unwrap();
        format!("Bearer {}", token)
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart(field: &str, file_name: &str, content_type: &str, body: &[u8]) -> (String, Vec<u8>) {
        let boundary = "receitas-test-boundary";
        let mut out = Vec::new();
        out.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\nContent-Type: {ct}\r\n\r\n",
                b = boundary,
                f = field,
                n = file_name,
                ct = content_type
            )
            .as_bytes(),
        );
        out.extend_from_slice(body);
        out.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (format!("multipart/form-data; boundary={}", boundary), out)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn api_without_token_is_401_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/api/receitas")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(res).await;
        assert_eq!(body, json!({ "success": false, "message": "Autenticação necessária" }));
    }

    #[tokio::test]
    async fn token_from_other_issuer_is_rejected() {
        let state = AppState::fake();
        let foreign = crate::auth::jwt::tests::make_keys("test-secret", "other", "test-aud");
        let token = foreign.issue(&identity(Role::Admin)).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn backoffice_redirects_by_role() {
        let state = AppState::fake();

        let res = build_app(state.clone())
            .oneshot(Request::get("/backoffice").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");

        let token = JwtKeys::from_ref(&state).issue(&identity(Role::User)).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/backoffice/utilizadores")
                    .header(header::COOKIE, format!("token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn login_page_renders_for_anonymous_and_redirects_signed_in() {
        let state = AppState::fake();
        let res = build_app(state.clone())
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(res.into_body().collect().await.unwrap().to_bytes().to_vec()).unwrap();
        assert!(html.contains("action=\"/login\""));

        let token = JwtKeys::from_ref(&state).issue(&identity(Role::User)).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/registo")
                    .header(header::COOKIE, format!("token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let res = build_app(AppState::fake())
            .oneshot(Request::get("/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/login");
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("token="));
    }

    #[tokio::test]
    async fn upload_checks_type_and_returns_public_path() {
        let state = AppState::fake();
        let auth = bearer(&state, &identity(Role::User));

        let (ct, body) = multipart("imagem", "notes.txt", "text/plain", b"hello");
        let res = build_app(state.clone())
            .oneshot(
                Request::post("/api/uploads")
                    .header(header::AUTHORIZATION, &auth)
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(res).await["success"], false);

        let (ct, body) = multipart("imagem", "big.png", "image/png", &vec![0u8; 6 * 1024 * 1024]);
        let res = build_app(state.clone())
            .oneshot(
                Request::post("/api/uploads")
                    .header(header::AUTHORIZATION, &auth)
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let (ct, body) = multipart("imagem", "bolo.png", "image/png", &vec![0u8; 1024 * 1024]);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/uploads")
                    .header(header::AUTHORIZATION, &auth)
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let path = body["data"]["path"].as_str().unwrap();
        assert!(path.starts_with("/uploads/receitas/"), "{path}");
    }

    #[tokio::test]
    async fn body_over_request_limit_is_413_envelope() {
        let state = AppState::fake();
        let auth = bearer(&state, &identity(Role::User));
        let (ct, body) = multipart("imagem", "huge.png", "image/png", &vec![0u8; 9 * 1024 * 1024]);
        assert!(body.len() > BODY_LIMIT);

        let res = build_app(state)
            .oneshot(
                Request::post("/api/uploads")
                    .header(header::AUTHORIZATION, &auth)
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Ficheiro muito grande. Máximo: 5MB");
    }

    #[tokio::test]
    async fn user_list_is_admin_only() {
        let state = AppState::fake();

        let res = build_app(state.clone())
            .oneshot(Request::get("/api/utilizadores").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let auth = bearer(&state, &identity(Role::User));
        let res = build_app(state)
            .oneshot(
                Request::get("/api/utilizadores")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(res).await["success"], false);
    }

    #[tokio::test]
    async fn upload_requires_token() {
        let (ct, body) = multipart("imagem", "bolo.png", "image/png", b"png");
        let res = build_app(AppState::fake())
            .oneshot(
                Request::post("/api/uploads")
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn external_search_proxies_upstream() {
        let base = crate::external::client::tests::fake_upstream().await;
        let mut state = AppState::fake();
        state.meal_db = crate::external::MealDbClient::new(reqwest::Client::new(), &base);

        let res = build_app(state)
            .oneshot(Request::get("/api/external/search/nada").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["count"], 0);
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        (status, json_body(res).await)
    }

    fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn register_login_create_list_delete() {
        use crate::categories::repo::{Category, CategoryInput};
        use crate::recipes::repo_types::{Difficulty, Recipe};

        let Some(db) = crate::db::test_pool().await else { return };
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let app = build_app(AppState::fake_with_db(&url));

        let email = format!("u1-{}@example.com", rand::random::<u32>());
        let (status, _) = call(
            &app,
            post_json("/api/auth/register", None, json!({ "name": "u1", "email": email, "password": "pw123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &app,
            post_json("/api/auth/login", None, json!({ "email": email, "password": "pw123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let auth = format!("Bearer {}", body["data"]["token"].as_str().unwrap());

        let category_id = Category::create(
            &db,
            &CategoryInput { name: format!("E2E {}", rand::random::<u32>()), description: None },
        )
        .await
        .unwrap();
        let difficulty_id = Difficulty::find_all(&db).await.unwrap()[0].id;

        let (status, body) = call(
            &app,
            post_json(
                "/api/receitas",
                Some(&auth),
                json!({
                    "nome": "Arroz doce",
                    "autor": "u1",
                    "preparacao": "Cozer o arroz no leite.",
                    "tempo_preparacao": 45,
                    "custo": 3.2,
                    "doses": 6,
                    "categoria_id": category_id,
                    "dificuldade_id": difficulty_id
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = call(&app, Request::get("/api/receitas").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().iter().any(|r| r["id"] == id));

        let in_category = Recipe::find_by_category(&db, category_id).await.unwrap();
        assert!(in_category.iter().any(|r| r.id == id));

        let (status, _) = call(
            &app,
            Request::delete(format!("/api/receitas/{}", id))
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(Recipe::find_by_id(&db, id).await.unwrap().is_none());

        Category::delete(&db, category_id).await.unwrap();
    }

    #[tokio::test]
    async fn backoffice_delete_keeps_shared_image_and_reports_missing_recipe() {
        use crate::recipes::repo::tests::{fixture, input};
        use crate::recipes::repo_types::Recipe;
        use crate::storage::{key_from_public_path, memory::MemoryImageStore, ImageStore};
        use std::sync::Arc;

        let Some(db) = crate::db::test_pool().await else { return };
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let store = Arc::new(MemoryImageStore::default());
        let mut state = AppState::fake_with_db(&url);
        state.storage = store.clone() as Arc<dyn ImageStore>;
        let token = JwtKeys::from_ref(&state).issue(&identity(Role::Admin)).unwrap();
        let app = build_app(state);
        let f = fixture(&db).await;

        let path = crate::images::services::store_recipe_image(
            store.as_ref(),
            crate::images::services::UploadItem {
                file_name: Some("bolo.png".into()),
                content_type: "image/png".into(),
                body: bytes::Bytes::from_static(b"png"),
            },
        )
        .await
        .unwrap();
        let key = key_from_public_path(&path).unwrap().to_string();
        let mut recipe = input("Pão de ló", f.category_id, f.difficulty_id);
        recipe.image = Some(path.clone());
        let owner = Recipe::create(&db, &recipe, f.user_id).await.unwrap();
        let copy = Recipe::create(&db, &recipe, f.user_id).await.unwrap();

        let delete = |id: i64| {
            Request::post(format!("/backoffice/receitas/eliminar/{}", id))
                .header(header::COOKIE, format!("token={}", token))
                .body(Body::empty())
                .unwrap()
        };

        let res = app.clone().oneshot(delete(copy)).await.unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/backoffice/receitas?ok=eliminada");
        assert!(store.objects.lock().unwrap().contains_key(&key));

        let res = app.clone().oneshot(delete(copy)).await.unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/backoffice/receitas?erro=inexistente");

        let res = app.clone().oneshot(delete(owner)).await.unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/backoffice/receitas?ok=eliminada");
        assert!(store.objects.lock().unwrap().is_empty());

        let (ct, body) = multipart("imagem", "huge.png", "image/png", &vec![0u8; 9 * 1024 * 1024]);
        let res = app
            .clone()
            .oneshot(
                Request::post("/backoffice/receitas/nova")
                    .header(header::COOKIE, format!("token={}", token))
                    .header(header::CONTENT_TYPE, ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(res.into_body().collect().await.unwrap().to_bytes().to_vec()).unwrap();
        assert!(html.contains("Ficheiro muito grande"), "{html}");

        f.cleanup(&db).await;
    }
}
