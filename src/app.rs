// Application state and the HTTP router
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::{TokenError, TokenService};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::models::{all_schemas, Booking, Review, Role, Tour, User};
use crate::database::{DatabaseError, DocumentStore, Repository, Resource};
use crate::error::ApiError;
use crate::handlers::{auth, factory, reviews, root, users};
use crate::middleware::restrict::{ADMIN, ADMIN_OR_LEAD_GUIDE, REVIEWER, REVIEW_EDITOR};
use crate::middleware::{is_logged_in, protect, restrict_to};
use crate::observer::ObserverPipeline;
use crate::services::{AuthService, Mailer};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Shared by every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub pipeline: Arc<ObserverPipeline>,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Prepare every collection and wire the observer pipeline
    pub async fn new(config: AppConfig, store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>) -> Result<Self, StartupError> {
        let tokens = TokenService::new(&config.security)?;

        for schema in all_schemas() {
            store.ensure_collection(schema).await?;
        }

        let pipeline = ObserverPipeline::standard(&config.security);
        info!(
            "Using {} store with {} observers registered",
            store.backend(),
            pipeline.observer_count()
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            pipeline: Arc::new(pipeline),
            tokens,
            mailer,
        })
    }

    pub fn repo<E: Resource>(&self) -> Repository<E> {
        Repository::new(self.store.clone(), self.pipeline.clone())
    }

    pub fn users(&self) -> Repository<User> {
        self.repo()
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.users(),
            self.tokens.clone(),
            self.mailer.clone(),
            self.config.security.clone(),
        )
    }
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/users", user_routes(&state))
        .nest("/tours", tour_routes(&state))
        .nest("/reviews", review_routes(&state))
        .nest("/bookings", booking_routes(&state));

    let overview = Router::new()
        .route("/", get(root::overview))
        .route_layer(from_fn_with_state(state.clone(), is_logged_in));

    Router::new()
        .merge(overview)
        .route("/health", get(root::health))
        .nest(API_PREFIX, api)
        .fallback(root::not_found)
        // Global middleware, innermost first
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(from_fn_with_state(state.clone(), render_errors))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `protect` on every route of `router`
fn protected(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), protect))
}

/// `protect`, then a role gate
fn restricted(router: Router<AppState>, state: &AppState, roles: &'static [Role]) -> Router<AppState> {
    let router = router.route_layer(from_fn(move |request: Request, next: Next| restrict_to(roles, request, next)));
    protected(router, state)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password));

    let account = Router::new()
        .route("/updateMyPassword", patch(auth::update_my_password))
        .route("/me", get(users::get_me))
        .route("/updateMe", patch(users::update_me))
        .route("/deleteMe", delete(users::delete_me));

    let admin = Router::new()
        .route("/", get(factory::get_all::<User>).post(users::create_user))
        .route(
            "/:id",
            get(factory::get_one::<User>)
                .patch(factory::update_one::<User>)
                .delete(factory::delete_one::<User>),
        );

    public
        .merge(protected(account, state))
        .merge(restricted(admin, state, ADMIN))
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(factory::get_all::<Tour>))
        .route("/:id", get(factory::get_one::<Tour>));

    let managed = Router::new()
        .route("/", post(factory::create_one::<Tour>))
        .route("/:id", patch(factory::update_one::<Tour>).delete(factory::delete_one::<Tour>));

    let review_readers = Router::new().route("/:id/reviews", get(reviews::list_tour_reviews));
    let review_authors = Router::new().route("/:id/reviews", post(reviews::create_tour_review));

    public
        .merge(restricted(managed, state, ADMIN_OR_LEAD_GUIDE))
        .merge(protected(review_readers, state))
        .merge(restricted(review_authors, state, REVIEWER))
}

fn review_routes(state: &AppState) -> Router<AppState> {
    let readers = Router::new()
        .route("/", get(factory::get_all::<Review>))
        .route("/:id", get(factory::get_one::<Review>));

    let authors = Router::new().route("/", post(reviews::create_review));

    let editors = Router::new().route(
        "/:id",
        patch(factory::update_one::<Review>).delete(factory::delete_one::<Review>),
    );

    protected(readers, state)
        .merge(restricted(authors, state, REVIEWER))
        .merge(restricted(editors, state, REVIEW_EDITOR))
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    let bookings = Router::new()
        .route("/", get(factory::get_all::<Booking>).post(factory::create_one::<Booking>))
        .route(
            "/:id",
            get(factory::get_one::<Booking>)
                .patch(factory::update_one::<Booking>)
                .delete(factory::delete_one::<Booking>),
        );

    restricted(bookings, state, ADMIN_OR_LEAD_GUIDE)
}

/// Errors render with the global config; re-render them for this app's environment
async fn render_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<ApiError>() {
        Some(error) => {
            let mut rendered = (error.response_status(), Json(error.to_json(state.config.environment))).into_response();
            for (name, value) in response.headers() {
                if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
                    rendered.headers_mut().append(name.clone(), value.clone());
                }
            }
            rendered
        }
        None => response,
    }
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
