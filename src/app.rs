use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::content::{Bit, BitDraft, Catalog, Project, Tutorial};
use crate::error::AppError;
use crate::feed::{self, FeedTab, ITEMS_PER_PAGE, Page, TOP_CATEGORIES};
use crate::llm::{GeminiClient, GenerativeModel};
use crate::login::{self, CurrentUser, require_auth, session_user};
use crate::notifier::{BitCompletionPayload, Notifier};
use crate::progress::{
    Award, Dashboard, MAX_READ_SECONDS, Progress, Recommendation, next_bit_to_continue, recommend,
};
use crate::proxy;
use crate::ratelimit::{RateLimiter, limit_requests};
use crate::saving::{self, Store};
use crate::topics::{
    self, TOPIC_CATEGORIES, TopicCategory, TopicFilter, TopicProgress, derive_topics,
    filter_topic_bits, find_topic, topic_progress,
};
use crate::tracks::{self, TRACKS, Track, TrackProgress, derive_tracks, track_progress};
use crate::utils::{format_time, now_millis};

pub const MAX_BODY_BYTES: usize = 100 * 1024;

const EXPORT_FILENAME: &str = "synapse-progress.json.gz";

/// Shared state behind every handler.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    catalog: RwLock<Catalog>,
    // Serialises read-modify-write cycles on progress documents.
    progress_lock: Mutex<()>,
    pub limiter: RateLimiter,
    pub model: Option<Arc<dyn GenerativeModel>>,
    pub notifier: Notifier,
}

impl AppState {
    /// Opens the store and loads the catalog with previously saved bits
    /// folded in.
    pub fn new(config: Config, model: Option<Arc<dyn GenerativeModel>>) -> Result<Self, AppError> {
        let store = Store::open(&config.database_dir)?;

        let mut catalog = match &config.catalog_path {
            Some(path) => Catalog::from_path(path)?,
            None => Catalog::seed()?,
        };
        catalog.merge_saved(store.load_bits()?);

        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window()),
            notifier: Notifier::new(config.completion_webhook_url.clone()),
            catalog: RwLock::new(catalog),
            progress_lock: Mutex::new(()),
            store,
            model,
            config,
        })
    }

    /// State with the provider client configured from the environment.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let model = GeminiClient::from_config(&config)
            .map_err(AppError::Generation)?
            .map(|client| Arc::new(client) as Arc<dyn GenerativeModel>);

        Self::new(config, model)
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a user's progress, counts today's visit, applies `change` and
    /// saves the result.
    pub fn update_progress<R>(
        &self,
        username: &str,
        change: impl FnOnce(&mut Progress, i64) -> R,
    ) -> Result<(Progress, R), AppError> {
        let _guard = self
            .progress_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = now_millis();
        let mut progress = self.store.load_progress(username, now)?;
        progress.check_in(now);
        let outcome = change(&mut progress, now);
        self.store.save_progress(username, &progress)?;

        Ok((progress, outcome))
    }

    /// Streak check-in without any other change.
    pub fn touch_progress(&self, username: &str) -> Result<Progress, AppError> {
        self.update_progress(username, |_, _| ()).map(|(progress, _)| progress)
    }

    /// The visitor's username and progress; anonymous visitors get an empty
    /// document.
    fn viewer(&self, jar: &CookieJar) -> Result<Viewer, AppError> {
        match session_user(jar) {
            Some(username) => Ok(Viewer {
                progress: self.store.load_progress(&username, now_millis())?,
                username: Some(username),
            }),
            None => Ok(Viewer {
                username: None,
                progress: Progress::default(),
            }),
        }
    }
}

struct Viewer {
    username: Option<String>,
    progress: Progress,
}

impl Viewer {
    fn signed_in(&self) -> bool {
        self.username.is_some()
    }
}

/// A bit as listed to a visitor. Locked bits keep their card but lose the
/// lesson body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitView {
    #[serde(flatten)]
    pub bit: Bit,
    pub slug: String,
    pub topic: String,
    pub locked: bool,
    pub posted: String,
}

impl BitView {
    pub fn new(bit: &Bit, signed_in: bool, now: i64) -> Self {
        let locked = bit.is_locked(signed_in);
        let mut bit = bit.clone();
        if locked {
            bit.content.clear();
            bit.code_snippet = None;
        }

        Self {
            slug: bit.slug(),
            topic: bit.topic(),
            posted: format_time(bit.timestamp, now),
            locked,
            bit,
        }
    }
}

fn bit_views<'a>(bits: impl IntoIterator<Item = &'a Bit>, signed_in: bool) -> Vec<BitView> {
    let now = now_millis();
    bits.into_iter()
        .map(|bit| BitView::new(bit, signed_in, now))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BitDetail {
    #[serde(flatten)]
    bit: BitView,
    completed: bool,
    bookmarked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TutorialView {
    #[serde(flatten)]
    tutorial: Tutorial,
    locked: bool,
}

impl TutorialView {
    fn new(tutorial: &Tutorial, signed_in: bool) -> Self {
        let locked = tutorial.is_locked(signed_in);
        let mut tutorial = tutorial.clone();
        if locked {
            tutorial.content = tutorial.preview();
        }
        Self { tutorial, locked }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicListing {
    slug: String,
    label: String,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_key: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<TopicProgress>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicPage {
    slug: String,
    label: String,
    description: Option<&'static str>,
    filter: TopicFilter,
    progress: TopicProgress,
    continue_bit: Option<BitView>,
    bits: Vec<BitView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackView {
    #[serde(flatten)]
    track: Track,
    locked: bool,
    progress: TrackProgress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackDetail {
    #[serde(flatten)]
    track: TrackView,
    bits: Vec<BitView>,
}

#[derive(Debug, Serialize)]
struct DerivedTrackView {
    slug: String,
    title: String,
    bits: Vec<BitView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressView {
    #[serde(flatten)]
    progress: Progress,
    level: u32,
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        Self {
            level: progress.level(),
            progress,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContinueView {
    next_bit: Option<BitView>,
    recommendation: Recommendation,
}

#[derive(Debug, Serialize)]
struct VoteResponse {
    votes: u32,
    award: Award,
}

#[derive(Debug, Deserialize, Default)]
struct FeedQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    tab: String,
    page: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct TopicQuery {
    #[serde(default)]
    filter: TopicFilter,
}

#[derive(Debug, Deserialize, Default)]
struct ContinueQuery {
    topic: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ReadRequest {
    /// Seconds spent on the bit
    #[serde(default)]
    time_spent: u64,
}

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(login::handle_me))
        .route("/auth/password", post(login::handle_change_password))
        .route("/auth/discord", post(login::handle_link_discord))
        .route("/bits/:slug/vote", post(vote_bit))
        .route("/progress", get(get_progress))
        .route("/progress/dashboard", get(get_dashboard))
        .route("/progress/continue", get(get_continue))
        .route("/progress/read/:id", post(read_bit))
        .route("/progress/complete/:id", post(complete_bit))
        .route("/progress/quiz-win", post(quiz_win))
        .route("/progress/export", get(export_progress))
        .route("/progress/import", post(import_progress))
        .route("/bookmarks/:id", post(toggle_bookmark))
        .route_layer(middleware::from_fn(require_auth));

    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(login::handle_signup))
        .route("/auth/login", post(login::handle_login))
        .route("/auth/logout", post(login::handle_logout))
        .route(
            "/bits",
            get(list_bits).merge(post(create_bit).route_layer(middleware::from_fn(require_auth))),
        )
        .route("/bits/featured", get(featured_bit))
        .route("/bits/surprise", get(surprise_bit))
        .route("/bits/:slug", get(get_bit))
        .route("/categories", get(list_categories))
        .route("/tutorials", get(list_tutorials))
        .route("/tutorials/:slug", get(get_tutorial))
        .route("/projects", get(list_projects))
        .route("/facts/random", get(random_fact))
        .route("/topics", get(list_topics))
        .route("/topic-categories", get(list_topic_categories))
        .route("/topics/:slug", get(get_topic))
        .route("/tracks", get(list_tracks))
        .route("/tracks/derived", get(list_derived_tracks))
        .route("/tracks/:slug", get(get_track))
        .route("/generate-bit", post(proxy::handle_generate_bit))
        .route("/chat", post(proxy::handle_chat))
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), limit_requests));

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&state.config))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Starts the server and runs until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.address();
    let state = Arc::new(AppState::from_config(config)?);

    {
        let catalog = state.catalog();
        info!(
            "Loaded {} bits, {} tutorials; LLM proxy {}",
            catalog.bits.len(),
            catalog.tutorials.len(),
            if state.model.is_some() { "configured" } else { "disabled" }
        );
    }

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{address}");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "bits": state.catalog().bits.len(),
        "llm": state.model.is_some(),
    }))
}

// Catalog

async fn list_bits(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Page<BitView>>, AppError> {
    let viewer = state.viewer(&jar)?;
    let tab: FeedTab = query.tab.parse().unwrap_or_default();

    let catalog = state.catalog();
    let matches = feed::filter_bits(
        &catalog.bits,
        &query.q,
        &tab,
        &viewer.progress.bookmarked_bits,
    );
    let page = feed::paginate(&matches, query.page.unwrap_or(1), ITEMS_PER_PAGE);

    Ok(Json(Page {
        items: bit_views(page.items, viewer.signed_in()),
        page: page.page,
        total_pages: page.total_pages,
        total: page.total,
    }))
}

async fn featured_bit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<BitView>, AppError> {
    let signed_in = session_user(&jar).is_some();
    let catalog = state.catalog();
    let bit = feed::featured(&catalog.bits).ok_or_else(|| AppError::NotFound("Bit".into()))?;

    Ok(Json(BitView::new(bit, signed_in, now_millis())))
}

async fn surprise_bit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<BitView>, AppError> {
    let signed_in = session_user(&jar).is_some();
    let catalog = state.catalog();
    let bit = feed::surprise(&catalog.bits).ok_or_else(|| AppError::NotFound("Bit".into()))?;

    Ok(Json(BitView::new(bit, signed_in, now_millis())))
}

async fn get_bit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(slug): Path<String>,
) -> Result<Json<BitDetail>, AppError> {
    let viewer = state.viewer(&jar)?;
    let catalog = state.catalog();
    let bit = catalog
        .find_bit(&slug)
        .ok_or_else(|| AppError::NotFound(format!("Bit {slug}")))?;

    if bit.is_locked(viewer.signed_in()) {
        return Err(AppError::Locked(bit.title.clone()));
    }

    Ok(Json(BitDetail {
        completed: viewer.progress.is_completed(&bit.id),
        bookmarked: viewer.progress.is_bookmarked(&bit.id),
        bit: BitView::new(bit, viewer.signed_in(), now_millis()),
    }))
}

async fn create_bit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(draft): Json<BitDraft>,
) -> Result<(StatusCode, Json<BitView>), AppError> {
    let now = now_millis();
    let mut catalog = state.catalog_mut();
    let view = BitView::new(catalog.add_bit(draft, &username, now)?, true, now);
    state.store.save_bits(&catalog.bits)?;

    info!("{username} published bit {}", view.bit.id);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn vote_bit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<VoteResponse>, AppError> {
    let votes = {
        let mut catalog = state.catalog_mut();
        let votes = catalog.vote(&id)?;
        state.store.save_bits(&catalog.bits)?;
        votes
    };
    let (_, award) = state.update_progress(&username, |progress, _| progress.record_vote())?;

    Ok(Json(VoteResponse { votes, award }))
}

async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(feed::top_categories(&state.catalog().bits, TOP_CATEGORIES))
}

async fn list_tutorials(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Json<Vec<TutorialView>> {
    let signed_in = session_user(&jar).is_some();
    let catalog = state.catalog();

    Json(
        catalog
            .tutorials
            .iter()
            .map(|t| TutorialView::new(t, signed_in))
            .collect(),
    )
}

async fn get_tutorial(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(slug): Path<String>,
) -> Result<Json<TutorialView>, AppError> {
    let signed_in = session_user(&jar).is_some();
    let catalog = state.catalog();
    let tutorial = catalog
        .find_tutorial(&slug)
        .ok_or_else(|| AppError::NotFound(format!("Tutorial {slug}")))?;

    Ok(Json(TutorialView::new(tutorial, signed_in)))
}

async fn list_projects(State(state): State<Arc<AppState>>) -> Json<Vec<Project>> {
    Json(state.catalog().projects.clone())
}

async fn random_fact(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = state.catalog();
    let fact = catalog
        .facts
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| AppError::NotFound("Fact".into()))?;

    Ok(Json(json!({ "fact": fact })))
}

// Topics and tracks

async fn list_topics(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<TopicListing>>, AppError> {
    let viewer = state.viewer(&jar)?;
    let catalog = state.catalog();

    let listings = derive_topics(&catalog.bits)
        .into_iter()
        .map(|summary| {
            let registered = find_topic(&summary.slug);
            TopicListing {
                description: registered.map(|t| t.description),
                icon_key: registered.map(|t| t.icon_key),
                progress: viewer
                    .signed_in()
                    .then(|| topic_progress(&catalog.bits, &viewer.progress, &summary.slug)),
                slug: summary.slug,
                label: summary.label,
                count: summary.count,
            }
        })
        .collect();

    Ok(Json(listings))
}

async fn list_topic_categories() -> Json<&'static [TopicCategory]> {
    Json(TOPIC_CATEGORIES)
}

async fn get_topic(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(slug): Path<String>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<TopicPage>, AppError> {
    let viewer = state.viewer(&jar)?;
    let catalog = state.catalog();

    let registered = find_topic(&slug);
    let progress = topic_progress(&catalog.bits, &viewer.progress, &slug);
    if registered.is_none() && progress.total == 0 {
        return Err(AppError::NotFound(format!("Topic {slug}")));
    }

    let bits = filter_topic_bits(
        &catalog.bits,
        &slug,
        &viewer.progress,
        query.filter,
        viewer.signed_in(),
    );
    let continue_bit = next_bit_to_continue(&catalog.bits, &viewer.progress, Some(&slug))
        .map(|bit| BitView::new(bit, viewer.signed_in(), now_millis()));

    Ok(Json(TopicPage {
        label: registered.map_or_else(|| topics::capitalize_slug(&slug), |t| t.label.to_string()),
        description: registered.map(|t| t.description),
        filter: query.filter,
        bits: bit_views(bits, viewer.signed_in()),
        progress,
        continue_bit,
        slug,
    }))
}

fn track_view(track: &Track, viewer: &Viewer) -> TrackView {
    TrackView {
        track: track.clone(),
        locked: track.is_locked(viewer.signed_in()),
        progress: track_progress(track, &viewer.progress),
    }
}

async fn list_tracks(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<TrackView>>, AppError> {
    let viewer = state.viewer(&jar)?;
    Ok(Json(TRACKS.iter().map(|t| track_view(t, &viewer)).collect()))
}

async fn list_derived_tracks(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Json<Vec<DerivedTrackView>> {
    let signed_in = session_user(&jar).is_some();
    let catalog = state.catalog();

    Json(
        derive_tracks(&catalog.bits)
            .into_iter()
            .map(|track| DerivedTrackView {
                slug: track.slug,
                title: track.title,
                bits: bit_views(track.bits, signed_in),
            })
            .collect(),
    )
}

async fn get_track(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(slug): Path<String>,
) -> Result<Json<TrackDetail>, AppError> {
    let viewer = state.viewer(&jar)?;
    let track =
        tracks::find_track(&slug).ok_or_else(|| AppError::NotFound(format!("Track {slug}")))?;
    if track.is_locked(viewer.signed_in()) {
        return Err(AppError::Locked(track.title.clone()));
    }

    let catalog = state.catalog();
    Ok(Json(TrackDetail {
        bits: bit_views(tracks::resolve_bits(track, &catalog.bits), viewer.signed_in()),
        track: track_view(track, &viewer),
    }))
}

// Progress

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<ProgressView>, AppError> {
    Ok(Json(state.touch_progress(&username)?.into()))
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<Dashboard>, AppError> {
    let (_, dashboard) = state.update_progress(&username, |progress, now| progress.dashboard(now))?;
    Ok(Json(dashboard))
}

async fn get_continue(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Query(query): Query<ContinueQuery>,
) -> Result<Json<ContinueView>, AppError> {
    let progress = state.touch_progress(&username)?;
    let catalog = state.catalog();

    let topic = query.topic.as_deref().filter(|t| !t.is_empty());
    Ok(Json(ContinueView {
        next_bit: next_bit_to_continue(&catalog.bits, &progress, topic)
            .map(|bit| BitView::new(bit, true, now_millis())),
        recommendation: recommend(&TRACKS, &catalog.bits, &progress),
    }))
}

fn bit_title(state: &AppState, id: &str) -> Result<String, AppError> {
    state
        .catalog()
        .bit_by_id(id)
        .map(|bit| bit.title.clone())
        .ok_or_else(|| AppError::NotFound(format!("Bit {id}")))
}

async fn read_bit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Option<Json<ReadRequest>>,
) -> Result<Json<Award>, AppError> {
    let title = bit_title(&state, &id)?;
    let time_spent = body
        .map(|Json(req)| req.time_spent.min(MAX_READ_SECONDS))
        .unwrap_or_default();

    let (_, award) = state.update_progress(&username, |progress, now| {
        progress.record_read(&id, time_spent, now)
    })?;

    if !state.notifier.is_enabled() {
        debug!("No completion webhook configured, skipping notification for bit {id}");
    } else if let Some(discord) = login::find_user(&state.store, &username)?.discord {
        let payload = BitCompletionPayload::new(
            &discord.id,
            &id,
            &title,
            now_millis(),
            time_spent,
            award.xp_gained,
        );
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = state.notifier.send_completion(&payload).await {
                warn!("Completion webhook failed for bit {}: {e}", payload.bit_id);
            }
        });
    } else {
        info!("{username} has no linked Discord account, skipping completion webhook");
    }

    Ok(Json(award))
}

async fn complete_bit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Award>, AppError> {
    bit_title(&state, &id)?;
    let (_, award) = state.update_progress(&username, |progress, _| progress.mark_completed(&id))?;
    Ok(Json(award))
}

async fn quiz_win(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<Award>, AppError> {
    let (_, award) = state.update_progress(&username, |progress, _| progress.record_quiz_win())?;
    Ok(Json(award))
}

async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    bit_title(&state, &id)?;
    let (_, bookmarked) =
        state.update_progress(&username, |progress, _| progress.toggle_bookmark(&id))?;
    Ok(Json(json!({ "bitId": id, "bookmarked": bookmarked })))
}

async fn export_progress(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let progress = state.touch_progress(&username)?;
    let buffer = saving::export_progress(&progress)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        buffer,
    )
        .into_response())
}

async fn import_progress(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ProgressView>, AppError> {
    let mut file_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("progress") {
            file_data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .to_vec();
        }
    }

    if file_data.is_empty() {
        return Err(AppError::BadRequest("No file data received".to_string()));
    }

    let imported = saving::import_progress(&file_data)
        .map_err(|e| AppError::BadRequest(format!("Failed to load progress: {e}")))?;
    let (progress, _) = state.update_progress(&username, move |progress, now| {
        *progress = imported;
        progress.check_in(now);
    })?;

    info!("Imported progress for {username}");
    Ok(Json(progress.into()))
}
