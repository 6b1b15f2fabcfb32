use std::{error::Error, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use derive_more::From;
use futures::future::try_join_all;
use itertools::Itertools as _;
use serde::Deserialize;
use time::{OffsetDateTime, PrimitiveDateTime, Time};
use tokio::{fs, net};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use turnero::{api, booking, db, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let db_client = db::connect(config.db)?;

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/municipality", get(list_municipalities))
        .route("/municipality/:id/office", get(list_offices))
        .route("/level", get(list_levels))
        .route("/subject", get(list_subjects))
        .route("/office/:id/hours", get(list_office_hours))
        .route(
            "/turno",
            get(find_turno)
                .post(create_turno)
                .patch(edit_turno)
                .delete(cancel_turno),
        )
        .route("/admin/turno", get(search_turnos))
        .route("/admin/turno/:id", patch(admin_edit_turno))
        .route("/admin/stats", get(get_stats))
        .route("/admin/municipality", post(create_municipality))
        .route(
            "/admin/municipality/:id",
            patch(update_municipality).delete(delete_municipality),
        )
        .route("/admin/level", post(create_level))
        .route(
            "/admin/level/:id",
            patch(update_level).delete(delete_level),
        )
        .route("/admin/subject", post(create_subject))
        .route(
            "/admin/subject/:id",
            patch(update_subject).delete(delete_subject),
        )
        .route("/admin/office", post(create_office))
        .route(
            "/admin/office/:id",
            patch(update_office).delete(delete_office),
        )
        .route("/admin/office/:id/hours", post(create_office_hours))
        .route("/admin/hours", get(list_all_hours))
        .route(
            "/admin/hours/:id",
            patch(update_hours).delete(delete_hours),
        )
        .layer(cors)
        .layer(TimeoutLayer::new(config.http.server.request_timeout))
        .with_state(Arc::new(AppState { db_client }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTurnoInput {
    office: db::office::Id,
    level: db::level::Id,
    subject: db::subject::Id,
    curp: String,
    full_name: String,
    given_name: String,
    paternal_surname: String,
    maternal_surname: Option<String>,
    phone: Option<String>,
    mobile: String,
    email: Option<String>,
    notes: Option<String>,
}

async fn create_turno(
    State(state): State<SharedAppState>,
    Json(input): Json<CreateTurnoInput>,
) -> Result<Json<api::Turno>, TurnoError> {
    let curp = input
        .curp
        .parse::<db::requester::Curp>()
        .map_err(booking::Error::InvalidCurp)?;
    let request = booking::issue::Request {
        route: booking::Route {
            office: input.office,
            level: input.level,
            subject: input.subject,
        },
        curp,
        requester: db::requester::Fields {
            full_name: input.full_name,
            given_name: input.given_name,
            paternal_surname: input.paternal_surname,
            maternal_surname: input.maternal_surname,
            phone: input.phone,
            mobile: input.mobile,
            email: input.email,
        },
        notes: input.notes,
    };
    request.validate()?;

    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    let ticket = booking::issue_ticket(&tx, now(), &request).await?;
    let snapshot =
        booking::lifecycle::find_by_lookup(&tx, ticket.number, &request.curp)
            .await?;
    tx.commit().await?;

    turno_view(&state, snapshot).await.map(Json)
}

#[derive(Deserialize)]
struct LookupInput {
    number: i32,
    curp: String,
}

async fn find_turno(
    State(state): State<SharedAppState>,
    Query(LookupInput { number, curp }): Query<LookupInput>,
) -> Result<Json<api::Turno>, TurnoError> {
    let curp = curp
        .parse::<db::requester::Curp>()
        .map_err(booking::Error::InvalidCurp)?;

    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    let snapshot =
        booking::lifecycle::find_by_lookup(&tx, number, &curp).await?;
    tx.commit().await?;

    turno_view(&state, snapshot).await.map(Json)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditTurnoInput {
    number: i32,
    curp: String,
    office: db::office::Id,
    level: db::level::Id,
    subject: db::subject::Id,
    full_name: String,
    given_name: String,
    paternal_surname: String,
    maternal_surname: Option<String>,
    phone: Option<String>,
    mobile: String,
    email: Option<String>,
}

async fn edit_turno(
    State(state): State<SharedAppState>,
    Json(input): Json<EditTurnoInput>,
) -> Result<Json<api::Turno>, TurnoError> {
    let curp = input
        .curp
        .parse::<db::requester::Curp>()
        .map_err(booking::Error::InvalidCurp)?;
    let changes = booking::lifecycle::Changes {
        route: booking::Route {
            office: input.office,
            level: input.level,
            subject: input.subject,
        },
        requester: db::requester::Fields {
            full_name: input.full_name,
            given_name: input.given_name,
            paternal_surname: input.paternal_surname,
            maternal_surname: input.maternal_surname,
            phone: input.phone,
            mobile: input.mobile,
            email: input.email,
        },
    };

    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    let snapshot = booking::lifecycle::edit_by_lookup(
        &tx,
        input.number,
        &curp,
        &changes,
    )
    .await?;
    tx.commit().await?;

    turno_view(&state, snapshot).await.map(Json)
}

async fn cancel_turno(
    State(state): State<SharedAppState>,
    Query(LookupInput { number, curp }): Query<LookupInput>,
) -> Result<StatusCode, TurnoError> {
    let curp = curp
        .parse::<db::requester::Curp>()
        .map_err(booking::Error::InvalidCurp)?;

    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    booking::lifecycle::cancel_by_lookup(&tx, number, &curp).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SearchInput {
    #[serde(default)]
    query: String,
    #[serde(default)]
    view: api::turno::View,
}

async fn search_turnos(
    State(state): State<SharedAppState>,
    Query(SearchInput { query, view }): Query<SearchInput>,
) -> Result<Json<Vec<api::turno::Summary>>, TurnoError> {
    let summaries = state.db_client.search_tickets(&query, view).await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|summary| api::turno::Summary {
                id: summary.ticket.id,
                number: summary.ticket.number,
                date: summary.ticket.scheduled_on,
                time: summary.ticket.scheduled_at,
                status: summary.ticket.status,
                requester_name: summary.requester_name,
                curp: summary.curp.to_string(),
                office: summary.office_name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
enum AdminEditTurnoInput {
    Resolve,
    Reopen,
    Cancel,
}

async fn admin_edit_turno(
    State(state): State<SharedAppState>,
    Path(id): Path<api::turno::Id>,
    Json(op): Json<AdminEditTurnoInput>,
) -> Result<StatusCode, TurnoError> {
    use AdminEditTurnoInput as Op;

    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    match op {
        Op::Resolve => booking::lifecycle::resolve(&tx, id).await?,
        Op::Reopen => booking::lifecycle::reopen(&tx, id).await?,
        Op::Cancel => booking::lifecycle::cancel(&tx, id).await?,
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_stats(
    State(state): State<SharedAppState>,
) -> Result<Json<api::turno::Stats>, TurnoError> {
    let totals_fut = state.db_client.count_tickets_by_status();
    let by_municipality_fut =
        state.db_client.count_tickets_by_municipality();
    let (totals, by_municipality) =
        tokio::try_join!(totals_fut, by_municipality_fut)?;

    let by_municipality = by_municipality
        .into_iter()
        .map(|(municipality, status, total)| {
            (municipality, (status, total))
        })
        .into_group_map()
        .into_iter()
        .map(|(municipality, counts)| api::turno::MunicipalityStats {
            municipality,
            counts: fold_counts(counts),
        })
        .sorted_by(|a, b| a.municipality.cmp(&b.municipality))
        .collect();

    Ok(Json(api::turno::Stats {
        totals: fold_counts(totals),
        by_municipality,
    }))
}

fn fold_counts(
    counts: impl IntoIterator<Item = (db::ticket::Status, i64)>,
) -> api::turno::StatusCounts {
    use db::ticket::Status;

    let mut out = api::turno::StatusCounts::default();
    for (status, total) in counts {
        match status {
            Status::Pending => out.pending = total,
            Status::Resolved => out.resolved = total,
            Status::Cancelled => out.cancelled = total,
        }
    }
    out
}

/// Resolves the display relations of a ticket snapshot into the full
/// public view.
async fn turno_view(
    state: &AppState,
    snapshot: db::ticket::Snapshot,
) -> Result<api::Turno, TurnoError> {
    use TurnoError as E;

    let db::ticket::Snapshot { ticket, requester } = snapshot;

    let office_fut = state.db_client.get_office_by_id(ticket.office);
    let level_fut = state.db_client.get_level_by_id(ticket.level);
    let subject_fut = state.db_client.get_subject_by_id(ticket.subject);
    let (office, level, subject) =
        tokio::try_join!(office_fut, level_fut, subject_fut)?;
    let office = office.ok_or(E::MissingRelation)?;
    let level = level.ok_or(E::MissingRelation)?;
    let subject = subject.ok_or(E::MissingRelation)?;
    let municipality = state
        .db_client
        .get_municipality_by_id(office.municipality)
        .await?
        .ok_or(E::MissingRelation)?;

    Ok(api::Turno {
        number: ticket.number,
        date: ticket.scheduled_on,
        time: ticket.scheduled_at,
        status: ticket.status,
        requester: api::turno::Requester {
            full_name: requester.fields.full_name,
            given_name: requester.fields.given_name,
            paternal_surname: requester.fields.paternal_surname,
            maternal_surname: requester.fields.maternal_surname,
            curp: requester.curp.to_string(),
            phone: requester.fields.phone,
            mobile: requester.fields.mobile,
            email: requester.fields.email,
        },
        office: api::Office {
            id: office.id,
            name: office.name,
            municipality: api::Municipality {
                id: municipality.id,
                name: municipality.name,
            },
        },
        level: api::Level {
            id: level.id,
            name: level.name,
        },
        subject: api::Subject {
            id: subject.id,
            description: subject.description,
        },
        notes: ticket.notes,
    })
}

#[derive(Debug, From)]
pub enum TurnoError {
    #[from]
    Booking(booking::Error),
    #[from]
    Db(db::Error),
    MissingRelation,
}

impl IntoResponse for TurnoError {
    fn into_response(self) -> Response {
        use booking::Error as B;

        match self {
            Self::Booking(e @ B::NoAvailability) => {
                (StatusCode::CONFLICT, e.to_string()).into_response()
            }
            Self::Booking(e @ (B::SlotTaken | B::DuplicateRequest)) => {
                tracing::warn!("booking conflict: {e}");
                (
                    StatusCode::CONFLICT,
                    "could not book a turno, please try again".to_owned(),
                )
                    .into_response()
            }
            Self::Booking(
                e @ (B::UnknownOffice(_)
                | B::InvalidReference
                | B::MissingField(_)
                | B::InvalidCurp(_)),
            ) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
                .into_response(),
            Self::Booking(e @ B::NotEligible) => {
                (StatusCode::NOT_FOUND, e.to_string()).into_response()
            }
            Self::Booking(B::Store(e)) => {
                tracing::error!("storage error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Db(e) => {
                tracing::error!("database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::MissingRelation => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn list_municipalities(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::Municipality>>, CatalogError> {
    Ok(Json(
        state
            .db_client
            .get_municipalities()
            .await?
            .into_iter()
            .map(|m| api::Municipality {
                id: m.id,
                name: m.name,
            })
            .collect(),
    ))
}

async fn list_offices(
    State(state): State<SharedAppState>,
    Path(id): Path<db::municipality::Id>,
) -> Result<Json<Vec<api::Office>>, CatalogError> {
    let municipality_fut = state.db_client.get_municipality_by_id(id);
    let offices_fut = state.db_client.get_offices_by_municipality(id);
    let (municipality, offices) =
        tokio::try_join!(municipality_fut, offices_fut)?;
    let municipality = municipality.ok_or(CatalogError::NotFound)?;
    let municipality = api::Municipality {
        id: municipality.id,
        name: municipality.name,
    };

    Ok(Json(
        offices
            .into_iter()
            .map(|o| api::Office {
                id: o.id,
                name: o.name,
                municipality: municipality.clone(),
            })
            .collect(),
    ))
}

async fn list_levels(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::Level>>, CatalogError> {
    Ok(Json(
        state
            .db_client
            .get_levels()
            .await?
            .into_iter()
            .map(|l| api::Level {
                id: l.id,
                name: l.name,
            })
            .collect(),
    ))
}

async fn list_subjects(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::Subject>>, CatalogError> {
    Ok(Json(
        state
            .db_client
            .get_subjects()
            .await?
            .into_iter()
            .map(|s| api::Subject {
                id: s.id,
                description: s.description,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct NameInput {
    name: String,
}

async fn create_municipality(
    State(state): State<SharedAppState>,
    Json(NameInput { name }): Json<NameInput>,
) -> Result<Json<api::Municipality>, CatalogError> {
    let name = non_empty(&name)?;
    let municipality = state.db_client.create_municipality(name).await?;
    Ok(Json(api::Municipality {
        id: municipality.id,
        name: municipality.name,
    }))
}

async fn update_municipality(
    State(state): State<SharedAppState>,
    Path(id): Path<db::municipality::Id>,
    Json(NameInput { name }): Json<NameInput>,
) -> Result<StatusCode, CatalogError> {
    let name = non_empty(&name)?;
    if state.db_client.update_municipality(id, name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn delete_municipality(
    State(state): State<SharedAppState>,
    Path(id): Path<db::municipality::Id>,
) -> Result<StatusCode, CatalogError> {
    if state.db_client.delete_municipality(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn create_level(
    State(state): State<SharedAppState>,
    Json(NameInput { name }): Json<NameInput>,
) -> Result<Json<api::Level>, CatalogError> {
    let name = non_empty(&name)?;
    let level = state.db_client.create_level(name).await?;
    Ok(Json(api::Level {
        id: level.id,
        name: level.name,
    }))
}

async fn update_level(
    State(state): State<SharedAppState>,
    Path(id): Path<db::level::Id>,
    Json(NameInput { name }): Json<NameInput>,
) -> Result<StatusCode, CatalogError> {
    let name = non_empty(&name)?;
    if state.db_client.update_level(id, name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn delete_level(
    State(state): State<SharedAppState>,
    Path(id): Path<db::level::Id>,
) -> Result<StatusCode, CatalogError> {
    if state.db_client.delete_level(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

#[derive(Deserialize)]
struct SubjectInput {
    description: String,
}

async fn create_subject(
    State(state): State<SharedAppState>,
    Json(SubjectInput { description }): Json<SubjectInput>,
) -> Result<Json<api::Subject>, CatalogError> {
    let description = non_empty(&description)?;
    let subject = state.db_client.create_subject(description).await?;
    Ok(Json(api::Subject {
        id: subject.id,
        description: subject.description,
    }))
}

async fn update_subject(
    State(state): State<SharedAppState>,
    Path(id): Path<db::subject::Id>,
    Json(SubjectInput { description }): Json<SubjectInput>,
) -> Result<StatusCode, CatalogError> {
    let description = non_empty(&description)?;
    if state.db_client.update_subject(id, description).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn delete_subject(
    State(state): State<SharedAppState>,
    Path(id): Path<db::subject::Id>,
) -> Result<StatusCode, CatalogError> {
    if state.db_client.delete_subject(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeInput {
    name: String,
    municipality: db::municipality::Id,
}

async fn create_office(
    State(state): State<SharedAppState>,
    Json(OfficeInput { name, municipality }): Json<OfficeInput>,
) -> Result<Json<api::Office>, CatalogError> {
    let name = non_empty(&name)?;
    let office = state.db_client.create_office(name, municipality).await?;
    let municipality = state
        .db_client
        .get_municipality_by_id(office.municipality)
        .await?
        .ok_or(CatalogError::NotFound)?;
    Ok(Json(api::Office {
        id: office.id,
        name: office.name,
        municipality: api::Municipality {
            id: municipality.id,
            name: municipality.name,
        },
    }))
}

async fn update_office(
    State(state): State<SharedAppState>,
    Path(id): Path<db::office::Id>,
    Json(OfficeInput { name, municipality }): Json<OfficeInput>,
) -> Result<StatusCode, CatalogError> {
    let name = non_empty(&name)?;
    if state.db_client.update_office(id, name, municipality).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn delete_office(
    State(state): State<SharedAppState>,
    Path(id): Path<db::office::Id>,
) -> Result<StatusCode, CatalogError> {
    if state.db_client.delete_office(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn list_office_hours(
    State(state): State<SharedAppState>,
    Path(id): Path<db::office::Id>,
) -> Result<Json<Vec<api::Hours>>, CatalogError> {
    Ok(Json(
        state
            .db_client
            .get_hours_by_office(id)
            .await?
            .into_iter()
            .map(api::Hours::from)
            .collect(),
    ))
}

async fn list_all_hours(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::Hours>>, CatalogError> {
    Ok(Json(
        state
            .db_client
            .get_hours()
            .await?
            .into_iter()
            .map(api::Hours::from)
            .collect(),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateHoursInput {
    days: Vec<api::catalog::Weekday>,
    opens_at: Time,
    closes_at: Time,
    #[serde(default = "default_max_tickets")]
    max_tickets: i16,
}

fn default_max_tickets() -> i16 {
    50
}

async fn create_office_hours(
    State(state): State<SharedAppState>,
    Path(id): Path<db::office::Id>,
    Json(input): Json<CreateHoursInput>,
) -> Result<Json<Vec<api::Hours>>, CatalogError> {
    if input.days.is_empty() {
        return Err(CatalogError::NoDays);
    }

    // One transaction for the whole batch: either every selected
    // weekday gets its entry or none does.
    let mut conn = state.db_client.conn().await?;
    let tx = conn.begin().await?;
    let created = try_join_all(input.days.iter().map(|&weekday| {
        tx.create_hours(
            id,
            weekday,
            input.opens_at,
            input.closes_at,
            input.max_tickets,
        )
    }))
    .await?;
    tx.commit().await?;

    Ok(Json(created.into_iter().map(api::Hours::from).collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateHoursInput {
    office: db::office::Id,
    weekday: api::catalog::Weekday,
    opens_at: Time,
    closes_at: Time,
    max_tickets: i16,
}

async fn update_hours(
    State(state): State<SharedAppState>,
    Path(id): Path<db::schedule::Id>,
    Json(input): Json<UpdateHoursInput>,
) -> Result<StatusCode, CatalogError> {
    let updated = state
        .db_client
        .update_hours(
            id,
            input.office,
            input.weekday,
            input.opens_at,
            input.closes_at,
            input.max_tickets,
        )
        .await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

async fn delete_hours(
    State(state): State<SharedAppState>,
    Path(id): Path<db::schedule::Id>,
) -> Result<StatusCode, CatalogError> {
    if state.db_client.delete_hours(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound)
    }
}

fn non_empty(value: &str) -> Result<&str, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        Err(CatalogError::Empty)
    } else {
        Ok(value)
    }
}

#[derive(Debug, From)]
pub enum CatalogError {
    #[from]
    Db(db::Error),
    Empty,
    NoDays,
    NotFound,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        match self {
            Self::Empty => {
                (StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty")
                    .into_response()
            }
            Self::NoDays => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "at least one weekday is required",
            )
                .into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Db(e) if e.is_unique_violation() => {
                (StatusCode::CONFLICT, "already exists").into_response()
            }
            Self::Db(e) if e.is_foreign_key_violation() => (
                StatusCode::CONFLICT,
                "conflicts with related records",
            )
                .into_response(),
            Self::Db(e) => {
                tracing::error!("database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: db::Client,
}
