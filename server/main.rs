use actix_files::Files;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::env;
use std::path::Path;

use zuglauf::clock;
use zuglauf::models::{Element, Line, OpenLine, OperatingPoint};
use zuglauf::predict::Manager;
use zuglauf::projection::project_trains;
use zuglauf::storage::TimetableStore;
use zuglauf::Config;

struct AppState {
    store: TimetableStore,
    config: Config,
    lines: Vec<Line>,
}

/// Built-in demo line, served when no line data is configured
fn sample_line() -> Line {
    let station = |id, pos, name| {
        OperatingPoint::new(id, pos, name).map(Element::Station)
    };

    Line::load(
        "sample",
        "Beispielstrecke",
        vec![
            station("XDE#1", 0, "Derau").expect("valid sample element"),
            Element::OpenLine(
                OpenLine::new("XDE#1_XCE#1", 15, Some(3000.0), Some(2)).expect("valid sample element"),
            ),
            station("XCE#1", 30, "Cella").expect("valid sample element"),
            station("XLG#1", 50, "Leopoldgrün").expect("valid sample element"),
            station("XDE#2", 100, "Derau").expect("valid sample element"),
        ],
    )
    .expect("valid sample line")
}

fn load_store() -> TimetableStore {
    let paths = (
        env::var("TRAINS_CSV").ok(),
        env::var("TIMETABLE_CSV").ok(),
        env::var("STOP_TIMES_CSV").ok(),
    );

    match paths {
        (Some(trains), Some(timetable), Some(stop_times)) => {
            match TimetableStore::from_files(
                Path::new(&trains),
                Path::new(&timetable),
                Path::new(&stop_times),
            ) {
                Ok(store) => store,
                Err(e) => {
                    log::error!("failed to load timetable store: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => {
            log::warn!("TRAINS_CSV/TIMETABLE_CSV/STOP_TIMES_CSV not set, starting with an empty store");
            TimetableStore::empty()
        }
    }
}

async fn lines_index(state: web::Data<AppState>) -> Result<HttpResponse> {
    let lines: Vec<_> = state
        .lines
        .iter()
        .map(|l| serde_json::json!({ "id": l.id, "name": l.name }))
        .collect();
    Ok(HttpResponse::Ok().json(lines))
}

async fn line_detail(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = path.into_inner();
    match state.lines.iter().find(|l| l.id == id) {
        Some(line) => Ok(HttpResponse::Ok().json(line.serialize())),
        None => Ok(HttpResponse::NotFound().body(format!("no line {id}"))),
    }
}

#[derive(Deserialize)]
struct TrainsQuery {
    line: String,
    start: String,
    end: String,
    /// Prediction time; falls back to the clock server when absent
    now: Option<String>,
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").ok()
}

async fn trains(query: web::Query<TrainsQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(line) = state.lines.iter().find(|l| l.id == query.line) else {
        return Ok(HttpResponse::NotFound().body(format!("no line {}", query.line)));
    };
    let (Some(start), Some(end)) = (parse_time(&query.start), parse_time(&query.end)) else {
        return Ok(HttpResponse::BadRequest().body("start/end must be HH:MM:SS"));
    };

    let now = match &query.now {
        Some(value) => match parse_time(value) {
            Some(now) => now,
            None => return Ok(HttpResponse::BadRequest().body("now must be HH:MM:SS")),
        },
        None => match clock::fetch_time(&state.config.clock_server) {
            Ok((_, time)) => time.time(),
            Err(e) => {
                log::error!("clock server unavailable: {e}");
                return Ok(HttpResponse::BadGateway().body("clock server unavailable"));
            }
        },
    };

    let mut trains = state.store.trains_within_timeframe(start, end);
    let run = Manager::from_trains(&mut trains, now, &state.config, state.store.stop_times())
        .and_then(|mut manager| manager.run());
    if let Err(e) = run {
        log::error!("prediction run failed: {e}");
        return Ok(HttpResponse::InternalServerError().body("prediction failed"));
    }

    Ok(HttpResponse::Ok().json(project_trains(&trains, line)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let state = web::Data::new(AppState {
        store: load_store(),
        config,
        lines: vec![sample_line()],
    });

    log::info!("starting server on 0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Compress::default())
            .wrap(middleware::Logger::default())
            .route("/api/lines", web::get().to(lines_index))
            .route("/api/lines/{id}", web::get().to(line_detail))
            .route("/api/trains", web::get().to(trains))
            .service(Files::new("/", "./frontend").index_file("index.html"))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
