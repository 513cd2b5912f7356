use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, StatusClass},
    Data, Orbit, Request, Response, Rocket,
};

/// Response header carrying the number the server gave the request.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Per-request bookkeeping, cached on the request the first time it is asked for.
#[derive(Debug)]
pub struct RequestTrace {
    pub id: u64,
    arrived: Instant,
}

impl RequestTrace {
    pub fn of<'r>(req: &'r Request<'_>) -> &'r Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        req.local_cache(|| Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            arrived: Instant::now(),
        })
    }

    fn elapsed_ms(&self) -> f64 {
        self.arrived.elapsed().as_secs_f64() * 1000.0
    }
}

/// The matched route as `name (uri)`, for the response log line.
fn route_name(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match &route.name {
            Some(name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "no route".to_string(),
    }
}

/// Logs every request and response, tagging each response with its request ID.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Accepting votes on {scheme}://{}:{}",
            config.address, config.port
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let trace = RequestTrace::of(req);
        info!("req{} {} {}", trace.id, req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let trace = RequestTrace::of(req);
        let status = res.status();
        let line = format!(
            "rsp{} {status} {} in {:.1}ms",
            trace.id,
            route_name(req),
            trace.elapsed_ms()
        );
        match status.class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
        res.set_header(Header::new(REQUEST_ID_HEADER, trace.id.to_string()));
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down, finishing in-flight requests");
    }
}
