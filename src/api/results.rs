use rocket::{
    http::{ContentType, Header},
    response::{self, Responder},
    serde::json::Json,
    Request, Response, Route,
};

use crate::error::Result;
use crate::model::{
    api::auth::{Admin, AnyRole, AuthToken},
    mongodb::Id,
};
use crate::store::Storage;
use crate::voting::{get_results, report_filename, write_csv, ElectionResults};

pub fn routes() -> Vec<Route> {
    routes![election_results, election_report]
}

#[get("/results/<election_id>")]
async fn election_results(
    _token: AuthToken<AnyRole>,
    election_id: Id,
    storage: Storage,
) -> Result<Json<ElectionResults>> {
    Ok(Json(get_results(&*storage, election_id).await?))
}

/// A CSV document sent as a file download.
pub struct CsvReport {
    filename: String,
    body: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for CsvReport {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        Response::build_from(self.body.respond_to(req)?)
            .header(ContentType::CSV)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ))
            .ok()
    }
}

#[get("/reports/<election_id>/csv")]
async fn election_report(
    token: AuthToken<Admin>,
    election_id: Id,
    storage: Storage,
) -> Result<CsvReport> {
    let results = get_results(&*storage, election_id).await?;
    let body = write_csv(&results)?;
    info!("Admin {} exported results of election {election_id}", token.id);
    Ok(CsvReport {
        filename: report_filename(&results.title),
        body,
    })
}
