use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use idmatch_core::{ComparisonReport, IdentityRecord};
use idmatch_model::{BatchSummary, MatchEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct CompareRequest {
    pub record1: IdentityRecord,
    pub record2: IdentityRecord,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    pairs: Vec<CompareRequest>,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    results: Vec<ComparisonReport>,
    summary: BatchSummary,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_ready: bool,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(engine: Arc<MatchEngine>, port: u16) -> std::io::Result<()> {
        tracing::info!("HTTP API listening on 0.0.0.0:{}", port);
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .configure(|cfg| configure(cfg, engine.clone()))
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Register the routes and shared engine on an app
pub fn configure(cfg: &mut web::ServiceConfig, engine: Arc<MatchEngine>) {
    cfg.app_data(web::Data::new(engine))
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            let message = err.to_string();
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
            )
            .into()
        }))
        .route("/health", web::get().to(health))
        .route("/compare", web::post().to(compare))
        .route("/compare/batch", web::post().to(compare_batch));
}

async fn health(engine: web::Data<Arc<MatchEngine>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model_ready: engine.ml_matcher().is_ready(),
    }))
}

async fn compare(
    engine: web::Data<Arc<MatchEngine>>,
    req: web::Json<CompareRequest>,
) -> ActixResult<HttpResponse> {
    let engine = Arc::clone(engine.get_ref());
    let CompareRequest { record1, record2 } = req.into_inner();

    // Comparison may train the fallback model, keep it off the async workers
    let report = web::block(move || engine.compare_records(&record1, &record2)).await;
    match report {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(e) => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": e.to_string()
        }))),
    }
}

async fn compare_batch(
    engine: web::Data<Arc<MatchEngine>>,
    req: web::Json<BatchRequest>,
) -> ActixResult<HttpResponse> {
    let engine = Arc::clone(engine.get_ref());
    let pairs: Vec<(IdentityRecord, IdentityRecord)> = req
        .into_inner()
        .pairs
        .into_iter()
        .map(|pair| (pair.record1, pair.record2))
        .collect();

    let results = web::block(move || engine.compare_batch(&pairs)).await;
    match results {
        Ok(results) => {
            let summary = BatchSummary::from_reports(&results);
            Ok(HttpResponse::Ok().json(BatchResponse { results, summary }))
        }
        Err(e) => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": e.to_string()
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use idmatch_core::MatchConfig;
    use serde_json::{json, Value};

    fn engine() -> Arc<MatchEngine> {
        let mut config = MatchConfig::default();
        config.fallback_sample_count = 200;
        config.forest.n_estimators = 10;
        Arc::new(MatchEngine::new(Arc::new(config)).unwrap())
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, engine()))).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_ready"], false);
    }

    #[actix_web::test]
    async fn test_compare() {
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, engine()))).await;
        let req = test::TestRequest::post()
            .uri("/compare")
            .set_json(json!({
                "record1": {"name": "John Doe", "email": "john.doe@gmail.com"},
                "record2": {"name": "Jon Doe", "email": "johndoe@gmail.com", "source": "crm"}
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["rule_based"]["method"], "rule_based");
        assert_eq!(body["ml_based"]["method"], "ml_based");
        assert!(body["rule_based"]["similarity_score"].as_f64().unwrap() > 0.0);
    }

    #[actix_web::test]
    async fn test_compare_batch() {
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, engine()))).await;
        let req = test::TestRequest::post()
            .uri("/compare/batch")
            .set_json(json!({
                "pairs": [
                    {"record1": {"email": "a@x.com"}, "record2": {"email": "a@x.com"}},
                    {"record1": {"name": "Ann"}, "record2": {"name": "Bob"}}
                ]
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["summary"]["total"], 2);
    }

    #[actix_web::test]
    async fn test_malformed_body() {
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, engine()))).await;
        let req = test::TestRequest::post()
            .uri("/compare")
            .set_json(json!({"record1": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
