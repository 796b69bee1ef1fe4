use std::net::TcpListener;

use actix_files::Files;
use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::PgPool;

use crate::{
    routes::{dashboard_route, default_route, lead_route, search_route},
    services::{ApifyClient, GoogleMapsClient, SheetsClient, StagingStore},
};

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    maps_client: GoogleMapsClient,
    apify_client: ApifyClient,
    sheets_client: SheetsClient,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let maps_client = web::Data::new(maps_client);
    let apify_client = web::Data::new(apify_client);
    let sheets_client = web::Data::new(sheets_client);
    let staging: Data<StagingStore> = web::Data::new(StagingStore::default());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/static", "./templates/static").prefer_utf8(true))
            .service(default_route::default)
            .service(dashboard_route::dashboard)
            .service(
                web::scope("/search")
                    .service(search_route::maps_search_page)
                    .service(search_route::maps_search)
                    .service(search_route::social_search_page)
                    .service(search_route::social_search)
                    .service(search_route::confirm_selection),
            )
            .service(
                web::scope("/leads")
                    .service(lead_route::lead_list)
                    .service(lead_route::export_leads),
            )
            .app_data(db_pool.clone())
            .app_data(maps_client.clone())
            .app_data(apify_client.clone())
            .app_data(sheets_client.clone())
            .app_data(staging.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
