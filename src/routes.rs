use crate::{
    api::{admin, alert, analytics, customer, events, expense, inventory, notification, service, worker},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/session").route(web::get().to(handlers::session)))
            .service(web::resource("/events").route(web::get().to(events::stream_events)))
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("")
                            .route(web::get().to(notification::list_notifications))
                            .route(web::delete().to(notification::clear_notifications)),
                    )
                    .service(
                        web::resource("/{id}/read")
                            .route(web::put().to(notification::mark_notification_read)),
                    ),
            )
            .service(
                web::scope("/customers")
                    .service(
                        web::resource("")
                            .route(web::post().to(customer::create_customer))
                            .route(web::get().to(customer::list_customers)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(customer::get_customer))
                            .route(web::put().to(customer::update_customer))
                            .route(web::delete().to(customer::delete_customer)),
                    ),
            )
            .service(
                web::scope("/workers")
                    .service(
                        web::resource("")
                            .route(web::post().to(worker::create_worker))
                            .route(web::get().to(worker::list_workers)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(worker::get_worker))
                            .route(web::put().to(worker::update_worker))
                            .route(web::delete().to(worker::delete_worker)),
                    )
                    .service(
                        web::resource("/{id}/payment")
                            .route(web::put().to(worker::set_payment_status)),
                    )
                    .service(
                        web::resource("/{id}/earnings").route(web::get().to(worker::list_earnings)),
                    ),
            )
            .service(
                web::scope("/services")
                    .service(
                        web::resource("")
                            .route(web::post().to(service::create_service))
                            .route(web::get().to(service::list_services)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(service::get_service))
                            .route(web::put().to(service::update_service))
                            .route(web::delete().to(service::delete_service)),
                    )
                    .service(
                        web::resource("/{id}/status").route(web::put().to(service::update_status)),
                    )
                    .service(
                        web::resource("/{id}/items")
                            .route(web::get().to(service::list_items))
                            .route(web::post().to(service::add_item)),
                    )
                    .service(
                        web::resource("/{id}/items/{item_id}")
                            .route(web::delete().to(service::remove_item)),
                    )
                    .service(
                        web::resource("/{id}/availability")
                            .route(web::get().to(service::availability)),
                    )
                    .service(
                        web::resource("/{id}/complete")
                            .route(web::post().to(service::complete_service)),
                    ),
            )
            .service(
                web::scope("/inventory")
                    .service(
                        web::resource("/items")
                            .route(web::post().to(inventory::create_item))
                            .route(web::get().to(inventory::list_items)),
                    )
                    .service(
                        web::resource("/items/{id}")
                            .route(web::get().to(inventory::get_item))
                            .route(web::put().to(inventory::update_item))
                            .route(web::delete().to(inventory::delete_item)),
                    )
                    .service(
                        web::resource("/items/{id}/adjust")
                            .route(web::post().to(inventory::adjust_stock)),
                    )
                    .service(
                        web::resource("/items/{id}/transactions")
                            .route(web::get().to(inventory::list_transactions)),
                    )
                    .service(
                        web::resource("/categories")
                            .route(web::get().to(inventory::list_categories))
                            .route(web::post().to(inventory::create_category)),
                    )
                    .service(
                        web::resource("/categories/{id}")
                            .route(web::delete().to(inventory::delete_category)),
                    )
                    .service(
                        web::resource("/products")
                            .route(web::get().to(inventory::list_products))
                            .route(web::post().to(inventory::create_product)),
                    )
                    .service(
                        web::resource("/products/{id}")
                            .route(web::delete().to(inventory::delete_product)),
                    ),
            )
            .service(
                web::scope("/alerts")
                    .service(
                        web::resource("")
                            .route(web::get().to(alert::list_alerts))
                            .route(web::post().to(alert::create_alert)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(alert::delete_alert)))
                    .service(
                        web::resource("/{id}/read").route(web::put().to(alert::mark_alert_read)),
                    ),
            )
            .service(
                web::scope("/expenses")
                    .service(
                        web::resource("")
                            .route(web::post().to(expense::create_expense))
                            .route(web::get().to(expense::list_expenses)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(expense::get_expense))
                            .route(web::put().to(expense::update_expense))
                            .route(web::delete().to(expense::delete_expense)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(web::resource("/profiles").route(web::get().to(admin::list_profiles)))
                    .service(
                        web::resource("/profiles/{user_id}")
                            .route(web::put().to(admin::update_profile)),
                    ),
            )
            .service(
                web::scope("/analytics")
                    .service(web::resource("/summary").route(web::get().to(analytics::summary)))
                    .service(web::resource("/export").route(web::get().to(analytics::export))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  ├─ refresh_token (7 days)
//  └─ session snapshot (profile provisioned on first login)

// API REQUEST
//  └─ Authorization: Bearer access_token
//       └─ permissions read live from the watcher, banned => 403

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a rotated token pair
