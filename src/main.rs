use std::io;
use std::sync::Arc;

use dotenvy::dotenv;
use storefront_orders::application::notifications::Notifier;
use storefront_orders::config::AppConfig;
use storefront_orders::domain::ports::Mailer;
use storefront_orders::infrastructure::mailer::{LogMailer, SmtpMailer};
use storefront_orders::infrastructure::order_repo::DieselOrderRepository;
use storefront_orders::infrastructure::razorpay::RazorpayClient;
use storefront_orders::{build_server, create_pool, run_migrations, JwtVerifier, OrderService};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).map_err(io::Error::other)?),
        None => {
            log::warn!("EMAIL_HOST not set; notification emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let service = OrderService::new(
        Arc::new(DieselOrderRepository::new(pool)),
        Arc::new(RazorpayClient::new(config.razorpay.clone())),
        Notifier::new(mailer, config.admin_email.clone()),
    );

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(service, JwtVerifier::new(&config.jwt_secret), &config.host, config.port)?.await
}
