use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation::domain::{Availability, Transaction};
use circulation::infrastructure::AppState;
use circulation::services::CirculationPolicy;
use circulation::{config, db, seed};

#[derive(Serialize)]
struct BookLine {
    name: String,
    author: String,
    #[serde(flatten)]
    availability: Availability,
}

#[derive(Serialize)]
struct Report {
    books: Vec<BookLine>,
    overdue: Vec<Transaction>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circulation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    // Check for --profile CLI argument
    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--profile")
        && let Some(val) = args.get(pos + 1)
    {
        unsafe { std::env::set_var("PROFILE", val) };
    }

    let config = config::Config::from_env();

    // Initialize database
    let db = db::init_db(&config.database_url)
        .await
        .expect("Failed to initialize database");

    let state = AppState::new(db, CirculationPolicy::from(&config));

    // Check for seed flag
    if std::env::var("SEED_DEMO").is_ok() {
        tracing::info!("Seeding demo data...");
        match seed::seed_demo_data(
            state.category_repo.as_ref(),
            state.book_repo.as_ref(),
            state.user_repo.as_ref(),
        )
        .await
        {
            Ok(summary) => tracing::info!("Demo data seeded: {:?}", summary),
            Err(e) => tracing::error!("Failed to seed data: {}", e),
        }
    }

    let today = chrono::Local::now().date_naive();
    let report = match build_report(&state, today).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Failed to build circulation report: {}", e);
            std::process::exit(1);
        }
    };

    for tx in &report.overdue {
        tracing::warn!(
            "Transaction #{} '{}' borrowed by {} was due {}",
            tx.id,
            tx.book_name,
            tx.borrower_name,
            tx.to_date
        );
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize report: {}", e),
    }
}

async fn build_report(
    state: &AppState,
    today: chrono::NaiveDate,
) -> Result<Report, circulation::domain::DomainError> {
    let books = state
        .book_repo
        .find_all()
        .await?
        .into_iter()
        .map(|book| BookLine {
            availability: book.availability(),
            name: book.name,
            author: book.author,
        })
        .collect();

    let overdue = state.transaction_repo.find_overdue(today).await?;

    Ok(Report { books, overdue })
}
